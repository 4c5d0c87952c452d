//! Catalog and order data model for ForgeKit.
//!
//! These types define the structure of the feature catalog, pricing
//! records, orders and preview sessions. They are shared by the core
//! assembly pipeline and the CLI, and mirror the wire shapes stored in
//! the catalog (camelCase JSON columns). Decoding is strict: unknown
//! keys are rejected at catalog read time so schema drift surfaces when
//! an admin writes a record, not when a customer generates an archive.

use serde::{Deserialize, Serialize};

pub mod catalog;
pub mod order;
pub mod preview;
pub mod validate;

pub use catalog::{ActiveWindow, BundleDiscount, Coupon, DiscountType, PricingTier, Template};
pub use order::{Currency, LicenseStatus, Order, OrderLicense, OrderTotals};
pub use preview::{PreviewSession, SchemaStatus, SchemaStatusError};
pub use validate::{DiagnosticSeverity, ValidationDiagnostic, ValidationResult};

/// A unit of optional functionality sold by the studio.
///
/// Features are created out of band in the catalog and treated as
/// immutable snapshots by the assembly pipeline. Each feature carries
/// the artifacts the pipeline merges into the emitted project: file
/// relocations, schema fragments, environment variables and package
/// additions.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct Feature {
    /// Stable identifier used everywhere features are referenced
    pub slug: String,

    /// Human-readable name
    pub name: String,

    #[serde(default)]
    pub description: String,

    /// Module membership; groups features in emitted documents
    pub category: String,

    /// Add-on price in minor units; zero for features only ever bundled
    #[serde(default)]
    pub price: i64,

    /// Slugs of features this one depends on
    #[serde(default)]
    pub requires: Vec<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub file_mappings: Vec<FileMapping>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub schema_mappings: Vec<SchemaMapping>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub env_vars: Vec<EnvVar>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub npm_packages: Vec<PackageSpec>,
}

/// A declared source → destination relocation contributed by a feature.
///
/// `source` is a logical path with recognized roots (`modules/<name>/...`,
/// `core/...`, or a legacy path relative to the core tree). `destination`
/// is a path inside the emitted project. Both are validated against their
/// roots before any I/O.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct FileMapping {
    pub source: String,
    pub destination: String,
}

/// A schema fragment contributed by a feature.
///
/// `model` is advisory; the merger discovers real model and enum names
/// by parsing the fragment.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct SchemaMapping {
    pub model: String,
    pub source: String,
}

/// An environment variable a feature needs in the emitted project.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct EnvVar {
    pub key: String,

    #[serde(default)]
    pub description: String,

    #[serde(default)]
    pub required: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<String>,
}

/// Dependency manifest section a package belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PackageKind {
    Runtime,
    Dev,
    Peer,
}

impl Default for PackageKind {
    fn default() -> Self {
        PackageKind::Runtime
    }
}

impl PackageKind {
    /// Parse from string (case-insensitive)
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "runtime" => Some(PackageKind::Runtime),
            "dev" => Some(PackageKind::Dev),
            "peer" => Some(PackageKind::Peer),
            _ => None,
        }
    }

    /// Get the string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            PackageKind::Runtime => "runtime",
            PackageKind::Dev => "dev",
            PackageKind::Peer => "peer",
        }
    }
}

/// Dependency manifest a package is merged into
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ManifestTarget {
    Server,
    Web,
}

impl Default for ManifestTarget {
    fn default() -> Self {
        ManifestTarget::Server
    }
}

impl ManifestTarget {
    /// Get the string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            ManifestTarget::Server => "server",
            ManifestTarget::Web => "web",
        }
    }
}

/// A package a feature adds to one of the generated dependency manifests.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct PackageSpec {
    pub name: String,
    pub version: String,

    #[serde(default)]
    pub kind: PackageKind,

    /// Which generated manifest receives this package
    #[serde(default)]
    pub target: ManifestTarget,
}
