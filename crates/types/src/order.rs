//! Paid order snapshot consumed by the assembly pipeline.
//!
//! Orders are created by the storefront at checkout time; the pipeline
//! treats them as read-only input. Pricing totals are persisted on the
//! order when the pricing calculator runs, and later materialized into
//! the emitted LICENSE document.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Currency codes for billing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Currency {
    /// US Dollar
    Usd,
    /// Euro
    Eur,
    /// British Pound
    Gbp,
}

impl Currency {
    /// Get the string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            Currency::Usd => "usd",
            Currency::Eur => "eur",
            Currency::Gbp => "gbp",
        }
    }
}

/// Monetary totals persisted on the order, in minor units.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct OrderTotals {
    pub subtotal: i64,
    pub discount: i64,
    pub total: i64,
    pub currency: Currency,
}

/// Download license status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LicenseStatus {
    Active,
    Revoked,
    Expired,
}

/// License issued against an order.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct OrderLicense {
    pub key: String,
    pub download_token: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,

    pub max_downloads: u32,

    #[serde(default)]
    pub download_count: u32,

    pub status: LicenseStatus,
}

/// A paid order: the input to `generate`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct Order {
    pub order_number: String,

    /// Tier slug
    pub tier: String,

    #[serde(default)]
    pub selected_features: Vec<String>,

    /// Template slug, when the customer started from a preset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub template: Option<String>,

    pub customer_email: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub customer_name: Option<String>,

    /// Creation timestamp; also the fixed modification time stamped on
    /// every archive entry so re-generation is byte-identical
    pub created_at: DateTime<Utc>,

    pub totals: OrderTotals,

    pub license: OrderLicense,
}

impl Order {
    /// Top-level directory name inside the emitted archive.
    pub fn project_name(&self) -> String {
        let base = self.template.as_deref().unwrap_or("starter");
        format!("{}-{}", base, self.tier)
    }
}
