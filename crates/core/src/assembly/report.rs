//! Non-fatal findings collected while generating an archive.
//!
//! Warnings ride a side channel next to the archive stream: they are
//! readable by the caller after `generate` returns and never affect the
//! bytes in the archive.

use forgekit_types::PackageKind;
use serde::Serialize;

/// A non-fatal finding recorded during generation.
#[derive(Debug, Clone, Serialize, thiserror::Error)]
#[serde(rename_all = "camelCase", tag = "type")]
pub enum GenerationWarning {
    /// A feature file mapping pointed at a source that does not exist.
    #[error("Missing source '{source_path}' for feature '{feature}'; file skipped")]
    #[serde(rename_all = "camelCase")]
    MissingSource {
        feature: String,
        #[serde(rename = "source")]
        source_path: String,
    },

    /// A schema fragment redeclared a model or enum; first occurrence wins.
    #[error("Duplicate schema declaration '{name}' from feature '{feature}'; keeping the first occurrence")]
    #[serde(rename_all = "camelCase")]
    SchemaDuplicate { name: String, feature: String },

    /// Two sources declared different versions for the same package.
    #[error("Conflicting versions for {kind:?} package '{name}': keeping '{kept}', ignoring '{ignored}'")]
    #[serde(rename_all = "camelCase")]
    DependencyConflict {
        name: String,
        kind: PackageKind,
        kept: String,
        ignored: String,
    },
}

/// The structured side channel for one `generate` call.
#[derive(Debug, Default)]
pub struct GenerationReport {
    pub warnings: Vec<GenerationWarning>,
}

impl GenerationReport {
    pub fn warn(&mut self, warning: GenerationWarning) {
        tracing::warn!("{warning}");
        self.warnings.push(warning);
    }

    pub fn is_clean(&self) -> bool {
        self.warnings.is_empty()
    }
}
