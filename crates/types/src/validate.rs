//! Validation diagnostics reported by the catalog validator.

use serde::Serialize;

/// Severity of a validation diagnostic
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DiagnosticSeverity {
    Error,
    Warning,
    Info,
}

/// A single validation diagnostic message
#[derive(Debug, Clone, Serialize)]
pub struct ValidationDiagnostic {
    /// Unique rule identifier
    pub rule: String,
    /// Human-readable message
    pub message: String,
    /// Severity level
    pub severity: DiagnosticSeverity,
    /// Field path where the issue was found
    #[serde(skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
    /// Suggestion for how to fix the issue
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suggestion: Option<String>,
}

impl ValidationDiagnostic {
    pub fn error(rule: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            rule: rule.into(),
            message: message.into(),
            severity: DiagnosticSeverity::Error,
            field: None,
            suggestion: None,
        }
    }

    pub fn warning(rule: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            rule: rule.into(),
            message: message.into(),
            severity: DiagnosticSeverity::Warning,
            field: None,
            suggestion: None,
        }
    }

    pub fn with_field(mut self, field: impl Into<String>) -> Self {
        self.field = Some(field.into());
        self
    }

    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestion = Some(suggestion.into());
        self
    }
}

/// Result of validating a catalog snapshot
#[derive(Debug, Clone, Serialize)]
pub struct ValidationResult {
    pub diagnostics: Vec<ValidationDiagnostic>,
    pub error_count: usize,
    pub warning_count: usize,
    pub is_valid: bool,
}

impl ValidationResult {
    pub fn from_diagnostics(diagnostics: Vec<ValidationDiagnostic>) -> Self {
        let error_count = diagnostics
            .iter()
            .filter(|d| d.severity == DiagnosticSeverity::Error)
            .count();
        let warning_count = diagnostics
            .iter()
            .filter(|d| d.severity == DiagnosticSeverity::Warning)
            .count();

        ValidationResult {
            is_valid: error_count == 0,
            error_count,
            warning_count,
            diagnostics,
        }
    }
}
