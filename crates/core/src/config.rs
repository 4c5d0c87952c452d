//! Process configuration.
//!
//! Everything the studio needs at runtime comes from the environment
//! (the CLI loads a `.env` file first). `INTERNAL_API_SECRET` is only
//! meaningful together with `PREVIEW_BACKEND_URL`; configuring one
//! without the other is rejected up front.

use std::path::PathBuf;

use url::Url;

/// Error types for configuration loading.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable {0}")]
    MissingVar(&'static str),

    #[error("Invalid value for {0}: {1}")]
    InvalidVar(&'static str, String),

    #[error("INTERNAL_API_SECRET is required when PREVIEW_BACKEND_URL is set")]
    MissingInternalSecret,
}

/// Runtime configuration for the studio process.
#[derive(Debug, Clone)]
pub struct StudioConfig {
    /// Root of the template store on disk
    pub project_root: PathBuf,

    /// The canonical base project tree inside the template store
    pub core_base: PathBuf,

    pub cors_origin: String,

    pub port: u16,

    /// Connection string for the catalog store
    pub database_url: String,

    /// Sender identity handed to the external email collaborator
    pub email_from: String,

    /// Preview backend endpoint; previews are disabled when unset
    pub preview_backend_url: Option<Url>,

    /// Shared secret for signing preview backend requests
    pub internal_api_secret: Option<String>,
}

impl StudioConfig {
    /// Load configuration from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration through an arbitrary lookup, for tests.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let required = |key: &'static str| lookup(key).ok_or(ConfigError::MissingVar(key));

        let port_raw = lookup("PORT").unwrap_or_else(|| "4000".to_string());
        let port = port_raw
            .parse::<u16>()
            .map_err(|_| ConfigError::InvalidVar("PORT", port_raw.clone()))?;

        let preview_backend_url = match lookup("PREVIEW_BACKEND_URL") {
            Some(raw) => Some(
                Url::parse(&raw).map_err(|_| ConfigError::InvalidVar("PREVIEW_BACKEND_URL", raw))?,
            ),
            None => None,
        };

        let internal_api_secret = lookup("INTERNAL_API_SECRET");
        if preview_backend_url.is_some() && internal_api_secret.is_none() {
            return Err(ConfigError::MissingInternalSecret);
        }

        Ok(Self {
            project_root: PathBuf::from(required("PROJECT_ROOT")?),
            core_base: PathBuf::from(required("CORE_BASE")?),
            cors_origin: lookup("CORS_ORIGIN")
                .unwrap_or_else(|| "http://localhost:3000".to_string()),
            port,
            database_url: required("DATABASE_URL")?,
            email_from: lookup("EMAIL_FROM")
                .unwrap_or_else(|| "orders@forgekit.dev".to_string()),
            preview_backend_url,
            internal_api_secret,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    fn base_env() -> HashMap<String, String> {
        env(&[
            ("PROJECT_ROOT", "/srv/studio/templates"),
            ("CORE_BASE", "/srv/studio/templates/core"),
            ("DATABASE_URL", "postgresql://localhost/studio"),
        ])
    }

    #[test]
    fn test_minimal_configuration_with_defaults() {
        let vars = base_env();
        let config = StudioConfig::from_lookup(|k| vars.get(k).cloned()).unwrap();

        assert_eq!(config.port, 4000);
        assert_eq!(config.cors_origin, "http://localhost:3000");
        assert!(config.preview_backend_url.is_none());
    }

    #[test]
    fn test_missing_required_var() {
        let mut vars = base_env();
        vars.remove("DATABASE_URL");
        let err = StudioConfig::from_lookup(|k| vars.get(k).cloned()).unwrap_err();
        assert!(matches!(err, ConfigError::MissingVar("DATABASE_URL")));
    }

    #[test]
    fn test_invalid_port() {
        let mut vars = base_env();
        vars.insert("PORT".to_string(), "not-a-port".to_string());
        let err = StudioConfig::from_lookup(|k| vars.get(k).cloned()).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidVar("PORT", _)));
    }

    #[test]
    fn test_preview_backend_requires_secret() {
        let mut vars = base_env();
        vars.insert(
            "PREVIEW_BACKEND_URL".to_string(),
            "http://preview.internal".to_string(),
        );
        let err = StudioConfig::from_lookup(|k| vars.get(k).cloned()).unwrap_err();
        assert!(matches!(err, ConfigError::MissingInternalSecret));

        vars.insert("INTERNAL_API_SECRET".to_string(), "hunter2".to_string());
        let config = StudioConfig::from_lookup(|k| vars.get(k).cloned()).unwrap();
        assert!(config.preview_backend_url.is_some());
        assert_eq!(config.internal_api_secret.as_deref(), Some("hunter2"));
    }
}
