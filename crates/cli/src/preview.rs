use chrono::Utc;
use console::style;
use forgekit_core::preview::PreviewClient;
use forgekit_core::PreviewError;
use forgekit_types::PreviewSession;
use url::Url;

/// Default preview session lifetime.
const SESSION_TTL_MINUTES: i64 = 30;

#[derive(Debug, Clone, clap::Args)]
pub struct ProvisionCommand {
    /// Session token to provision a schema for
    #[arg(long)]
    pub session_token: String,

    /// Tier slug the customer is previewing
    #[arg(long)]
    pub tier: String,

    /// Comma-separated feature slugs
    #[arg(long, value_delimiter = ',')]
    pub features: Vec<String>,

    /// Preview backend endpoint
    #[arg(long, env = "PREVIEW_BACKEND_URL")]
    pub backend_url: Url,

    /// Shared secret for the internal channel
    #[arg(long, env = "INTERNAL_API_SECRET", hide_env_values = true)]
    pub secret: String,
}

impl ProvisionCommand {
    pub async fn execute(&self) -> Result<(), PreviewError> {
        let client = PreviewClient::new(self.backend_url.clone(), self.secret.clone())?;
        let mut session = PreviewSession::new(
            self.session_token.clone(),
            Utc::now(),
            chrono::Duration::minutes(SESSION_TTL_MINUTES),
        );

        client
            .provision(&mut session, &self.features, &self.tier)
            .await?;

        eprintln!(
            "{} Provisioned schema {} for session {}",
            style("✓").green(),
            session.schema_name.as_deref().unwrap_or("<unknown>"),
            session.session_token
        );
        Ok(())
    }
}

#[derive(Debug, Clone, clap::Args)]
pub struct InvalidateCommand {
    /// Session token to invalidate
    #[arg(long)]
    pub session_token: String,

    /// Preview backend endpoint
    #[arg(long, env = "PREVIEW_BACKEND_URL")]
    pub backend_url: Url,

    /// Shared secret for the internal channel
    #[arg(long, env = "INTERNAL_API_SECRET", hide_env_values = true)]
    pub secret: String,
}

impl InvalidateCommand {
    pub async fn execute(&self) -> Result<(), PreviewError> {
        let client = PreviewClient::new(self.backend_url.clone(), self.secret.clone())?;
        let mut session = PreviewSession::new(
            self.session_token.clone(),
            Utc::now(),
            chrono::Duration::minutes(SESSION_TTL_MINUTES),
        );

        client.invalidate(&mut session).await;
        eprintln!(
            "{} Invalidated session {}",
            style("✓").green(),
            session.session_token
        );
        Ok(())
    }
}

#[derive(Debug, Clone, clap::Args)]
pub struct DropCommand {
    /// Schema name to drop
    #[arg(long)]
    pub schema_name: String,

    /// Preview backend endpoint
    #[arg(long, env = "PREVIEW_BACKEND_URL")]
    pub backend_url: Url,

    /// Shared secret for the internal channel
    #[arg(long, env = "INTERNAL_API_SECRET", hide_env_values = true)]
    pub secret: String,
}

impl DropCommand {
    pub async fn execute(&self) -> Result<(), PreviewError> {
        let client = PreviewClient::new(self.backend_url.clone(), self.secret.clone())?;
        client.drop_schema(&self.schema_name).await;
        eprintln!(
            "{} Drop requested for schema {}",
            style("✓").green(),
            self.schema_name
        );
        Ok(())
    }
}
