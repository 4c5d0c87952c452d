//! Preview control plane client.
//!
//! Provisions and tears down ephemeral preview schemas on an external
//! preview backend over HTTP. Every request is signed with an HMAC over
//! `METHOD:PATH:BODY:TIMESTAMP` so the receiver can authenticate the
//! caller and enforce a clock-skew window. Invalidate and drop are
//! best-effort side effects: their failures are logged, never
//! propagated into archive generation.

use std::time::Duration;

use chrono::Utc;
use forgekit_types::{PreviewSession, SchemaStatus, SchemaStatusError};
use hmac::{Hmac, Mac};
use serde::Deserialize;
use serde_json::json;
use sha2::Sha256;
use tracing::{info, warn};
use url::Url;

/// Default timeout for preview backend calls.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

const TIMESTAMP_HEADER: &str = "X-Internal-Timestamp";
const SIGNATURE_HEADER: &str = "X-Internal-Signature";

/// Error types for preview operations.
#[derive(Debug, thiserror::Error)]
pub enum PreviewError {
    #[error("Failed to build preview HTTP client: {0}")]
    ClientBuild(reqwest::Error),

    #[error("Failed to contact preview backend: {0}")]
    Transport(reqwest::Error),

    #[error("Preview backend rejected the request: {0}")]
    Backend(reqwest::StatusCode),

    #[error("Failed to parse preview backend response: {0}")]
    ResponseParse(reqwest::Error),

    #[error(transparent)]
    State(#[from] SchemaStatusError),
}

/// Sign one outgoing request: lowercase hex of
/// `HMAC_SHA256(secret, METHOD:PATH:BODY:TIMESTAMP)`.
pub fn sign_request(
    secret: &str,
    method: &str,
    path: &str,
    body: &str,
    timestamp_ms: i64,
) -> String {
    let mut mac = Hmac::<Sha256>::new_from_slice(secret.as_bytes())
        .expect("HMAC can take a key of any size so this cannot fail");
    mac.update(format!("{}:{}:{}:{}", method, path, body, timestamp_ms).as_bytes());
    hex::encode(mac.finalize().into_bytes())
}

#[derive(Debug, Deserialize)]
struct ProvisionResponse {
    data: ProvisionData,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ProvisionData {
    schema_name: String,
}

/// Signed HTTP client for the preview backend.
pub struct PreviewClient {
    base_url: Url,
    secret: String,
    http: reqwest::Client,
}

impl PreviewClient {
    pub fn new(base_url: Url, secret: impl Into<String>) -> Result<Self, PreviewError> {
        let http = reqwest::Client::builder()
            .timeout(DEFAULT_TIMEOUT)
            .build()
            .map_err(PreviewError::ClientBuild)?;

        Ok(Self {
            base_url,
            secret: secret.into(),
            http,
        })
    }

    /// Drive `session` through a provision attempt.
    ///
    /// Not legal while the session is already provisioning; retrying a
    /// failed session requires restarting it to `pending` first.
    pub async fn provision(
        &self,
        session: &mut PreviewSession,
        features: &[String],
        tier: &str,
    ) -> Result<(), PreviewError> {
        session.transition(SchemaStatus::Provisioning)?;

        let body = json!({
            "sessionToken": session.session_token,
            "features": features,
            "tier": tier,
        });

        match self
            .post("/internal/schemas/provision", &body.to_string())
            .await
        {
            Ok(response) => {
                let parsed: ProvisionResponse = response
                    .json()
                    .await
                    .map_err(|e| self.fail(session, PreviewError::ResponseParse(e)))?;
                session.schema_name = Some(parsed.data.schema_name.clone());
                session.transition(SchemaStatus::Ready)?;
                info!(
                    "Provisioned preview schema {} for session {}",
                    parsed.data.schema_name, session.session_token
                );
                Ok(())
            }
            Err(e) => Err(self.fail(session, e)),
        }
    }

    /// Invalidate the backend session. Best-effort: the local session is
    /// invalidated even when the backend call fails.
    pub async fn invalidate(&self, session: &mut PreviewSession) {
        let body = json!({ "sessionToken": session.session_token });
        if let Err(e) = self.post("/internal/sessions/invalidate", &body.to_string()).await {
            warn!(
                "Failed to invalidate preview session {}: {}",
                session.session_token, e
            );
        }
        if session.schema_status.can_transition(SchemaStatus::Invalidated) {
            let _ = session.transition(SchemaStatus::Invalidated);
        }
    }

    /// Drop a provisioned schema. Best-effort: failures are logged, not
    /// retried.
    pub async fn drop_schema(&self, schema_name: &str) {
        let path = format!("/internal/schemas/{}", schema_name);
        match self.delete(&path).await {
            Ok(_) => info!("Dropped preview schema {}", schema_name),
            Err(e) => warn!("Failed to drop preview schema {}: {}", schema_name, e),
        }
    }

    fn fail(&self, session: &mut PreviewSession, error: PreviewError) -> PreviewError {
        if session.schema_status.can_transition(SchemaStatus::Failed) {
            let _ = session.transition(SchemaStatus::Failed);
        }
        error
    }

    async fn post(&self, path: &str, body: &str) -> Result<reqwest::Response, PreviewError> {
        let timestamp = Utc::now().timestamp_millis();
        let signature = sign_request(&self.secret, "POST", path, body, timestamp);
        let url = self.join(path)?;

        let response = self
            .http
            .post(url)
            .header("Content-Type", "application/json")
            .header(TIMESTAMP_HEADER, timestamp.to_string())
            .header(SIGNATURE_HEADER, signature)
            .body(body.to_string())
            .send()
            .await
            .map_err(PreviewError::Transport)?;

        if !response.status().is_success() {
            return Err(PreviewError::Backend(response.status()));
        }
        Ok(response)
    }

    async fn delete(&self, path: &str) -> Result<reqwest::Response, PreviewError> {
        let timestamp = Utc::now().timestamp_millis();
        let signature = sign_request(&self.secret, "DELETE", path, "", timestamp);
        let url = self.join(path)?;

        let response = self
            .http
            .delete(url)
            .header(TIMESTAMP_HEADER, timestamp.to_string())
            .header(SIGNATURE_HEADER, signature)
            .send()
            .await
            .map_err(PreviewError::Transport)?;

        if !response.status().is_success() {
            return Err(PreviewError::Backend(response.status()));
        }
        Ok(response)
    }

    fn join(&self, path: &str) -> Result<Url, PreviewError> {
        // Url::join drops the base path on rooted inputs, so splice the
        // path onto the base manually.
        let mut url = self.base_url.clone();
        let base_path = url.path().trim_end_matches('/').to_string();
        url.set_path(&format!("{}{}", base_path, path));
        Ok(url)
    }
}
