//! Preview session lifecycle.
//!
//! A preview session is a short-lived server-side workspace holding a
//! per-user database schema so the customer can exercise a configuration
//! before paying. Its schema status only ever moves forward, except for
//! the `failed → pending` restart; `invalidated` is terminal.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Provisioning status of a preview schema
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SchemaStatus {
    Pending,
    Provisioning,
    Ready,
    Failed,
    Invalidated,
}

impl SchemaStatus {
    /// Whether `next` is a legal transition from this state.
    pub fn can_transition(self, next: SchemaStatus) -> bool {
        use SchemaStatus::*;
        matches!(
            (self, next),
            (Pending, Provisioning)
                | (Pending, Invalidated)
                | (Provisioning, Ready)
                | (Provisioning, Failed)
                | (Ready, Invalidated)
                | (Failed, Pending)
                | (Failed, Invalidated)
        )
    }
}

#[derive(Debug, thiserror::Error)]
#[error("Illegal schema status transition: {from:?} -> {to:?}")]
pub struct SchemaStatusError {
    pub from: SchemaStatus,
    pub to: SchemaStatus,
}

/// An ephemeral preview workspace tied to a storefront session.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct PreviewSession {
    pub session_token: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schema_name: Option<String>,

    pub schema_status: SchemaStatus,

    pub created_at: DateTime<Utc>,

    pub expires_at: DateTime<Utc>,
}

impl PreviewSession {
    /// Start a fresh session in `pending`.
    pub fn new(session_token: impl Into<String>, created_at: DateTime<Utc>, ttl: chrono::Duration) -> Self {
        Self {
            session_token: session_token.into(),
            schema_name: None,
            schema_status: SchemaStatus::Pending,
            created_at,
            expires_at: created_at + ttl,
        }
    }

    /// Move to `next`, rejecting transitions the lifecycle does not allow.
    pub fn transition(&mut self, next: SchemaStatus) -> Result<(), SchemaStatusError> {
        if !self.schema_status.can_transition(next) {
            return Err(SchemaStatusError {
                from: self.schema_status,
                to: next,
            });
        }
        self.schema_status = next;
        Ok(())
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now > self.expires_at
    }
}
