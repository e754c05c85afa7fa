//! Core data model for the auth/session flow

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Seconds before expiry at which a session counts as near-expiry and the
/// gateway will refresh it opportunistically.
const REFRESH_THRESHOLD_SECONDS: i64 = 60;

/// An authenticated session: the token pair granting continued access
/// without re-authentication.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub access_token: String,
    pub refresh_token: String,
    /// Expiry of the access token; absent when the service did not report one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
    /// Identity id this session belongs to.
    pub user_id: String,
}

impl Session {
    /// Whether the access token is past its expiry.
    pub fn is_expired(&self) -> bool {
        match self.expires_at {
            Some(expires_at) => Utc::now() >= expires_at,
            None => false,
        }
    }

    /// Whether the access token is expired or within the refresh threshold.
    pub fn needs_refresh(&self) -> bool {
        match self.expires_at {
            Some(expires_at) => {
                Utc::now() >= expires_at - Duration::seconds(REFRESH_THRESHOLD_SECONDS)
            }
            None => false,
        }
    }
}

/// The authenticated principal as known to the hosted auth service.
///
/// Immutable from the client's perspective except through explicit update
/// calls; `metadata` may carry `role`, `first_name`, `last_name` and OAuth
/// profile attributes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Identity {
    pub id: String,
    pub email: Option<String>,
    #[serde(default)]
    pub metadata: HashMap<String, serde_json::Value>,
}

impl Identity {
    /// String-valued metadata field, if present.
    pub fn metadata_str(&self, key: &str) -> Option<&str> {
        self.metadata.get(key).and_then(|v| v.as_str())
    }

    /// Display name from OAuth profile attributes (`full_name` or `name`).
    pub fn full_name(&self) -> Option<&str> {
        self.metadata_str("full_name")
            .or_else(|| self.metadata_str("name"))
    }
}

/// Discrete auth-state change notifications delivered to subscribers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthEvent {
    SignedIn,
    SignedOut,
    PasswordRecovery,
    TokenRefreshed,
}
