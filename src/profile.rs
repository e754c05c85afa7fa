//! Profile persistence boundary
//!
//! The application-level user record lives in a `users` table keyed by
//! identity id, persisted separately from the auth service's own user table.
//! This client reads the role column and upserts whole records; it does not
//! own the schema.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::config::AuthConfig;
use crate::error::AuthError;
use crate::role::Role;
use crate::types::Identity;

/// Canonical profile record. `id` is a foreign key equal to the identity id.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProfileRecord {
    pub id: String,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    pub role: Role,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub country_code: Option<String>,
    pub accepts_promos: bool,
    pub updated_at: DateTime<Utc>,
}

impl ProfileRecord {
    /// Build a record from an OAuth identity, splitting the provider's
    /// display name into first/last parts.
    pub fn from_identity(identity: &Identity, role: Role) -> Self {
        let full_name = identity.full_name().unwrap_or_default();
        let (first_name, last_name) = split_full_name(full_name);
        Self {
            id: identity.id.clone(),
            first_name,
            last_name,
            email: identity.email.clone().unwrap_or_default(),
            phone: None,
            role,
            country_code: None,
            accepts_promos: false,
            updated_at: Utc::now(),
        }
    }
}

fn split_full_name(full_name: &str) -> (String, String) {
    let mut parts = full_name.trim().split_whitespace();
    let first = parts.next().unwrap_or_default().to_string();
    let last = parts.collect::<Vec<_>>().join(" ");
    (first, last)
}

/// Read/write access to the persisted profile record.
#[async_trait]
pub trait ProfileStore: Send + Sync {
    /// Role stored for this identity, if a record exists and has one.
    async fn fetch_role(&self, user_id: &str) -> Result<Option<Role>, AuthError>;

    /// Upsert-by-id on the users record.
    async fn upsert(&self, record: &ProfileRecord) -> Result<(), AuthError>;
}

/// Profile client over the hosted service's REST data surface.
pub struct ProfileClient {
    config: AuthConfig,
    http: reqwest::Client,
}

impl ProfileClient {
    pub fn new(config: AuthConfig) -> Self {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .user_agent(concat!("njambe-auth/", env!("CARGO_PKG_VERSION")))
            .build()
            .expect("Failed to create HTTP client");
        Self { config, http }
    }
}

#[derive(Debug, Deserialize)]
struct RoleRow {
    role: Option<String>,
}

#[async_trait]
impl ProfileStore for ProfileClient {
    async fn fetch_role(&self, user_id: &str) -> Result<Option<Role>, AuthError> {
        let url = format!(
            "{}?id=eq.{}&select=role",
            self.config.rest_endpoint("users"),
            urlencoding::encode(user_id)
        );

        let response = self
            .http
            .get(&url)
            .header("apikey", &self.config.api_key)
            .bearer_auth(&self.config.api_key)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(AuthError::Gateway {
                code: Some(status.as_u16().to_string()),
                message: format!("Profile lookup failed: {}", body),
            });
        }

        let rows: Vec<RoleRow> = response.json().await?;
        Ok(rows
            .into_iter()
            .next()
            .and_then(|row| row.role)
            .and_then(|value| Role::parse(&value)))
    }

    async fn upsert(&self, record: &ProfileRecord) -> Result<(), AuthError> {
        let response = self
            .http
            .post(self.config.rest_endpoint("users"))
            .header("apikey", &self.config.api_key)
            .bearer_auth(&self.config.api_key)
            .header("Prefer", "resolution=merge-duplicates")
            .json(record)
            .send()
            .await
            .map_err(|e| AuthError::ProfileWrite(e.to_string()))?;

        if !response.status().is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AuthError::ProfileWrite(body));
        }

        Ok(())
    }
}
