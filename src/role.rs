//! Role resolution and role-based routing
//!
//! The role gates which app section is rendered, so resolution must always
//! produce a usable value. Precedence: identity metadata first (set during
//! signup), then the persisted profile record, then the customer default.
//! This is the single place that logic lives.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::debug;

use crate::profile::ProfileStore;

/// Which side of the marketplace a session belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Customer,
    Provider,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Customer => "customer",
            Role::Provider => "provider",
        }
    }

    /// Parse only the exact strings `"customer"` and `"provider"`.
    pub fn parse(value: &str) -> Option<Role> {
        match value {
            "customer" => Some(Role::Customer),
            "provider" => Some(Role::Provider),
            _ => None,
        }
    }
}

/// Navigation targets emitted by this core; the navigation host maps them
/// onto its screen stack.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    /// The pre-auth start screen.
    Entry,
    /// The email/password login screen.
    Login,
    /// Customer home tabs.
    CustomerHome,
    /// Provider home tabs.
    ProviderHome,
    /// The password-reset screen reached from a recovery session.
    ResetPassword,
}

impl Route {
    pub fn path(&self) -> &'static str {
        match self {
            Route::Entry => "/",
            Route::Login => "/auth/login",
            Route::CustomerHome => "/(customer)/(tabs)",
            Route::ProviderHome => "/(provider)/(tabs)",
            Route::ResetPassword => "/auth/reset-password",
        }
    }
}

/// Total mapping from role to the home route of that app section.
pub fn route_for_role(role: Role) -> Route {
    match role {
        Role::Provider => Route::ProviderHome,
        Role::Customer => Route::CustomerHome,
    }
}

/// Resolve the role for an authenticated identity.
///
/// Never fails: persistence errors are treated as "not found" and fall
/// through to the customer default. When metadata carries a valid role the
/// profile store is not consulted at all.
pub async fn resolve_role(
    profiles: &dyn ProfileStore,
    user_id: &str,
    metadata: Option<&HashMap<String, serde_json::Value>>,
) -> Role {
    if let Some(metadata) = metadata {
        if let Some(role) = metadata
            .get("role")
            .and_then(|v| v.as_str())
            .and_then(Role::parse)
        {
            debug!("Role from identity metadata: {}", role.as_str());
            return role;
        }
    }

    match profiles.fetch_role(user_id).await {
        Ok(Some(role)) => {
            debug!("Role from profile record: {}", role.as_str());
            role
        }
        Ok(None) => {
            debug!("No role found for {}, defaulting to customer", user_id);
            Role::Customer
        }
        Err(e) => {
            debug!("Profile lookup failed ({}), defaulting to customer", e);
            Role::Customer
        }
    }
}
