//! njambe-auth: authentication and session-role core for the Njambe
//! local-services marketplace client
//!
//! Covers the full pre-app flow:
//! - email/password sign-in and signup with local validation
//! - OAuth provider login through the system browser and app-scheme redirect
//! - password recovery via emailed deep links
//! - session persistence (OS keychain with a file fallback) and refresh
//! - role resolution (customer vs provider) and the routes that follow
//!
//! The navigation host wires a [`controller::SessionController`] to its
//! screen stack and drives [`flows::AuthFlows`] / [`oauth::OAuthFlow`] from
//! its auth screens.

pub mod config;
pub mod controller;
pub mod deeplink;
pub mod error;
pub mod flows;
pub mod gateway;
pub mod oauth;
pub mod profile;
pub mod role;
pub mod store;
pub mod types;
pub mod validation;

#[cfg(test)]
mod tests_flows;
#[cfg(test)]
mod tests_support;

pub use config::AuthConfig;
pub use controller::{ControllerHandles, ControllerState, SessionController};
pub use error::AuthError;
pub use flows::{AuthFlows, SignInSuccess, SignUpForm, SignUpSuccess};
pub use gateway::{AuthGateway, GatewayClient, SignUpOutcome};
pub use oauth::{Browser, OAuthFlow, OAuthOutcome, SystemBrowser};
pub use profile::{ProfileClient, ProfileRecord, ProfileStore};
pub use role::{resolve_role, route_for_role, Role, Route};
pub use store::SessionStore;
pub use types::{AuthEvent, Identity, Session};
