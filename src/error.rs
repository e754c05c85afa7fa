//! Error types for the auth/session flow
//!
//! Every external call site converts its failure into one of these kinds;
//! nothing in this crate is allowed to crash the process. Gateway error text
//! is assumed user-presentable and passed through verbatim.

use thiserror::Error;

use crate::validation::ValidationError;

/// Authentication error taxonomy
#[derive(Debug, Error)]
pub enum AuthError {
    /// Client-side validation failure; resolved at the UI boundary and never
    /// logged as a flow failure.
    #[error("{0}")]
    Validation(#[from] ValidationError),

    /// The hosted auth service rejected the credentials.
    #[error("Invalid login credentials")]
    InvalidCredentials,

    /// The account exists but its email address has not been confirmed.
    #[error("Email not confirmed")]
    EmailNotConfirmed,

    /// Any other rejection from the hosted auth service.
    #[error("{message}")]
    Gateway {
        code: Option<String>,
        message: String,
    },

    /// Transport failure: offline, timeout, DNS, TLS.
    #[error("Network error: {0}")]
    Network(String),

    /// The OAuth provider returned an explicit error on the redirect.
    #[error("OAuth provider error: {code}")]
    OAuthProvider {
        code: String,
        description: Option<String>,
    },

    /// The browser session ended without success or cancellation.
    #[error("OAuth authentication failed: {0}")]
    OAuthFailed(String),

    /// The redirect completed but carried neither tokens nor a code, and no
    /// session materialized in the background.
    #[error("No authentication data received")]
    NoAuthData,

    /// Secondary profile persistence failed after a successful auth call.
    #[error("Profile write failed: {0}")]
    ProfileWrite(String),

    /// Missing or malformed environment configuration.
    #[error("Configuration error: {0}")]
    Config(String),

    /// An operation that requires an active session was called without one.
    #[error("No active session")]
    SessionMissing,
}

impl AuthError {
    /// User-presentable message for this error.
    pub fn message(&self) -> String {
        match self {
            AuthError::OAuthProvider {
                code,
                description: Some(description),
            } => format!("{} ({})", description, code),
            other => other.to_string(),
        }
    }
}

impl From<reqwest::Error> for AuthError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            AuthError::Gateway {
                code: None,
                message: format!("Malformed response from auth service: {}", err),
            }
        } else {
            AuthError::Network(err.to_string())
        }
    }
}
