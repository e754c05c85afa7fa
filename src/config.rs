//! Environment configuration for the hosted auth service
//!
//! The service URL and API key come from the process environment at startup.
//! Missing configuration refuses to start rather than falling back to
//! placeholder credentials.

use url::Url;

use crate::error::AuthError;

/// Environment variable holding the hosted service base URL.
pub const SERVICE_URL_VAR: &str = "NJAMBE_SERVICE_URL";

/// Environment variable holding the service API key.
pub const API_KEY_VAR: &str = "NJAMBE_API_KEY";

/// App scheme registered with the OS and the auth service allow-list.
pub const DEFAULT_SCHEME: &str = "njambe";

/// Path component of the OAuth redirect URI.
pub const OAUTH_CALLBACK_PATH: &str = "auth/callback";

/// Path component of the password-recovery deep link.
pub const PASSWORD_RESET_PATH: &str = "auth/reset-password";

/// Minimum password length for signup and reset paths.
pub const PASSWORD_MIN_LENGTH: usize = 8;

/// UI-enforced cooldown between password-reset emails, in seconds.
pub const RESEND_COOLDOWN_SECONDS: u64 = 60;

/// Configuration for the auth gateway and profile clients.
#[derive(Debug, Clone)]
pub struct AuthConfig {
    /// Base URL of the hosted auth/database service.
    pub service_url: Url,
    /// Public API key sent with every request.
    pub api_key: String,
    /// Custom app scheme used for redirect URIs and deep links.
    pub scheme: String,
}

impl AuthConfig {
    /// Build a config from explicit values.
    pub fn new(service_url: &str, api_key: &str) -> Result<Self, AuthError> {
        let service_url = Url::parse(service_url)
            .map_err(|e| AuthError::Config(format!("Invalid service URL: {}", e)))?;
        if api_key.trim().is_empty() {
            return Err(AuthError::Config("API key must not be empty".to_string()));
        }
        Ok(Self {
            service_url,
            api_key: api_key.to_string(),
            scheme: DEFAULT_SCHEME.to_string(),
        })
    }

    /// Read configuration from the process environment, failing fast when
    /// either variable is absent.
    pub fn from_env() -> Result<Self, AuthError> {
        let service_url = require_env(SERVICE_URL_VAR)?;
        let api_key = require_env(API_KEY_VAR)?;
        Self::new(&service_url, &api_key)
    }

    /// Redirect URI handed to the OAuth provider: `njambe://auth/callback`.
    pub fn oauth_redirect_uri(&self) -> String {
        format!("{}://{}", self.scheme, OAUTH_CALLBACK_PATH)
    }

    /// Deep link target for password-reset emails:
    /// `njambe://auth/reset-password`.
    pub fn password_reset_redirect(&self) -> String {
        format!("{}://{}", self.scheme, PASSWORD_RESET_PATH)
    }

    /// Endpoint under the auth surface, e.g. `auth_endpoint("signup")`.
    pub fn auth_endpoint(&self, path: &str) -> String {
        format!(
            "{}/auth/v1/{}",
            self.service_url.as_str().trim_end_matches('/'),
            path
        )
    }

    /// Endpoint under the data surface, e.g. `rest_endpoint("users")`.
    pub fn rest_endpoint(&self, path: &str) -> String {
        format!(
            "{}/rest/v1/{}",
            self.service_url.as_str().trim_end_matches('/'),
            path
        )
    }
}

fn require_env(key: &str) -> Result<String, AuthError> {
    match std::env::var(key) {
        Ok(value) if !value.trim().is_empty() => Ok(value),
        _ => Err(AuthError::Config(format!(
            "{} is not set; refusing to start with placeholder credentials",
            key
        ))),
    }
}
