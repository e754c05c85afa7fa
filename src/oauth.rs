//! OAuth redirect handling for provider login
//!
//! Orchestrates third-party login without any UI: build the app-scheme
//! redirect URI, obtain the authorization URL from the gateway, open an
//! interactive browser session, then classify and parse the callback.
//! Callers see one uniform outcome regardless of which flow variant
//! (implicit tokens or PKCE code) the provider used.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, Mutex};
use tracing::{info, warn};

use crate::config::AuthConfig;
use crate::error::AuthError;
use crate::gateway::AuthGateway;
use crate::profile::{ProfileRecord, ProfileStore};
use crate::role::Role;
use crate::types::Session;

/// How long to wait for the provider to send the user back.
const BROWSER_TIMEOUT: Duration = Duration::from_secs(300);

/// Terminal state of an interactive browser session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BrowserOutcome {
    /// The browser navigated to the redirect URI.
    Success(String),
    /// The user dismissed the session. Not an error.
    Cancelled,
    /// Any other non-success termination.
    Failed(String),
}

/// Seam for the interactive, user-dismissible browser session.
#[async_trait]
pub trait Browser: Send + Sync {
    /// Open `auth_url` and return control only on navigation to
    /// `redirect_uri` or on cancellation.
    async fn open(&self, auth_url: &str, redirect_uri: &str) -> BrowserOutcome;
}

/// Browser implementation backed by the OS default browser and the app's
/// incoming deep-link channel: the host pushes every `njambe://` URL it
/// receives into the sender side.
pub struct SystemBrowser {
    incoming: Mutex<mpsc::UnboundedReceiver<String>>,
    timeout: Duration,
}

impl SystemBrowser {
    pub fn new(incoming: mpsc::UnboundedReceiver<String>) -> Self {
        Self {
            incoming: Mutex::new(incoming),
            timeout: BROWSER_TIMEOUT,
        }
    }
}

#[async_trait]
impl Browser for SystemBrowser {
    async fn open(&self, auth_url: &str, redirect_uri: &str) -> BrowserOutcome {
        if let Err(e) = webbrowser::open(auth_url) {
            return BrowserOutcome::Failed(format!("Could not open browser: {}", e));
        }
        info!("Browser opened for provider authorization");

        let mut incoming = self.incoming.lock().await;
        let deadline = tokio::time::Instant::now() + self.timeout;
        loop {
            match tokio::time::timeout_at(deadline, incoming.recv()).await {
                Ok(Some(url)) if url.starts_with(redirect_uri) => {
                    return BrowserOutcome::Success(url);
                }
                // Unrelated deep link while the session is open; keep waiting.
                Ok(Some(_)) => continue,
                // Channel closed: the host tore down the session.
                Ok(None) => return BrowserOutcome::Cancelled,
                Err(_) => {
                    return BrowserOutcome::Failed(
                        "Timed out waiting for the authorization redirect".to_string(),
                    )
                }
            }
        }
    }
}

/// Parameters extracted from a callback URL: hash-fragment tokens for the
/// implicit flow, query parameters for the PKCE/error flow.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct CallbackData {
    pub access_token: Option<String>,
    pub refresh_token: Option<String>,
    pub code: Option<String>,
    pub error: Option<String>,
    pub error_description: Option<String>,
}

/// Parse a redirect callback URL. Pure; parsed once per OAuth attempt.
pub fn parse_callback_url(url: &str) -> CallbackData {
    let mut data = CallbackData::default();

    let (without_fragment, fragment) = match url.split_once('#') {
        Some((head, fragment)) => (head, Some(fragment)),
        None => (url, None),
    };

    if let Some(fragment) = fragment {
        let params: HashMap<_, _> = url::form_urlencoded::parse(fragment.as_bytes())
            .into_owned()
            .collect();
        data.access_token = params.get("access_token").cloned();
        data.refresh_token = params.get("refresh_token").cloned();
    }

    if let Some((_, query)) = without_fragment.split_once('?') {
        let params: HashMap<_, _> = url::form_urlencoded::parse(query.as_bytes())
            .into_owned()
            .collect();
        data.code = params.get("code").cloned();
        data.error = params.get("error").cloned();
        data.error_description = params.get("error_description").cloned();
    }

    data
}

/// Uniform result of an OAuth attempt. Cancellation is a normal outcome and
/// is not surfaced as an error banner by calling UIs.
#[derive(Debug, Clone)]
pub enum OAuthOutcome {
    SignedIn(Session),
    Cancelled,
}

/// Drives a complete OAuth attempt: strictly sequential steps, no concurrent
/// invocation of a later step before the previous one settles.
pub struct OAuthFlow {
    gateway: Arc<dyn AuthGateway>,
    browser: Arc<dyn Browser>,
    redirect_uri: String,
}

impl OAuthFlow {
    pub fn new(gateway: Arc<dyn AuthGateway>, browser: Arc<dyn Browser>, config: &AuthConfig) -> Self {
        Self {
            gateway,
            browser,
            redirect_uri: config.oauth_redirect_uri(),
        }
    }

    /// Provider login for an existing account.
    pub async fn sign_in(&self, provider: &str) -> Result<OAuthOutcome, AuthError> {
        self.run(provider, false).await
    }

    /// Provider signup: on success also writes the profile record with the
    /// chosen role. A failed profile write is logged and does not fail the
    /// flow; the user proceeds authenticated.
    pub async fn sign_up(
        &self,
        provider: &str,
        role: Role,
        profiles: &dyn ProfileStore,
    ) -> Result<OAuthOutcome, AuthError> {
        let outcome = self.run(provider, true).await?;

        if let OAuthOutcome::SignedIn(_) = &outcome {
            match self.gateway.current_identity().await {
                Ok(identity) => {
                    let record = ProfileRecord::from_identity(&identity, role);
                    if let Err(e) = profiles.upsert(&record).await {
                        warn!("Profile write after provider signup failed: {}", e);
                    }
                }
                Err(e) => warn!("Could not load identity for profile creation: {}", e),
            }
        }

        Ok(outcome)
    }

    async fn run(&self, provider: &str, prompt_consent: bool) -> Result<OAuthOutcome, AuthError> {
        let auth_url = self
            .gateway
            .authorize_url(provider, &self.redirect_uri, prompt_consent)
            .await?;

        let outcome = self.browser.open(&auth_url, &self.redirect_uri).await;
        let url = match outcome {
            BrowserOutcome::Cancelled => {
                info!("Provider authorization cancelled by user");
                return Ok(OAuthOutcome::Cancelled);
            }
            BrowserOutcome::Failed(reason) => return Err(AuthError::OAuthFailed(reason)),
            BrowserOutcome::Success(url) => url,
        };

        let callback = parse_callback_url(&url);

        // An explicit provider error short-circuits everything else.
        if let Some(error) = callback.error {
            return Err(AuthError::OAuthProvider {
                code: error,
                description: callback.error_description,
            });
        }

        if let (Some(access), Some(refresh)) = (&callback.access_token, &callback.refresh_token) {
            let session = self.gateway.set_session(access, refresh).await?;
            return Ok(OAuthOutcome::SignedIn(session));
        }

        if let Some(code) = &callback.code {
            let session = self.gateway.exchange_code_for_session(code).await?;
            return Ok(OAuthOutcome::SignedIn(session));
        }

        // The provider's redirect may have established the session in the
        // background; check before giving up.
        if let Ok(Some(session)) = self.gateway.get_session().await {
            return Ok(OAuthOutcome::SignedIn(session));
        }

        Err(AuthError::NoAuthData)
    }
}
