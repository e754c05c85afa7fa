//! Auth gateway client
//!
//! Wraps the hosted identity service's REST surface: password sign-in,
//! sign-up, password reset, session adoption and refresh, PKCE code
//! exchange, sign-out, and auth-state change notifications. The concrete
//! client is injected behind the [`AuthGateway`] trait so flows and the
//! lifecycle controller can be tested against a fake.

use async_trait::async_trait;
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use chrono::{Duration as ChronoDuration, Utc};
use rand::Rng;
use serde::Deserialize;
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::{broadcast, Mutex, RwLock};
use tracing::{debug, info, warn};

use crate::config::AuthConfig;
use crate::error::AuthError;
use crate::store::SessionStore;
use crate::types::{AuthEvent, Identity, Session};

/// Capacity of the auth-event channel; events are tiny and consumers are
/// expected to keep up on the UI task.
const EVENT_CHANNEL_CAPACITY: usize = 32;

/// Result of a sign-up: the created identity, and a session when the
/// service signs the user in immediately (no email confirmation required).
#[derive(Debug, Clone)]
pub struct SignUpOutcome {
    pub identity: Identity,
    pub session: Option<Session>,
}

/// Operations against the hosted auth service.
///
/// Stateless per call and safe to invoke concurrently; callers are
/// responsible for guarding against double-submission at the form level.
#[async_trait]
pub trait AuthGateway: Send + Sync {
    async fn sign_in_with_password(
        &self,
        email: &str,
        password: &str,
    ) -> Result<Session, AuthError>;

    /// Sign up with email/password. The returned identity echoes the
    /// submitted metadata so the role resolves without a profile round trip.
    async fn sign_up(
        &self,
        email: &str,
        password: &str,
        metadata: HashMap<String, Value>,
    ) -> Result<SignUpOutcome, AuthError>;

    /// Trigger an out-of-band password-reset email. Idempotent; the 60s
    /// resend cooldown is a UI concern.
    async fn request_password_reset(&self, email: &str, redirect_uri: &str)
        -> Result<(), AuthError>;

    /// Update the password of the active (possibly recovery-scoped) session.
    async fn update_password(&self, new_password: &str) -> Result<(), AuthError>;

    /// Cached session lookup; refreshes over the network when the token is
    /// near expiry, and hydrates from the persisted store on cold start.
    async fn get_session(&self) -> Result<Option<Session>, AuthError>;

    /// Adopt a token pair obtained out-of-band (OAuth implicit flow).
    async fn set_session(
        &self,
        access_token: &str,
        refresh_token: &str,
    ) -> Result<Session, AuthError>;

    /// Adopt a recovery token pair from a password-reset deep link. Emits
    /// `PasswordRecovery` instead of `SignedIn` so the lifecycle controller
    /// routes to the reset screen rather than a role home.
    async fn adopt_recovery_session(
        &self,
        access_token: &str,
        refresh_token: &str,
    ) -> Result<Session, AuthError>;

    /// PKCE authorization-code exchange.
    async fn exchange_code_for_session(&self, code: &str) -> Result<Session, AuthError>;

    /// Best-effort server sign-out; local state is cleared regardless of the
    /// network outcome and the call never fails.
    async fn sign_out(&self);

    /// Build the provider authorization URL without redirecting, recording
    /// the PKCE verifier for the later code exchange.
    async fn authorize_url(
        &self,
        provider: &str,
        redirect_uri: &str,
        prompt_consent: bool,
    ) -> Result<String, AuthError>;

    /// The identity behind the active session.
    async fn current_identity(&self) -> Result<Identity, AuthError>;

    /// Subscribe to auth-state change events. Dropping the receiver
    /// unsubscribes.
    fn subscribe(&self) -> broadcast::Receiver<AuthEvent>;
}

/// PKCE verifier/challenge pair.
#[derive(Debug, Clone)]
pub struct PkceParams {
    pub code_verifier: String,
    pub code_challenge: String,
}

impl PkceParams {
    /// Generate a random verifier and its S256 challenge.
    pub fn generate() -> Self {
        let verifier_bytes: Vec<u8> = (0..32).map(|_| rand::thread_rng().gen()).collect();
        let code_verifier = URL_SAFE_NO_PAD.encode(&verifier_bytes);

        let mut hasher = Sha256::new();
        hasher.update(code_verifier.as_bytes());
        let code_challenge = URL_SAFE_NO_PAD.encode(hasher.finalize());

        Self {
            code_verifier,
            code_challenge,
        }
    }
}

/// Concrete gateway over the hosted service's REST endpoints.
pub struct GatewayClient {
    config: AuthConfig,
    http: reqwest::Client,
    store: SessionStore,
    session: RwLock<Option<Session>>,
    identity: RwLock<Option<Identity>>,
    pkce_verifier: Mutex<Option<String>>,
    events: broadcast::Sender<AuthEvent>,
}

#[derive(Debug, Deserialize)]
struct WireUser {
    id: String,
    email: Option<String>,
    #[serde(default)]
    user_metadata: HashMap<String, Value>,
}

impl From<WireUser> for Identity {
    fn from(user: WireUser) -> Self {
        Identity {
            id: user.id,
            email: user.email,
            metadata: user.user_metadata,
        }
    }
}

#[derive(Debug, Deserialize)]
struct WireToken {
    access_token: String,
    refresh_token: String,
    expires_in: Option<i64>,
    user: Option<WireUser>,
}

#[derive(Debug, Default, Deserialize)]
struct WireError {
    error: Option<String>,
    error_description: Option<String>,
    error_code: Option<String>,
    msg: Option<String>,
}

/// Map a non-success response body onto the error taxonomy. The service's
/// message text is user-presentable and passed through.
fn map_api_error(status: reqwest::StatusCode, body: &str) -> AuthError {
    let wire: WireError = serde_json::from_str(body).unwrap_or_default();
    let message = wire
        .error_description
        .or(wire.msg)
        .or(wire.error.clone())
        .unwrap_or_else(|| format!("Auth service returned status {}", status));

    if message.contains("Invalid login credentials") {
        return AuthError::InvalidCredentials;
    }
    if message.contains("Email not confirmed") {
        return AuthError::EmailNotConfirmed;
    }

    AuthError::Gateway {
        code: wire.error_code.or(wire.error),
        message,
    }
}

impl GatewayClient {
    pub fn new(config: AuthConfig, store: SessionStore) -> Self {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .user_agent(concat!("njambe-auth/", env!("CARGO_PKG_VERSION")))
            .build()
            .expect("Failed to create HTTP client");
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            config,
            http,
            store,
            session: RwLock::new(None),
            identity: RwLock::new(None),
            pkce_verifier: Mutex::new(None),
            events,
        }
    }

    fn emit(&self, event: AuthEvent) {
        // Send only fails when nobody is subscribed, which is fine.
        let _ = self.events.send(event);
    }

    /// Cache and persist a token response, then notify subscribers.
    async fn install_session(&self, token: WireToken, event: AuthEvent) -> Session {
        let identity: Option<Identity> = token.user.map(Identity::from);

        let user_id = match &identity {
            Some(identity) => identity.id.clone(),
            None => {
                let cached = self.identity.read().await;
                match cached.as_ref() {
                    Some(identity) => identity.id.clone(),
                    None => self
                        .session
                        .read()
                        .await
                        .as_ref()
                        .map(|s| s.user_id.clone())
                        .unwrap_or_default(),
                }
            }
        };

        let session = Session {
            access_token: token.access_token,
            refresh_token: token.refresh_token,
            expires_at: token
                .expires_in
                .map(|seconds| Utc::now() + ChronoDuration::seconds(seconds)),
            user_id,
        };

        if let Some(identity) = identity {
            *self.identity.write().await = Some(identity);
        }
        *self.session.write().await = Some(session.clone());
        self.store.save(&session);
        self.emit(event);
        session
    }

    async fn clear_local_session(&self) {
        *self.session.write().await = None;
        *self.identity.write().await = None;
        self.store.clear();
    }

    async fn fetch_user(&self, access_token: &str) -> Result<Identity, AuthError> {
        let response = self
            .http
            .get(self.config.auth_endpoint("user"))
            .header("apikey", &self.config.api_key)
            .bearer_auth(access_token)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(map_api_error(status, &body));
        }

        let user: WireUser = response.json().await?;
        Ok(user.into())
    }

    /// Mint a new token pair from a refresh token.
    async fn refresh_session(&self, refresh_token: &str) -> Result<Session, AuthError> {
        let url = format!(
            "{}?grant_type=refresh_token",
            self.config.auth_endpoint("token")
        );
        let response = self
            .http
            .post(&url)
            .header("apikey", &self.config.api_key)
            .json(&serde_json::json!({ "refresh_token": refresh_token }))
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(map_api_error(status, &body));
        }

        let token: WireToken = response.json().await?;
        Ok(self.install_session(token, AuthEvent::TokenRefreshed).await)
    }

    /// Common path for adopting an out-of-band token pair.
    async fn adopt(
        &self,
        access_token: &str,
        refresh_token: &str,
        event: AuthEvent,
    ) -> Result<Session, AuthError> {
        let identity = self.fetch_user(access_token).await?;

        let session = Session {
            access_token: access_token.to_string(),
            refresh_token: refresh_token.to_string(),
            expires_at: None,
            user_id: identity.id.clone(),
        };

        *self.identity.write().await = Some(identity);
        *self.session.write().await = Some(session.clone());
        self.store.save(&session);
        self.emit(event);
        Ok(session)
    }
}

#[async_trait]
impl AuthGateway for GatewayClient {
    async fn sign_in_with_password(
        &self,
        email: &str,
        password: &str,
    ) -> Result<Session, AuthError> {
        let url = format!("{}?grant_type=password", self.config.auth_endpoint("token"));
        let response = self
            .http
            .post(&url)
            .header("apikey", &self.config.api_key)
            .json(&serde_json::json!({ "email": email, "password": password }))
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(map_api_error(status, &body));
        }

        let token: WireToken = response.json().await?;
        info!("Password sign-in succeeded");
        Ok(self.install_session(token, AuthEvent::SignedIn).await)
    }

    async fn sign_up(
        &self,
        email: &str,
        password: &str,
        metadata: HashMap<String, Value>,
    ) -> Result<SignUpOutcome, AuthError> {
        let response = self
            .http
            .post(self.config.auth_endpoint("signup"))
            .header("apikey", &self.config.api_key)
            .json(&serde_json::json!({
                "email": email,
                "password": password,
                "data": metadata,
            }))
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(map_api_error(status, &body));
        }

        // The service returns a bare user when email confirmation is
        // pending, or a token payload with an embedded user otherwise.
        let body: Value = response.json().await?;
        if body.get("access_token").is_some() {
            let token: WireToken = serde_json::from_value(body).map_err(|e| AuthError::Gateway {
                code: None,
                message: format!("Malformed signup response: {}", e),
            })?;
            let identity = match &token.user {
                Some(user) => Identity {
                    id: user.id.clone(),
                    email: user.email.clone(),
                    metadata: user.user_metadata.clone(),
                },
                None => return Err(AuthError::NoAuthData),
            };
            let session = self.install_session(token, AuthEvent::SignedIn).await;
            Ok(SignUpOutcome {
                identity,
                session: Some(session),
            })
        } else {
            let user: WireUser = serde_json::from_value(body).map_err(|e| AuthError::Gateway {
                code: None,
                message: format!("Malformed signup response: {}", e),
            })?;
            let identity: Identity = user.into();
            *self.identity.write().await = Some(identity.clone());
            Ok(SignUpOutcome {
                identity,
                session: None,
            })
        }
    }

    async fn request_password_reset(
        &self,
        email: &str,
        redirect_uri: &str,
    ) -> Result<(), AuthError> {
        let url = format!(
            "{}?redirect_to={}",
            self.config.auth_endpoint("recover"),
            urlencoding::encode(redirect_uri)
        );
        let response = self
            .http
            .post(&url)
            .header("apikey", &self.config.api_key)
            .json(&serde_json::json!({ "email": email }))
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(map_api_error(status, &body));
        }

        info!("Password reset email requested");
        Ok(())
    }

    async fn update_password(&self, new_password: &str) -> Result<(), AuthError> {
        let session = self
            .get_session()
            .await?
            .ok_or(AuthError::SessionMissing)?;

        let response = self
            .http
            .put(self.config.auth_endpoint("user"))
            .header("apikey", &self.config.api_key)
            .bearer_auth(&session.access_token)
            .json(&serde_json::json!({ "password": new_password }))
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(map_api_error(status, &body));
        }

        info!("Password updated");
        Ok(())
    }

    async fn get_session(&self) -> Result<Option<Session>, AuthError> {
        let current = {
            let mut guard = self.session.write().await;
            if guard.is_none() {
                if let Some(persisted) = self.store.load() {
                    debug!("Hydrated session from secure store");
                    *guard = Some(persisted);
                }
            }
            guard.clone()
        };

        let Some(session) = current else {
            return Ok(None);
        };

        if !session.needs_refresh() {
            return Ok(Some(session));
        }

        match self.refresh_session(&session.refresh_token).await {
            Ok(refreshed) => Ok(Some(refreshed)),
            Err(AuthError::Network(e)) => Err(AuthError::Network(e)),
            Err(e) => {
                // The refresh token was rejected; the stored session is dead.
                warn!("Session refresh rejected, clearing local session: {}", e);
                self.clear_local_session().await;
                Ok(None)
            }
        }
    }

    async fn set_session(
        &self,
        access_token: &str,
        refresh_token: &str,
    ) -> Result<Session, AuthError> {
        self.adopt(access_token, refresh_token, AuthEvent::SignedIn)
            .await
    }

    async fn adopt_recovery_session(
        &self,
        access_token: &str,
        refresh_token: &str,
    ) -> Result<Session, AuthError> {
        self.adopt(access_token, refresh_token, AuthEvent::PasswordRecovery)
            .await
    }

    async fn exchange_code_for_session(&self, code: &str) -> Result<Session, AuthError> {
        let verifier = self
            .pkce_verifier
            .lock()
            .await
            .take()
            .ok_or_else(|| AuthError::OAuthFailed("No PKCE verifier for code exchange".to_string()))?;

        let url = format!("{}?grant_type=pkce", self.config.auth_endpoint("token"));
        let response = self
            .http
            .post(&url)
            .header("apikey", &self.config.api_key)
            .json(&serde_json::json!({
                "auth_code": code,
                "code_verifier": verifier,
            }))
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(map_api_error(status, &body));
        }

        let token: WireToken = response.json().await?;
        info!("Authorization code exchanged for session");
        Ok(self.install_session(token, AuthEvent::SignedIn).await)
    }

    async fn sign_out(&self) {
        let session = self.session.read().await.clone();
        self.clear_local_session().await;

        if let Some(session) = session {
            let result = self
                .http
                .post(self.config.auth_endpoint("logout"))
                .header("apikey", &self.config.api_key)
                .bearer_auth(&session.access_token)
                .send()
                .await;
            if let Err(e) = result {
                warn!("Server sign-out failed (local state already cleared): {}", e);
            }
        }

        self.emit(AuthEvent::SignedOut);
    }

    async fn authorize_url(
        &self,
        provider: &str,
        redirect_uri: &str,
        prompt_consent: bool,
    ) -> Result<String, AuthError> {
        let pkce = PkceParams::generate();
        *self.pkce_verifier.lock().await = Some(pkce.code_verifier);

        let mut url = format!(
            "{}?provider={}&redirect_to={}&code_challenge={}&code_challenge_method=s256",
            self.config.auth_endpoint("authorize"),
            urlencoding::encode(provider),
            urlencoding::encode(redirect_uri),
            pkce.code_challenge,
        );
        if prompt_consent {
            url.push_str("&prompt=consent");
        }
        Ok(url)
    }

    async fn current_identity(&self) -> Result<Identity, AuthError> {
        if let Some(identity) = self.identity.read().await.clone() {
            return Ok(identity);
        }

        let session = self
            .get_session()
            .await?
            .ok_or(AuthError::SessionMissing)?;
        let identity = self.fetch_user(&session.access_token).await?;
        *self.identity.write().await = Some(identity.clone());
        Ok(identity)
    }

    fn subscribe(&self) -> broadcast::Receiver<AuthEvent> {
        self.events.subscribe()
    }
}
