//! Shared in-memory fakes for the unit tests: a scriptable gateway, a
//! profile store backed by a map, and a browser that replays a canned
//! callback. Each fake records the calls made against it so tests can
//! assert on interaction order.

use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;
use tokio::sync::broadcast;

use crate::error::AuthError;
use crate::gateway::{AuthGateway, SignUpOutcome};
use crate::oauth::{Browser, BrowserOutcome};
use crate::profile::{ProfileRecord, ProfileStore};
use crate::role::Role;
use crate::types::{AuthEvent, Identity, Session};

/// Install the test log subscriber once; output shows up with
/// `RUST_LOG=debug cargo test -- --nocapture`.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn session_for(user_id: &str) -> Session {
    Session {
        access_token: "access".to_string(),
        refresh_token: "refresh".to_string(),
        expires_at: None,
        user_id: user_id.to_string(),
    }
}

/// Scriptable [`AuthGateway`] double. Every method appends a line to
/// `calls`; knobs make individual operations fail or stall.
pub struct FakeGateway {
    pub session: Mutex<Option<Session>>,
    pub identity: Mutex<Option<Identity>>,
    pub calls: Mutex<Vec<String>>,
    pub fail_get_session: AtomicBool,
    sign_in_error: Mutex<Option<AuthError>>,
    get_session_delay: Mutex<Option<Duration>>,
    events: broadcast::Sender<AuthEvent>,
}

impl Default for FakeGateway {
    fn default() -> Self {
        let (events, _) = broadcast::channel(32);
        Self {
            session: Mutex::new(None),
            identity: Mutex::new(None),
            calls: Mutex::new(Vec::new()),
            fail_get_session: AtomicBool::new(false),
            sign_in_error: Mutex::new(None),
            get_session_delay: Mutex::new(None),
            events,
        }
    }
}

impl FakeGateway {
    fn record(&self, call: String) {
        self.calls.lock().unwrap().push(call);
    }

    fn session_user_id(&self) -> String {
        self.identity
            .lock()
            .unwrap()
            .as_ref()
            .map(|i| i.id.clone())
            .unwrap_or_else(|| "user-1".to_string())
    }

    /// Seed a live session as if a user had signed in earlier.
    pub fn install_test_session(&self, user_id: &str) {
        *self.session.lock().unwrap() = Some(session_for(user_id));
    }

    /// Seed the identity behind the session, with a display name in the
    /// provider-metadata shape.
    pub fn set_identity_with_name(&self, id: &str, email: &str, full_name: &str) {
        let mut metadata = HashMap::new();
        metadata.insert("full_name".to_string(), serde_json::json!(full_name));
        *self.identity.lock().unwrap() = Some(Identity {
            id: id.to_string(),
            email: Some(email.to_string()),
            metadata,
        });
    }

    /// Make the next sign-in attempt fail with `error`.
    pub fn set_sign_in_error(&self, error: AuthError) {
        *self.sign_in_error.lock().unwrap() = Some(error);
    }

    /// Stall `get_session` so tests can interleave live events with a slow
    /// restore.
    pub fn set_get_session_delay(&self, delay: Duration) {
        *self.get_session_delay.lock().unwrap() = Some(delay);
    }

    /// Push an auth event as the real gateway would.
    pub fn emit(&self, event: AuthEvent) {
        let _ = self.events.send(event);
    }
}

#[async_trait]
impl AuthGateway for FakeGateway {
    async fn sign_in_with_password(
        &self,
        email: &str,
        _password: &str,
    ) -> Result<Session, AuthError> {
        self.record(format!("sign_in:{}", email));
        if let Some(error) = self.sign_in_error.lock().unwrap().take() {
            return Err(error);
        }
        let session = session_for(&self.session_user_id());
        *self.session.lock().unwrap() = Some(session.clone());
        self.emit(AuthEvent::SignedIn);
        Ok(session)
    }

    async fn sign_up(
        &self,
        email: &str,
        _password: &str,
        metadata: HashMap<String, Value>,
    ) -> Result<SignUpOutcome, AuthError> {
        self.record(format!("sign_up:{}", email));
        let identity = Identity {
            id: "user-new".to_string(),
            email: Some(email.to_string()),
            metadata,
        };
        let session = session_for(&identity.id);
        *self.identity.lock().unwrap() = Some(identity.clone());
        *self.session.lock().unwrap() = Some(session.clone());
        self.emit(AuthEvent::SignedIn);
        Ok(SignUpOutcome {
            identity,
            session: Some(session),
        })
    }

    async fn request_password_reset(
        &self,
        email: &str,
        redirect_uri: &str,
    ) -> Result<(), AuthError> {
        self.record(format!("reset:{}:{}", email, redirect_uri));
        Ok(())
    }

    async fn update_password(&self, _new_password: &str) -> Result<(), AuthError> {
        self.record("update_password".to_string());
        if self.session.lock().unwrap().is_none() {
            return Err(AuthError::SessionMissing);
        }
        Ok(())
    }

    async fn get_session(&self) -> Result<Option<Session>, AuthError> {
        let delay = *self.get_session_delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if self.fail_get_session.load(Ordering::SeqCst) {
            return Err(AuthError::Network("connection reset".to_string()));
        }
        Ok(self.session.lock().unwrap().clone())
    }

    async fn set_session(
        &self,
        access_token: &str,
        refresh_token: &str,
    ) -> Result<Session, AuthError> {
        self.record(format!("set_session:{}:{}", access_token, refresh_token));
        let session = session_for(&self.session_user_id());
        *self.session.lock().unwrap() = Some(session.clone());
        self.emit(AuthEvent::SignedIn);
        Ok(session)
    }

    async fn adopt_recovery_session(
        &self,
        access_token: &str,
        refresh_token: &str,
    ) -> Result<Session, AuthError> {
        self.record(format!(
            "adopt_recovery:{}:{}",
            access_token, refresh_token
        ));
        let session = session_for(&self.session_user_id());
        *self.session.lock().unwrap() = Some(session.clone());
        self.emit(AuthEvent::PasswordRecovery);
        Ok(session)
    }

    async fn exchange_code_for_session(&self, code: &str) -> Result<Session, AuthError> {
        self.record(format!("exchange_code:{}", code));
        let session = session_for(&self.session_user_id());
        *self.session.lock().unwrap() = Some(session.clone());
        self.emit(AuthEvent::SignedIn);
        Ok(session)
    }

    async fn sign_out(&self) {
        self.record("sign_out".to_string());
        *self.session.lock().unwrap() = None;
        *self.identity.lock().unwrap() = None;
        self.emit(AuthEvent::SignedOut);
    }

    async fn authorize_url(
        &self,
        provider: &str,
        redirect_uri: &str,
        _prompt_consent: bool,
    ) -> Result<String, AuthError> {
        self.record(format!("authorize_url:{}", provider));
        Ok(format!(
            "https://auth.example.com/auth/v1/authorize?provider={}&redirect_to={}",
            provider, redirect_uri
        ))
    }

    async fn current_identity(&self) -> Result<Identity, AuthError> {
        self.identity
            .lock()
            .unwrap()
            .clone()
            .ok_or(AuthError::SessionMissing)
    }

    fn subscribe(&self) -> broadcast::Receiver<AuthEvent> {
        self.events.subscribe()
    }
}

/// In-memory [`ProfileStore`] with failure knobs and a fetch counter.
#[derive(Default)]
pub struct FakeProfiles {
    roles: Mutex<HashMap<String, Role>>,
    pub upserts: Mutex<Vec<ProfileRecord>>,
    pub fetch_count: AtomicUsize,
    pub fail_fetch: AtomicBool,
    pub fail_upsert: AtomicBool,
}

impl FakeProfiles {
    pub fn set_role(&self, user_id: &str, role: Role) {
        self.roles.lock().unwrap().insert(user_id.to_string(), role);
    }
}

#[async_trait]
impl ProfileStore for FakeProfiles {
    async fn fetch_role(&self, user_id: &str) -> Result<Option<Role>, AuthError> {
        self.fetch_count.fetch_add(1, Ordering::SeqCst);
        if self.fail_fetch.load(Ordering::SeqCst) {
            return Err(AuthError::Gateway {
                code: Some("500".to_string()),
                message: "profile store unavailable".to_string(),
            });
        }
        Ok(self.roles.lock().unwrap().get(user_id).copied())
    }

    async fn upsert(&self, record: &ProfileRecord) -> Result<(), AuthError> {
        if self.fail_upsert.load(Ordering::SeqCst) {
            return Err(AuthError::ProfileWrite("row level security".to_string()));
        }
        self.roles
            .lock()
            .unwrap()
            .insert(record.id.clone(), record.role);
        self.upserts.lock().unwrap().push(record.clone());
        Ok(())
    }
}

/// [`Browser`] double that records the opened URL and replays one canned
/// outcome.
pub struct FakeBrowser {
    outcome: Mutex<Option<BrowserOutcome>>,
    pub opened: Mutex<Vec<String>>,
}

impl FakeBrowser {
    pub fn success(callback_url: &str) -> Self {
        Self::with_outcome(BrowserOutcome::Success(callback_url.to_string()))
    }

    pub fn cancelled() -> Self {
        Self::with_outcome(BrowserOutcome::Cancelled)
    }

    pub fn failed(reason: &str) -> Self {
        Self::with_outcome(BrowserOutcome::Failed(reason.to_string()))
    }

    fn with_outcome(outcome: BrowserOutcome) -> Self {
        Self {
            outcome: Mutex::new(Some(outcome)),
            opened: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl Browser for FakeBrowser {
    async fn open(&self, auth_url: &str, _redirect_uri: &str) -> BrowserOutcome {
        self.opened.lock().unwrap().push(auth_url.to_string());
        self.outcome
            .lock()
            .unwrap()
            .take()
            .unwrap_or(BrowserOutcome::Cancelled)
    }
}
