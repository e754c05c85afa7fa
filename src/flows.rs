//! Sign-in, sign-up and password-reset orchestration
//!
//! These are the entry points UI screens call: validate first, then talk to
//! the gateway, then resolve the role and hand back the route to navigate
//! to. Each call is stateless; guarding against double-submission while a
//! call is in flight (disabling the submit control) is the caller's job.

use std::collections::HashMap;
use std::sync::Arc;
use tracing::{info, warn};

use crate::config::AuthConfig;
use crate::error::AuthError;
use crate::gateway::AuthGateway;
use crate::profile::{ProfileRecord, ProfileStore};
use crate::role::{resolve_role, route_for_role, Role, Route};
use crate::types::{Identity, Session};
use crate::validation::{
    format_phone, normalize_phone, validate_email, validate_password, validate_phone,
};

/// Successful password sign-in: the session plus where to go next.
#[derive(Debug, Clone)]
pub struct SignInSuccess {
    pub session: Session,
    pub role: Role,
    pub route: Route,
}

/// Successful sign-up. `session` is absent while email confirmation is
/// pending.
#[derive(Debug, Clone)]
pub struct SignUpSuccess {
    pub identity: Identity,
    pub session: Option<Session>,
    pub role: Role,
    pub route: Route,
}

/// Everything the signup screen collects.
#[derive(Debug, Clone)]
pub struct SignUpForm {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    /// Raw phone input; validated as a nine-digit mobile number when
    /// present, then reduced to digits.
    pub phone: String,
    /// Country calling code prefix, e.g. `+237`.
    pub phone_calling_code: String,
    pub country_code: Option<String>,
    pub accepts_promos: bool,
    pub role: Role,
    pub password: String,
    pub confirm_password: String,
}

/// Auth flow orchestrator shared by the login, signup and reset screens.
pub struct AuthFlows {
    gateway: Arc<dyn AuthGateway>,
    profiles: Arc<dyn ProfileStore>,
    reset_redirect: String,
}

impl AuthFlows {
    pub fn new(
        gateway: Arc<dyn AuthGateway>,
        profiles: Arc<dyn ProfileStore>,
        config: &AuthConfig,
    ) -> Self {
        Self {
            gateway,
            profiles,
            reset_redirect: config.password_reset_redirect(),
        }
    }

    /// Email/password login. Resolves the role and the home route for it.
    pub async fn password_sign_in(
        &self,
        email: &str,
        password: &str,
    ) -> Result<SignInSuccess, AuthError> {
        if let Some(e) = validate_email(email) {
            return Err(e.into());
        }

        let session = self
            .gateway
            .sign_in_with_password(email.trim(), password)
            .await?;

        let metadata = self
            .gateway
            .current_identity()
            .await
            .ok()
            .map(|identity| identity.metadata);
        let role = resolve_role(&*self.profiles, &session.user_id, metadata.as_ref()).await;
        let route = route_for_role(role);

        info!("Signed in as {} ({})", session.user_id, role.as_str());
        Ok(SignInSuccess {
            session,
            role,
            route,
        })
    }

    /// Email/password signup with profile creation.
    ///
    /// The profile write is secondary: when it fails the user still proceeds
    /// authenticated and the failure is logged.
    pub async fn password_sign_up(&self, form: SignUpForm) -> Result<SignUpSuccess, AuthError> {
        if let Some(e) = validate_email(&form.email) {
            return Err(e.into());
        }
        if let Some(e) = validate_password(&form.password, Some(&form.confirm_password)) {
            return Err(e.into());
        }
        // Phone stays optional for provider-prefilled forms; when entered it
        // must be a valid mobile number.
        if !form.phone.trim().is_empty() {
            if let Some(e) = validate_phone(&form.phone) {
                return Err(e.into());
            }
        }

        let mut metadata: HashMap<String, serde_json::Value> = HashMap::new();
        metadata.insert("first_name".to_string(), form.first_name.clone().into());
        metadata.insert("last_name".to_string(), form.last_name.clone().into());
        metadata.insert("role".to_string(), form.role.as_str().into());

        let outcome = self
            .gateway
            .sign_up(form.email.trim(), &form.password, metadata)
            .await?;

        let digits = normalize_phone(&form.phone);
        let phone = if digits.is_empty() {
            None
        } else {
            Some(format_phone(&form.phone_calling_code, &digits))
        };

        let record = ProfileRecord {
            id: outcome.identity.id.clone(),
            first_name: form.first_name,
            last_name: form.last_name,
            email: form.email.trim().to_string(),
            phone,
            role: form.role,
            country_code: form.country_code,
            accepts_promos: form.accepts_promos,
            updated_at: chrono::Utc::now(),
        };
        if let Err(e) = self.profiles.upsert(&record).await {
            warn!("Profile write after signup failed: {}", e);
        }

        let role = resolve_role(
            &*self.profiles,
            &outcome.identity.id,
            Some(&outcome.identity.metadata),
        )
        .await;
        let route = route_for_role(role);

        info!("Signed up {} as {}", outcome.identity.id, role.as_str());
        Ok(SignUpSuccess {
            identity: outcome.identity,
            session: outcome.session,
            role,
            route,
        })
    }

    /// Ask the service to send a password-reset email targeting the app's
    /// recovery deep link. May be repeated; the UI enforces the resend
    /// cooldown ([`crate::config::RESEND_COOLDOWN_SECONDS`]).
    pub async fn request_password_reset(&self, email: &str) -> Result<(), AuthError> {
        if let Some(e) = validate_email(email) {
            return Err(e.into());
        }
        self.gateway
            .request_password_reset(email.trim(), &self.reset_redirect)
            .await
    }

    /// Set a new password on the active recovery session, then sign out so
    /// the user logs back in with the new credential.
    pub async fn complete_password_reset(
        &self,
        new_password: &str,
        confirm_password: &str,
    ) -> Result<Route, AuthError> {
        if let Some(e) = validate_password(new_password, Some(confirm_password)) {
            return Err(e.into());
        }

        self.gateway.update_password(new_password).await?;
        self.gateway.sign_out().await;
        Ok(Route::Login)
    }
}
