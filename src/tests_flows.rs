//! Scenario tests wiring the flow orchestrator to the fakes: full signup,
//! login, and password-reset journeys as the screens drive them.

use std::sync::Arc;

use crate::config::AuthConfig;
use crate::error::AuthError;
use crate::flows::{AuthFlows, SignUpForm};
use crate::role::{Role, Route};
use crate::tests_support::{FakeGateway, FakeProfiles};

fn config() -> AuthConfig {
    AuthConfig::new("https://auth.example.com", "anon-key").unwrap()
}

fn flows(gateway: &Arc<FakeGateway>, profiles: &Arc<FakeProfiles>) -> AuthFlows {
    crate::tests_support::init_tracing();
    AuthFlows::new(gateway.clone(), profiles.clone(), &config())
}

fn customer_form() -> SignUpForm {
    SignUpForm {
        first_name: "Ada".to_string(),
        last_name: "Lovelace".to_string(),
        email: "a@b.com".to_string(),
        phone: "697 12 34 56".to_string(),
        phone_calling_code: "+237".to_string(),
        country_code: Some("CM".to_string()),
        accepts_promos: true,
        role: Role::Customer,
        password: "longenough1".to_string(),
        confirm_password: "longenough1".to_string(),
    }
}

#[tokio::test]
async fn signup_creates_profile_and_routes_to_customer_home() {
    let gateway = Arc::new(FakeGateway::default());
    let profiles = Arc::new(FakeProfiles::default());

    let success = flows(&gateway, &profiles)
        .password_sign_up(customer_form())
        .await
        .unwrap();

    assert_eq!(success.route, Route::CustomerHome);
    assert_eq!(success.role, Role::Customer);
    assert!(success.session.is_some());

    let upserts = profiles.upserts.lock().unwrap();
    assert_eq!(upserts.len(), 1);
    assert_eq!(upserts[0].id, success.identity.id);
    assert_eq!(upserts[0].phone.as_deref(), Some("+237697123456"));
    assert!(upserts[0].accepts_promos);

    // The echoed metadata role made a profile lookup unnecessary.
    assert_eq!(
        profiles
            .fetch_count
            .load(std::sync::atomic::Ordering::SeqCst),
        0
    );
    assert_eq!(success.identity.metadata_str("role"), Some("customer"));
}

#[tokio::test]
async fn signup_rejects_password_mismatch_before_any_network_call() {
    let gateway = Arc::new(FakeGateway::default());
    let profiles = Arc::new(FakeProfiles::default());
    let mut form = customer_form();
    form.confirm_password = "different1".to_string();

    let result = flows(&gateway, &profiles).password_sign_up(form).await;

    assert!(matches!(result, Err(AuthError::Validation(_))));
    assert!(gateway.calls.lock().unwrap().is_empty());
}

#[tokio::test]
async fn signup_rejects_invalid_phone_before_any_network_call() {
    let gateway = Arc::new(FakeGateway::default());
    let profiles = Arc::new(FakeProfiles::default());
    let mut form = customer_form();
    form.phone = "123 45 67 89".to_string();

    let result = flows(&gateway, &profiles).password_sign_up(form).await;

    assert!(matches!(result, Err(AuthError::Validation(_))));
    assert!(gateway.calls.lock().unwrap().is_empty());
}

#[tokio::test]
async fn signup_allows_empty_phone() {
    let gateway = Arc::new(FakeGateway::default());
    let profiles = Arc::new(FakeProfiles::default());
    let mut form = customer_form();
    form.phone = String::new();

    let success = flows(&gateway, &profiles)
        .password_sign_up(form)
        .await
        .unwrap();

    assert_eq!(success.route, Route::CustomerHome);
    assert_eq!(profiles.upserts.lock().unwrap()[0].phone, None);
}

#[tokio::test]
async fn signup_proceeds_when_profile_write_fails() {
    let gateway = Arc::new(FakeGateway::default());
    let profiles = Arc::new(FakeProfiles::default());
    profiles
        .fail_upsert
        .store(true, std::sync::atomic::Ordering::SeqCst);

    let success = flows(&gateway, &profiles)
        .password_sign_up(customer_form())
        .await
        .unwrap();

    assert_eq!(success.route, Route::CustomerHome);
    assert!(profiles.upserts.lock().unwrap().is_empty());
}

#[tokio::test]
async fn sign_in_resolves_role_from_profile_record() {
    let gateway = Arc::new(FakeGateway::default());
    let profiles = Arc::new(FakeProfiles::default());
    profiles.set_role("user-1", Role::Provider);

    let success = flows(&gateway, &profiles)
        .password_sign_in("a@b.com", "longenough1")
        .await
        .unwrap();

    assert_eq!(success.role, Role::Provider);
    assert_eq!(success.route, Route::ProviderHome);
    assert_eq!(success.session.user_id, "user-1");
}

#[tokio::test]
async fn sign_in_surfaces_unconfirmed_email() {
    let gateway = Arc::new(FakeGateway::default());
    let profiles = Arc::new(FakeProfiles::default());
    gateway.set_sign_in_error(AuthError::EmailNotConfirmed);

    let result = flows(&gateway, &profiles)
        .password_sign_in("a@b.com", "longenough1")
        .await;

    assert!(matches!(result, Err(AuthError::EmailNotConfirmed)));
}

#[tokio::test]
async fn sign_in_rejects_malformed_email_locally() {
    let gateway = Arc::new(FakeGateway::default());
    let profiles = Arc::new(FakeProfiles::default());

    let result = flows(&gateway, &profiles)
        .password_sign_in("not an email", "longenough1")
        .await;

    assert!(matches!(result, Err(AuthError::Validation(_))));
    assert!(gateway.calls.lock().unwrap().is_empty());
}

#[tokio::test]
async fn reset_request_targets_the_recovery_deep_link() {
    let gateway = Arc::new(FakeGateway::default());
    let profiles = Arc::new(FakeProfiles::default());

    flows(&gateway, &profiles)
        .request_password_reset("a@b.com")
        .await
        .unwrap();

    let calls = gateway.calls.lock().unwrap();
    assert_eq!(calls[0], "reset:a@b.com:njambe://auth/reset-password");
}

#[tokio::test]
async fn completing_reset_updates_password_then_signs_out() {
    let gateway = Arc::new(FakeGateway::default());
    let profiles = Arc::new(FakeProfiles::default());
    gateway.install_test_session("user-1");

    let route = flows(&gateway, &profiles)
        .complete_password_reset("newpassword1", "newpassword1")
        .await
        .unwrap();

    assert_eq!(route, Route::Login);
    let calls = gateway.calls.lock().unwrap().clone();
    assert_eq!(calls, vec!["update_password", "sign_out"]);
    assert!(gateway.session.lock().unwrap().is_none());
}

#[tokio::test]
async fn completing_reset_rejects_mismatched_confirmation() {
    let gateway = Arc::new(FakeGateway::default());
    let profiles = Arc::new(FakeProfiles::default());
    gateway.install_test_session("user-1");

    let result = flows(&gateway, &profiles)
        .complete_password_reset("newpassword1", "other1")
        .await;

    assert!(matches!(result, Err(AuthError::Validation(_))));
    assert!(gateway.calls.lock().unwrap().is_empty());
}
