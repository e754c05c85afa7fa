//! Password-recovery deep link recognition
//!
//! Reset emails land the user on `njambe://auth/reset-password` with the
//! recovery token pair in the hash fragment. Anything else is not ours to
//! interpret here.

use std::collections::HashMap;

/// Token pair extracted from a recovery deep link.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecoveryTokens {
    pub access_token: String,
    pub refresh_token: String,
}

/// Parse a deep link URL as a password-recovery link.
///
/// Recognized when the URL mentions `reset-password` or `type=recovery` and
/// the hash fragment carries `access_token`, `refresh_token` and
/// `type=recovery`. Returns `None` for every other URL shape.
pub fn parse_recovery_link(url: &str) -> Option<RecoveryTokens> {
    if !url.contains("reset-password") && !url.contains("type=recovery") {
        return None;
    }

    let fragment = url.split_once('#')?.1;
    let params: HashMap<_, _> = url::form_urlencoded::parse(fragment.as_bytes())
        .into_owned()
        .collect();

    if params.get("type").map(String::as_str) != Some("recovery") {
        return None;
    }

    let access_token = params.get("access_token")?.clone();
    let refresh_token = params.get("refresh_token")?.clone();
    if access_token.is_empty() || refresh_token.is_empty() {
        return None;
    }

    Some(RecoveryTokens {
        access_token,
        refresh_token,
    })
}
