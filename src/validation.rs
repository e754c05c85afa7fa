//! Pre-flight credential validation
//!
//! Pure functions checking email/password shape and strength. Nothing here
//! touches the network; failures are resolved entirely at the UI boundary.

use regex::Regex;
use std::sync::OnceLock;
use thiserror::Error;

use crate::config::PASSWORD_MIN_LENGTH;

/// Client-side validation failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("Please enter a valid email address")]
    InvalidEmailFormat,
    #[error("Password must be at least 8 characters")]
    PasswordTooShort,
    #[error("Please confirm your password")]
    ConfirmationMissing,
    #[error("Passwords do not match")]
    PasswordMismatch,
    #[error("Please enter a valid phone number")]
    InvalidPhoneNumber,
}

fn email_regex() -> &'static Regex {
    static EMAIL_REGEX: OnceLock<Regex> = OnceLock::new();
    EMAIL_REGEX.get_or_init(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("static regex"))
}

/// Validate email shape against a simple `local@domain.tld` grammar.
///
/// Returns `None` when the address is acceptable.
pub fn validate_email(email: &str) -> Option<ValidationError> {
    let trimmed = email.trim();
    if trimmed.is_empty() || !email_regex().is_match(trimmed) {
        return Some(ValidationError::InvalidEmailFormat);
    }
    None
}

/// Validate a password for signup/reset paths, optionally against a
/// confirmation value.
pub fn validate_password(password: &str, confirm: Option<&str>) -> Option<ValidationError> {
    if password.len() < PASSWORD_MIN_LENGTH {
        return Some(ValidationError::PasswordTooShort);
    }
    if let Some(confirm) = confirm {
        if confirm.trim().is_empty() {
            return Some(ValidationError::ConfirmationMissing);
        }
        if password != confirm {
            return Some(ValidationError::PasswordMismatch);
        }
    }
    None
}

/// Strength tier reported to the UI's strength meter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum StrengthTier {
    None,
    Weak,
    Fair,
    Good,
    Strong,
}

/// Password strength: a tier plus the number of character classes present
/// (uppercase, lowercase, digit, special).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PasswordStrength {
    pub tier: StrengthTier,
    pub score: u8,
}

const WEAK_MAX_LENGTH: usize = 6;
const FAIR_MAX_LENGTH: usize = 8;
const STRONG_MIN_CLASSES: u8 = 3;

/// Compute the strength indicator for a password.
///
/// Deterministic and referentially transparent: length thresholds first,
/// then character-class diversity.
pub fn password_strength(password: &str) -> PasswordStrength {
    let score = character_classes(password);

    if password.is_empty() {
        return PasswordStrength {
            tier: StrengthTier::None,
            score,
        };
    }
    if password.len() < WEAK_MAX_LENGTH {
        return PasswordStrength {
            tier: StrengthTier::Weak,
            score,
        };
    }
    if password.len() < FAIR_MAX_LENGTH {
        return PasswordStrength {
            tier: StrengthTier::Fair,
            score,
        };
    }

    let tier = if score >= STRONG_MIN_CLASSES {
        StrengthTier::Strong
    } else {
        StrengthTier::Good
    };
    PasswordStrength { tier, score }
}

fn character_classes(password: &str) -> u8 {
    let has_upper = password.chars().any(|c| c.is_ascii_uppercase());
    let has_lower = password.chars().any(|c| c.is_ascii_lowercase());
    let has_digit = password.chars().any(|c| c.is_ascii_digit());
    let has_special = password.chars().any(|c| "!@#$%^&*(),.?\":{}|<>".contains(c));
    [has_upper, has_lower, has_digit, has_special]
        .iter()
        .filter(|present| **present)
        .count() as u8
}

fn phone_regex() -> &'static Regex {
    static PHONE_REGEX: OnceLock<Regex> = OnceLock::new();
    PHONE_REGEX.get_or_init(|| Regex::new(r"^[67]\d{8}$").expect("static regex"))
}

/// Validate a Cameroonian mobile number: nine digits starting with 6 or 7,
/// checked after stripping formatting characters.
///
/// Returns `None` when the number is acceptable.
pub fn validate_phone(raw: &str) -> Option<ValidationError> {
    let digits: String = raw.chars().filter(|c| c.is_ascii_digit()).collect();
    if !phone_regex().is_match(&digits) {
        return Some(ValidationError::InvalidPhoneNumber);
    }
    None
}

/// Keep only digits from raw phone input, capped at nine digits.
pub fn normalize_phone(raw: &str) -> String {
    raw.chars().filter(|c| c.is_ascii_digit()).take(9).collect()
}

/// Full phone number with the country calling code prefix.
pub fn format_phone(calling_code: &str, digits: &str) -> String {
    format!("{}{}", calling_code, digits)
}
