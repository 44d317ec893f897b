//! Field validators for common user input.
//!
//! Each validator reports every rule the value breaks as a
//! [`FieldViolation`] against the named field, so results from several
//! fields can be gathered into one [`ValidationErrors`](crate::errors::ValidationErrors).

use regex::Regex;
use std::sync::OnceLock;

use crate::errors::FieldViolation;

const PASSWORD_MAX: usize = 128;

fn email_pattern() -> &'static Regex {
    static EMAIL: OnceLock<Regex> = OnceLock::new();
    EMAIL.get_or_init(|| {
        Regex::new(r"^[a-z0-9_'+\-.]*[a-z0-9_+\-]@([a-z0-9][a-z0-9\-]*\.)+[a-z]{2,}$")
            .expect("email pattern is valid")
    })
}

fn phone_pattern() -> &'static Regex {
    static PHONE: OnceLock<Regex> = OnceLock::new();
    PHONE.get_or_init(|| Regex::new(r"^\+?[1-9][0-9]{1,14}$").expect("phone pattern is valid"))
}

fn zip_pattern() -> &'static Regex {
    static ZIP: OnceLock<Regex> = OnceLock::new();
    ZIP.get_or_init(|| Regex::new(r"^[0-9]{5}(-[0-9]{4})?$").expect("zip pattern is valid"))
}

/// Trim and lowercase an email address, rejecting malformed ones.
pub fn normalize_email(field: &str, value: &str) -> Result<String, FieldViolation> {
    let email = value.trim().to_lowercase();
    let local = email.split('@').next().unwrap_or_default();

    if local.starts_with('.') || local.contains("..") || !email_pattern().is_match(&email) {
        return Err(FieldViolation::field(field, "Invalid email"));
    }
    Ok(email)
}

/// Password of 8 to 128 characters with a lowercase letter, an uppercase
/// letter and a digit.
pub fn check_password(field: &str, value: &str) -> Vec<FieldViolation> {
    password_violations(field, value, 8, false)
}

/// [`check_password`] raised to 12 characters, plus a special character.
pub fn check_strong_password(field: &str, value: &str) -> Vec<FieldViolation> {
    password_violations(field, value, 12, true)
}

fn password_violations(
    field: &str,
    value: &str,
    min: usize,
    needs_special: bool,
) -> Vec<FieldViolation> {
    let length = value.chars().count();
    let mut messages = Vec::new();

    if length < min {
        messages.push(format!("Password must be at least {} characters", min));
    }
    if length > PASSWORD_MAX {
        messages.push(format!("Password must be less than {} characters", PASSWORD_MAX));
    }
    if !value.chars().any(|c| c.is_ascii_lowercase()) {
        messages.push("Password must contain a lowercase letter".to_string());
    }
    if !value.chars().any(|c| c.is_ascii_uppercase()) {
        messages.push("Password must contain an uppercase letter".to_string());
    }
    if !value.chars().any(|c| c.is_ascii_digit()) {
        messages.push("Password must contain a number".to_string());
    }
    if needs_special && value.chars().all(|c| c.is_ascii_alphanumeric()) {
        messages.push("Password must contain a special character".to_string());
    }

    messages
        .into_iter()
        .map(|m| FieldViolation::field(field, m))
        .collect()
}

/// E.164-style phone number: optional `+`, up to 15 digits, no leading zero.
pub fn check_phone(field: &str, value: &str) -> Option<FieldViolation> {
    (!phone_pattern().is_match(value))
        .then(|| FieldViolation::field(field, "Invalid phone number format"))
}

/// US ZIP or ZIP+4.
pub fn check_zip_code(field: &str, value: &str) -> Option<FieldViolation> {
    (!zip_pattern().is_match(value)).then(|| FieldViolation::field(field, "Invalid ZIP code"))
}
