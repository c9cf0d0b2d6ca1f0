//! Validation helpers for user-editable settings.
//!
//! Each helper returns `Err(&'static str)` with a human-readable reason so the
//! settings panel can surface it next to the offending field.

use once_cell::sync::Lazy;
use regex::Regex;

// Beamline/endstation numerals, e.g. "7.0.1.1" or "12.3.2".
static ENDSTATION_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\d+(\.\d+)+$").expect("Invalid endstation regex"));

static EMAIL_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").expect("Invalid email regex"));

/// Validates an endstation identifier such as `"7.0.1.1"`.
///
/// # Arguments
///
/// * `endstation` - The identifier to validate.
///
/// # Returns
///
/// * `Ok(())` if the identifier is at least two dot-separated numerals.
/// * `Err(&'static str)` otherwise.
pub fn is_valid_endstation(endstation: &str) -> Result<(), &'static str> {
    is_not_empty(endstation).map_err(|_| "Endstation cannot be empty")?;
    if ENDSTATION_RE.is_match(endstation) {
        Ok(())
    } else {
        Err("Endstation must be dot-separated numerals (e.g. \"7.0.1.1\")")
    }
}

/// Validates an email address.
///
/// Only the overall `local@domain.tld` shape is checked; the scheduling
/// service is the authority on whether the account exists.
pub fn is_valid_email(email: &str) -> Result<(), &'static str> {
    if EMAIL_RE.is_match(email) {
        Ok(())
    } else {
        Err("Email address must look like name@example.org")
    }
}

/// Like [`is_valid_email`], but the empty string is accepted ("not set").
pub fn is_valid_optional_email(email: &str) -> Result<(), &'static str> {
    if email.is_empty() {
        Ok(())
    } else {
        is_valid_email(email)
    }
}

/// Validates if a given string is a usable HTTP(S) base URL.
pub fn is_valid_base_url(url: &str) -> Result<(), &'static str> {
    if url.starts_with("https://") || url.starts_with("http://") {
        Ok(())
    } else {
        Err("Base URL must start with http:// or https://")
    }
}

/// Validates an IANA time zone name such as `"America/Los_Angeles"`.
pub fn is_valid_time_zone(tz_id: &str) -> Result<(), &'static str> {
    tz_id
        .parse::<chrono_tz::Tz>()
        .map(|_| ())
        .map_err(|_| "Time zone must be an IANA name (e.g. \"America/Los_Angeles\")")
}

/// Validates if a given string is not empty.
///
/// # Arguments
///
/// * `value` - The string to validate.
///
/// # Returns
///
/// * `Ok(())` if the string is not empty.
/// * `Err(&'static str)` if the string is empty.
pub fn is_not_empty(value: &str) -> Result<(), &'static str> {
    if !value.is_empty() {
        Ok(())
    } else {
        Err("Value cannot be empty")
    }
}
