//! Field validation shared by the directory, catalog and import services.

use std::sync::OnceLock;

use regex::Regex;

use crate::error::{AppError, Result};

/// Maximum length of names and descriptions
pub const MAX_TEXT_LEN: usize = 50;

pub const MIN_PASSWORD_LEN: usize = 8;

// Bulgarian mobile numbers: +3598XYYYYYYY or 08XYYYYYYY, X in 7..=9
fn phone_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^(\+359|0)8[7-9]\d{7}$").unwrap())
}

/// Trimmed, non-empty, at most [`MAX_TEXT_LEN`] characters.
pub fn required_text(field: &str, value: &str) -> Result<String> {
    let value = value.trim();
    if value.is_empty() {
        return Err(AppError::Validation(format!("{} is required", field)));
    }
    if value.chars().count() > MAX_TEXT_LEN {
        return Err(AppError::Validation(format!(
            "{} must be at most {} characters",
            field, MAX_TEXT_LEN
        )));
    }
    Ok(value.to_string())
}

/// Like [`required_text`], but blank input means "no value".
pub fn optional_text(field: &str, value: Option<&str>) -> Result<Option<String>> {
    match value.map(str::trim) {
        None | Some("") => Ok(None),
        Some(v) => required_text(field, v).map(Some),
    }
}

pub fn username(value: &str) -> Result<String> {
    let value = required_text("Username", value)?;
    if value.chars().any(char::is_whitespace) {
        return Err(AppError::Validation(
            "Username must not contain spaces".to_string(),
        ));
    }
    Ok(value)
}

/// Personal identification number: exactly ten ASCII digits.
pub fn egn(value: Option<&str>) -> Result<Option<String>> {
    match value.map(str::trim) {
        None | Some("") => Ok(None),
        Some(v) if v.len() == 10 && v.bytes().all(|b| b.is_ascii_digit()) => {
            Ok(Some(v.to_string()))
        }
        Some(_) => Err(AppError::Validation(
            "EGN must consist of exactly 10 digits".to_string(),
        )),
    }
}

/// Mobile phone; inner spaces are dropped before matching.
pub fn phone(value: Option<&str>) -> Result<Option<String>> {
    let Some(raw) = value else {
        return Ok(None);
    };
    let compact: String = raw.chars().filter(|c| !c.is_whitespace()).collect();
    if compact.is_empty() {
        return Ok(None);
    }
    if !phone_regex().is_match(&compact) {
        return Err(AppError::Validation(format!(
            "'{}' is not a valid mobile phone number",
            raw.trim()
        )));
    }
    Ok(Some(compact))
}

pub fn password(value: &str) -> Result<()> {
    if value.chars().count() < MIN_PASSWORD_LEN {
        return Err(AppError::Validation(format!(
            "Password must be at least {} characters",
            MIN_PASSWORD_LEN
        )));
    }
    Ok(())
}
