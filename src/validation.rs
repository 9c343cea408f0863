//! Input limits and field checks for request bodies.

use crate::error::{AppError, AppResult};

pub const USERNAME_MIN: usize = 3;
pub const USERNAME_MAX: usize = 30;
pub const EMAIL_MAX: usize = 255;
pub const PASSWORD_MIN: usize = 8;
pub const PASSWORD_MAX: usize = 128;
pub const DISPLAY_NAME_MAX: usize = 60;
pub const BIO_MAX: usize = 500;
pub const AVATAR_URL_MAX: usize = 500;

pub const TITLE_MAX: usize = 300;
pub const POST_BODY_MAX: usize = 40_000;
pub const LINK_URL_MAX: usize = 2048;
pub const COMMENT_BODY_MAX: usize = 10_000;

/// Uploaded avatars larger than this are refused (2 MiB).
pub const AVATAR_MAX_BYTES: usize = 2 * 1024 * 1024;

pub const PAGE_LIMIT_DEFAULT: i64 = 20;
pub const PAGE_LIMIT_MAX: i64 = 100;

/// Character count of `value` must fall within `min..=max`.
pub fn length(field: &str, value: &str, min: usize, max: usize) -> AppResult<()> {
    let len = value.chars().count();
    if len < min {
        return Err(AppError::Validation(format!(
            "{} must be at least {} characters.",
            field, min
        )));
    }
    if len > max {
        return Err(AppError::Validation(format!(
            "{} must be at most {} characters.",
            field, max
        )));
    }
    Ok(())
}

pub fn max_length(field: &str, value: Option<&str>, max: usize) -> AppResult<()> {
    match value {
        Some(v) => length(field, v, 0, max),
        None => Ok(()),
    }
}

pub fn username(value: &str) -> AppResult<()> {
    length("Username", value, USERNAME_MIN, USERNAME_MAX)?;
    if !value.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
        return Err(AppError::Validation(
            "Username may only contain letters, numbers, and underscores.".into(),
        ));
    }
    Ok(())
}

pub fn email(value: &str) -> AppResult<()> {
    length("Email", value, 3, EMAIL_MAX)?;
    let invalid = || AppError::Validation("Email address is not valid.".into());

    let (local, domain) = value.split_once('@').ok_or_else(invalid)?;
    let well_formed = !local.is_empty()
        && !domain.contains('@')
        && !value.chars().any(char::is_whitespace)
        && domain
            .split_once('.')
            .is_some_and(|(host, _)| !host.is_empty())
        && !domain.ends_with('.');
    if well_formed {
        Ok(())
    } else {
        Err(invalid())
    }
}

pub fn password(value: &str) -> AppResult<()> {
    length("Password", value, PASSWORD_MIN, PASSWORD_MAX)?;
    if !value.chars().any(|c| c.is_ascii_uppercase()) {
        return Err(AppError::Validation(
            "Password must contain at least one uppercase letter.".into(),
        ));
    }
    if !value.chars().any(|c| c.is_ascii_digit()) {
        return Err(AppError::Validation(
            "Password must contain at least one digit.".into(),
        ));
    }
    Ok(())
}

/// Treat blank strings as absent.
pub fn non_blank(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

/// `skip`/`limit` query bounds shared by the listing endpoints.
pub fn page(skip: Option<i64>, limit: Option<i64>) -> AppResult<(i64, i64)> {
    let skip = skip.unwrap_or(0);
    let limit = limit.unwrap_or(PAGE_LIMIT_DEFAULT);
    if skip < 0 {
        return Err(AppError::Validation("skip must be >= 0.".into()));
    }
    if !(1..=PAGE_LIMIT_MAX).contains(&limit) {
        return Err(AppError::Validation(format!(
            "limit must be between 1 and {}.",
            PAGE_LIMIT_MAX
        )));
    }
    Ok((skip, limit))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn username_rules() {
        assert!(username("alice_01").is_ok());
        assert!(username("al").is_err());
        assert!(username("has space").is_err());
        assert!(username("dash-name").is_err());
        assert!(username(&"a".repeat(31)).is_err());
    }

    #[test]
    fn email_rules() {
        assert!(email("a@example.com").is_ok());
        assert!(email("no-at-sign.com").is_err());
        assert!(email("@example.com").is_err());
        assert!(email("a@localhost").is_err());
        assert!(email("a@b@c.com").is_err());
        assert!(email("a@.com").is_err());
        assert!(email("a b@example.com").is_err());
    }

    #[test]
    fn password_rules() {
        assert!(password("Passw0rdOk").is_ok());
        assert!(password("Sh0rt").is_err());
        assert!(password("nouppercase1").is_err());
        assert!(password("NoDigitsHere").is_err());
    }

    #[test]
    fn length_counts_characters_not_bytes() {
        assert!(length("Title", "ééé", 1, 3).is_ok());
        assert!(length("Title", "", 1, 3).is_err());
    }

    #[test]
    fn blank_is_absent() {
        assert_eq!(non_blank(Some("   ".into())), None);
        assert_eq!(non_blank(Some("x".into())), Some("x".into()));
        assert_eq!(non_blank(None), None);
    }

    #[test]
    fn page_bounds() {
        assert_eq!(page(None, None).unwrap(), (0, 20));
        assert_eq!(page(Some(5), Some(100)).unwrap(), (5, 100));
        assert!(page(Some(-1), None).is_err());
        assert!(page(None, Some(0)).is_err());
        assert!(page(None, Some(101)).is_err());
    }
}
