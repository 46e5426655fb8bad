//! Client-side input validation.
//!
//! Mirrors the checks the external API performs so that obviously bad input
//! is rejected before a request is made. The server remains the authority.

use crate::error::{DomainError, DomainResult};

pub const USERNAME_MIN: usize = 3;
pub const USERNAME_MAX: usize = 50;
pub const PASSWORD_MIN: usize = 6;
/// Password hashing on the server only accepts this many UTF-8 bytes.
pub const PASSWORD_MAX_BYTES: usize = 72;
pub const NAME_MAX: usize = 100;
pub const PHONE_DIGITS_MIN: usize = 10;
pub const PHONE_DIGITS_MAX: usize = 15;

/// Username: 3-50 ASCII alphanumerics or underscores.
pub fn validate_username(username: &str) -> DomainResult<()> {
    let len = username.chars().count();
    let well_formed = (USERNAME_MIN..=USERNAME_MAX).contains(&len)
        && username.chars().all(|c| c.is_ascii_alphanumeric() || c == '_');

    if well_formed {
        Ok(())
    } else {
        Err(DomainError::validation(
            "invalid username format: use 3-50 alphanumeric characters or underscores",
        ))
    }
}

/// Phone: separators (spaces, dashes, parentheses) are ignored, then an
/// optional leading `+` followed by 10-15 digits.
pub fn validate_phone(phone: &str) -> DomainResult<()> {
    let cleaned: String = phone
        .chars()
        .filter(|c| !matches!(c, ' ' | '-' | '(' | ')'))
        .collect();
    let digits = cleaned.strip_prefix('+').unwrap_or(&cleaned);

    let well_formed = (PHONE_DIGITS_MIN..=PHONE_DIGITS_MAX).contains(&digits.len())
        && digits.chars().all(|c| c.is_ascii_digit());

    if well_formed {
        Ok(())
    } else {
        Err(DomainError::validation("invalid phone number format"))
    }
}

/// Password: at least 6 characters and at most 72 bytes once encoded.
pub fn validate_password(password: &str) -> DomainResult<()> {
    if password.chars().count() < PASSWORD_MIN {
        return Err(DomainError::validation(format!(
            "password must be at least {PASSWORD_MIN} characters"
        )));
    }
    if password.len() > PASSWORD_MAX_BYTES {
        return Err(DomainError::validation(format!(
            "password is too long ({} bytes); maximum is {PASSWORD_MAX_BYTES} bytes",
            password.len()
        )));
    }
    Ok(())
}

/// Person names: non-blank, at most 100 characters.
pub fn validate_name(field: &str, value: &str) -> DomainResult<()> {
    validate_text(field, value, NAME_MAX)
}

/// Required free text: non-blank, at most `max` characters.
pub fn validate_text(field: &str, value: &str, max: usize) -> DomainResult<()> {
    if value.trim().is_empty() {
        return Err(DomainError::validation(format!("{field} must not be empty")));
    }
    if value.chars().count() > max {
        return Err(DomainError::validation(format!(
            "{field} must be at most {max} characters"
        )));
    }
    Ok(())
}

/// Shallow email check: `local@domain.tld`, single `@`, no whitespace.
pub fn validate_email(email: &str) -> DomainResult<()> {
    let invalid = || DomainError::validation(format!("invalid email address: {email}"));

    if email.chars().any(char::is_whitespace) {
        return Err(invalid());
    }
    let (local, domain) = email.split_once('@').ok_or_else(invalid)?;
    if local.is_empty() || domain.contains('@') {
        return Err(invalid());
    }
    match domain.rsplit_once('.') {
        Some((host, tld)) if !host.is_empty() && !tld.is_empty() => Ok(()),
        _ => Err(invalid()),
    }
}

/// Optional free text bounded to `max` characters.
pub fn validate_max_len(field: &str, value: Option<&str>, max: usize) -> DomainResult<()> {
    match value {
        Some(v) if v.chars().count() > max => Err(DomainError::validation(format!(
            "{field} must be at most {max} characters"
        ))),
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn username_accepts_word_characters_only() {
        assert!(validate_username("john_smith").is_ok());
        assert!(validate_username("abc").is_ok());
        assert!(validate_username("ab").is_err());
        assert!(validate_username("john.smith").is_err());
        assert!(validate_username(&"a".repeat(51)).is_err());
    }

    #[test]
    fn phone_ignores_separators() {
        assert!(validate_phone("(555) 012-3456").is_ok());
        assert!(validate_phone("+1 555 012 3456").is_ok());
        assert!(validate_phone("555-0123").is_err());
        assert!(validate_phone("555-012-345x").is_err());
        assert!(validate_phone("+").is_err());
    }

    #[test]
    fn password_minimum_length() {
        assert!(validate_password("123456").is_ok());
        assert!(validate_password("12345").is_err());
    }

    #[test]
    fn password_limit_counts_bytes_not_characters() {
        assert!(validate_password(&"a".repeat(72)).is_ok());
        assert!(validate_password(&"a".repeat(73)).is_err());
        // 25 three-byte characters: 25 chars, 75 bytes.
        let err = validate_password(&"€".repeat(25)).unwrap_err();
        assert!(err.to_string().contains("75 bytes"));
    }

    #[test]
    fn names_must_not_be_blank() {
        assert!(validate_name("first_name", "Ada").is_ok());
        assert!(validate_name("first_name", "   ").is_err());
        assert!(validate_name("last_name", &"x".repeat(101)).is_err());
    }

    #[test]
    fn email_shape() {
        assert!(validate_email("john.smith@company.com").is_ok());
        assert!(validate_email("john@company").is_err());
        assert!(validate_email("@company.com").is_err());
        assert!(validate_email("a@b@c.com").is_err());
        assert!(validate_email("john smith@company.com").is_err());
    }

    #[test]
    fn optional_text_is_bounded() {
        assert!(validate_max_len("notes", None, 5).is_ok());
        assert!(validate_max_len("notes", Some("12345"), 5).is_ok());
        assert!(validate_max_len("notes", Some("123456"), 5).is_err());
    }

    mod proptest_tests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn well_formed_usernames_validate(name in "[A-Za-z0-9_]{3,50}") {
                prop_assert!(validate_username(&name).is_ok());
            }

            #[test]
            fn usernames_with_punctuation_are_rejected(
                prefix in "[a-z]{2,10}",
                bad in "[.@!# -]",
                suffix in "[a-z]{0,10}"
            ) {
                let name = format!("{prefix}{bad}{suffix}");
                prop_assert!(validate_username(&name).is_err());
            }
        }
    }
}
