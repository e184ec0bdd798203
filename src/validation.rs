//! Local form checks run before anything reaches the identity provider.

/// Form field a [`ValidationError`] belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Field {
    Email,
    Password,
    NewPassword,
    Code,
    Terms,
}

/// Inline form error. Never leaves the client.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{message}")]
pub struct ValidationError {
    pub field: Field,
    pub message: String,
}

impl ValidationError {
    #[must_use]
    pub fn new(field: Field, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

const MIN_PASSWORD_LEN: usize = 8;
const MAX_PASSWORD_LEN: usize = 256;

/// Checks an email address and returns it trimmed.
///
/// Accepts exactly one `@`, a non-empty local part and a dotted domain
/// without empty labels. Whitespace anywhere inside is rejected.
///
/// # Errors
///
/// Returns a [`ValidationError`] on [`Field::Email`].
pub fn validate_email(email: &str) -> Result<&str, ValidationError> {
    let email = email.trim();
    let invalid = || ValidationError::new(Field::Email, "Please enter a valid email address");

    if email.is_empty() {
        return Err(ValidationError::new(Field::Email, "Email is required"));
    }
    if email.chars().any(char::is_whitespace) {
        return Err(invalid());
    }
    let (local, domain) = email.split_once('@').ok_or_else(invalid)?;
    if local.is_empty() || domain.contains('@') || !domain.contains('.') {
        return Err(invalid());
    }
    if domain.split('.').any(str::is_empty) {
        return Err(invalid());
    }
    Ok(email)
}

/// Checks password length. Character-class policy is left to the provider,
/// which reports violations verbatim.
///
/// # Errors
///
/// Returns a [`ValidationError`] on `field`.
pub fn validate_password(password: &str, field: Field) -> Result<(), ValidationError> {
    let len = password.chars().count();
    if len == 0 {
        return Err(ValidationError::new(field, "Password is required"));
    }
    if len < MIN_PASSWORD_LEN {
        return Err(ValidationError::new(
            field,
            format!("Password must be at least {MIN_PASSWORD_LEN} characters"),
        ));
    }
    if len > MAX_PASSWORD_LEN {
        return Err(ValidationError::new(
            field,
            format!("Password must be at most {MAX_PASSWORD_LEN} characters"),
        ));
    }
    Ok(())
}

/// Checks a one-time confirmation code and returns it trimmed.
///
/// # Errors
///
/// Returns a [`ValidationError`] on [`Field::Code`].
pub fn validate_code(code: &str) -> Result<&str, ValidationError> {
    let code = code.trim();
    if code.is_empty() {
        return Err(ValidationError::new(Field::Code, "Confirmation code is required"));
    }
    Ok(code)
}

/// # Errors
///
/// Returns a [`ValidationError`] on [`Field::Terms`] when `accepted` is false.
pub fn require_terms(accepted: bool) -> Result<(), ValidationError> {
    if accepted {
        Ok(())
    } else {
        Err(ValidationError::new(
            Field::Terms,
            "You must accept the Terms & Conditions",
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_plain_addresses() {
        assert_eq!(validate_email("  jane@example.com ").unwrap(), "jane@example.com");
        assert!(validate_email("a.b+tag@mail.example.co.uk").is_ok());
    }

    #[test]
    fn rejects_malformed_addresses() {
        for bad in [
            "",
            "jane",
            "@example.com",
            "jane@",
            "jane@example",
            "jane@@example.com",
            "jane@example..com",
            "jane doe@example.com",
            "jane@.example.com",
        ] {
            let err = validate_email(bad).unwrap_err();
            assert_eq!(err.field, Field::Email, "{bad:?} should be rejected");
        }
    }

    #[test]
    fn password_length_bounds() {
        assert!(validate_password("", Field::Password).is_err());
        assert!(validate_password("short", Field::Password).is_err());
        assert!(validate_password("long enough", Field::Password).is_ok());
        let err = validate_password(&"x".repeat(300), Field::NewPassword).unwrap_err();
        assert_eq!(err.field, Field::NewPassword);
    }

    #[test]
    fn code_is_trimmed() {
        assert_eq!(validate_code(" 123456 ").unwrap(), "123456");
        assert!(validate_code("   ").is_err());
    }

    #[test]
    fn terms_checkbox_is_required() {
        assert!(require_terms(true).is_ok());
        assert_eq!(require_terms(false).unwrap_err().field, Field::Terms);
    }
}
