use crate::validation::ValidationError;

/// Broad category of an [`Error`], deciding how the failure is presented.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Bad form input; shown inline, never sent to the network.
    Validation,
    /// The identity provider rejected the request (wrong password, unverified account).
    AuthProvider,
    /// CSRF state mismatch; the flow restarts from the login view.
    Security,
    /// Timeouts, transport failures, 5xx. Retryable by the user.
    Network,
    /// No usable session; the user is signed out.
    SessionExpired,
    /// Local decoding, storage or configuration problems.
    Internal,
}

#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// Error reported by the identity provider, carrying its own error code.
    #[error("{message}")]
    AuthProvider { code: String, message: String },

    /// Returned `state` does not match the stored nonce, or nothing was stored.
    #[error("Invalid state parameter")]
    InvalidState,

    #[error("Token exchange failed: {status} - {body}")]
    TokenExchange { status: u16, body: String },

    #[error("{operation} failed: HTTP {status}")]
    Service { operation: &'static str, status: u16 },

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("No authenticated user")]
    NoSession,

    #[error("Session expired")]
    SessionExpired,

    #[error("Invalid identity token: {0}")]
    Decode(String),

    #[error("Session storage error: {0}")]
    Storage(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl Error {
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Validation(_) => ErrorKind::Validation,
            Self::AuthProvider { .. } => ErrorKind::AuthProvider,
            Self::InvalidState => ErrorKind::Security,
            Self::TokenExchange { status, .. } if *status >= 500 => ErrorKind::Network,
            Self::TokenExchange { .. } => ErrorKind::AuthProvider,
            Self::Service { .. } | Self::Http(_) => ErrorKind::Network,
            Self::NoSession | Self::SessionExpired => ErrorKind::SessionExpired,
            Self::Decode(_) | Self::Storage(_) | Self::Config(_) => ErrorKind::Internal,
        }
    }

    /// Whether retrying the same action later may succeed.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        self.kind() == ErrorKind::Network
    }

    /// Provider error code, e.g. `NotAuthorizedException`.
    #[must_use]
    pub fn provider_code(&self) -> Option<&str> {
        match self {
            Self::AuthProvider { code, .. } => Some(code),
            _ => None,
        }
    }

    /// Text for the dismissible notice shown to the user.
    #[must_use]
    pub fn user_message(&self) -> String {
        match (self, self.kind()) {
            (Self::Validation(e), _) => e.message.clone(),
            (Self::AuthProvider { message, .. }, _) => message.clone(),
            (Self::TokenExchange { .. }, ErrorKind::AuthProvider) => self.to_string(),
            (_, ErrorKind::Security) => {
                "Your login session has expired. Please try signing in again.".into()
            }
            (_, ErrorKind::Network) => {
                "Network error. Please check your connection and try again.".into()
            }
            (_, ErrorKind::SessionExpired) => "Session expired. Please sign in again.".into(),
            _ => "Something went wrong. Please try again.".into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::validation::{Field, ValidationError};

    #[test]
    fn token_exchange_kind_depends_on_status() {
        let client = Error::TokenExchange {
            status: 400,
            body: "invalid_grant".into(),
        };
        let server = Error::TokenExchange {
            status: 503,
            body: String::new(),
        };
        assert_eq!(client.kind(), ErrorKind::AuthProvider);
        assert_eq!(server.kind(), ErrorKind::Network);
        assert!(server.is_retryable());
        assert!(!client.is_retryable());
    }

    #[test]
    fn provider_messages_are_verbatim() {
        let err = Error::AuthProvider {
            code: "NotAuthorizedException".into(),
            message: "Incorrect username or password.".into(),
        };
        assert_eq!(err.user_message(), "Incorrect username or password.");
        assert_eq!(err.provider_code(), Some("NotAuthorizedException"));
    }

    #[test]
    fn state_mismatch_is_a_security_failure() {
        assert_eq!(Error::InvalidState.kind(), ErrorKind::Security);
        assert!(Error::InvalidState.user_message().contains("expired"));
    }

    #[test]
    fn validation_message_is_inline_text() {
        let err = Error::from(ValidationError::new(Field::Email, "Enter a valid email"));
        assert_eq!(err.kind(), ErrorKind::Validation);
        assert_eq!(err.user_message(), "Enter a valid email");
    }

    #[test]
    fn session_errors_share_a_kind() {
        assert_eq!(Error::NoSession.kind(), ErrorKind::SessionExpired);
        assert_eq!(Error::SessionExpired.kind(), ErrorKind::SessionExpired);
    }
}
