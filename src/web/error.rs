use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;

use crate::error::{Error, ErrorKind};

/// Errors of the sign-in routes that are answered in place rather than by
/// a redirect.
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    /// The identity provider or local validation rejected the request.
    #[error(transparent)]
    Provider(#[from] Error),

    /// Session store operation failed.
    #[error("Session store error: {0}")]
    Store(String),

    /// Missing or invalid configuration.
    #[error("Configuration error: {0}")]
    Config(String),
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        match self {
            Self::Provider(e) => {
                let status = match e.kind() {
                    ErrorKind::Validation => StatusCode::UNPROCESSABLE_ENTITY,
                    ErrorKind::SessionExpired => StatusCode::UNAUTHORIZED,
                    ErrorKind::Security | ErrorKind::AuthProvider => StatusCode::BAD_REQUEST,
                    ErrorKind::Network => StatusCode::BAD_GATEWAY,
                    ErrorKind::Internal => {
                        tracing::error!(error = %e, "Auth internal error");
                        StatusCode::INTERNAL_SERVER_ERROR
                    }
                };
                let body = json!({
                    "error": error_code(&e),
                    "message": e.user_message(),
                });
                (status, Json(body)).into_response()
            }
            Self::Store(_) | Self::Config(_) => {
                tracing::error!(error = %self, "Auth internal error");
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal error").into_response()
            }
        }
    }
}

/// Stable code for the `?error=` parameter of the sign-in page.
pub(super) fn error_code(error: &Error) -> &str {
    match error {
        Error::Validation(_) => "invalid_input",
        Error::AuthProvider { code, .. } => code,
        Error::InvalidState => "state_mismatch",
        Error::TokenExchange { .. } => "token_exchange_failed",
        Error::Service { .. } | Error::Http(_) => "network_error",
        Error::NoSession | Error::SessionExpired => "session_expired",
        Error::Decode(_) => "invalid_token",
        _ => "login_failed",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_codes() {
        assert_eq!(error_code(&Error::InvalidState), "state_mismatch");
        assert_eq!(
            error_code(&Error::TokenExchange {
                status: 400,
                body: "invalid_grant".into()
            }),
            "token_exchange_failed"
        );
        assert_eq!(
            error_code(&Error::AuthProvider {
                code: "access_denied".into(),
                message: "denied".into()
            }),
            "access_denied"
        );
        assert_eq!(error_code(&Error::Storage("disk".into())), "login_failed");
    }

    #[test]
    fn provider_errors_map_to_status() {
        let validation = crate::validation::ValidationError::new(
            crate::validation::Field::Email,
            "Please enter a valid email address",
        );
        let response = AuthError::Provider(validation.into()).into_response();
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);

        let response = AuthError::Provider(Error::SessionExpired).into_response();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

        let response = AuthError::Store("down".into()).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
