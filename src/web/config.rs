use axum_extra::extract::cookie::Key;

use super::error::AuthError;
use crate::config::AuthConfig;
use crate::oauth::OAuthClient;
use crate::terms::TermsGate;
use crate::types::Route;

/// Shared auth settings used by both config and runtime state.
#[derive(Clone)]
pub(crate) struct AuthSettings {
    pub(crate) cookie_key: Key,
    pub(crate) session_cookie_name: String,
    pub(crate) session_ttl_days: i64,
    pub(crate) secure_cookies: bool,
    pub(crate) auth_path: String,
    pub(crate) app_path: String,
}

impl AuthSettings {
    fn defaults() -> Self {
        Self {
            cookie_key: Key::generate(),
            session_cookie_name: "__irisnex_session".into(),
            session_ttl_days: 30,
            secure_cookies: true,
            auth_path: Route::AUTH_PATH.into(),
            app_path: Route::UPLOAD_PATH.into(),
        }
    }

    pub(crate) fn terms_path(&self) -> String {
        format!("{}/terms", self.auth_path)
    }
}

/// Server-side sign-in configuration.
///
/// Required parts (`client`, `gate`) are constructor parameters.
///
/// Use [`from_env()`](WebAuthConfig::from_env) for convention-based setup,
/// or [`new()`](WebAuthConfig::new) with `with_*` methods for full control.
pub struct WebAuthConfig {
    pub(super) client: OAuthClient,
    pub(super) gate: TermsGate,
    pub(super) settings: AuthSettings,
}

impl WebAuthConfig {
    #[must_use]
    pub fn new(client: OAuthClient, gate: TermsGate) -> Self {
        Self {
            client,
            gate,
            settings: AuthSettings::defaults(),
        }
    }

    /// Build from identity settings plus web-only environment variables.
    ///
    /// # Optional env vars
    /// - `DEV_AUTH`: `"1"` or `"true"` disables the `Secure` cookie flag (plain-HTTP dev)
    /// - `COOKIE_KEY`: cookie encryption key bytes (at least 64); ephemeral if unset
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::Config`] if the identity settings are unusable or
    /// `COOKIE_KEY` is too short.
    pub fn from_env(auth: &AuthConfig) -> Result<Self, AuthError> {
        let client = auth
            .oauth_config()
            .and_then(OAuthClient::new)
            .map_err(|e| AuthError::Config(e.to_string()))?;

        let dev_auth = matches!(std::env::var("DEV_AUTH").as_deref(), Ok("1" | "true"));

        let cookie_key = match std::env::var("COOKIE_KEY") {
            Ok(k) => Key::try_from(k.as_bytes()).map_err(|_| {
                AuthError::Config(
                    "COOKIE_KEY is set but invalid (must be at least 64 bytes). \
                     Remove the env var to use an ephemeral key, or provide a valid key."
                        .into(),
                )
            })?,
            Err(_) => Key::generate(),
        };

        Ok(Self::new(client, auth.terms_gate())
            .with_cookie_key(cookie_key)
            .with_secure_cookies(!dev_auth))
    }

    #[must_use]
    pub fn with_cookie_key(mut self, key: Key) -> Self {
        self.settings.cookie_key = key;
        self
    }

    #[must_use]
    pub fn with_session_cookie_name(mut self, name: impl Into<String>) -> Self {
        self.settings.session_cookie_name = name.into();
        self
    }

    #[must_use]
    pub fn with_session_ttl_days(mut self, days: i64) -> Self {
        self.settings.session_ttl_days = days;
        self
    }

    #[must_use]
    pub fn with_secure_cookies(mut self, secure: bool) -> Self {
        self.settings.secure_cookies = secure;
        self
    }

    /// Mount point of the sign-in routes (default `/auth`).
    #[must_use]
    pub fn with_auth_path(mut self, path: impl Into<String>) -> Self {
        self.settings.auth_path = path.into();
        self
    }

    /// Where signed-in users with accepted terms land (default `/upload`).
    #[must_use]
    pub fn with_app_path(mut self, path: impl Into<String>) -> Self {
        self.settings.app_path = path.into();
        self
    }
}
