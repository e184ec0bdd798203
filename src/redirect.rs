//! Federated sign-in through the hosted UI: build the authorization
//! redirect, then complete it when the browser comes back.

use std::sync::{Mutex, PoisonError};

use serde::Deserialize;
use url::Url;

use crate::error::Error;
use crate::oauth::OAuthClient;
use crate::session::Session;
use crate::store::AttemptStore;
use crate::types::IdentityProvider;

/// `idle -> awaiting_redirect -> exchanging -> {authenticated | failed}`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RedirectPhase {
    Idle,
    AwaitingRedirect,
    Exchanging,
    Authenticated,
    Failed,
}

/// Query parameters the identity provider appends to the redirect URI.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct CallbackParams {
    pub code: Option<String>,
    pub state: Option<String>,
    pub error: Option<String>,
    pub error_description: Option<String>,
}

impl CallbackParams {
    #[must_use]
    pub fn from_url(url: &Url) -> Self {
        let mut params = Self::default();
        for (key, value) in url.query_pairs() {
            let slot = match key.as_ref() {
                "code" => &mut params.code,
                "state" => &mut params.state,
                "error" => &mut params.error,
                "error_description" => &mut params.error_description,
                _ => continue,
            };
            *slot = Some(value.into_owned());
        }
        params
    }

    /// True when the URL carries nothing from the identity provider.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.code.is_none() && self.state.is_none() && self.error.is_none()
    }
}

#[derive(Debug)]
pub enum CallbackOutcome {
    /// No redirect parameters on the URL.
    NoCallback,
    /// Redirect parameters without a stored attempt (stale bookmark, replay,
    /// new tab). The caller cleans the URL and shows nothing.
    NotAnActiveFlow,
    Authenticated(Session),
    Failed(Error),
}

/// Drives one federated login attempt at a time.
#[derive(Debug)]
pub struct RedirectHandler<A> {
    client: OAuthClient,
    store: A,
    phase: Mutex<RedirectPhase>,
}

impl<A: AttemptStore> RedirectHandler<A> {
    pub fn new(client: OAuthClient, store: A) -> Self {
        Self {
            client,
            store,
            phase: Mutex::new(RedirectPhase::Idle),
        }
    }

    pub fn phase(&self) -> RedirectPhase {
        *self.phase.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn set_phase(&self, phase: RedirectPhase) {
        *self.phase.lock().unwrap_or_else(PoisonError::into_inner) = phase;
    }

    pub fn client(&self) -> &OAuthClient {
        &self.client
    }

    pub fn store(&self) -> &A {
        &self.store
    }

    /// Store a fresh attempt and return the URL to navigate the browser to.
    pub fn begin_federated_login(&self, provider: &IdentityProvider) -> Url {
        let request = self.client.authorization_url(provider);
        self.store.save(request.attempt);
        self.set_phase(RedirectPhase::AwaitingRedirect);
        tracing::info!(provider = %provider, "Redirecting to identity provider");
        request.url
    }

    /// Exchange `code` for a session, provided `state` matches the stored attempt.
    ///
    /// The stored attempt is consumed whatever the outcome.
    ///
    /// # Errors
    ///
    /// [`Error::InvalidState`] if nothing is stored or `state` differs (the
    /// token endpoint is not called), otherwise the errors of
    /// [`OAuthClient::exchange_code`] and [`Session::from_tokens`].
    pub async fn complete_federated_login(&self, code: &str, state: &str) -> Result<Session, Error> {
        let Some(attempt) = self.store.take().filter(|a| a.matches_state(state)) else {
            tracing::warn!("OAuth state mismatch");
            self.set_phase(RedirectPhase::Failed);
            return Err(Error::InvalidState);
        };

        self.set_phase(RedirectPhase::Exchanging);
        let result = match self.client.exchange_code(code, &attempt.code_verifier).await {
            Ok(tokens) => Session::from_tokens(tokens),
            Err(e) => Err(e),
        };

        match &result {
            Ok(session) => {
                self.set_phase(RedirectPhase::Authenticated);
                tracing::info!(user = %session.user(), "Federated login successful");
            }
            Err(e) => {
                self.set_phase(RedirectPhase::Failed);
                tracing::error!(error = %e, "Token exchange failed");
            }
        }
        result
    }

    /// Handle whatever the identity provider put on the redirect URL.
    pub async fn handle_callback(&self, params: &CallbackParams) -> CallbackOutcome {
        if params.is_empty() {
            return CallbackOutcome::NoCallback;
        }
        if self.store.load().is_none() {
            tracing::debug!("Redirect parameters without an active attempt, ignoring");
            self.store.clear();
            return CallbackOutcome::NotAnActiveFlow;
        }

        if let Some(error) = &params.error {
            self.store.clear();
            self.set_phase(RedirectPhase::Failed);
            let description = params
                .error_description
                .clone()
                .unwrap_or_else(|| "Sign-in was cancelled or failed. Please try again.".into());
            tracing::warn!(error = %error, description = %description, "OAuth2 error from identity provider");
            return CallbackOutcome::Failed(Error::AuthProvider {
                code: error.clone(),
                message: description,
            });
        }

        let Some(code) = params.code.as_deref() else {
            self.store.clear();
            self.set_phase(RedirectPhase::Failed);
            return CallbackOutcome::Failed(Error::AuthProvider {
                code: "missing_code".into(),
                message: "Sign-in did not complete. Please try again.".into(),
            });
        };

        let state = params.state.as_deref().unwrap_or_default();
        match self.complete_federated_login(code, state).await {
            Ok(session) => CallbackOutcome::Authenticated(session),
            Err(e) => CallbackOutcome::Failed(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_callback_query() {
        let url: Url = "https://app.example.com/auth?code=abc&state=xyz&other=1"
            .parse()
            .unwrap();
        let params = CallbackParams::from_url(&url);
        assert_eq!(params.code.as_deref(), Some("abc"));
        assert_eq!(params.state.as_deref(), Some("xyz"));
        assert!(params.error.is_none());
        assert!(!params.is_empty());
    }

    #[test]
    fn parses_provider_error() {
        let url: Url =
            "https://app.example.com/auth?error=access_denied&error_description=User+cancelled"
                .parse()
                .unwrap();
        let params = CallbackParams::from_url(&url);
        assert_eq!(params.error.as_deref(), Some("access_denied"));
        assert_eq!(params.error_description.as_deref(), Some("User cancelled"));
    }

    #[test]
    fn plain_url_has_no_callback() {
        let url: Url = "https://app.example.com/auth".parse().unwrap();
        assert!(CallbackParams::from_url(&url).is_empty());
    }
}
