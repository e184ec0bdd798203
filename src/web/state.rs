use std::sync::Arc;

use axum::extract::FromRef;
use axum_extra::extract::cookie::Key;

use super::config::{AuthSettings, WebAuthConfig};
use super::store::SessionStore;
use crate::error::Error;
use crate::oauth::OAuthClient;
use crate::session::{Session, SessionProvider};
use crate::terms::TermsGate;
use crate::types::SessionId;

/// Shared state for the sign-in routes and the [`AuthSession`](super::AuthSession)
/// extractor.
pub struct AuthState<P, S> {
    pub(super) client: Arc<OAuthClient>,
    pub(super) provider: Arc<P>,
    pub(super) store: Arc<S>,
    pub(super) gate: Arc<TermsGate>,
    pub(super) settings: AuthSettings,
}

// Manual Clone: avoid derive adding `P: Clone, S: Clone` bounds.
impl<P, S> Clone for AuthState<P, S> {
    fn clone(&self) -> Self {
        Self {
            client: self.client.clone(),
            provider: self.provider.clone(),
            store: self.store.clone(),
            gate: self.gate.clone(),
            settings: self.settings.clone(),
        }
    }
}

// PrivateCookieJar requires Key to be extractable from state
impl<P, S> FromRef<AuthState<P, S>> for Key {
    fn from_ref(state: &AuthState<P, S>) -> Self {
        state.settings.cookie_key.clone()
    }
}

impl<P: SessionProvider, S: SessionStore> AuthState<P, S> {
    pub fn new(config: WebAuthConfig, provider: P, store: S) -> Self {
        Self {
            client: Arc::new(config.client),
            provider: Arc::new(provider),
            store: Arc::new(store),
            gate: Arc::new(config.gate),
            settings: config.settings,
        }
    }

    pub fn provider(&self) -> &P {
        &self.provider
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn gate(&self) -> &TermsGate {
        &self.gate
    }

    /// Trade the session's refresh token for new tokens and persist them.
    ///
    /// # Errors
    ///
    /// [`Error::SessionExpired`] without a refresh token, provider errors
    /// as returned, [`Error::Storage`] if the store rejects the update.
    pub(super) async fn refresh_session(
        &self,
        id: &SessionId,
        session: &Session,
    ) -> Result<Session, Error> {
        let refresh_token = session
            .tokens()
            .refresh_token
            .as_deref()
            .ok_or(Error::SessionExpired)?;
        let tokens = self.provider.refresh(refresh_token).await?;
        let refreshed = session.refreshed(tokens)?;
        self.store
            .update(id, refreshed.clone())
            .await
            .map_err(|e| Error::Storage(e.to_string()))?;
        tracing::debug!(session_id = %id, user = %refreshed.user(), "Session refreshed");
        Ok(refreshed)
    }
}
