use axum::extract::FromRequestParts;
use axum::http::StatusCode;
use axum::http::request::Parts;
use axum::response::{IntoResponse, Redirect, Response};
use axum_extra::extract::PrivateCookieJar;
use axum_extra::extract::cookie::Key;

use super::state::AuthState;
use super::store::SessionStore;
use crate::guard::UserProfile;
use crate::session::{Session, SessionProvider};
use crate::terms::TermsDecision;
use crate::types::SessionId;

/// Signed-in user with the current terms accepted.
///
/// Use as an Axum extractor in protected handlers. Expired sessions are
/// refreshed on the way in. Requests without a usable session are
/// redirected to the sign-in page, and users who still have to accept the
/// current terms are redirected to the terms view.
///
/// # Example
///
/// ```rust,ignore
/// async fn upload(auth: AuthSession) -> Json<UserProfile> {
///     Json(auth.profile())
/// }
/// ```
#[derive(Debug, Clone)]
pub struct AuthSession {
    /// Session ID (from cookie).
    pub session_id: SessionId,
    pub session: Session,
}

impl AuthSession {
    #[must_use]
    pub fn profile(&self) -> UserProfile {
        UserProfile::from_session(&self.session)
    }
}

/// Look up the session named by the session cookie, refreshing it if it
/// has expired. A session that cannot be refreshed is deleted.
pub(super) async fn current_session<P, S>(
    state: &AuthState<P, S>,
    jar: &PrivateCookieJar<Key>,
) -> Result<Option<(SessionId, Session)>, Response>
where
    P: SessionProvider,
    S: SessionStore,
{
    let Some(cookie) = jar.get(&state.settings.session_cookie_name) else {
        return Ok(None);
    };
    let session_id = SessionId(cookie.value().to_string());

    let session = state.store.find(&session_id).await.map_err(|e| {
        tracing::error!(error = %e, "Session lookup failed");
        (StatusCode::INTERNAL_SERVER_ERROR, "Internal error").into_response()
    })?;
    let Some(session) = session else {
        return Ok(None);
    };

    if !session.is_expired() {
        return Ok(Some((session_id, session)));
    }

    match state.refresh_session(&session_id, &session).await {
        Ok(session) => Ok(Some((session_id, session))),
        Err(e) => {
            tracing::info!(session_id = %session_id, error = %e, "Session refresh failed, signing out");
            if let Err(e) = state.store.delete(&session_id).await {
                tracing::warn!(error = %e, "Session deletion failed");
            }
            Ok(None)
        }
    }
}

impl<P, S> FromRequestParts<AuthState<P, S>> for AuthSession
where
    P: SessionProvider,
    S: SessionStore,
{
    type Rejection = Response;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AuthState<P, S>,
    ) -> Result<Self, Self::Rejection> {
        let jar: PrivateCookieJar<Key> = PrivateCookieJar::from_request_parts(parts, state)
            .await
            .map_err(IntoResponse::into_response)?;

        let Some((session_id, session)) = current_session(state, &jar).await? else {
            return Err(Redirect::to(&state.settings.auth_path).into_response());
        };

        match state.gate.evaluate(session.claims()) {
            TermsDecision::Proceed => Ok(Self {
                session_id,
                session,
            }),
            TermsDecision::MustReaccept => {
                tracing::debug!(user = %session.user(), "Terms not accepted, redirecting");
                Err(Redirect::to(&state.settings.terms_path()).into_response())
            }
        }
    }
}
