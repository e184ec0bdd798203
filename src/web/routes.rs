use axum::extract::{Form, Path, Query, State};
use axum::http::{HeaderMap, header::USER_AGENT};
use axum::response::{IntoResponse, Redirect, Response};
use axum::routing::get;
use axum::{Json, Router};
use axum_extra::extract::PrivateCookieJar;
use serde::{Deserialize, Serialize};

use super::config::WebAuthConfig;
use super::cookies;
use super::error::{AuthError, error_code};
use super::extractor::current_session;
use super::state::AuthState;
use super::store::SessionStore;
use super::types::NewSession;
use crate::error::Error;
use crate::oauth::OAuthClient;
use crate::redirect::{CallbackOutcome, CallbackParams, RedirectHandler};
use crate::session::SessionProvider;
use crate::store::{AttemptStore, MemoryAttemptStore};
use crate::terms::TermsDecision;
use crate::types::IdentityProvider;
use crate::validation::require_terms;

/// Create the sign-in router with its own state.
pub fn auth_routes<P, S>(config: WebAuthConfig, provider: P, store: S) -> Router
where
    P: SessionProvider,
    S: SessionStore,
{
    let state = AuthState::new(config, provider, store);
    auth_router(&state).with_state(state)
}

/// The sign-in routes, for merging into an app that shares [`AuthState`]
/// with protected handlers.
pub fn auth_router<P, S>(state: &AuthState<P, S>) -> Router<AuthState<P, S>>
where
    P: SessionProvider,
    S: SessionStore,
{
    let auth_path = &state.settings.auth_path;

    Router::new()
        .route(&format!("{auth_path}/login/{{provider}}"), get(login::<P, S>))
        .route(&format!("{auth_path}/callback"), get(callback::<P, S>))
        .route(
            &format!("{auth_path}/terms"),
            get(terms_status::<P, S>).post(accept_terms::<P, S>),
        )
        .route(
            &format!("{auth_path}/logout"),
            get(logout::<P, S>).post(logout::<P, S>),
        )
}

// ── Login ──────────────────────────────────────────────────────────

async fn login<P: SessionProvider, S: SessionStore>(
    State(state): State<AuthState<P, S>>,
    jar: PrivateCookieJar,
    Path(provider): Path<String>,
) -> Result<(PrivateCookieJar, Redirect), AuthError> {
    let provider: IdentityProvider = provider.parse()?;
    let request = state.client.authorization_url(&provider);

    let attempt_cookie = cookies::attempt_cookie(
        &request.attempt,
        state.settings.secure_cookies,
        &state.settings.auth_path,
    )
    .ok_or_else(|| AuthError::Store("login attempt could not be encoded".into()))?;

    tracing::info!(provider = %provider, "Redirecting to identity provider");
    Ok((jar.add(attempt_cookie), Redirect::to(request.url.as_str())))
}

// ── Callback ───────────────────────────────────────────────────────

async fn callback<P: SessionProvider, S: SessionStore>(
    State(state): State<AuthState<P, S>>,
    jar: PrivateCookieJar,
    Query(params): Query<CallbackParams>,
    headers: HeaderMap,
) -> Result<(PrivateCookieJar, Redirect), AuthError> {
    let settings = &state.settings;

    let attempts = MemoryAttemptStore::new();
    if let Some(attempt) = cookies::get_attempt(&jar) {
        attempts.save(attempt);
    }
    let jar = jar.remove(cookies::clear_attempt_cookie(&settings.auth_path));

    let handler = RedirectHandler::new(OAuthClient::clone(&state.client), attempts);
    let session = match handler.handle_callback(&params).await {
        CallbackOutcome::NoCallback | CallbackOutcome::NotAnActiveFlow => {
            return Ok((jar, Redirect::to(&settings.auth_path)));
        }
        CallbackOutcome::Failed(e) => {
            return Ok((jar, login_error(&settings.auth_path, error_code(&e))));
        }
        CallbackOutcome::Authenticated(session) => session,
    };

    let destination = match state.gate.evaluate(session.claims()) {
        TermsDecision::Proceed => settings.app_path.clone(),
        TermsDecision::MustReaccept => settings.terms_path(),
    };
    let user = session.user();

    let session_id = state
        .store
        .create(NewSession {
            session,
            user_agent: extract_user_agent(&headers),
            ip_address: extract_client_ip(&headers),
        })
        .await
        .map_err(|e| {
            tracing::error!(error = %e, "Session creation failed");
            AuthError::Store(e.to_string())
        })?;

    let session_cookie = cookies::session_cookie(
        &settings.session_cookie_name,
        &session_id.to_string(),
        settings.session_ttl_days,
        settings.secure_cookies,
    );

    tracing::info!(session_id = %session_id, user = %user, "Federated login successful");

    Ok((jar.add(session_cookie), Redirect::to(&destination)))
}

// ── Terms ──────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
struct TermsStatus {
    current_version: String,
    accepted: bool,
    email: Option<String>,
}

async fn terms_status<P: SessionProvider, S: SessionStore>(
    State(state): State<AuthState<P, S>>,
    jar: PrivateCookieJar,
) -> Result<Json<TermsStatus>, Response> {
    let Some((_, session)) = current_session(&state, &jar).await? else {
        return Err(Redirect::to(&state.settings.auth_path).into_response());
    };

    Ok(Json(TermsStatus {
        current_version: state.gate.current_version().to_string(),
        accepted: state.gate.evaluate(session.claims()) == TermsDecision::Proceed,
        email: session.email().map(str::to_string),
    }))
}

#[derive(Debug, Deserialize)]
struct AcceptTermsForm {
    /// Checkbox value; browsers send `on` when ticked and nothing otherwise.
    accepted: Option<String>,
}

async fn accept_terms<P: SessionProvider, S: SessionStore>(
    State(state): State<AuthState<P, S>>,
    jar: PrivateCookieJar,
    Form(form): Form<AcceptTermsForm>,
) -> Result<(PrivateCookieJar, Redirect), Response> {
    let settings = &state.settings;

    let accepted = matches!(form.accepted.as_deref(), Some("on" | "true" | "1"));
    require_terms(accepted).map_err(|e| AuthError::from(Error::from(e)).into_response())?;

    let Some((session_id, session)) = current_session(&state, &jar).await? else {
        return Err(Redirect::to(&settings.auth_path).into_response());
    };

    let attributes = state.gate.acceptance_attributes();
    let updated = state
        .provider
        .update_attributes(&session.tokens().access_token, &attributes)
        .await;

    let refreshed = match updated {
        Ok(()) => state.refresh_session(&session_id, &session).await,
        Err(e) if e.provider_code() == Some("NotAuthorizedException") => Err(Error::SessionExpired),
        Err(e) => {
            tracing::error!(error = %e, "Recording terms acceptance failed");
            return Err(AuthError::from(e).into_response());
        }
    };

    match refreshed {
        Ok(session) => {
            if state.gate.evaluate(session.claims()) == TermsDecision::MustReaccept {
                tracing::warn!(user = %session.user(), "Refreshed token still lacks terms acceptance");
            }
            tracing::info!(user = %session.user(), version = state.gate.current_version(), "Terms accepted");
            Ok((jar, Redirect::to(&settings.app_path)))
        }
        Err(e) => {
            tracing::info!(session_id = %session_id, error = %e, "Session expired while accepting terms");
            if let Err(e) = state.store.delete(&session_id).await {
                tracing::warn!(error = %e, "Session deletion failed");
            }
            let clear = cookies::clear_session_cookie(&settings.session_cookie_name);
            Ok((
                jar.remove(clear),
                login_error(&settings.auth_path, "session_expired"),
            ))
        }
    }
}

// ── Logout ─────────────────────────────────────────────────────────

async fn logout<P: SessionProvider, S: SessionStore>(
    State(state): State<AuthState<P, S>>,
    jar: PrivateCookieJar,
) -> (PrivateCookieJar, Redirect) {
    if let Some(cookie) = jar.get(&state.settings.session_cookie_name) {
        let session_id = crate::types::SessionId(cookie.value().to_string());
        if let Err(e) = state.store.delete(&session_id).await {
            tracing::warn!(error = %e, "Session deletion failed during logout");
        }
        tracing::info!(session_id = %session_id, "Signed out");
    }

    let clear_cookie = cookies::clear_session_cookie(&state.settings.session_cookie_name);
    (jar.remove(clear_cookie), Redirect::to(&state.settings.auth_path))
}

// ── Helpers ────────────────────────────────────────────────────────

fn login_error(auth_path: &str, code: &str) -> Redirect {
    let encoded = urlencoding::encode(code);
    Redirect::to(&format!("{auth_path}?error={encoded}"))
}

fn extract_user_agent(headers: &HeaderMap) -> Option<String> {
    headers
        .get(USER_AGENT)
        .and_then(|v| v.to_str().ok())
        .map(|s| s.to_string())
}

fn extract_client_ip(headers: &HeaderMap) -> Option<String> {
    headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.split(',').next())
        .map(|s| s.trim().to_string())
        .or_else(|| {
            headers
                .get("x-real-ip")
                .and_then(|v| v.to_str().ok())
                .map(|s| s.to_string())
        })
}
