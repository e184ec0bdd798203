use axum_extra::extract::PrivateCookieJar;
use axum_extra::extract::cookie::{Cookie, SameSite};
use time::Duration;

use crate::pkce::{ATTEMPT_TTL_SECS, OAuthAttempt};

const ATTEMPT_COOKIE_NAME: &str = "__irisnex_oauth";

/// Private cookie carrying the login attempt (state + verifier) across the redirect.
pub(super) fn attempt_cookie(
    attempt: &OAuthAttempt,
    secure: bool,
    auth_path: &str,
) -> Option<Cookie<'static>> {
    let value = serde_json::to_string(attempt).ok()?;
    Some(
        Cookie::build((ATTEMPT_COOKIE_NAME, value))
            .http_only(true)
            .secure(secure)
            .same_site(SameSite::Lax)
            .path(auth_path.to_string())
            .max_age(Duration::seconds(ATTEMPT_TTL_SECS))
            .build(),
    )
}

/// Removal cookie for the login attempt.
pub(super) fn clear_attempt_cookie(auth_path: &str) -> Cookie<'static> {
    Cookie::build((ATTEMPT_COOKIE_NAME, ""))
        .path(auth_path.to_string())
        .max_age(Duration::ZERO)
        .build()
}

/// The login attempt from cookies, if present and readable.
pub(super) fn get_attempt(jar: &PrivateCookieJar) -> Option<OAuthAttempt> {
    jar.get(ATTEMPT_COOKIE_NAME)
        .and_then(|c| serde_json::from_str(c.value()).ok())
}

/// Create session cookie.
pub(super) fn session_cookie(
    name: &str,
    session_id: &str,
    ttl_days: i64,
    secure: bool,
) -> Cookie<'static> {
    Cookie::build((name.to_string(), session_id.to_string()))
        .http_only(true)
        .secure(secure)
        .same_site(SameSite::Lax)
        .path("/".to_string())
        .max_age(Duration::days(ttl_days))
        .build()
}

/// Create removal cookie for session.
pub(super) fn clear_session_cookie(name: &str) -> Cookie<'static> {
    Cookie::build((name.to_string(), ""))
        .path("/".to_string())
        .max_age(Duration::ZERO)
        .build()
}
