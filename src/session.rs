//! Session adapter over the identity provider.

use std::future::Future;

use crate::error::Error;
use crate::store::{SessionCache, StoredSession};
use crate::token::{IdTokenClaims, TokenSet, decode_claims};
use crate::types::{Route, User, UserAttribute};

/// Seconds before `exp` at which a session is already treated as expired.
pub const EXPIRY_SKEW_SECS: i64 = 60;

/// Authenticated session: provider tokens plus the decoded identity claims.
#[derive(Debug, Clone)]
pub struct Session {
    tokens: TokenSet,
    claims: IdTokenClaims,
}

impl Session {
    /// # Errors
    ///
    /// Returns [`Error::Decode`] if the identity token cannot be decoded or
    /// names no user.
    pub fn from_tokens(tokens: TokenSet) -> Result<Self, Error> {
        let claims = decode_claims(&tokens.id_token)?;
        if claims.username().is_none() {
            return Err(Error::Decode("identity token has no subject".into()));
        }
        Ok(Self { tokens, claims })
    }

    #[must_use]
    pub fn user(&self) -> User {
        // from_tokens guarantees a username
        User(self.claims.username().unwrap_or_default().to_owned())
    }

    #[must_use]
    pub fn tokens(&self) -> &TokenSet {
        &self.tokens
    }

    #[must_use]
    pub fn claims(&self) -> &IdTokenClaims {
        &self.claims
    }

    #[must_use]
    pub fn email(&self) -> Option<&str> {
        self.claims.email.as_deref()
    }

    /// Tokens without an `exp` claim never expire locally.
    #[must_use]
    pub fn is_expired_at(&self, now: i64) -> bool {
        self.claims
            .exp
            .is_some_and(|exp| exp.saturating_sub(EXPIRY_SKEW_SECS) <= now)
    }

    #[must_use]
    pub fn is_expired(&self) -> bool {
        self.is_expired_at(time::OffsetDateTime::now_utc().unix_timestamp())
    }

    /// Applies a refresh result. Refresh responses carry no new refresh
    /// token, so the current one is kept.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Decode`] if the refreshed identity token is unusable.
    pub fn refreshed(&self, mut tokens: TokenSet) -> Result<Self, Error> {
        if tokens.refresh_token.is_none() {
            tokens.refresh_token.clone_from(&self.tokens.refresh_token);
        }
        Self::from_tokens(tokens)
    }

    #[must_use]
    pub fn to_stored(&self) -> StoredSession {
        StoredSession {
            user: self.user(),
            tokens: self.tokens.clone(),
        }
    }
}

/// The identity backend.
///
/// Every operation the sign-in flow needs from the user pool, behind one
/// interface so the backend can be swapped or mocked.
pub trait SessionProvider: Send + Sync + 'static {
    /// Password sign-in.
    fn sign_in(
        &self,
        username: &str,
        password: &str,
    ) -> impl Future<Output = Result<TokenSet, Error>> + Send;

    /// Trade a refresh token for fresh identity and access tokens.
    fn refresh(&self, refresh_token: &str) -> impl Future<Output = Result<TokenSet, Error>> + Send;

    fn sign_up(
        &self,
        email: &str,
        password: &str,
        attributes: &[UserAttribute],
    ) -> impl Future<Output = Result<(), Error>> + Send;

    fn confirm_sign_up(
        &self,
        username: &str,
        code: &str,
    ) -> impl Future<Output = Result<(), Error>> + Send;

    fn resend_confirmation_code(
        &self,
        username: &str,
    ) -> impl Future<Output = Result<(), Error>> + Send;

    fn forgot_password(&self, username: &str) -> impl Future<Output = Result<(), Error>> + Send;

    fn confirm_forgot_password(
        &self,
        username: &str,
        code: &str,
        new_password: &str,
    ) -> impl Future<Output = Result<(), Error>> + Send;

    fn update_attributes(
        &self,
        access_token: &str,
        attributes: &[UserAttribute],
    ) -> impl Future<Output = Result<(), Error>> + Send;
}

/// Current-user lookup, transparent refresh and sign-out over a
/// [`SessionProvider`] and a device-local [`SessionCache`].
#[derive(Debug)]
pub struct SessionManager<P, C> {
    provider: P,
    cache: C,
}

impl<P: SessionProvider, C: SessionCache> SessionManager<P, C> {
    pub fn new(provider: P, cache: C) -> Self {
        Self { provider, cache }
    }

    pub fn provider(&self) -> &P {
        &self.provider
    }

    /// Locally cached user; never touches the network.
    pub fn current_user(&self) -> Option<User> {
        self.cache.load().map(|stored| stored.user)
    }

    /// Current session, refreshed first if it has expired.
    ///
    /// A failed refresh signs the user out.
    ///
    /// # Errors
    ///
    /// [`Error::NoSession`] if nobody is signed in on this device,
    /// [`Error::SessionExpired`] if the session could not be refreshed.
    pub async fn get_session(&self) -> Result<Session, Error> {
        let stored = self.cache.load().ok_or(Error::NoSession)?;
        let session = match Session::from_tokens(stored.tokens) {
            Ok(session) => session,
            Err(e) => {
                tracing::warn!(error = %e, "Cached session is unreadable, signing out");
                self.sign_out();
                return Err(Error::SessionExpired);
            }
        };
        if session.is_expired() {
            return self.refresh_session(&session).await;
        }
        Ok(session)
    }

    /// Refresh now, regardless of expiry. Used after attribute updates so the
    /// new claims show up in the identity token.
    ///
    /// # Errors
    ///
    /// Same as [`get_session`](Self::get_session).
    pub async fn refresh(&self) -> Result<Session, Error> {
        let stored = self.cache.load().ok_or(Error::NoSession)?;
        let session = Session::from_tokens(stored.tokens).map_err(|e| {
            tracing::warn!(error = %e, "Cached session is unreadable, signing out");
            self.sign_out();
            Error::SessionExpired
        })?;
        self.refresh_session(&session).await
    }

    async fn refresh_session(&self, session: &Session) -> Result<Session, Error> {
        let Some(refresh_token) = session.tokens().refresh_token.as_deref() else {
            tracing::info!(user = %session.user(), "Session expired without refresh token");
            self.sign_out();
            return Err(Error::SessionExpired);
        };

        let refreshed = match self.provider.refresh(refresh_token).await {
            Ok(tokens) => session.refreshed(tokens),
            Err(e) => Err(e),
        };
        match refreshed {
            Ok(session) => {
                self.cache.save(&session.to_stored())?;
                tracing::debug!(user = %session.user(), "Session refreshed");
                Ok(session)
            }
            Err(e) => {
                tracing::warn!(error = %e, "Session refresh failed, signing out");
                self.sign_out();
                Err(Error::SessionExpired)
            }
        }
    }

    /// Password sign-in; the new session becomes the current one.
    ///
    /// # Errors
    ///
    /// Provider errors are passed through unchanged.
    pub async fn sign_in(&self, username: &str, password: &str) -> Result<Session, Error> {
        let tokens = self.provider.sign_in(username, password).await?;
        self.establish(tokens)
    }

    /// Adopt tokens obtained elsewhere (e.g. an OAuth code exchange).
    ///
    /// # Errors
    ///
    /// [`Error::Decode`] for an unusable identity token, [`Error::Storage`]
    /// if the cache write fails.
    pub fn establish(&self, tokens: TokenSet) -> Result<Session, Error> {
        let session = Session::from_tokens(tokens)?;
        self.adopt(&session)?;
        Ok(session)
    }

    /// Make an already-built session the current one.
    ///
    /// # Errors
    ///
    /// [`Error::Storage`] if the cache write fails.
    pub fn adopt(&self, session: &Session) -> Result<(), Error> {
        self.cache.save(&session.to_stored())?;
        tracing::info!(user = %session.user(), "Signed in");
        Ok(())
    }

    /// Forget the local session. Idempotent. Returns the login route.
    pub fn sign_out(&self) -> Route {
        if let Some(user) = self.current_user() {
            tracing::info!(user = %user, "Signed out");
        }
        self.cache.clear();
        Route::Auth
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use serde_json::json;

    use super::*;
    use crate::store::MemorySessionCache;
    use crate::token::unsigned_jwt;

    const NOW: i64 = 1_800_000_000;
    const PAST: i64 = 1_000_000_000;

    fn tokens(exp: i64, refresh: Option<&str>) -> TokenSet {
        TokenSet {
            id_token: unsigned_jwt(&json!({
                "sub": "sub-1",
                "cognito:username": "jane",
                "email": "jane@example.com",
                "exp": exp,
            })),
            access_token: "access".into(),
            refresh_token: refresh.map(str::to_string),
        }
    }

    /// Answers refreshes with `refreshed`, or fails when it is `None`.
    struct RefreshOnly {
        refreshed: Mutex<Option<TokenSet>>,
        calls: AtomicUsize,
    }

    impl RefreshOnly {
        fn new(refreshed: Option<TokenSet>) -> Self {
            Self {
                refreshed: Mutex::new(refreshed),
                calls: AtomicUsize::new(0),
            }
        }
    }

    fn unsupported() -> Error {
        Error::AuthProvider {
            code: "Unsupported".into(),
            message: "not used here".into(),
        }
    }

    impl SessionProvider for RefreshOnly {
        async fn sign_in(&self, _: &str, _: &str) -> Result<TokenSet, Error> {
            Ok(tokens(i64::MAX / 2, Some("refresh-1")))
        }

        async fn refresh(&self, _: &str) -> Result<TokenSet, Error> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.refreshed
                .lock()
                .unwrap()
                .clone()
                .ok_or(Error::AuthProvider {
                    code: "NotAuthorizedException".into(),
                    message: "Refresh Token has expired".into(),
                })
        }

        async fn sign_up(&self, _: &str, _: &str, _: &[UserAttribute]) -> Result<(), Error> {
            Err(unsupported())
        }

        async fn confirm_sign_up(&self, _: &str, _: &str) -> Result<(), Error> {
            Err(unsupported())
        }

        async fn resend_confirmation_code(&self, _: &str) -> Result<(), Error> {
            Err(unsupported())
        }

        async fn forgot_password(&self, _: &str) -> Result<(), Error> {
            Err(unsupported())
        }

        async fn confirm_forgot_password(&self, _: &str, _: &str, _: &str) -> Result<(), Error> {
            Err(unsupported())
        }

        async fn update_attributes(&self, _: &str, _: &[UserAttribute]) -> Result<(), Error> {
            Err(unsupported())
        }
    }

    #[test]
    fn expiry_uses_skew() {
        let session = Session::from_tokens(tokens(NOW + 30, None)).unwrap();
        assert!(session.is_expired_at(NOW));
        let session = Session::from_tokens(tokens(NOW + 3600, None)).unwrap();
        assert!(!session.is_expired_at(NOW));
    }

    #[test]
    fn extreme_expiry_does_not_overflow() {
        let session = Session::from_tokens(tokens(i64::MIN, None)).unwrap();
        assert!(session.is_expired_at(NOW));
        let session = Session::from_tokens(tokens(i64::MAX, None)).unwrap();
        assert!(!session.is_expired_at(NOW));
    }

    #[test]
    fn token_without_subject_is_rejected() {
        let result = Session::from_tokens(TokenSet {
            id_token: unsigned_jwt(&json!({"email": "jane@example.com"})),
            access_token: "access".into(),
            refresh_token: None,
        });
        assert!(matches!(result, Err(Error::Decode(_))));
    }

    #[test]
    fn refresh_keeps_refresh_token() {
        let session = Session::from_tokens(tokens(NOW, Some("refresh-1"))).unwrap();
        let refreshed = session.refreshed(tokens(NOW + 3600, None)).unwrap();
        assert_eq!(refreshed.tokens().refresh_token.as_deref(), Some("refresh-1"));
        assert_eq!(refreshed.user(), User("jane".into()));
    }

    #[tokio::test]
    async fn no_session_without_sign_in() {
        let manager = SessionManager::new(RefreshOnly::new(None), MemorySessionCache::new());
        assert!(manager.current_user().is_none());
        assert!(matches!(manager.get_session().await, Err(Error::NoSession)));
    }

    #[tokio::test]
    async fn sign_in_then_sign_out() {
        let manager = SessionManager::new(RefreshOnly::new(None), MemorySessionCache::new());
        let session = manager.sign_in("jane@example.com", "password1").await.unwrap();
        assert_eq!(manager.current_user(), Some(session.user()));

        assert_eq!(manager.sign_out(), Route::Auth);
        assert!(manager.current_user().is_none());
        assert_eq!(manager.sign_out(), Route::Auth);
    }

    #[tokio::test]
    async fn expired_session_is_refreshed_and_saved() {
        let provider = RefreshOnly::new(Some(tokens(i64::MAX / 2, None)));
        let manager = SessionManager::new(provider, MemorySessionCache::new());
        manager.establish(tokens(PAST, Some("refresh-1"))).unwrap();

        let session = manager.get_session().await.unwrap();
        assert!(!session.is_expired());
        assert_eq!(manager.provider().calls.load(Ordering::SeqCst), 1);

        // Second call uses the saved, fresh session.
        manager.get_session().await.unwrap();
        assert_eq!(manager.provider().calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn failed_refresh_signs_out() {
        let manager = SessionManager::new(RefreshOnly::new(None), MemorySessionCache::new());
        manager.establish(tokens(PAST, Some("refresh-1"))).unwrap();

        assert!(matches!(manager.get_session().await, Err(Error::SessionExpired)));
        assert!(manager.current_user().is_none());
    }

    #[tokio::test]
    async fn expired_without_refresh_token_signs_out() {
        let provider = RefreshOnly::new(Some(tokens(i64::MAX / 2, None)));
        let manager = SessionManager::new(provider, MemorySessionCache::new());
        manager.establish(tokens(PAST, None)).unwrap();

        assert!(matches!(manager.get_session().await, Err(Error::SessionExpired)));
        assert_eq!(manager.provider().calls.load(Ordering::SeqCst), 0);
        assert!(manager.current_user().is_none());
    }
}
