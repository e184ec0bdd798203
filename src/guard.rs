//! Access check for protected views.

use serde::Serialize;

use crate::session::{Session, SessionManager, SessionProvider};
use crate::store::SessionCache;
use crate::terms::{TermsDecision, TermsGate};
use crate::types::Route;

const DEFAULT_PLAN: &str = "free";

/// What protected views show about the signed-in user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UserProfile {
    pub email: Option<String>,
    /// Uppercased first character of the email, for the avatar badge.
    pub initial: String,
    pub plan: String,
}

impl UserProfile {
    #[must_use]
    pub fn from_session(session: &Session) -> Self {
        let claims = session.claims();
        let initial = claims
            .email
            .as_deref()
            .and_then(|email| email.chars().next())
            .map(|c| c.to_uppercase().collect::<String>())
            .unwrap_or_default();
        Self {
            email: claims.email.clone(),
            initial,
            plan: claims.plan.clone().unwrap_or_else(|| DEFAULT_PLAN.into()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Access {
    Granted(UserProfile),
    /// Send the user here instead.
    Denied(Route),
}

/// Protected views need a live session with the current terms accepted;
/// everyone else goes back to the sign-in flow.
pub async fn authorize<P, C>(sessions: &SessionManager<P, C>, gate: &TermsGate) -> Access
where
    P: SessionProvider,
    C: SessionCache,
{
    let session = match sessions.get_session().await {
        Ok(session) => session,
        Err(e) => {
            tracing::debug!(error = %e, "Protected view without session");
            return Access::Denied(Route::Auth);
        }
    };
    match gate.evaluate(session.claims()) {
        TermsDecision::Proceed => Access::Granted(UserProfile::from_session(&session)),
        TermsDecision::MustReaccept => Access::Denied(Route::Auth),
    }
}
