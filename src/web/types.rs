use crate::session::Session;

/// A successful sign-in, handed to
/// [`SessionStore::create`](super::SessionStore::create) for persistence.
///
/// The tokens inside `session` are credentials; store them the way you
/// would store passwords.
#[derive(Debug, Clone)]
pub struct NewSession {
    pub session: Session,
    /// Client `User-Agent` header value.
    pub user_agent: Option<String>,
    /// Client IP address.
    pub ip_address: Option<String>,
}
