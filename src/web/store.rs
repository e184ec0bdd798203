use std::collections::HashMap;
use std::future::Future;

use tokio::sync::RwLock;

use super::types::NewSession;
use crate::session::Session;
use crate::types::SessionId;

type StoreError = Box<dyn std::error::Error + Send + Sync>;

/// Server-side session persistence.
///
/// Sessions are identified by opaque [`SessionId`]s held in the session
/// cookie. Implement this over your database; [`MemorySessionStore`] is
/// enough for a single process.
///
/// # Example
///
/// ```rust,ignore
/// impl SessionStore for MyAppState {
///     async fn create(&self, session: NewSession) -> Result<SessionId, ...> {
///         let id = SessionId(Ulid::new().to_string());
///         self.db.insert_session(&id, &session).await?;
///         Ok(id)
///     }
///
///     async fn find(&self, id: &SessionId) -> Result<Option<Session>, ...> {
///         self.db.find_session(id).await
///     }
///
///     // update, delete ...
/// }
/// ```
pub trait SessionStore: Send + Sync + 'static {
    /// Persist a freshly signed-in session. Returns its ID.
    fn create(
        &self,
        session: NewSession,
    ) -> impl Future<Output = Result<SessionId, StoreError>> + Send;

    fn find(
        &self,
        id: &SessionId,
    ) -> impl Future<Output = Result<Option<Session>, StoreError>> + Send;

    /// Replace the tokens of an existing session (after a refresh).
    fn update(
        &self,
        id: &SessionId,
        session: Session,
    ) -> impl Future<Output = Result<(), StoreError>> + Send;

    /// Delete a session (logout). Deleting an unknown ID is not an error.
    fn delete(&self, id: &SessionId) -> impl Future<Output = Result<(), StoreError>> + Send;
}

/// In-process [`SessionStore`] keyed by ULID session IDs.
#[derive(Debug, Default)]
pub struct MemorySessionStore {
    sessions: RwLock<HashMap<SessionId, NewSession>>,
}

impl MemorySessionStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.sessions.read().await.is_empty()
    }
}

impl SessionStore for MemorySessionStore {
    async fn create(&self, session: NewSession) -> Result<SessionId, StoreError> {
        let id = SessionId(ulid::Ulid::new().to_string());
        self.sessions.write().await.insert(id.clone(), session);
        Ok(id)
    }

    async fn find(&self, id: &SessionId) -> Result<Option<Session>, StoreError> {
        Ok(self
            .sessions
            .read()
            .await
            .get(id)
            .map(|record| record.session.clone()))
    }

    async fn update(&self, id: &SessionId, session: Session) -> Result<(), StoreError> {
        match self.sessions.write().await.get_mut(id) {
            Some(record) => {
                record.session = session;
                Ok(())
            }
            None => Err(format!("unknown session {id}").into()),
        }
    }

    async fn delete(&self, id: &SessionId) -> Result<(), StoreError> {
        self.sessions.write().await.remove(id);
        Ok(())
    }
}
