//! Client-side storage: the per-attempt OAuth state and the device-local
//! session cache.

use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use serde::{Deserialize, Serialize};

use crate::error::Error;
use crate::pkce::OAuthAttempt;
use crate::token::TokenSet;
use crate::types::User;

/// Holds the state nonce and PKCE verifier of the login attempt in progress.
///
/// Only one attempt exists at a time; saving replaces any previous one.
pub trait AttemptStore: Send + Sync {
    fn save(&self, attempt: OAuthAttempt);

    /// The stored attempt, unless it is missing or expired.
    fn load(&self) -> Option<OAuthAttempt>;

    /// Removes and returns the stored attempt (expired attempts are discarded).
    fn take(&self) -> Option<OAuthAttempt>;

    fn clear(&self) {
        self.take();
    }
}

/// In-process [`AttemptStore`], the equivalent of per-tab session storage.
#[derive(Debug, Default)]
pub struct MemoryAttemptStore {
    slot: Mutex<Option<OAuthAttempt>>,
}

impl MemoryAttemptStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

fn live(attempt: Option<OAuthAttempt>) -> Option<OAuthAttempt> {
    let now = time::OffsetDateTime::now_utc().unix_timestamp();
    attempt.filter(|a| !a.is_expired_at(now))
}

impl AttemptStore for MemoryAttemptStore {
    fn save(&self, attempt: OAuthAttempt) {
        *self.slot.lock().unwrap_or_else(PoisonError::into_inner) = Some(attempt);
    }

    fn load(&self) -> Option<OAuthAttempt> {
        live(self.slot.lock().unwrap_or_else(PoisonError::into_inner).clone())
    }

    fn take(&self) -> Option<OAuthAttempt> {
        live(self.slot.lock().unwrap_or_else(PoisonError::into_inner).take())
    }
}

/// Session material persisted on the device between visits.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredSession {
    pub user: User,
    pub tokens: TokenSet,
}

/// Device-local cache backing `current_user` and silent session restore.
pub trait SessionCache: Send + Sync {
    fn load(&self) -> Option<StoredSession>;

    /// # Errors
    ///
    /// Returns [`Error::Storage`] if the session cannot be persisted.
    fn save(&self, session: &StoredSession) -> Result<(), Error>;

    /// Idempotent.
    fn clear(&self);
}

#[derive(Debug, Default)]
pub struct MemorySessionCache {
    slot: Mutex<Option<StoredSession>>,
}

impl MemorySessionCache {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl SessionCache for MemorySessionCache {
    fn load(&self) -> Option<StoredSession> {
        self.slot
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn save(&self, session: &StoredSession) -> Result<(), Error> {
        *self.slot.lock().unwrap_or_else(PoisonError::into_inner) = Some(session.clone());
        Ok(())
    }

    fn clear(&self) {
        self.slot.lock().unwrap_or_else(PoisonError::into_inner).take();
    }
}

/// JSON file [`SessionCache`] for desktop and CLI clients.
///
/// A missing or unreadable file reads as "never signed in".
#[derive(Debug, Clone)]
pub struct FileSessionCache {
    path: PathBuf,
}

impl FileSessionCache {
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl SessionCache for FileSessionCache {
    fn load(&self) -> Option<StoredSession> {
        let bytes = std::fs::read(&self.path).ok()?;
        match serde_json::from_slice(&bytes) {
            Ok(session) => Some(session),
            Err(e) => {
                tracing::warn!(path = %self.path.display(), error = %e, "Discarding unreadable session cache");
                None
            }
        }
    }

    fn save(&self, session: &StoredSession) -> Result<(), Error> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| Error::Storage(e.to_string()))?;
        }
        let json = serde_json::to_vec(session).map_err(|e| Error::Storage(e.to_string()))?;
        std::fs::write(&self.path, json).map_err(|e| Error::Storage(e.to_string()))
    }

    fn clear(&self) {
        match std::fs::remove_file(&self.path) {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => {
                tracing::warn!(path = %self.path.display(), error = %e, "Failed to remove session cache");
            }
        }
    }
}
