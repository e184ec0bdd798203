use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use rand::Rng;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// How long a stored attempt stays usable after it was created.
pub const ATTEMPT_TTL_SECS: i64 = 5 * 60;

/// Generates a cryptographically random code verifier for PKCE.
///
/// Returns a 64-character URL-safe string (RFC 7636 compliant, 43-128 chars).
#[must_use]
pub fn generate_code_verifier() -> String {
    let random_bytes: [u8; 48] = rand::rng().random();
    URL_SAFE_NO_PAD.encode(random_bytes)
}

/// Computes the S256 code challenge from a code verifier.
///
/// `challenge = BASE64URL(SHA256(verifier))`
#[must_use]
pub fn generate_code_challenge(verifier: &str) -> String {
    let hash = Sha256::digest(verifier.as_bytes());
    URL_SAFE_NO_PAD.encode(hash)
}

/// Generates a cryptographically random `OAuth2` state nonce.
///
/// Returns a 22-character URL-safe string (16 random bytes → base64url).
#[must_use]
pub fn generate_state() -> String {
    let random_bytes: [u8; 16] = rand::rng().random();
    URL_SAFE_NO_PAD.encode(random_bytes)
}

/// State nonce and PKCE verifier of one federated login attempt.
///
/// Created right before the redirect to the identity provider and consumed
/// exactly once by the code exchange.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OAuthAttempt {
    pub state: String,
    pub code_verifier: String,
    /// Unix seconds.
    pub created_at: i64,
}

impl OAuthAttempt {
    /// Fresh nonce and verifier, stamped with the current time.
    #[must_use]
    pub fn generate() -> Self {
        Self {
            state: generate_state(),
            code_verifier: generate_code_verifier(),
            created_at: time::OffsetDateTime::now_utc().unix_timestamp(),
        }
    }

    #[must_use]
    pub fn code_challenge(&self) -> String {
        generate_code_challenge(&self.code_verifier)
    }

    #[must_use]
    pub fn is_expired_at(&self, now: i64) -> bool {
        now - self.created_at > ATTEMPT_TTL_SECS
    }

    #[must_use]
    pub fn matches_state(&self, state: &str) -> bool {
        self.state == state
    }
}

impl std::fmt::Debug for OAuthAttempt {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OAuthAttempt")
            .field("state", &self.state)
            .field("code_verifier", &"<redacted>")
            .field("created_at", &self.created_at)
            .finish()
    }
}
