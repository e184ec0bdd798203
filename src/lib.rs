#![doc = include_str!("../README.md")]

pub mod cognito;
pub mod config;
pub mod error;
pub mod flow;
pub mod guard;
pub mod oauth;
pub mod pkce;
pub mod redirect;
pub mod session;
pub mod store;
pub mod terms;
pub mod token;
pub mod types;
pub mod validation;
#[cfg(feature = "web")]
pub mod web;

// Re-exports for convenient access
pub use cognito::{CognitoConfig, CognitoProvider};
pub use config::AuthConfig;
pub use error::{Error, ErrorKind};
pub use flow::{Action, AuthFlow, FlowState, Notice, Outcome, View};
pub use guard::{Access, UserProfile, authorize};
pub use oauth::{AuthorizationRequest, OAuthClient, OAuthConfig};
pub use pkce::{OAuthAttempt, generate_code_challenge, generate_code_verifier, generate_state};
pub use redirect::{CallbackOutcome, CallbackParams, RedirectHandler, RedirectPhase};
pub use session::{Session, SessionManager, SessionProvider};
pub use store::{
    AttemptStore, FileSessionCache, MemoryAttemptStore, MemorySessionCache, SessionCache,
    StoredSession,
};
pub use terms::{CURRENT_TERMS_VERSION, TermsDecision, TermsGate};
pub use token::{IdTokenClaims, TokenSet, decode_claims};
pub use types::{IdentityProvider, Route, SessionId, User, UserAttribute};
pub use validation::{Field, ValidationError};
