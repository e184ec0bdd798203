//! Server-side sign-in for Axum applications.
//!
//! The same flow as the client controller, with the attempt state kept in a
//! private cookie and sessions kept server-side.
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use irisnex_auth::web::{MemorySessionStore, WebAuthConfig, auth_routes};
//!
//! let auth = AuthConfig::from_env()?;
//! let provider = CognitoProvider::new(auth.cognito_config()?)?;
//! let config = WebAuthConfig::from_env(&auth)?;
//!
//! let app = axum::Router::new()
//!     .merge(auth_routes(config, provider, MemorySessionStore::new()));
//! ```
//!
//! Protected handlers take an [`AuthSession`]; it redirects to the sign-in
//! flow when there is no live session, and to the terms view when the
//! current terms are not accepted.

mod config;
mod cookies;
mod error;
mod extractor;
mod routes;
mod state;
mod store;
mod types;

pub use config::WebAuthConfig;
pub use error::AuthError;
pub use extractor::AuthSession;
pub use routes::{auth_routes, auth_router};
pub use state::AuthState;
pub use store::{MemorySessionStore, SessionStore};
pub use types::NewSession;

/// Re-export cookie key type for builder API.
pub use axum_extra::extract::cookie::Key as CookieKey;
