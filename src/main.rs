use std::net::SocketAddr;

use anyhow::{Context, Result};
use axum::routing::get;
use axum::{Json, Router};
use tracing::info;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use irisnex_auth::web::{AuthSession, AuthState, MemorySessionStore, WebAuthConfig, auth_router};
use irisnex_auth::{AuthConfig, CognitoProvider, Route, UserProfile};

type AppState = AuthState<CognitoProvider, MemorySessionStore>;

#[tokio::main]
async fn main() -> Result<()> {
    // Missing .env is fine; real environments set variables directly
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("irisnex_auth=info")),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting irisnex-auth v{}", env!("CARGO_PKG_VERSION"));

    let auth = AuthConfig::from_env().context("loading identity settings")?;
    let provider = CognitoProvider::new(auth.cognito_config()?)?;
    let web = WebAuthConfig::from_env(&auth)?;
    info!(region = %auth.region, terms_version = %auth.terms_version, "Identity provider configured");

    let state: AppState = AuthState::new(web, provider, MemorySessionStore::new());

    let app = Router::new()
        .route(Route::UPLOAD_PATH, get(upload))
        .merge(auth_router(&state))
        .with_state(state);

    let port: u16 = match std::env::var("PORT") {
        Ok(port) => port.parse().context("PORT must be a port number")?,
        Err(_) => 3000,
    };
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    info!("Listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

/// Placeholder for the upload view: shows who is signed in.
async fn upload(auth: AuthSession) -> Json<UserProfile> {
    Json(auth.profile())
}
