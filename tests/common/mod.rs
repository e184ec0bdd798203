//! Shared fixtures for the sign-in integration tests.

#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use serde_json::{Value, json};
use tokio::sync::Notify;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use irisnex_auth::{
    AuthFlow, Error, MemoryAttemptStore, MemorySessionCache, OAuthClient, OAuthConfig,
    RedirectHandler, SessionManager, SessionProvider, TermsGate, TokenSet, UserAttribute,
};

pub const EMAIL: &str = "jane@example.com";
pub const PASSWORD: &str = "correct-horse-9";
/// Far enough ahead that test tokens never expire.
pub const FAR_FUTURE: i64 = 4_000_000_000;
pub const LONG_AGO: i64 = 1_000_000_000;

pub type TestFlow = AuthFlow<FakeProvider, MemorySessionCache, MemoryAttemptStore>;

/// Unsigned JWT carrying `claims`.
pub fn jwt(claims: &Value) -> String {
    let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"none","typ":"JWT"}"#);
    let payload = URL_SAFE_NO_PAD.encode(claims.to_string());
    format!("{header}.{payload}.signature")
}

pub fn claims(terms_accepted: bool, exp: i64) -> Value {
    let mut claims = json!({
        "sub": "5c7d2f4e-0000-4000-8000-000000000001",
        "cognito:username": "google_1234567890",
        "email": EMAIL,
        "exp": exp,
    });
    if terms_accepted {
        claims["custom:terms_accepted"] = json!("true");
        claims["custom:terms_version"] = json!("1.0");
    }
    claims
}

pub fn tokens(terms_accepted: bool) -> TokenSet {
    tokens_expiring(terms_accepted, FAR_FUTURE)
}

pub fn tokens_expiring(terms_accepted: bool, exp: i64) -> TokenSet {
    TokenSet {
        id_token: jwt(&claims(terms_accepted, exp)),
        access_token: "access-token".into(),
        refresh_token: Some("refresh-token".into()),
    }
}

/// Scriptable identity backend that records every call.
pub struct FakeProvider {
    calls: Mutex<Vec<String>>,
    tokens: Mutex<TokenSet>,
    failure: Mutex<Option<(String, String)>>,
    release: Option<Arc<Notify>>,
}

impl FakeProvider {
    /// `sign_in` and `refresh` both answer with `tokens`.
    pub fn new(tokens: TokenSet) -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            tokens: Mutex::new(tokens),
            failure: Mutex::new(None),
            release: None,
        }
    }

    /// `sign_in` blocks until `release` is notified.
    pub fn gated(tokens: TokenSet, release: Arc<Notify>) -> Self {
        Self {
            release: Some(release),
            ..Self::new(tokens)
        }
    }

    /// The next call fails with this provider error.
    pub fn fail_next(&self, code: &str, message: &str) {
        *self.failure.lock().unwrap() = Some((code.into(), message.into()));
    }

    pub fn set_tokens(&self, tokens: TokenSet) {
        *self.tokens.lock().unwrap() = tokens;
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    fn record(&self, call: String) -> Result<(), Error> {
        self.calls.lock().unwrap().push(call);
        match self.failure.lock().unwrap().take() {
            Some((code, message)) => Err(Error::AuthProvider { code, message }),
            None => Ok(()),
        }
    }

    fn current_tokens(&self) -> TokenSet {
        self.tokens.lock().unwrap().clone()
    }
}

impl SessionProvider for FakeProvider {
    async fn sign_in(&self, username: &str, _password: &str) -> Result<TokenSet, Error> {
        if let Some(release) = &self.release {
            release.notified().await;
        }
        self.record(format!("sign_in:{username}"))?;
        Ok(self.current_tokens())
    }

    async fn refresh(&self, _refresh_token: &str) -> Result<TokenSet, Error> {
        self.record("refresh".into())?;
        let mut tokens = self.current_tokens();
        tokens.refresh_token = None;
        Ok(tokens)
    }

    async fn sign_up(
        &self,
        email: &str,
        _password: &str,
        attributes: &[UserAttribute],
    ) -> Result<(), Error> {
        let names: Vec<_> = attributes.iter().map(|a| a.name.as_str()).collect();
        self.record(format!("sign_up:{email}:{}", names.join(",")))
    }

    async fn confirm_sign_up(&self, username: &str, code: &str) -> Result<(), Error> {
        self.record(format!("confirm_sign_up:{username}:{code}"))
    }

    async fn resend_confirmation_code(&self, username: &str) -> Result<(), Error> {
        self.record(format!("resend_confirmation_code:{username}"))
    }

    async fn forgot_password(&self, username: &str) -> Result<(), Error> {
        self.record(format!("forgot_password:{username}"))
    }

    async fn confirm_forgot_password(
        &self,
        username: &str,
        code: &str,
        _new_password: &str,
    ) -> Result<(), Error> {
        self.record(format!("confirm_forgot_password:{username}:{code}"))
    }

    async fn update_attributes(
        &self,
        _access_token: &str,
        attributes: &[UserAttribute],
    ) -> Result<(), Error> {
        let pairs: Vec<_> = attributes
            .iter()
            .map(|a| format!("{}={}", a.name, a.value))
            .collect();
        self.record(format!("update_attributes:{}", pairs.join(",")))
    }
}

/// OAuth client whose hosted UI lives on `server`.
pub fn oauth_client(server: &MockServer) -> OAuthClient {
    let config = OAuthConfig::new(
        "test-client",
        server.uri().parse().unwrap(),
        "https://app.example.com/auth".parse().unwrap(),
    )
    .unwrap();
    OAuthClient::new(config).unwrap()
}

pub fn flow(provider: FakeProvider, client: OAuthClient) -> TestFlow {
    AuthFlow::new(
        SessionManager::new(provider, MemorySessionCache::new()),
        RedirectHandler::new(client, MemoryAttemptStore::new()),
        TermsGate::default(),
    )
}

/// Token endpoint answering every exchange with `tokens`.
pub async fn mount_token_endpoint(server: &MockServer, tokens: &TokenSet) {
    Mock::given(method("POST"))
        .and(path("/oauth2/token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id_token": tokens.id_token,
            "access_token": tokens.access_token,
            "refresh_token": tokens.refresh_token,
            "token_type": "Bearer",
            "expires_in": 3600,
        })))
        .mount(server)
        .await;
}

/// Token endpoint rejecting every exchange with `status`.
pub async fn mount_failing_token_endpoint(server: &MockServer, status: u16) {
    Mock::given(method("POST"))
        .and(path("/oauth2/token"))
        .respond_with(ResponseTemplate::new(status).set_body_json(json!({"error": "invalid_grant"})))
        .mount(server)
        .await;
}

/// Token endpoint that must never be called.
pub async fn forbid_token_endpoint(server: &MockServer) {
    Mock::given(method("POST"))
        .and(path("/oauth2/token"))
        .respond_with(ResponseTemplate::new(500))
        .expect(0)
        .mount(server)
        .await;
}
