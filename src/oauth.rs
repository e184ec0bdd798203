use std::time::Duration;

use serde::Deserialize;
use url::Url;

use crate::error::Error;
use crate::pkce::OAuthAttempt;
use crate::token::TokenSet;
use crate::types::IdentityProvider;

/// Client-side timeout applied to every identity-provider request.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(20);

/// Hosted sign-in UI configuration.
///
/// Required fields are constructor parameters; the authorize and token
/// endpoints are derived from the hosted domain and can be overridden.
///
/// ```rust,ignore
/// use irisnex_auth::OAuthConfig;
///
/// let config = OAuthConfig::new(
///     "my-client-id",
///     "https://auth.example.com".parse()?,
///     "https://app.example.com/auth".parse()?,
/// )?;
/// ```
#[derive(Debug, Clone)]
#[non_exhaustive]
pub struct OAuthConfig {
    pub(crate) client_id: String,
    pub(crate) auth_url: Url,
    pub(crate) token_url: Url,
    pub(crate) redirect_uri: Url,
    pub(crate) scopes: Vec<String>,
    pub(crate) timeout: Duration,
}

impl OAuthConfig {
    /// Create a configuration for the hosted UI served at `domain`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if `domain` cannot be a base URL.
    pub fn new(client_id: impl Into<String>, domain: Url, redirect_uri: Url) -> Result<Self, Error> {
        let endpoint = |path: &str| {
            domain
                .join(path)
                .map_err(|e| Error::Config(format!("hosted UI domain {domain}: {e}")))
        };
        Ok(Self {
            client_id: client_id.into(),
            auth_url: endpoint("/oauth2/authorize")?,
            token_url: endpoint("/oauth2/token")?,
            redirect_uri,
            scopes: [
                "openid",
                "email",
                "profile",
                "aws.cognito.signin.user.admin",
            ]
            .map(String::from)
            .to_vec(),
            timeout: DEFAULT_TIMEOUT,
        })
    }

    /// Override the authorization endpoint.
    #[must_use]
    pub fn with_auth_url(mut self, url: Url) -> Self {
        self.auth_url = url;
        self
    }

    /// Override the token endpoint.
    #[must_use]
    pub fn with_token_url(mut self, url: Url) -> Self {
        self.token_url = url;
        self
    }

    /// Override the requested scopes.
    #[must_use]
    pub fn with_scopes(mut self, scopes: Vec<String>) -> Self {
        self.scopes = scopes;
        self
    }

    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    #[must_use]
    pub fn client_id(&self) -> &str {
        &self.client_id
    }

    #[must_use]
    pub fn auth_url(&self) -> &Url {
        &self.auth_url
    }

    #[must_use]
    pub fn token_url(&self) -> &Url {
        &self.token_url
    }

    #[must_use]
    pub fn redirect_uri(&self) -> &Url {
        &self.redirect_uri
    }

    #[must_use]
    pub fn scopes(&self) -> &[String] {
        &self.scopes
    }

    #[must_use]
    pub fn timeout(&self) -> Duration {
        self.timeout
    }
}

/// `OAuth2` authorization-code client for the hosted sign-in UI.
#[derive(Debug, Clone)]
pub struct OAuthClient {
    config: OAuthConfig,
    http: reqwest::Client,
}

/// Authorization URL plus the attempt that must be stored until the redirect returns.
#[derive(Debug)]
#[non_exhaustive]
pub struct AuthorizationRequest {
    pub url: Url,
    pub attempt: OAuthAttempt,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    #[serde(default)]
    id_token: Option<String>,
    access_token: String,
    #[serde(default)]
    refresh_token: Option<String>,
}

impl OAuthClient {
    /// # Errors
    ///
    /// Returns [`Error::Http`] if the HTTP client cannot be built.
    pub fn new(config: OAuthConfig) -> Result<Self, Error> {
        let http = reqwest::Client::builder().timeout(config.timeout).build()?;
        Ok(Self { config, http })
    }

    /// Use a custom HTTP client (for connection pool reuse or testing).
    #[must_use]
    pub fn with_http_client(mut self, client: reqwest::Client) -> Self {
        self.http = client;
        self
    }

    #[must_use]
    pub fn config(&self) -> &OAuthConfig {
        &self.config
    }

    /// Generate an authorization URL for `provider` with fresh PKCE parameters.
    #[must_use]
    pub fn authorization_url(&self, provider: &IdentityProvider) -> AuthorizationRequest {
        let attempt = OAuthAttempt::generate();
        let scope = self.config.scopes.join(" ");

        let mut url = self.config.auth_url.clone();
        url.query_pairs_mut()
            .append_pair("identity_provider", &provider.to_string())
            .append_pair("response_type", "code")
            .append_pair("client_id", &self.config.client_id)
            .append_pair("redirect_uri", self.config.redirect_uri.as_str())
            .append_pair("scope", &scope)
            .append_pair("state", &attempt.state)
            .append_pair("code_challenge", &attempt.code_challenge())
            .append_pair("code_challenge_method", "S256");

        AuthorizationRequest { url, attempt }
    }

    /// Exchange an authorization code for tokens using PKCE.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Http`] on network failure or timeout,
    /// [`Error::TokenExchange`] with the provider's status and body on a
    /// non-success response, and [`Error::Decode`] if the body is not a token
    /// response or carries no identity token.
    pub async fn exchange_code(&self, code: &str, code_verifier: &str) -> Result<TokenSet, Error> {
        let params = [
            ("grant_type", "authorization_code"),
            ("client_id", self.config.client_id.as_str()),
            ("code", code),
            ("redirect_uri", self.config.redirect_uri.as_str()),
            ("code_verifier", code_verifier),
        ];

        let response = self
            .http
            .post(self.config.token_url.clone())
            .form(&params)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::TokenExchange { status, body });
        }

        let tokens: TokenResponse = response
            .json()
            .await
            .map_err(|e| Error::Decode(format!("token response: {e}")))?;
        let id_token = tokens
            .id_token
            .ok_or_else(|| Error::Decode("token response has no id_token".into()))?;

        Ok(TokenSet {
            id_token,
            access_token: tokens.access_token,
            refresh_token: tokens.refresh_token,
        })
    }
}
