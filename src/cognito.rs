//! [`SessionProvider`] over the Cognito user-pool JSON API.

use std::time::Duration;

use reqwest::header::CONTENT_TYPE;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::json;
use url::Url;

use crate::error::Error;
use crate::oauth::DEFAULT_TIMEOUT;
use crate::session::SessionProvider;
use crate::token::TokenSet;
use crate::types::UserAttribute;

const TARGET_PREFIX: &str = "AWSCognitoIdentityProviderService";
const AMZ_JSON: &str = "application/x-amz-json-1.1";

/// User-pool API settings.
#[derive(Debug, Clone)]
#[non_exhaustive]
pub struct CognitoConfig {
    pub(crate) client_id: String,
    pub(crate) endpoint: Url,
    pub(crate) timeout: Duration,
}

impl CognitoConfig {
    /// Configuration for the regional user-pool endpoint.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if `region` does not form a valid host.
    pub fn new(region: &str, client_id: impl Into<String>) -> Result<Self, Error> {
        let endpoint = format!("https://cognito-idp.{region}.amazonaws.com/")
            .parse()
            .map_err(|e| Error::Config(format!("region {region:?}: {e}")))?;
        Ok(Self {
            client_id: client_id.into(),
            endpoint,
            timeout: DEFAULT_TIMEOUT,
        })
    }

    /// Override the API endpoint (local emulators, tests).
    #[must_use]
    pub fn with_endpoint(mut self, endpoint: Url) -> Self {
        self.endpoint = endpoint;
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
    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }
}

/// Region prefix of a user-pool id (`ap-south-1_AbC123` → `ap-south-1`).
#[must_use]
pub fn region_from_pool_id(pool_id: &str) -> Option<&str> {
    pool_id
        .split_once('_')
        .map(|(region, _)| region)
        .filter(|region| !region.is_empty())
}

#[derive(Debug, Clone)]
pub struct CognitoProvider {
    config: CognitoConfig,
    http: reqwest::Client,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct InitiateAuthResponse {
    #[serde(default)]
    authentication_result: Option<AuthenticationResult>,
    #[serde(default)]
    challenge_name: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct AuthenticationResult {
    id_token: String,
    access_token: String,
    #[serde(default)]
    refresh_token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(default, rename = "__type")]
    kind: Option<String>,
    #[serde(default, alias = "Message")]
    message: Option<String>,
}

impl CognitoProvider {
    /// # Errors
    ///
    /// Returns [`Error::Http`] if the HTTP client cannot be built.
    pub fn new(config: CognitoConfig) -> Result<Self, Error> {
        let http = reqwest::Client::builder().timeout(config.timeout).build()?;
        Ok(Self { config, http })
    }

    /// Use a custom HTTP client (for connection pool reuse or testing).
    #[must_use]
    pub fn with_http_client(mut self, client: reqwest::Client) -> Self {
        self.http = client;
        self
    }

    async fn send<B: Serialize>(
        &self,
        operation: &'static str,
        body: &B,
    ) -> Result<reqwest::Response, Error> {
        let response = self
            .http
            .post(self.config.endpoint.clone())
            .header(CONTENT_TYPE, AMZ_JSON)
            .header("X-Amz-Target", format!("{TARGET_PREFIX}.{operation}"))
            .json(body)
            .send()
            .await?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        if status.is_server_error() {
            tracing::warn!(operation, status = status.as_u16(), "User pool unavailable");
            return Err(Error::Service {
                operation,
                status: status.as_u16(),
            });
        }

        let body: ErrorBody = response.json().await.unwrap_or(ErrorBody {
            kind: None,
            message: None,
        });
        // `__type` is sometimes namespaced: `com.amazonaws...#NotAuthorizedException`
        let code = body
            .kind
            .as_deref()
            .map(|k| k.rsplit('#').next().unwrap_or(k).to_owned())
            .unwrap_or_else(|| format!("HTTP{}", status.as_u16()));
        let message = body
            .message
            .unwrap_or_else(|| format!("{operation} failed. Please try again."));
        tracing::debug!(operation, code = %code, "User pool rejected request");
        Err(Error::AuthProvider { code, message })
    }

    async fn call<B: Serialize, R: DeserializeOwned>(
        &self,
        operation: &'static str,
        body: &B,
    ) -> Result<R, Error> {
        Ok(self.send(operation, body).await?.json::<R>().await?)
    }

    async fn initiate_auth(
        &self,
        flow: &str,
        parameters: serde_json::Value,
    ) -> Result<TokenSet, Error> {
        let response: InitiateAuthResponse = self
            .call(
                "InitiateAuth",
                &json!({
                    "AuthFlow": flow,
                    "ClientId": self.config.client_id,
                    "AuthParameters": parameters,
                }),
            )
            .await?;

        match (response.authentication_result, response.challenge_name) {
            (Some(result), _) => Ok(TokenSet {
                id_token: result.id_token,
                access_token: result.access_token,
                refresh_token: result.refresh_token,
            }),
            (None, Some(challenge)) => Err(Error::AuthProvider {
                message: format!("Additional sign-in step required ({challenge})."),
                code: challenge,
            }),
            (None, None) => Err(Error::AuthProvider {
                code: "NoAuthenticationResult".into(),
                message: "Sign-in failed. Please try again.".into(),
            }),
        }
    }
}

impl SessionProvider for CognitoProvider {
    async fn sign_in(&self, username: &str, password: &str) -> Result<TokenSet, Error> {
        self.initiate_auth(
            "USER_PASSWORD_AUTH",
            json!({ "USERNAME": username, "PASSWORD": password }),
        )
        .await
    }

    async fn refresh(&self, refresh_token: &str) -> Result<TokenSet, Error> {
        self.initiate_auth(
            "REFRESH_TOKEN_AUTH",
            json!({ "REFRESH_TOKEN": refresh_token }),
        )
        .await
    }

    async fn sign_up(
        &self,
        email: &str,
        password: &str,
        attributes: &[UserAttribute],
    ) -> Result<(), Error> {
        self.send(
            "SignUp",
            &json!({
                "ClientId": self.config.client_id,
                "Username": email,
                "Password": password,
                "UserAttributes": attributes,
            }),
        )
        .await
        .map(drop)
    }

    async fn confirm_sign_up(&self, username: &str, code: &str) -> Result<(), Error> {
        self.send(
            "ConfirmSignUp",
            &json!({
                "ClientId": self.config.client_id,
                "Username": username,
                "ConfirmationCode": code,
                "ForceAliasCreation": true,
            }),
        )
        .await
        .map(drop)
    }

    async fn resend_confirmation_code(&self, username: &str) -> Result<(), Error> {
        self.send(
            "ResendConfirmationCode",
            &json!({ "ClientId": self.config.client_id, "Username": username }),
        )
        .await
        .map(drop)
    }

    async fn forgot_password(&self, username: &str) -> Result<(), Error> {
        self.send(
            "ForgotPassword",
            &json!({ "ClientId": self.config.client_id, "Username": username }),
        )
        .await
        .map(drop)
    }

    async fn confirm_forgot_password(
        &self,
        username: &str,
        code: &str,
        new_password: &str,
    ) -> Result<(), Error> {
        self.send(
            "ConfirmForgotPassword",
            &json!({
                "ClientId": self.config.client_id,
                "Username": username,
                "ConfirmationCode": code,
                "Password": new_password,
            }),
        )
        .await
        .map(drop)
    }

    async fn update_attributes(
        &self,
        access_token: &str,
        attributes: &[UserAttribute],
    ) -> Result<(), Error> {
        self.send(
            "UpdateUserAttributes",
            &json!({ "AccessToken": access_token, "UserAttributes": attributes }),
        )
        .await
        .map(drop)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn region_is_pool_id_prefix() {
        assert_eq!(region_from_pool_id("ap-south-1_X8dTvZK9H"), Some("ap-south-1"));
        assert_eq!(region_from_pool_id("nounderscore"), None);
        assert_eq!(region_from_pool_id("_abc"), None);
    }

    #[test]
    fn regional_endpoint() {
        let config = CognitoConfig::new("eu-west-1", "client").unwrap();
        assert_eq!(
            config.endpoint().as_str(),
            "https://cognito-idp.eu-west-1.amazonaws.com/"
        );
        assert_eq!(config.client_id(), "client");
    }

    #[test]
    fn invalid_region_is_a_config_error() {
        assert!(matches!(
            CognitoConfig::new("bad region/", "client"),
            Err(Error::Config(_))
        ));
    }
}
