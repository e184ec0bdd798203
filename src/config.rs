use std::time::Duration;

use url::Url;

use crate::cognito::{CognitoConfig, region_from_pool_id};
use crate::error::Error;
use crate::oauth::{DEFAULT_TIMEOUT, OAuthConfig};
use crate::terms::{CURRENT_TERMS_VERSION, TermsGate};

/// Identity settings shared by the hosted-UI client and the user-pool API.
#[derive(Debug, Clone)]
#[non_exhaustive]
pub struct AuthConfig {
    pub client_id: String,
    pub region: String,
    pub hosted_domain: Url,
    pub redirect_uri: Url,
    pub scopes: Option<Vec<String>>,
    pub terms_version: String,
    pub timeout: Duration,
    pub cognito_endpoint: Option<Url>,
}

impl AuthConfig {
    /// Create config from environment variables.
    ///
    /// # Required env vars
    /// - `IRISNEX_CLIENT_ID`: app client id
    /// - `IRISNEX_USER_POOL_ID`: user pool id; its prefix is the region
    ///   (or set `IRISNEX_COGNITO_REGION` instead)
    /// - `IRISNEX_COGNITO_DOMAIN`: hosted UI domain, with or without scheme
    /// - `IRISNEX_REDIRECT_URI`: where the hosted UI sends the browser back
    ///
    /// # Optional env vars
    /// - `IRISNEX_SCOPES`: comma-separated scopes
    /// - `IRISNEX_TERMS_VERSION`: current terms version (default `1.0`)
    /// - `IRISNEX_HTTP_TIMEOUT_SECS`: request timeout (default 20)
    /// - `IRISNEX_COGNITO_ENDPOINT`: user-pool API endpoint override
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if required env vars are missing or malformed.
    pub fn from_env() -> Result<Self, Error> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub(crate) fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, Error> {
        let require = |key: &str| {
            lookup(key)
                .filter(|v| !v.trim().is_empty())
                .ok_or_else(|| Error::Config(format!("{key} is required")))
        };
        let parse_url = |key: &str, value: &str| {
            value
                .parse::<Url>()
                .map_err(|e| Error::Config(format!("{key}: {e}")))
        };

        let client_id = require("IRISNEX_CLIENT_ID")?;

        let region = match lookup("IRISNEX_COGNITO_REGION") {
            Some(region) => region,
            None => {
                let pool_id = require("IRISNEX_USER_POOL_ID")?;
                region_from_pool_id(&pool_id)
                    .ok_or_else(|| {
                        Error::Config(format!("IRISNEX_USER_POOL_ID {pool_id:?} has no region prefix"))
                    })?
                    .to_owned()
            }
        };

        let domain = require("IRISNEX_COGNITO_DOMAIN")?;
        let domain = if domain.contains("://") {
            domain
        } else {
            format!("https://{domain}")
        };
        let hosted_domain = parse_url("IRISNEX_COGNITO_DOMAIN", &domain)?;

        let redirect_uri = parse_url("IRISNEX_REDIRECT_URI", &require("IRISNEX_REDIRECT_URI")?)?;

        let scopes = lookup("IRISNEX_SCOPES").map(|scopes| {
            scopes
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect()
        });

        let timeout = match lookup("IRISNEX_HTTP_TIMEOUT_SECS") {
            Some(secs) => Duration::from_secs(secs.trim().parse().map_err(|e| {
                Error::Config(format!("IRISNEX_HTTP_TIMEOUT_SECS: {e}"))
            })?),
            None => DEFAULT_TIMEOUT,
        };

        let cognito_endpoint = lookup("IRISNEX_COGNITO_ENDPOINT")
            .map(|v| parse_url("IRISNEX_COGNITO_ENDPOINT", &v))
            .transpose()?;

        Ok(Self {
            client_id,
            region,
            hosted_domain,
            redirect_uri,
            scopes,
            terms_version: lookup("IRISNEX_TERMS_VERSION")
                .unwrap_or_else(|| CURRENT_TERMS_VERSION.to_string()),
            timeout,
            cognito_endpoint,
        })
    }

    /// # Errors
    ///
    /// Returns [`Error::Config`] if the hosted domain cannot be a base URL.
    pub fn oauth_config(&self) -> Result<OAuthConfig, Error> {
        let mut config = OAuthConfig::new(
            self.client_id.clone(),
            self.hosted_domain.clone(),
            self.redirect_uri.clone(),
        )?
        .with_timeout(self.timeout);
        if let Some(scopes) = &self.scopes {
            config = config.with_scopes(scopes.clone());
        }
        Ok(config)
    }

    /// # Errors
    ///
    /// Returns [`Error::Config`] if the region does not form a valid endpoint.
    pub fn cognito_config(&self) -> Result<CognitoConfig, Error> {
        let mut config =
            CognitoConfig::new(&self.region, self.client_id.clone())?.with_timeout(self.timeout);
        if let Some(endpoint) = &self.cognito_endpoint {
            config = config.with_endpoint(endpoint.clone());
        }
        Ok(config)
    }

    #[must_use]
    pub fn terms_gate(&self) -> TermsGate {
        TermsGate::new(self.terms_version.clone())
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    const REQUIRED: [(&str, &str); 4] = [
        ("IRISNEX_CLIENT_ID", "client-123"),
        ("IRISNEX_USER_POOL_ID", "ap-south-1_X8dTvZK9H"),
        ("IRISNEX_COGNITO_DOMAIN", "auth.example.com"),
        ("IRISNEX_REDIRECT_URI", "https://app.example.com/auth"),
    ];

    #[test]
    fn minimal_environment() {
        let config = AuthConfig::from_lookup(lookup(&REQUIRED)).unwrap();
        assert_eq!(config.client_id, "client-123");
        assert_eq!(config.region, "ap-south-1");
        assert_eq!(config.hosted_domain.as_str(), "https://auth.example.com/");
        assert_eq!(config.terms_version, CURRENT_TERMS_VERSION);
        assert_eq!(config.timeout, DEFAULT_TIMEOUT);

        let oauth = config.oauth_config().unwrap();
        assert_eq!(
            oauth.token_url().as_str(),
            "https://auth.example.com/oauth2/token"
        );
        let cognito = config.cognito_config().unwrap();
        assert_eq!(
            cognito.endpoint().as_str(),
            "https://cognito-idp.ap-south-1.amazonaws.com/"
        );
    }

    #[test]
    fn optional_overrides() {
        let mut vars = REQUIRED.to_vec();
        vars.extend([
            ("IRISNEX_SCOPES", "openid, email"),
            ("IRISNEX_TERMS_VERSION", "2.0"),
            ("IRISNEX_HTTP_TIMEOUT_SECS", "15"),
            ("IRISNEX_COGNITO_REGION", "eu-west-1"),
            ("IRISNEX_COGNITO_ENDPOINT", "http://localhost:9229/"),
        ]);
        let config = AuthConfig::from_lookup(lookup(&vars)).unwrap();
        assert_eq!(config.scopes.as_deref(), Some(&["openid".to_string(), "email".to_string()][..]));
        assert_eq!(config.terms_gate().current_version(), "2.0");
        assert_eq!(config.timeout, Duration::from_secs(15));
        assert_eq!(config.region, "eu-west-1");
        assert_eq!(
            config.cognito_config().unwrap().endpoint().as_str(),
            "http://localhost:9229/"
        );
    }

    #[test]
    fn missing_required_var() {
        let vars: Vec<_> = REQUIRED
            .iter()
            .copied()
            .filter(|(k, _)| *k != "IRISNEX_REDIRECT_URI")
            .collect();
        let err = AuthConfig::from_lookup(lookup(&vars)).unwrap_err();
        assert!(err.to_string().contains("IRISNEX_REDIRECT_URI"));
    }

    #[test]
    fn bad_timeout() {
        let mut vars = REQUIRED.to_vec();
        vars.push(("IRISNEX_HTTP_TIMEOUT_SECS", "soon"));
        assert!(matches!(
            AuthConfig::from_lookup(lookup(&vars)),
            Err(Error::Config(_))
        ));
    }
}
