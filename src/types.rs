use derive_more::{Display, From, Into};
use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::Error;

/// Identity-provider username (`cognito:username`, falling back to `sub`).
///
/// Stored in the device-local cache; returned by
/// [`SessionManager::current_user`](crate::session::SessionManager::current_user)
/// without touching the network.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, Display, From, Into)]
#[serde(transparent)]
pub struct User(pub String);

impl User {
    #[must_use]
    pub fn username(&self) -> &str {
        &self.0
    }
}

/// Server-side session identifier (ULID string), held in the session cookie.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, Display, From, Into)]
#[serde(transparent)]
pub struct SessionId(pub String);

/// Federated identity provider behind the hosted sign-in UI.
///
/// `Display` yields the provider name the hosted UI expects in the
/// `identity_provider` query parameter.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum IdentityProvider {
    Google,
    Facebook,
    Apple,
    Amazon,
    /// Any other provider configured on the user pool (SAML/OIDC name).
    Custom(String),
}

impl std::fmt::Display for IdentityProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Google => f.write_str("Google"),
            Self::Facebook => f.write_str("Facebook"),
            Self::Apple => f.write_str("SignInWithApple"),
            Self::Amazon => f.write_str("LoginWithAmazon"),
            Self::Custom(name) => f.write_str(name),
        }
    }
}

impl std::str::FromStr for IdentityProvider {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "google" => Ok(Self::Google),
            "facebook" => Ok(Self::Facebook),
            "apple" | "signinwithapple" => Ok(Self::Apple),
            "amazon" | "loginwithamazon" => Ok(Self::Amazon),
            "" => Err(Error::Config("identity provider name is empty".into())),
            _ => Ok(Self::Custom(s.to_owned())),
        }
    }
}

/// Where the application should go next.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Route {
    /// The authentication flow (`/auth`).
    Auth,
    /// The protected application entry point (`/upload`).
    Upload,
    /// Full-page navigation to an external URL (the hosted sign-in page).
    External(Url),
}

impl Route {
    pub const AUTH_PATH: &'static str = "/auth";
    pub const UPLOAD_PATH: &'static str = "/upload";

    #[must_use]
    pub fn path(&self) -> &str {
        match self {
            Self::Auth => Self::AUTH_PATH,
            Self::Upload => Self::UPLOAD_PATH,
            Self::External(url) => url.as_str(),
        }
    }
}

/// A user-pool attribute, serialized the way the Cognito API expects it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct UserAttribute {
    pub name: String,
    pub value: String,
}

impl UserAttribute {
    #[must_use]
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn provider_names_match_hosted_ui() {
        assert_eq!(IdentityProvider::Google.to_string(), "Google");
        assert_eq!(IdentityProvider::Apple.to_string(), "SignInWithApple");
        assert_eq!(
            IdentityProvider::Custom("AcmeSaml".into()).to_string(),
            "AcmeSaml"
        );
    }

    #[test]
    fn provider_parses_case_insensitively() {
        assert_eq!(
            "GOOGLE".parse::<IdentityProvider>().unwrap(),
            IdentityProvider::Google
        );
        assert_eq!(
            "AcmeSaml".parse::<IdentityProvider>().unwrap(),
            IdentityProvider::Custom("AcmeSaml".into())
        );
        assert!("".parse::<IdentityProvider>().is_err());
    }

    #[test]
    fn attribute_serializes_pascal_case() {
        let attr = UserAttribute::new("custom:terms_version", "1.0");
        let json = serde_json::to_value(&attr).unwrap();
        assert_eq!(
            json,
            serde_json::json!({ "Name": "custom:terms_version", "Value": "1.0" })
        );
    }

    #[test]
    fn routes_have_fixed_paths() {
        assert_eq!(Route::Auth.path(), "/auth");
        assert_eq!(Route::Upload.path(), "/upload");
    }

    #[test]
    fn newtypes_prevent_mixing() {
        fn takes_user(_: &User) {}
        fn takes_session_id(_: &SessionId) {}

        let user = User::from("id".to_string());
        let session = SessionId::from("id".to_string());

        takes_user(&user);
        takes_session_id(&session);
        assert_eq!(user.username(), "id");
    }
}
