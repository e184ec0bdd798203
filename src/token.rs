use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value as JsonValue;

use crate::error::Error;

/// Claim names used by the user pool.
pub mod claim {
    pub const USERNAME: &str = "cognito:username";
    pub const TERMS_ACCEPTED: &str = "custom:terms_accepted";
    pub const TERMS_VERSION: &str = "custom:terms_version";
    pub const PLAN: &str = "custom:plan";
}

/// Tokens issued by the identity provider for one session.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenSet {
    pub id_token: String,
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
}

impl std::fmt::Debug for TokenSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenSet")
            .field("id_token", &"<redacted>")
            .field("access_token", &"<redacted>")
            .field("refresh_token", &self.refresh_token.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

/// Claims decoded from an identity token payload.
///
/// The signature is not checked: tokens only ever arrive straight from the
/// provider's token endpoint over TLS.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct IdTokenClaims {
    #[serde(default)]
    pub sub: Option<String>,
    #[serde(default, rename = "cognito:username")]
    pub cognito_username: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    /// The pool stores custom attributes as strings; `"true"` and `true` both count.
    #[serde(default, rename = "custom:terms_accepted", deserialize_with = "flag")]
    pub terms_accepted: bool,
    #[serde(default, rename = "custom:terms_version")]
    pub terms_version: Option<String>,
    #[serde(default, rename = "custom:plan")]
    pub plan: Option<String>,
    /// Expiry, unix seconds.
    #[serde(default)]
    pub exp: Option<i64>,
}

impl IdTokenClaims {
    /// `cognito:username`, falling back to `sub`.
    #[must_use]
    pub fn username(&self) -> Option<&str> {
        self.cognito_username.as_deref().or(self.sub.as_deref())
    }
}

fn flag<'de, D: Deserializer<'de>>(deserializer: D) -> Result<bool, D::Error> {
    Ok(match JsonValue::deserialize(deserializer)? {
        JsonValue::Bool(b) => b,
        JsonValue::String(s) => s == "true",
        _ => false,
    })
}

/// Decodes the payload segment of a JWT without verifying it.
///
/// # Errors
///
/// Returns [`Error::Decode`] if the token is not three dot-separated segments,
/// the payload is not base64url, or it is not a JSON object of claims.
pub fn decode_claims(token: &str) -> Result<IdTokenClaims, Error> {
    let payload = payload_json(token)?;
    serde_json::from_value(payload).map_err(|e| Error::Decode(e.to_string()))
}

/// Decodes the payload segment into raw JSON.
fn payload_json(token: &str) -> Result<JsonValue, Error> {
    let mut parts = token.split('.');
    let (Some(_header), Some(payload), Some(_signature), None) =
        (parts.next(), parts.next(), parts.next(), parts.next())
    else {
        return Err(Error::Decode("invalid token format".into()));
    };
    if payload.is_empty() {
        return Err(Error::Decode("empty payload".into()));
    }

    // Some encoders leave the padding in.
    let bytes = URL_SAFE_NO_PAD
        .decode(payload.trim_end_matches('='))
        .map_err(|_| Error::Decode("payload is not base64url".into()))?;

    let json: JsonValue =
        serde_json::from_slice(&bytes).map_err(|e| Error::Decode(e.to_string()))?;
    if !json.is_object() {
        return Err(Error::Decode("payload is not a JSON object".into()));
    }
    Ok(json)
}

/// Builds an unsigned JWT around `claims`.
#[cfg(test)]
pub(crate) fn unsigned_jwt(claims: &JsonValue) -> String {
    let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"none","typ":"JWT"}"#);
    let payload = URL_SAFE_NO_PAD.encode(claims.to_string());
    format!("{header}.{payload}.sig")
}
