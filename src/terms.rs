//! Terms-of-service gate over identity-token claims.

use crate::token::{IdTokenClaims, claim};
use crate::types::UserAttribute;

/// Terms version users must have accepted to use the application.
pub const CURRENT_TERMS_VERSION: &str = "1.0";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TermsDecision {
    Proceed,
    MustReaccept,
}

/// Decides whether a user may enter the application or must first accept
/// the current terms. Pure: no network, no mutation.
#[derive(Debug, Clone)]
pub struct TermsGate {
    current_version: String,
}

impl Default for TermsGate {
    fn default() -> Self {
        Self::new(CURRENT_TERMS_VERSION)
    }
}

impl TermsGate {
    #[must_use]
    pub fn new(current_version: impl Into<String>) -> Self {
        Self {
            current_version: current_version.into(),
        }
    }

    #[must_use]
    pub fn current_version(&self) -> &str {
        &self.current_version
    }

    /// `Proceed` only when the terms are accepted at exactly the current version.
    #[must_use]
    pub fn evaluate(&self, claims: &IdTokenClaims) -> TermsDecision {
        let current = claims.terms_version.as_deref() == Some(self.current_version.as_str());
        if claims.terms_accepted && current {
            TermsDecision::Proceed
        } else {
            TermsDecision::MustReaccept
        }
    }

    /// Attributes recording acceptance of the current version.
    #[must_use]
    pub fn acceptance_attributes(&self) -> Vec<UserAttribute> {
        vec![
            UserAttribute::new(claim::TERMS_ACCEPTED, "true"),
            UserAttribute::new(claim::TERMS_VERSION, self.current_version.clone()),
        ]
    }
}
