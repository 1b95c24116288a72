//! Verifier failure taxonomy.
//!
//! Failures split into two classes: the caller presented a bad token
//! ([`AuthError::is_upstream`] is false), or the key issuer could not be
//! consulted. Callers map the classes to different HTTP status codes.

use thiserror::Error;

/// Reasons a token could not be accepted.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum AuthError {
    /// No token was presented.
    #[error("missing access token")]
    MissingToken,

    /// Token is oversized or not a parseable JWT.
    #[error("malformed access token")]
    MalformedToken,

    /// No key in the JWKS matches the token's key identifier.
    #[error("signing key not found")]
    KeyNotFound,

    /// Signature does not verify, or the token is otherwise untrusted.
    #[error("token signature invalid")]
    SignatureInvalid,

    /// Token is past its expiry, or issued too far in the future.
    #[error("token expired")]
    TokenExpired,

    /// Token audience does not match the configured policy.
    #[error("audience mismatch")]
    AudienceMismatch,

    /// JWKS could not be fetched or parsed.
    #[error("JWKS fetch failed: {0}")]
    FetchError(String),

    /// JWKS fetch exceeded its deadline.
    #[error("JWKS fetch timed out")]
    FetchTimeout,
}

impl AuthError {
    /// Whether the failure was caused by the key issuer rather than the token.
    pub fn is_upstream(&self) -> bool {
        matches!(self, AuthError::FetchError(_) | AuthError::FetchTimeout)
    }

    /// Bounded label for metrics.
    pub fn error_type(&self) -> &'static str {
        match self {
            AuthError::MissingToken => "missing_token",
            AuthError::MalformedToken => "malformed_token",
            AuthError::KeyNotFound => "key_not_found",
            AuthError::SignatureInvalid => "signature_invalid",
            AuthError::TokenExpired => "token_expired",
            AuthError::AudienceMismatch => "audience_mismatch",
            AuthError::FetchError(_) => "fetch_error",
            AuthError::FetchTimeout => "fetch_timeout",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_upstream_classification() {
        assert!(AuthError::FetchError("boom".to_string()).is_upstream());
        assert!(AuthError::FetchTimeout.is_upstream());

        assert!(!AuthError::MissingToken.is_upstream());
        assert!(!AuthError::KeyNotFound.is_upstream());
        assert!(!AuthError::SignatureInvalid.is_upstream());
        assert!(!AuthError::TokenExpired.is_upstream());
        assert!(!AuthError::AudienceMismatch.is_upstream());
    }

    #[test]
    fn test_error_type_labels_are_distinct() {
        let labels = [
            AuthError::MissingToken.error_type(),
            AuthError::MalformedToken.error_type(),
            AuthError::KeyNotFound.error_type(),
            AuthError::SignatureInvalid.error_type(),
            AuthError::TokenExpired.error_type(),
            AuthError::AudienceMismatch.error_type(),
            AuthError::FetchError(String::new()).error_type(),
            AuthError::FetchTimeout.error_type(),
        ];
        let unique: std::collections::HashSet<_> = labels.iter().collect();
        assert_eq!(unique.len(), labels.len());
    }
}
