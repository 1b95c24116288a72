//! Access assertion claims.
//!
//! Contains the claims extracted from verified tokens. The `sub` and `email`
//! fields are redacted in Debug output to prevent exposure in logs.

use common::jwt::deserialize_audience;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Claims carried by a verified access assertion.
///
/// Produced once per verification and never mutated.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessClaims {
    /// Subject (identity provider user id) - redacted in Debug output.
    pub sub: String,

    /// Audience list. A bare string in the token becomes a one-element list.
    #[serde(default, deserialize_with = "deserialize_audience")]
    pub aud: Vec<String>,

    /// Issuer (the Access team domain).
    #[serde(default)]
    pub iss: String,

    /// Expiration timestamp (Unix epoch seconds).
    pub exp: i64,

    /// Issued-at timestamp (Unix epoch seconds).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iat: Option<i64>,

    /// Authenticated email address - redacted in Debug output.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
}

impl fmt::Debug for AccessClaims {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AccessClaims")
            .field("sub", &"[REDACTED]")
            .field("aud", &self.aud)
            .field("iss", &self.iss)
            .field("exp", &self.exp)
            .field("iat", &self.iat)
            .field("email", &self.email.as_ref().map(|_| "[REDACTED]"))
            .finish()
    }
}

/// Apply the audience policy.
///
/// Passes only when the audience list is non-empty and its FIRST entry equals
/// `expected_audience`. Later entries are not consulted.
pub fn check_audience(claims: &AccessClaims, expected_audience: &str) -> bool {
    claims
        .aud
        .first()
        .is_some_and(|aud| aud == expected_audience)
}
