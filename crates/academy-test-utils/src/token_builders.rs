//! Builder patterns for test token construction
//!
//! Provides a fluent API for creating signed access assertions.

use crate::crypto_fixtures::TestRsaKey;
use chrono::{Duration, Utc};
use serde_json::json;

/// Audience the test server is configured to expect.
pub const TEST_POLICY_AUD: &str = "expected-aud";

/// Issuer placed in test tokens.
pub const TEST_ISSUER: &str = "https://academy-test.cloudflareaccess.com";

/// Builder for creating signed access assertions.
///
/// # Example
/// ```rust,ignore
/// let token = AccessTokenBuilder::new()
///     .for_subject("member-guid")
///     .with_email("alice@example.com")
///     .expires_in(3600)
///     .sign(&TestRsaKey::primary());
/// ```
pub struct AccessTokenBuilder {
    sub: String,
    aud: Vec<String>,
    iss: String,
    email: Option<String>,
    exp: i64,
    iat: i64,
}

impl AccessTokenBuilder {
    /// Create a new token builder with defaults: valid for an hour, audience
    /// [`TEST_POLICY_AUD`].
    pub fn new() -> Self {
        let now = Utc::now();
        Self {
            sub: "test-subject".to_string(),
            aud: vec![TEST_POLICY_AUD.to_string()],
            iss: TEST_ISSUER.to_string(),
            email: Some("test@example.com".to_string()),
            exp: (now + Duration::seconds(3600)).timestamp(),
            iat: now.timestamp(),
        }
    }

    /// Set the subject.
    pub fn for_subject(mut self, subject: &str) -> Self {
        self.sub = subject.to_string();
        self
    }

    /// Replace the audience list.
    pub fn with_audience(mut self, audience: &[&str]) -> Self {
        self.aud = audience.iter().map(|aud| aud.to_string()).collect();
        self
    }

    /// Set the issuer.
    pub fn with_issuer(mut self, issuer: &str) -> Self {
        self.iss = issuer.to_string();
        self
    }

    /// Set the email claim.
    pub fn with_email(mut self, email: &str) -> Self {
        self.email = Some(email.to_string());
        self
    }

    /// Set expiration in seconds from now (negative for an expired token).
    pub fn expires_in(mut self, seconds: i64) -> Self {
        self.exp = (Utc::now() + Duration::seconds(seconds)).timestamp();
        self
    }

    /// Set issued-at timestamp.
    pub fn issued_at(mut self, timestamp: i64) -> Self {
        self.iat = timestamp;
        self
    }

    /// Build the claims as a JSON value.
    pub fn build(&self) -> serde_json::Value {
        let mut claims = json!({
            "sub": self.sub,
            "aud": self.aud,
            "iss": self.iss,
            "exp": self.exp,
            "iat": self.iat,
            "type": "app",
        });
        if let Some(email) = &self.email {
            claims["email"] = json!(email);
        }
        claims
    }

    /// Sign the claims with the given key.
    pub fn sign(&self, key: &TestRsaKey) -> String {
        key.sign(&self.build())
    }
}

impl Default for AccessTokenBuilder {
    fn default() -> Self {
        Self::new()
    }
}
