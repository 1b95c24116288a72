//! Access assertion validation.
//!
//! Validates incoming RS256 JWTs using public keys from the issuer's JWKS.
//!
//! # Security
//!
//! - Tokens are size-checked BEFORE parsing (DoS prevention)
//! - Only RS256 is accepted
//! - Expiration is enforced strictly, issued-at with clock skew tolerance
//! - The audience policy is applied by the caller via [`check_audience`]
//!
//! [`check_audience`]: crate::auth::check_audience

use crate::auth::claims::AccessClaims;
use crate::auth::jwks::{Jwk, JwksClient};
use crate::auth::AuthError;
use common::jwt::{extract_header, validate_iat};
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use std::sync::Arc;
use std::time::Duration;
use tracing::instrument;

/// JWT validator backed by a cached JWKS.
pub struct JwtValidator {
    /// JWKS client for fetching public keys.
    jwks_client: Arc<JwksClient>,

    /// Clock skew tolerance for iat validation.
    clock_skew: Duration,

    /// Required issuer, when pinned.
    issuer: Option<String>,
}

impl JwtValidator {
    /// Create a new JWT validator.
    ///
    /// # Arguments
    ///
    /// * `jwks_client` - Client for fetching public keys
    /// * `clock_skew_seconds` - Clock skew tolerance for iat validation
    /// * `issuer` - Expected `iss` claim, if any
    pub fn new(jwks_client: Arc<JwksClient>, clock_skew_seconds: i64, issuer: Option<String>) -> Self {
        Self {
            jwks_client,
            clock_skew: Duration::from_secs(clock_skew_seconds.unsigned_abs()),
            issuer,
        }
    }

    /// Validate a JWT and return the claims.
    ///
    /// # Checks
    ///
    /// 1. Size check - reject tokens > 8KB before parsing
    /// 2. Extract kid (and alg) from the header
    /// 3. Look up the public key in the cached JWKS
    /// 4. Verify RS256 signature
    /// 5. Validate exp (strict) and iss (when pinned)
    /// 6. Validate iat with clock skew tolerance
    ///
    /// # Errors
    ///
    /// One of the [`AuthError`] variants; see the module docs of
    /// [`crate::auth::error`] for how they split.
    #[instrument(skip_all)]
    pub async fn validate(&self, token: &str) -> Result<AccessClaims, AuthError> {
        // 1-2. Parse header (includes size check via common::jwt)
        let header = extract_header(token).map_err(|e| {
            tracing::debug!(target: "academy.auth.jwt", error = ?e, "Token header extraction failed");
            AuthError::MalformedToken
        })?;

        if let Some(alg) = header.alg.as_deref() {
            if alg != "RS256" {
                tracing::debug!(target: "academy.auth.jwt", alg = %alg, "Token uses unsupported algorithm");
                return Err(AuthError::SignatureInvalid);
            }
        }

        // 3. Fetch public key from JWKS
        let jwk = self.jwks_client.get_key(&header.kid).await?;

        // 4-5. Verify signature and extract claims
        let claims = verify_token(token, &jwk, self.issuer.as_deref())?;

        // 6. Validate iat claim with clock skew tolerance
        if let Some(iat) = claims.iat {
            if let Err(e) = validate_iat(iat, self.clock_skew) {
                tracing::debug!(target: "academy.auth.jwt", error = ?e, "Token iat validation failed");
                return Err(AuthError::TokenExpired);
            }
        }

        tracing::debug!(target: "academy.auth.jwt", "Token validated successfully");
        Ok(claims)
    }
}

/// Build an RS256 decoding key from a JWK.
///
/// Keys that are not RSA signing keys are treated as absent.
fn decoding_key(jwk: &Jwk) -> Result<DecodingKey, AuthError> {
    if jwk.kty != "RSA" {
        tracing::warn!(target: "academy.auth.jwt", kty = %jwk.kty, "Unexpected JWK key type");
        return Err(AuthError::KeyNotFound);
    }
    if let Some(alg) = &jwk.alg {
        if alg != "RS256" {
            tracing::warn!(target: "academy.auth.jwt", alg = %alg, "Unexpected JWK algorithm");
            return Err(AuthError::KeyNotFound);
        }
    }
    if let Some(key_use) = &jwk.key_use {
        if key_use != "sig" {
            tracing::warn!(target: "academy.auth.jwt", key_use = %key_use, "JWK is not a signing key");
            return Err(AuthError::KeyNotFound);
        }
    }

    let (Some(n), Some(e)) = (jwk.n.as_deref(), jwk.e.as_deref()) else {
        tracing::error!(target: "academy.auth.jwt", kid = %jwk.kid, "JWK missing n or e");
        return Err(AuthError::KeyNotFound);
    };

    DecodingKey::from_rsa_components(n, e).map_err(|e| {
        tracing::error!(target: "academy.auth.jwt", error = %e, "Invalid RSA key components");
        AuthError::KeyNotFound
    })
}

/// Verify JWT signature and extract claims.
fn verify_token(token: &str, jwk: &Jwk, issuer: Option<&str>) -> Result<AccessClaims, AuthError> {
    let decoding_key = decoding_key(jwk)?;

    let mut validation = Validation::new(Algorithm::RS256);
    validation.validate_exp = true;
    validation.leeway = 0;
    // Audience is checked by the caller against the first entry only
    validation.validate_aud = false;
    if let Some(issuer) = issuer {
        validation.set_issuer(&[issuer]);
    }

    let token_data = decode::<AccessClaims>(token, &decoding_key, &validation).map_err(|e| {
        tracing::debug!(target: "academy.auth.jwt", error = %e, "Token verification failed");
        map_decode_error(e.kind())
    })?;

    Ok(token_data.claims)
}

fn map_decode_error(kind: &ErrorKind) -> AuthError {
    match kind {
        ErrorKind::ExpiredSignature | ErrorKind::ImmatureSignature => AuthError::TokenExpired,
        ErrorKind::MissingRequiredClaim(claim) if claim == "iss" => AuthError::SignatureInvalid,
        ErrorKind::InvalidToken
        | ErrorKind::Base64(_)
        | ErrorKind::Json(_)
        | ErrorKind::Utf8(_)
        | ErrorKind::MissingRequiredClaim(_) => AuthError::MalformedToken,
        _ => AuthError::SignatureInvalid,
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::indexing_slicing)]
mod tests {
    use super::*;
    use crate::auth::check_audience;
    use academy_test_utils::{jwks_json, AccessTokenBuilder, TestRsaKey, TEST_ISSUER};
    use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
    use common::kv::MemoryKvStore;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const JWKS_PATH: &str = "/cdn-cgi/access/certs";

    async fn validator_for(
        keys: &[&TestRsaKey],
        expected_fetches: u64,
        issuer: Option<&str>,
    ) -> (MockServer, JwtValidator) {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(JWKS_PATH))
            .respond_with(ResponseTemplate::new(200).set_body_json(jwks_json(keys)))
            .expect(expected_fetches)
            .mount(&server)
            .await;

        let jwks_client = Arc::new(JwksClient::new(
            format!("{}{}", server.uri(), JWKS_PATH),
            Arc::new(MemoryKvStore::new()),
        ));
        let validator = JwtValidator::new(jwks_client, 300, issuer.map(str::to_string));
        (server, validator)
    }

    fn rsa_jwk(key: &TestRsaKey) -> Jwk {
        serde_json::from_value(key.jwk()).unwrap()
    }

    // =========================================================================
    // End-to-end validation
    // =========================================================================

    #[tokio::test]
    async fn test_valid_token_yields_subject_and_email() {
        let key = TestRsaKey::primary();
        let (_server, validator) = validator_for(&[&key], 1, None).await;

        let token = AccessTokenBuilder::new()
            .for_subject("member-guid-1")
            .with_email("alice@example.com")
            .sign(&key);

        let claims = validator.validate(&token).await.unwrap();
        assert_eq!(claims.sub, "member-guid-1");
        assert_eq!(claims.email.as_deref(), Some("alice@example.com"));
        assert!(check_audience(&claims, "expected-aud"));
    }

    #[tokio::test]
    async fn test_unknown_kid_is_key_not_found() {
        let (_server, validator) = validator_for(&[&TestRsaKey::primary()], 1, None).await;

        let token =
            AccessTokenBuilder::new().sign(&TestRsaKey::primary().with_kid("not-in-jwks"));

        assert_eq!(validator.validate(&token).await, Err(AuthError::KeyNotFound));
    }

    #[tokio::test]
    async fn test_expired_token_is_token_expired() {
        let key = TestRsaKey::primary();
        let (_server, validator) = validator_for(&[&key], 1, None).await;

        let token = AccessTokenBuilder::new()
            .expires_in(-3600)
            .issued_at(chrono::Utc::now().timestamp() - 7200)
            .sign(&key);

        assert_eq!(validator.validate(&token).await, Err(AuthError::TokenExpired));
    }

    #[tokio::test]
    async fn test_token_expired_one_second_ago_is_rejected() {
        let key = TestRsaKey::primary();
        let (_server, validator) = validator_for(&[&key], 1, None).await;

        let token = AccessTokenBuilder::new()
            .expires_in(-1)
            .issued_at(chrono::Utc::now().timestamp() - 60)
            .sign(&key);

        assert_eq!(validator.validate(&token).await, Err(AuthError::TokenExpired));
    }

    #[tokio::test]
    async fn test_wrong_audience_verifies_but_fails_policy() {
        let key = TestRsaKey::primary();
        let (_server, validator) = validator_for(&[&key], 1, None).await;

        let token = AccessTokenBuilder::new()
            .with_audience(&["other-aud"])
            .sign(&key);

        let claims = validator.validate(&token).await.unwrap();
        assert!(!check_audience(&claims, "expected-aud"));
    }

    #[tokio::test]
    async fn test_warm_cache_fetches_jwks_once() {
        let key = TestRsaKey::primary();
        let (_server, validator) = validator_for(&[&key], 1, None).await;

        for i in 0..5 {
            let token = AccessTokenBuilder::new()
                .for_subject(&format!("member-{i}"))
                .sign(&key);
            assert!(validator.validate(&token).await.is_ok());
        }
    }

    #[tokio::test]
    async fn test_token_signed_by_second_key_verifies() {
        let primary = TestRsaKey::primary();
        let secondary = TestRsaKey::secondary();
        let (_server, validator) = validator_for(&[&primary, &secondary], 1, None).await;

        let token = AccessTokenBuilder::new()
            .for_subject("rotated-user")
            .sign(&secondary);

        let claims = validator.validate(&token).await.unwrap();
        assert_eq!(claims.sub, "rotated-user");
    }

    #[tokio::test]
    async fn test_signature_from_other_key_is_signature_invalid() {
        let (_server, validator) = validator_for(&[&TestRsaKey::primary()], 1, None).await;

        // Secondary key material published under the primary kid
        let impostor = TestRsaKey::secondary().with_kid("test-key-primary");
        let token = AccessTokenBuilder::new().sign(&impostor);

        assert_eq!(
            validator.validate(&token).await,
            Err(AuthError::SignatureInvalid)
        );
    }

    #[tokio::test]
    async fn test_tampered_payload_is_signature_invalid() {
        let key = TestRsaKey::primary();
        let (_server, validator) = validator_for(&[&key], 1, None).await;

        let token = AccessTokenBuilder::new().for_subject("alice").sign(&key);
        let parts: Vec<&str> = token.split('.').collect();
        let forged_payload = URL_SAFE_NO_PAD.encode(
            AccessTokenBuilder::new()
                .for_subject("mallory")
                .build()
                .to_string(),
        );
        let forged = format!("{}.{}.{}", parts[0], forged_payload, parts[2]);

        assert_eq!(
            validator.validate(&forged).await,
            Err(AuthError::SignatureInvalid)
        );
    }

    #[tokio::test]
    async fn test_iat_far_in_future_is_rejected() {
        let key = TestRsaKey::primary();
        let (_server, validator) = validator_for(&[&key], 1, None).await;

        let token = AccessTokenBuilder::new()
            .issued_at(chrono::Utc::now().timestamp() + 3600)
            .sign(&key);

        assert_eq!(validator.validate(&token).await, Err(AuthError::TokenExpired));
    }

    #[tokio::test]
    async fn test_pinned_issuer_accepts_match_and_rejects_other() {
        let key = TestRsaKey::primary();
        let (_server, validator) = validator_for(&[&key], 1, Some(TEST_ISSUER)).await;

        let good = AccessTokenBuilder::new().sign(&key);
        assert!(validator.validate(&good).await.is_ok());

        let bad = AccessTokenBuilder::new()
            .with_issuer("https://evil.example.com")
            .sign(&key);
        assert_eq!(validator.validate(&bad).await, Err(AuthError::SignatureInvalid));
    }

    #[tokio::test]
    async fn test_malformed_token_rejected_before_fetch() {
        let (_server, validator) = validator_for(&[&TestRsaKey::primary()], 0, None).await;

        assert_eq!(
            validator.validate("not-a-jwt").await,
            Err(AuthError::MalformedToken)
        );
        assert_eq!(
            validator.validate(&"a".repeat(10_000)).await,
            Err(AuthError::MalformedToken)
        );
    }

    #[tokio::test]
    async fn test_non_rs256_header_rejected_before_fetch() {
        let (_server, validator) = validator_for(&[&TestRsaKey::primary()], 0, None).await;

        let header = URL_SAFE_NO_PAD.encode(r#"{"alg":"HS256","typ":"JWT","kid":"test-key-primary"}"#);
        let payload = URL_SAFE_NO_PAD.encode(r#"{"sub":"x","exp":9999999999}"#);
        let token = format!("{header}.{payload}.c2lnbmF0dXJl");

        assert_eq!(
            validator.validate(&token).await,
            Err(AuthError::SignatureInvalid)
        );
    }

    // =========================================================================
    // JWK suitability
    // =========================================================================

    #[test]
    fn test_decoding_key_accepts_rsa_signing_key() {
        assert!(decoding_key(&rsa_jwk(&TestRsaKey::primary())).is_ok());
    }

    #[test]
    fn test_decoding_key_rejects_non_rsa_key_type() {
        let mut jwk = rsa_jwk(&TestRsaKey::primary());
        jwk.kty = "OKP".to_string();

        assert_eq!(decoding_key(&jwk).err(), Some(AuthError::KeyNotFound));
    }

    #[test]
    fn test_decoding_key_rejects_other_algorithm() {
        let mut jwk = rsa_jwk(&TestRsaKey::primary());
        jwk.alg = Some("RS512".to_string());

        assert_eq!(decoding_key(&jwk).err(), Some(AuthError::KeyNotFound));
    }

    #[test]
    fn test_decoding_key_rejects_encryption_key() {
        let mut jwk = rsa_jwk(&TestRsaKey::primary());
        jwk.key_use = Some("enc".to_string());

        assert_eq!(decoding_key(&jwk).err(), Some(AuthError::KeyNotFound));
    }

    #[test]
    fn test_decoding_key_rejects_missing_components() {
        let mut jwk = rsa_jwk(&TestRsaKey::primary());
        jwk.n = None;

        assert_eq!(decoding_key(&jwk).err(), Some(AuthError::KeyNotFound));
    }

    #[test]
    fn test_decoding_key_allows_missing_optional_fields() {
        let mut jwk = rsa_jwk(&TestRsaKey::primary());
        jwk.alg = None;
        jwk.key_use = None;

        assert!(decoding_key(&jwk).is_ok());
    }

    #[test]
    fn test_map_decode_error() {
        assert_eq!(
            map_decode_error(&ErrorKind::ExpiredSignature),
            AuthError::TokenExpired
        );
        assert_eq!(
            map_decode_error(&ErrorKind::InvalidSignature),
            AuthError::SignatureInvalid
        );
        assert_eq!(
            map_decode_error(&ErrorKind::InvalidIssuer),
            AuthError::SignatureInvalid
        );
        assert_eq!(
            map_decode_error(&ErrorKind::MissingRequiredClaim("iss".to_string())),
            AuthError::SignatureInvalid
        );
        assert_eq!(
            map_decode_error(&ErrorKind::MissingRequiredClaim("exp".to_string())),
            AuthError::MalformedToken
        );
        assert_eq!(
            map_decode_error(&ErrorKind::InvalidToken),
            AuthError::MalformedToken
        );
    }
}
