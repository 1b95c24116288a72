//! Access middleware for protected routes.
//!
//! Extracts the access assertion from the `Cf-Access-Jwt-Assertion` header
//! (falling back to `Authorization: Bearer`), validates it against the cached
//! JWKS, applies the audience policy, and injects the claims into request
//! extensions.

use crate::auth::{check_audience, AccessClaims, AuthError, JwtValidator};
use crate::errors::ApiError;
use crate::observability::metrics;
use axum::{
    extract::{Request, State},
    http::{header::AUTHORIZATION, HeaderMap},
    middleware::Next,
    response::Response,
};
use std::sync::Arc;
use std::time::Instant;
use tracing::instrument;

/// Header set by the access proxy on every forwarded request.
pub const ACCESS_ASSERTION_HEADER: &str = "cf-access-jwt-assertion";

/// State for the access middleware.
#[derive(Clone)]
pub struct AccessState {
    /// JWT validator with JWKS client.
    pub jwt_validator: Arc<JwtValidator>,

    /// Audience the first `aud` entry must equal.
    pub policy_aud: String,
}

/// Access middleware that validates the access assertion.
///
/// # Response
///
/// - 401 with WWW-Authenticate if the token is missing, malformed, expired,
///   signed by an unknown key, or fails signature verification
/// - 403 if the audience policy rejects the token
/// - 502/504 if the JWKS could not be fetched in time
/// - Otherwise continues with [`AccessClaims`] in request extensions
#[instrument(skip_all, name = "academy.middleware.auth")]
pub async fn require_access(
    State(state): State<Arc<AccessState>>,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let start = Instant::now();

    match authenticate(&state, req.headers()).await {
        Ok(claims) => {
            metrics::record_token_validation("success", None, start.elapsed());
            req.extensions_mut().insert(claims);
            Ok(next.run(req).await)
        }
        Err(err) => {
            metrics::record_token_validation("error", Some(err.error_type()), start.elapsed());
            if err.is_upstream() {
                tracing::warn!(target: "academy.middleware.auth", error = %err, "Access check failed upstream");
            } else {
                tracing::debug!(target: "academy.middleware.auth", error = %err, "Access denied");
            }
            Err(err.into())
        }
    }
}

async fn authenticate(state: &AccessState, headers: &HeaderMap) -> Result<AccessClaims, AuthError> {
    let token = extract_token(headers).ok_or(AuthError::MissingToken)?;

    let claims = state.jwt_validator.validate(token).await?;

    if !check_audience(&claims, &state.policy_aud) {
        return Err(AuthError::AudienceMismatch);
    }

    Ok(claims)
}

/// Pull the raw token out of the request headers.
fn extract_token(headers: &HeaderMap) -> Option<&str> {
    let assertion = headers
        .get(ACCESS_ASSERTION_HEADER)
        .and_then(|h| h.to_str().ok())
        .map(str::trim)
        .filter(|t| !t.is_empty());

    assertion.or_else(|| {
        headers
            .get(AUTHORIZATION)
            .and_then(|h| h.to_str().ok())
            .and_then(|h| h.strip_prefix("Bearer "))
            .map(str::trim)
            .filter(|t| !t.is_empty())
    })
}
