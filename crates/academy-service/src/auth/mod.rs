//! Authentication module for the Academy service.
//!
//! Verifies access assertions forwarded by the edge proxy (Cloudflare Access)
//! against the issuer's JWKS.
//!
//! # Components
//!
//! - `jwks` - JWKS client that reads through a shared key-value cache
//! - `jwt` - RS256 token verification using cached JWKS keys
//! - `claims` - Verified claims and the audience policy check
//! - `error` - Verifier failure taxonomy

pub mod claims;
pub mod error;
pub mod jwks;
pub mod jwt;

pub use claims::{check_audience, AccessClaims};
pub use error::AuthError;
pub use jwks::JwksClient;
pub use jwt::JwtValidator;
