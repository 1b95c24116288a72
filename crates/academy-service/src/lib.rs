//! Academy Service Library
//!
//! Members and courses REST backend that sits behind an access proxy.
//! Every protected request carries an RS256 access assertion which is
//! verified against the issuer's JWKS, cached in a shared key-value store.
//!
//! # Architecture
//!
//! ```text
//! routes/mod.rs -> middleware/auth.rs -> handlers/*.rs -> repositories/*.rs
//!                        |
//!                        v
//!                  auth/jwt.rs -> auth/jwks.rs -> common::kv
//! ```
//!
//! # Modules
//!
//! - `auth` - JWKS cache, JWT validation, claims and audience policy
//! - `config` - Service configuration from environment
//! - `errors` - Error types with HTTP status code mapping
//! - `handlers` - HTTP request handlers
//! - `middleware` - Access and metrics middleware
//! - `models` - Database rows and API bodies
//! - `observability` - Prometheus metrics
//! - `repositories` - SQLite access
//! - `routes` - Axum router setup

pub mod auth;
pub mod config;
pub mod errors;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod observability;
pub mod repositories;
pub mod routes;
