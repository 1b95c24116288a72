//! Middleware for the academy service.
//!
//! # Components
//!
//! - `auth` - Access assertion middleware for protected routes
//! - `http_metrics` - HTTP request metrics middleware

pub mod auth;
pub mod http_metrics;

pub use auth::{require_access, AccessState};
pub use http_metrics::http_metrics_middleware;
