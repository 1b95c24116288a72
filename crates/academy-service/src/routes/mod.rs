//! HTTP routes for the academy service.
//!
//! Defines the Axum router and application state.

use crate::auth::{JwksClient, JwtValidator};
use crate::config::Config;
use crate::handlers;
use crate::middleware::{http_metrics_middleware, require_access, AccessState};
use axum::{
    middleware,
    routing::{get, post, put},
    Router,
};
use common::kv::KvStore;
use metrics_exporter_prometheus::PrometheusHandle;
use sqlx::SqlitePool;
use std::sync::Arc;
use std::time::Duration;
use tower_http::{timeout::TimeoutLayer, trace::TraceLayer};

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    /// Database connection pool.
    pub pool: SqlitePool,

    /// Service configuration.
    pub config: Config,

    /// Key-value store backing the JWKS cache.
    pub kv_store: Arc<dyn KvStore>,
}

/// Build the JWT validator for the configured JWKS URI.
///
/// One JWKS client is created per router so that cache refills for the URI
/// are single-flight.
pub fn build_jwt_validator(config: &Config, kv_store: Arc<dyn KvStore>) -> JwtValidator {
    let jwks_client = JwksClient::new(config.jwks_uri.clone(), kv_store)
        .with_cache_key(config.jwks_cache_key.clone())
        .with_ttl(config.jwks_cache_ttl)
        .with_fetch_timeout(config.jwks_fetch_timeout);

    JwtValidator::new(
        Arc::new(jwks_client),
        config.jwt_clock_skew_seconds,
        config.jwt_issuer.clone(),
    )
}

/// Build the application routes.
///
/// Creates an Axum router with:
/// - `/health` - Liveness check (simple "OK") - public
/// - `/ready` - Readiness check (checks DB + JWKS config) - public
/// - `/metrics` - Prometheus metrics endpoint - public
/// - `/api/v1/courses` (GET list, GET by guid) - public
/// - `/api/v1/courses` (POST, PUT, DELETE) - requires access
/// - `/api/v1/members/**` - requires access
/// - TraceLayer for request logging
/// - HTTP metrics middleware
/// - 30 second request timeout
///
/// Unsupported methods on any of these paths get 405 without a token check.
pub fn build_routes(state: Arc<AppState>, metrics_handle: PrometheusHandle) -> Router {
    let jwt_validator = Arc::new(build_jwt_validator(
        &state.config,
        Arc::clone(&state.kv_store),
    ));
    let access_state = Arc::new(AccessState {
        jwt_validator,
        policy_aud: state.config.policy_aud.clone(),
    });

    // Applied per method so unsupported methods still fall through to 405
    let access = middleware::from_fn_with_state(access_state, require_access);

    let api_routes = Router::new()
        .route("/health", get(handlers::health_check))
        .route("/ready", get(handlers::readiness_check))
        // Members (every method requires access)
        .route(
            "/api/v1/members",
            get(handlers::list_members)
                .post(handlers::create_member)
                .route_layer(access.clone()),
        )
        .route(
            "/api/v1/members/identify",
            post(handlers::identify_member).route_layer(access.clone()),
        )
        .route(
            "/api/v1/members/:guid",
            get(handlers::get_member)
                .put(handlers::update_member)
                .delete(handlers::delete_member)
                .route_layer(access.clone()),
        )
        // Courses (public reads, writes require access)
        .route(
            "/api/v1/courses",
            get(handlers::list_courses)
                .merge(post(handlers::create_course).route_layer(access.clone())),
        )
        .route(
            "/api/v1/courses/:guid",
            get(handlers::get_course).merge(
                put(handlers::update_course)
                    .delete(handlers::delete_course)
                    .route_layer(access),
            ),
        )
        .with_state(state);

    let metrics_routes = Router::new()
        .route("/metrics", get(handlers::metrics_handler))
        .with_state(metrics_handle);

    // Layer order (bottom-to-top execution):
    // 1. TimeoutLayer - Timeout the request (innermost)
    // 2. TraceLayer - Log request details
    // 3. http_metrics_middleware - Record ALL responses (outermost)
    api_routes
        .merge(metrics_routes)
        .layer(TraceLayer::new_for_http())
        .layer(TimeoutLayer::new(Duration::from_secs(30)))
        .layer(middleware::from_fn(http_metrics_middleware))
}
