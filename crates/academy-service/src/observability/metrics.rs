//! Metrics definitions for the academy service.
//!
//! All metrics follow Prometheus naming conventions:
//! - `academy_` prefix
//! - `_total` suffix for counters
//! - `_seconds` suffix for duration histograms
//!
//! # Cardinality
//!
//! Labels are bounded to prevent cardinality explosion:
//! - `method`: 7 values max (GET, POST, PATCH, DELETE, PUT, HEAD, OPTIONS)
//! - `endpoint`: parameterized paths, unknown paths collapse to `/other`
//! - `status`: a handful of outcome words per metric
//! - `operation`: bounded by repository code
//! - `error_type`: bounded by [`AuthError`](crate::auth::AuthError) variants

use metrics::{counter, histogram};
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder, PrometheusHandle};
use std::time::Duration;

/// Install the global Prometheus recorder with the service's buckets.
///
/// # Errors
///
/// Returns a description when bucket configuration or installation fails
/// (for example, when a recorder is already installed).
pub fn init_metrics_recorder() -> Result<PrometheusHandle, String> {
    PrometheusBuilder::new()
        .set_buckets_for_metric(
            Matcher::Prefix("academy_http_request".to_string()),
            &[
                0.005, 0.010, 0.025, 0.050, 0.100, 0.150, 0.200, 0.300, 0.500, 1.000, 2.000,
            ],
        )
        .map_err(|e| format!("Failed to set HTTP request buckets: {e}"))?
        .set_buckets_for_metric(
            Matcher::Prefix("academy_db_query".to_string()),
            &[
                0.001, 0.002, 0.005, 0.010, 0.020, 0.050, 0.100, 0.250, 0.500, 1.000,
            ],
        )
        .map_err(|e| format!("Failed to set DB query buckets: {e}"))?
        // JWKS fetches are bounded by the fetch deadline (default 5s)
        .set_buckets_for_metric(
            Matcher::Prefix("academy_jwks_fetch".to_string()),
            &[
                0.010, 0.025, 0.050, 0.100, 0.200, 0.500, 1.000, 2.000, 5.000,
            ],
        )
        .map_err(|e| format!("Failed to set JWKS fetch buckets: {e}"))?
        .set_buckets_for_metric(
            Matcher::Prefix("academy_token_validation".to_string()),
            &[0.001, 0.002, 0.005, 0.010, 0.025, 0.050, 0.100, 0.500, 1.000, 5.000],
        )
        .map_err(|e| format!("Failed to set token validation buckets: {e}"))?
        .install_recorder()
        .map_err(|e| format!("Failed to install Prometheus recorder: {e}"))
}

// ============================================================================
// HTTP Request Metrics
// ============================================================================

/// Record HTTP request completion
///
/// Metric: `academy_http_requests_total`, `academy_http_request_duration_seconds`
/// Labels: `method`, `endpoint`, `status`
///
/// Captures ALL HTTP responses including framework-level errors (415, 400
/// JSON rejections, 404, 405).
pub fn record_http_request(method: &str, endpoint: &str, status_code: u16, duration: Duration) {
    let normalized_endpoint = normalize_endpoint(endpoint);
    let status = categorize_status_code(status_code);

    histogram!("academy_http_request_duration_seconds",
        "method" => method.to_string(),
        "endpoint" => normalized_endpoint.clone(),
        "status" => status.to_string()
    )
    .record(duration.as_secs_f64());

    counter!("academy_http_requests_total",
        "method" => method.to_string(),
        "endpoint" => normalized_endpoint,
        "status_code" => status_code.to_string()
    )
    .increment(1);
}

/// Categorize HTTP status code into success/error/timeout
fn categorize_status_code(status_code: u16) -> &'static str {
    match status_code {
        200..=299 => "success",
        408 | 504 => "timeout",
        _ => "error",
    }
}

/// Normalize endpoint path to prevent label cardinality explosion
///
/// Replaces member and course guids with a placeholder.
fn normalize_endpoint(path: &str) -> String {
    match path {
        "/health" | "/ready" | "/metrics" | "/api/v1/members" | "/api/v1/members/identify"
        | "/api/v1/courses" => path.to_string(),
        _ => normalize_dynamic_endpoint(path),
    }
}

/// Normalize paths with a trailing guid segment.
fn normalize_dynamic_endpoint(path: &str) -> String {
    for collection in ["/api/v1/members/", "/api/v1/courses/"] {
        if let Some(rest) = path.strip_prefix(collection) {
            if !rest.is_empty() && !rest.contains('/') {
                return format!("{collection}{{guid}}");
            }
        }
    }

    // Unknown paths normalized to "/other" to bound cardinality
    "/other".to_string()
}

// ============================================================================
// Authentication Metrics
// ============================================================================

/// Record the outcome of a JWKS cache lookup
///
/// Metric: `academy_jwks_cache_total`
/// Labels: `result` (hit, miss, stale, error)
pub fn record_jwks_cache(result: &str) {
    counter!("academy_jwks_cache_total",
        "result" => result.to_string()
    )
    .increment(1);
}

/// Record an upstream JWKS fetch
///
/// Metric: `academy_jwks_fetch_total`, `academy_jwks_fetch_duration_seconds`
/// Labels: `status` (success, error, timeout)
pub fn record_jwks_fetch(status: &str, duration: Duration) {
    histogram!("academy_jwks_fetch_duration_seconds",
        "status" => status.to_string()
    )
    .record(duration.as_secs_f64());

    counter!("academy_jwks_fetch_total",
        "status" => status.to_string()
    )
    .increment(1);
}

/// Record a token validation attempt
///
/// Metric: `academy_token_validations_total`, `academy_token_validation_duration_seconds`
/// Labels: `status` (success, error), `error_type`
pub fn record_token_validation(status: &str, error_type: Option<&str>, duration: Duration) {
    histogram!("academy_token_validation_duration_seconds",
        "status" => status.to_string()
    )
    .record(duration.as_secs_f64());

    counter!("academy_token_validations_total",
        "status" => status.to_string(),
        "error_type" => error_type.unwrap_or("none").to_string()
    )
    .increment(1);
}

// ============================================================================
// Database Metrics
// ============================================================================

/// Record database query execution
///
/// Metric: `academy_db_query_duration_seconds`, `academy_db_queries_total`
/// Labels: `operation`, `status`
pub fn record_db_query(operation: &str, status: &str, duration: Duration) {
    histogram!("academy_db_query_duration_seconds",
        "operation" => operation.to_string()
    )
    .record(duration.as_secs_f64());

    counter!("academy_db_queries_total",
        "operation" => operation.to_string(),
        "status" => status.to_string()
    )
    .increment(1);
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use metrics_util::debugging::{DebugValue, DebuggingRecorder};

    fn counter_value(
        snapshot: &[(
            metrics_util::CompositeKey,
            Option<metrics::Unit>,
            Option<metrics::SharedString>,
            DebugValue,
        )],
        name: &str,
        label: (&str, &str),
    ) -> u64 {
        snapshot
            .iter()
            .filter(|(key, _, _, _)| key.key().name() == name)
            .filter(|(key, _, _, _)| {
                key.key()
                    .labels()
                    .any(|l| l.key() == label.0 && l.value() == label.1)
            })
            .map(|(_, _, _, value)| match value {
                DebugValue::Counter(count) => *count,
                _ => 0,
            })
            .sum()
    }

    #[test]
    fn test_record_http_request() {
        record_http_request("GET", "/health", 200, Duration::from_millis(5));
        record_http_request("GET", "/api/v1/members", 200, Duration::from_millis(50));
        record_http_request("POST", "/api/v1/members", 201, Duration::from_millis(20));
        record_http_request("GET", "/api/v1/courses/abc", 404, Duration::from_millis(5));
        record_http_request("GET", "/api/v1/members", 504, Duration::from_secs(30));
    }

    #[test]
    fn test_categorize_status_code() {
        assert_eq!(categorize_status_code(200), "success");
        assert_eq!(categorize_status_code(201), "success");
        assert_eq!(categorize_status_code(204), "success");

        assert_eq!(categorize_status_code(408), "timeout");
        assert_eq!(categorize_status_code(504), "timeout");

        assert_eq!(categorize_status_code(400), "error");
        assert_eq!(categorize_status_code(401), "error");
        assert_eq!(categorize_status_code(403), "error");
        assert_eq!(categorize_status_code(409), "error");
        assert_eq!(categorize_status_code(502), "error");
    }

    #[test]
    fn test_normalize_endpoint_known_paths() {
        assert_eq!(normalize_endpoint("/health"), "/health");
        assert_eq!(normalize_endpoint("/ready"), "/ready");
        assert_eq!(normalize_endpoint("/metrics"), "/metrics");
        assert_eq!(normalize_endpoint("/api/v1/members"), "/api/v1/members");
        assert_eq!(
            normalize_endpoint("/api/v1/members/identify"),
            "/api/v1/members/identify"
        );
        assert_eq!(normalize_endpoint("/api/v1/courses"), "/api/v1/courses");
    }

    #[test]
    fn test_normalize_endpoint_guid_paths() {
        assert_eq!(
            normalize_endpoint("/api/v1/members/550e8400-e29b-41d4-a716-446655440000"),
            "/api/v1/members/{guid}"
        );
        assert_eq!(
            normalize_endpoint("/api/v1/courses/intro-to-rust"),
            "/api/v1/courses/{guid}"
        );
    }

    #[test]
    fn test_normalize_endpoint_unknown_paths() {
        assert_eq!(normalize_endpoint("/"), "/other");
        assert_eq!(normalize_endpoint("/unknown"), "/other");
        assert_eq!(normalize_endpoint("/api/v1/members/"), "/other");
        assert_eq!(normalize_endpoint("/api/v1/members/a/b"), "/other");
        assert_eq!(normalize_endpoint("/api/v2/courses/x"), "/other");
    }

    #[test]
    fn test_auth_metrics_are_counted() {
        let recorder = DebuggingRecorder::new();
        let snapshotter = recorder.snapshotter();

        metrics::with_local_recorder(&recorder, || {
            record_jwks_cache("miss");
            record_jwks_cache("hit");
            record_jwks_cache("hit");
            record_jwks_fetch("success", Duration::from_millis(40));
            record_token_validation("success", None, Duration::from_millis(2));
            record_token_validation("error", Some("token_expired"), Duration::from_millis(1));
        });

        let snapshot = snapshotter.snapshot().into_vec();
        assert_eq!(counter_value(&snapshot, "academy_jwks_cache_total", ("result", "hit")), 2);
        assert_eq!(counter_value(&snapshot, "academy_jwks_cache_total", ("result", "miss")), 1);
        assert_eq!(
            counter_value(&snapshot, "academy_jwks_fetch_total", ("status", "success")),
            1
        );
        assert_eq!(
            counter_value(
                &snapshot,
                "academy_token_validations_total",
                ("error_type", "token_expired")
            ),
            1
        );
        assert_eq!(
            counter_value(&snapshot, "academy_token_validations_total", ("error_type", "none")),
            1
        );
    }

    #[test]
    fn test_record_db_query() {
        let recorder = DebuggingRecorder::new();
        let snapshotter = recorder.snapshotter();

        metrics::with_local_recorder(&recorder, || {
            record_db_query("list_members", "success", Duration::from_millis(5));
            record_db_query("create_member", "error", Duration::from_millis(3));
        });

        let snapshot = snapshotter.snapshot().into_vec();
        assert_eq!(
            counter_value(&snapshot, "academy_db_queries_total", ("operation", "list_members")),
            1
        );
        assert_eq!(
            counter_value(&snapshot, "academy_db_queries_total", ("status", "error")),
            1
        );
    }
}
