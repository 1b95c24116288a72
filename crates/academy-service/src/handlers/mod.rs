//! HTTP request handlers for the academy service.

pub mod courses;
pub mod health;
pub mod members;
pub mod metrics;

pub use courses::{create_course, delete_course, get_course, list_courses, update_course};
pub use health::{health_check, readiness_check};
pub use members::{
    create_member, delete_member, get_member, identify_member, list_members, update_member,
};
pub use metrics::metrics_handler;

use crate::errors::ApiError;

/// Require a non-blank string field, returning it trimmed.
pub(crate) fn required_field(value: Option<String>, field: &str) -> Result<String, ApiError> {
    match value.as_deref().map(str::trim) {
        Some(v) if !v.is_empty() => Ok(v.to_string()),
        _ => Err(ApiError::BadRequest(format!("Missing {field} value"))),
    }
}
