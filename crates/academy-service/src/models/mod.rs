//! Academy models.
//!
//! Database rows and the request/response bodies of the HTTP API.
//! Timestamps are Unix epoch milliseconds throughout.

use serde::{Deserialize, Serialize};

/// Role assigned to every newly created member.
pub const ROLE_PENDING: &str = "PENDING";

// ============================================================================
// Members
// ============================================================================

/// Row of the `members` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct MemberRow {
    pub id: i64,
    pub name: String,
    pub email: String,
    pub role: String,
    pub guid: String,
    pub created: i64,
    pub modified: i64,
    pub deleted: Option<i64>,
}

/// Public view of a member.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemberResponse {
    pub name: String,
    pub email: String,
    pub role: String,
    pub guid: String,
}

impl From<MemberRow> for MemberResponse {
    fn from(row: MemberRow) -> Self {
        Self {
            name: row.name,
            email: row.email,
            role: row.role,
            guid: row.guid,
        }
    }
}

/// Body of `POST /api/v1/members`.
///
/// Fields are optional so that a missing value surfaces as a 400 with a
/// field-specific message rather than a generic JSON rejection.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CreateMemberRequest {
    pub name: Option<String>,
    pub email: Option<String>,

    /// Caller-chosen guid (normally the identity provider's subject id).
    pub guid: Option<String>,
}

/// Body of `PUT /api/v1/members/:guid`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateMemberRequest {
    pub name: Option<String>,
    pub email: Option<String>,
    pub role: Option<String>,
}

/// Response of `POST /api/v1/members/identify`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdentifyResponse {
    pub name: String,
    pub role: String,
    pub email: String,

    /// The token subject the member was matched on.
    pub refid: String,
}

// ============================================================================
// Courses
// ============================================================================

/// Row of the `courses` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct CourseRow {
    pub id: i64,
    pub guid: String,
    pub title: String,
    pub description: String,
    pub category: String,
    pub url: Option<String>,
    pub published: Option<i64>,
    pub created: i64,
    pub modified: i64,
}

/// Public view of a course.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CourseResponse {
    pub guid: String,
    pub title: String,
    pub description: String,
    pub category: String,
    pub url: Option<String>,

    /// Publication time; absent for drafts.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub published: Option<i64>,
}

impl From<CourseRow> for CourseResponse {
    fn from(row: CourseRow) -> Self {
        Self {
            guid: row.guid,
            title: row.title,
            description: row.description,
            category: row.category,
            url: row.url,
            published: row.published,
        }
    }
}

/// Body of `POST /api/v1/courses` and `PUT /api/v1/courses/:guid`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CourseRequest {
    pub title: Option<String>,
    pub description: Option<String>,
    pub category: Option<String>,
    pub url: Option<String>,
    pub published: Option<i64>,
}

/// Validated course fields ready for persistence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CourseFields {
    pub title: String,
    pub description: String,
    pub category: String,
    pub url: Option<String>,
    pub published: Option<i64>,
}

// ============================================================================
// Operational
// ============================================================================

/// Readiness check response.
#[derive(Debug, Clone, Serialize)]
pub struct ReadinessResponse {
    /// "ready" or "not_ready".
    pub status: &'static str,

    /// Database status ("healthy" or "unhealthy").
    #[serde(skip_serializing_if = "Option::is_none")]
    pub database: Option<&'static str>,

    /// JWKS configuration status ("configured" or "missing").
    #[serde(skip_serializing_if = "Option::is_none")]
    pub jwks: Option<&'static str>,

    /// Generic error description.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}
