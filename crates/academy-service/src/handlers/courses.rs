//! Course handlers.
//!
//! Reads are public; writes sit behind the access middleware.

use super::required_field;
use crate::errors::ApiError;
use crate::models::{CourseFields, CourseRequest, CourseResponse};
use crate::repositories::CoursesRepository;
use crate::routes::AppState;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use std::sync::Arc;
use tracing::instrument;
use uuid::Uuid;

/// List published courses.
#[instrument(skip_all, name = "academy.api.list_courses")]
pub async fn list_courses(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<CourseResponse>>, ApiError> {
    let rows = CoursesRepository::list_published(&state.pool).await?;

    Ok(Json(rows.into_iter().map(CourseResponse::from).collect()))
}

/// Get one course by guid.
#[instrument(skip_all, name = "academy.api.get_course")]
pub async fn get_course(
    State(state): State<Arc<AppState>>,
    Path(guid): Path<String>,
) -> Result<Json<CourseResponse>, ApiError> {
    let row = CoursesRepository::find_by_guid(&state.pool, &guid)
        .await?
        .ok_or_else(|| ApiError::NotFound("Course not found".to_string()))?;

    Ok(Json(row.into()))
}

/// Create a course under a fresh guid.
#[instrument(skip_all, name = "academy.api.create_course")]
pub async fn create_course(
    State(state): State<Arc<AppState>>,
    Json(req): Json<CourseRequest>,
) -> Result<(StatusCode, Json<CourseResponse>), ApiError> {
    let fields = course_fields(req)?;
    let guid = Uuid::new_v4().to_string();

    let row = CoursesRepository::create(&state.pool, &guid, &fields).await?;

    Ok((StatusCode::CREATED, Json(row.into())))
}

/// Overwrite every field of a course.
#[instrument(skip_all, name = "academy.api.update_course")]
pub async fn update_course(
    State(state): State<Arc<AppState>>,
    Path(guid): Path<String>,
    Json(req): Json<CourseRequest>,
) -> Result<Json<CourseResponse>, ApiError> {
    let fields = course_fields(req)?;

    let row = CoursesRepository::update(&state.pool, &guid, &fields)
        .await?
        .ok_or_else(|| ApiError::NotFound("Course not found".to_string()))?;

    Ok(Json(row.into()))
}

/// Permanently delete a course.
#[instrument(skip_all, name = "academy.api.delete_course")]
pub async fn delete_course(
    State(state): State<Arc<AppState>>,
    Path(guid): Path<String>,
) -> Result<StatusCode, ApiError> {
    if CoursesRepository::delete(&state.pool, &guid).await? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(ApiError::NotFound("Course not found".to_string()))
    }
}

fn course_fields(req: CourseRequest) -> Result<CourseFields, ApiError> {
    Ok(CourseFields {
        title: required_field(req.title, "title")?,
        description: required_field(req.description, "description")?,
        category: required_field(req.category, "category")?,
        url: req
            .url
            .map(|url| url.trim().to_string())
            .filter(|url| !url.is_empty()),
        published: req.published,
    })
}
