//! Courses repository for database operations.

use super::{map_write_error, now_millis};
use crate::errors::ApiError;
use crate::models::{CourseFields, CourseRow};
use crate::observability::metrics;
use sqlx::SqlitePool;
use std::time::Instant;
use tracing::instrument;

const COURSE_COLUMNS: &str =
    "id, guid, title, description, category, url, published, created, modified";

/// Courses repository for database operations.
pub struct CoursesRepository;

impl CoursesRepository {
    /// List published courses, ordered by id.
    #[instrument(skip_all, name = "academy.repo.list_courses")]
    pub async fn list_published(pool: &SqlitePool) -> Result<Vec<CourseRow>, ApiError> {
        let start = Instant::now();

        let rows = sqlx::query_as::<_, CourseRow>(&format!(
            "SELECT {COURSE_COLUMNS} FROM courses WHERE published IS NOT NULL ORDER BY id"
        ))
        .fetch_all(pool)
        .await
        .map_err(|e| {
            metrics::record_db_query("list_courses", "error", start.elapsed());
            ApiError::Database(e.to_string())
        })?;

        metrics::record_db_query("list_courses", "success", start.elapsed());
        Ok(rows)
    }

    /// Find a course by guid, published or not.
    #[instrument(skip_all, name = "academy.repo.find_course")]
    pub async fn find_by_guid(
        pool: &SqlitePool,
        guid: &str,
    ) -> Result<Option<CourseRow>, ApiError> {
        let start = Instant::now();

        let row = sqlx::query_as::<_, CourseRow>(&format!(
            "SELECT {COURSE_COLUMNS} FROM courses WHERE guid = ?1"
        ))
        .bind(guid)
        .fetch_optional(pool)
        .await
        .map_err(|e| {
            metrics::record_db_query("find_course", "error", start.elapsed());
            ApiError::Database(e.to_string())
        })?;

        metrics::record_db_query("find_course", "success", start.elapsed());
        Ok(row)
    }

    /// Insert a course under the given guid.
    #[instrument(skip_all, name = "academy.repo.create_course")]
    pub async fn create(
        pool: &SqlitePool,
        guid: &str,
        fields: &CourseFields,
    ) -> Result<CourseRow, ApiError> {
        let start = Instant::now();
        let now = now_millis();

        let row = sqlx::query_as::<_, CourseRow>(&format!(
            "INSERT INTO courses (guid, title, description, category, url, published, created, modified) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?7) \
             RETURNING {COURSE_COLUMNS}"
        ))
        .bind(guid)
        .bind(&fields.title)
        .bind(&fields.description)
        .bind(&fields.category)
        .bind(&fields.url)
        .bind(fields.published)
        .bind(now)
        .fetch_one(pool)
        .await
        .map_err(|e| {
            metrics::record_db_query("create_course", "error", start.elapsed());
            map_write_error(e, "A course with this guid already exists")
        })?;

        metrics::record_db_query("create_course", "success", start.elapsed());
        tracing::info!(target: "academy.repo.courses", course_id = row.id, "Course created");
        Ok(row)
    }

    /// Overwrite every field of a course.
    ///
    /// Returns `Ok(None)` if no such course exists.
    #[instrument(skip_all, name = "academy.repo.update_course")]
    pub async fn update(
        pool: &SqlitePool,
        guid: &str,
        fields: &CourseFields,
    ) -> Result<Option<CourseRow>, ApiError> {
        let start = Instant::now();

        let row = sqlx::query_as::<_, CourseRow>(&format!(
            "UPDATE courses SET title = ?1, description = ?2, category = ?3, url = ?4, \
             published = ?5, modified = ?6 \
             WHERE guid = ?7 \
             RETURNING {COURSE_COLUMNS}"
        ))
        .bind(&fields.title)
        .bind(&fields.description)
        .bind(&fields.category)
        .bind(&fields.url)
        .bind(fields.published)
        .bind(now_millis())
        .bind(guid)
        .fetch_optional(pool)
        .await
        .map_err(|e| {
            metrics::record_db_query("update_course", "error", start.elapsed());
            ApiError::Database(e.to_string())
        })?;

        metrics::record_db_query("update_course", "success", start.elapsed());
        Ok(row)
    }

    /// Permanently remove a course.
    ///
    /// Returns `false` if no such course exists.
    #[instrument(skip_all, name = "academy.repo.delete_course")]
    pub async fn delete(pool: &SqlitePool, guid: &str) -> Result<bool, ApiError> {
        let start = Instant::now();

        let result = sqlx::query("DELETE FROM courses WHERE guid = ?1")
            .bind(guid)
            .execute(pool)
            .await
            .map_err(|e| {
                metrics::record_db_query("delete_course", "error", start.elapsed());
                ApiError::Database(e.to_string())
            })?;

        metrics::record_db_query("delete_course", "success", start.elapsed());
        Ok(result.rows_affected() > 0)
    }
}
