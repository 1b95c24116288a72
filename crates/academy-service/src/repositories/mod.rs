//! Repository layer for database operations.
//!
//! Each repository is a unit struct with associated async functions that take
//! the pool explicitly. Handlers call repositories directly.

mod courses;
mod members;

pub use courses::CoursesRepository;
pub use members::MembersRepository;

use crate::errors::ApiError;

/// Current time as Unix epoch milliseconds.
pub(crate) fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

/// Map a write failure, turning unique constraint violations into 409.
pub(crate) fn map_write_error(err: sqlx::Error, conflict_message: &str) -> ApiError {
    if let sqlx::Error::Database(db_err) = &err {
        if db_err.is_unique_violation() {
            return ApiError::Conflict(conflict_message.to_string());
        }
    }
    ApiError::Database(err.to_string())
}
