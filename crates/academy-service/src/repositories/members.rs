//! Members repository for database operations.
//!
//! # Security
//!
//! - All queries use parameterized statements (SQL injection safe)
//! - Soft-deleted members are invisible to every read and write

use super::{map_write_error, now_millis};
use crate::errors::ApiError;
use crate::models::{MemberRow, ROLE_PENDING};
use crate::observability::metrics;
use sqlx::SqlitePool;
use std::time::Instant;
use tracing::instrument;

const MEMBER_COLUMNS: &str = "id, name, email, role, guid, created, modified, deleted";

const DUPLICATE_MEMBER: &str = "A member with this email or guid already exists";

/// Members repository for database operations.
pub struct MembersRepository;

impl MembersRepository {
    /// List all members that have not been deleted, ordered by id.
    #[instrument(skip_all, name = "academy.repo.list_members")]
    pub async fn list(pool: &SqlitePool) -> Result<Vec<MemberRow>, ApiError> {
        let start = Instant::now();

        let rows = sqlx::query_as::<_, MemberRow>(&format!(
            "SELECT {MEMBER_COLUMNS} FROM members WHERE deleted IS NULL ORDER BY id"
        ))
        .fetch_all(pool)
        .await
        .map_err(|e| {
            metrics::record_db_query("list_members", "error", start.elapsed());
            ApiError::Database(e.to_string())
        })?;

        metrics::record_db_query("list_members", "success", start.elapsed());
        Ok(rows)
    }

    /// Find a non-deleted member by guid.
    #[instrument(skip_all, name = "academy.repo.find_member")]
    pub async fn find_by_guid(
        pool: &SqlitePool,
        guid: &str,
    ) -> Result<Option<MemberRow>, ApiError> {
        let start = Instant::now();

        let row = sqlx::query_as::<_, MemberRow>(&format!(
            "SELECT {MEMBER_COLUMNS} FROM members WHERE guid = ?1 AND deleted IS NULL"
        ))
        .bind(guid)
        .fetch_optional(pool)
        .await
        .map_err(|e| {
            metrics::record_db_query("find_member", "error", start.elapsed());
            ApiError::Database(e.to_string())
        })?;

        metrics::record_db_query("find_member", "success", start.elapsed());
        Ok(row)
    }

    /// Create a member with the `PENDING` role.
    ///
    /// Returns `ApiError::Conflict` if the email or guid is already taken.
    #[instrument(skip_all, name = "academy.repo.create_member")]
    pub async fn create(
        pool: &SqlitePool,
        name: &str,
        email: &str,
        guid: &str,
    ) -> Result<MemberRow, ApiError> {
        let start = Instant::now();
        let now = now_millis();

        let row = sqlx::query_as::<_, MemberRow>(&format!(
            "INSERT INTO members (name, email, role, guid, created, modified) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?5) \
             RETURNING {MEMBER_COLUMNS}"
        ))
        .bind(name)
        .bind(email)
        .bind(ROLE_PENDING)
        .bind(guid)
        .bind(now)
        .fetch_one(pool)
        .await
        .map_err(|e| {
            metrics::record_db_query("create_member", "error", start.elapsed());
            map_write_error(e, DUPLICATE_MEMBER)
        })?;

        metrics::record_db_query("create_member", "success", start.elapsed());
        tracing::info!(target: "academy.repo.members", member_id = row.id, "Member created");
        Ok(row)
    }

    /// Overwrite name, email and role of a non-deleted member.
    ///
    /// Returns `Ok(None)` if no such member exists.
    #[instrument(skip_all, name = "academy.repo.update_member")]
    pub async fn update(
        pool: &SqlitePool,
        guid: &str,
        name: &str,
        email: &str,
        role: &str,
    ) -> Result<Option<MemberRow>, ApiError> {
        let start = Instant::now();

        let row = sqlx::query_as::<_, MemberRow>(&format!(
            "UPDATE members SET name = ?1, email = ?2, role = ?3, modified = ?4 \
             WHERE guid = ?5 AND deleted IS NULL \
             RETURNING {MEMBER_COLUMNS}"
        ))
        .bind(name)
        .bind(email)
        .bind(role)
        .bind(now_millis())
        .bind(guid)
        .fetch_optional(pool)
        .await
        .map_err(|e| {
            metrics::record_db_query("update_member", "error", start.elapsed());
            map_write_error(e, DUPLICATE_MEMBER)
        })?;

        metrics::record_db_query("update_member", "success", start.elapsed());
        Ok(row)
    }

    /// Mark a member as deleted.
    ///
    /// Returns `false` if the member does not exist or was already deleted.
    #[instrument(skip_all, name = "academy.repo.delete_member")]
    pub async fn soft_delete(pool: &SqlitePool, guid: &str) -> Result<bool, ApiError> {
        let start = Instant::now();
        let now = now_millis();

        let result = sqlx::query(
            "UPDATE members SET deleted = ?1, modified = ?1 WHERE guid = ?2 AND deleted IS NULL",
        )
        .bind(now)
        .bind(guid)
        .execute(pool)
        .await
        .map_err(|e| {
            metrics::record_db_query("delete_member", "error", start.elapsed());
            ApiError::Database(e.to_string())
        })?;

        metrics::record_db_query("delete_member", "success", start.elapsed());
        Ok(result.rows_affected() > 0)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::indexing_slicing)]
mod tests {
    use super::*;

    #[sqlx::test(migrations = "../../migrations")]
    async fn test_create_and_find(pool: SqlitePool) {
        let created = MembersRepository::create(&pool, "Ada", "ada@example.com", "guid-ada")
            .await
            .unwrap();

        assert_eq!(created.role, ROLE_PENDING);
        assert_eq!(created.created, created.modified);
        assert!(created.deleted.is_none());

        let found = MembersRepository::find_by_guid(&pool, "guid-ada")
            .await
            .unwrap()
            .expect("member should exist");
        assert_eq!(found.id, created.id);
        assert_eq!(found.email, "ada@example.com");
    }

    #[sqlx::test(migrations = "../../migrations")]
    async fn test_list_is_ordered_and_skips_deleted(pool: SqlitePool) {
        MembersRepository::create(&pool, "A", "a@example.com", "g-a").await.unwrap();
        MembersRepository::create(&pool, "B", "b@example.com", "g-b").await.unwrap();
        MembersRepository::create(&pool, "C", "c@example.com", "g-c").await.unwrap();
        assert!(MembersRepository::soft_delete(&pool, "g-b").await.unwrap());

        let rows = MembersRepository::list(&pool).await.unwrap();
        let guids: Vec<_> = rows.iter().map(|r| r.guid.as_str()).collect();
        assert_eq!(guids, vec!["g-a", "g-c"]);
    }

    #[sqlx::test(migrations = "../../migrations")]
    async fn test_list_empty(pool: SqlitePool) {
        assert!(MembersRepository::list(&pool).await.unwrap().is_empty());
    }

    #[sqlx::test(migrations = "../../migrations")]
    async fn test_duplicate_email_or_guid_conflicts(pool: SqlitePool) {
        MembersRepository::create(&pool, "Ada", "ada@example.com", "guid-1").await.unwrap();

        let same_email = MembersRepository::create(&pool, "Ada2", "ada@example.com", "guid-2").await;
        assert!(matches!(same_email, Err(ApiError::Conflict(_))));

        let same_guid = MembersRepository::create(&pool, "Bob", "bob@example.com", "guid-1").await;
        assert!(matches!(same_guid, Err(ApiError::Conflict(_))));
    }

    #[sqlx::test(migrations = "../../migrations")]
    async fn test_update_overwrites_fields(pool: SqlitePool) {
        let created = MembersRepository::create(&pool, "Ada", "ada@example.com", "guid-ada")
            .await
            .unwrap();

        let updated = MembersRepository::update(
            &pool,
            "guid-ada",
            "Ada Lovelace",
            "lovelace@example.com",
            "INSTRUCTOR",
        )
        .await
        .unwrap()
        .expect("member should exist");

        assert_eq!(updated.id, created.id);
        assert_eq!(updated.name, "Ada Lovelace");
        assert_eq!(updated.role, "INSTRUCTOR");
        assert!(updated.modified >= created.modified);
    }

    #[sqlx::test(migrations = "../../migrations")]
    async fn test_update_missing_member(pool: SqlitePool) {
        let result = MembersRepository::update(&pool, "nobody", "N", "n@example.com", "PENDING")
            .await
            .unwrap();
        assert!(result.is_none());
    }

    #[sqlx::test(migrations = "../../migrations")]
    async fn test_update_email_clash_conflicts(pool: SqlitePool) {
        MembersRepository::create(&pool, "A", "a@example.com", "g-a").await.unwrap();
        MembersRepository::create(&pool, "B", "b@example.com", "g-b").await.unwrap();

        let result = MembersRepository::update(&pool, "g-b", "B", "a@example.com", "PENDING").await;
        assert!(matches!(result, Err(ApiError::Conflict(_))));
    }

    #[sqlx::test(migrations = "../../migrations")]
    async fn test_soft_delete_hides_member(pool: SqlitePool) {
        MembersRepository::create(&pool, "Ada", "ada@example.com", "guid-ada").await.unwrap();

        assert!(MembersRepository::soft_delete(&pool, "guid-ada").await.unwrap());
        assert!(!MembersRepository::soft_delete(&pool, "guid-ada").await.unwrap());
        assert!(MembersRepository::find_by_guid(&pool, "guid-ada")
            .await
            .unwrap()
            .is_none());

        // Row is retained with a deletion timestamp
        let (deleted,): (Option<i64>,) =
            sqlx::query_as("SELECT deleted FROM members WHERE guid = 'guid-ada'")
                .fetch_one(&pool)
                .await
                .unwrap();
        assert!(deleted.is_some());
    }

    #[sqlx::test(migrations = "../../migrations")]
    async fn test_soft_deleted_member_releases_email_and_guid(pool: SqlitePool) {
        MembersRepository::create(&pool, "Ada", "ada@example.com", "guid-ada").await.unwrap();
        assert!(MembersRepository::soft_delete(&pool, "guid-ada").await.unwrap());

        let recreated = MembersRepository::create(&pool, "Ada", "ada@example.com", "guid-ada")
            .await
            .unwrap();
        assert!(recreated.deleted.is_none());

        let found = MembersRepository::find_by_guid(&pool, "guid-ada")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(found.id, recreated.id);

        // A second live member still cannot take the same email
        let duplicate = MembersRepository::create(&pool, "Ada", "ada@example.com", "guid-other").await;
        assert!(matches!(duplicate, Err(ApiError::Conflict(_))));
    }
}
