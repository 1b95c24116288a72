//! Member handlers.
//!
//! All routes here sit behind the access middleware.
//!
//! - `GET /api/v1/members` - list members
//! - `GET /api/v1/members/:guid` - member by guid
//! - `POST /api/v1/members` - create a pending member
//! - `PUT /api/v1/members/:guid` - overwrite a member
//! - `DELETE /api/v1/members/:guid` - soft delete
//! - `POST /api/v1/members/identify` - resolve the caller's own member record

use super::required_field;
use crate::auth::AccessClaims;
use crate::errors::ApiError;
use crate::models::{
    CreateMemberRequest, IdentifyResponse, MemberResponse, UpdateMemberRequest,
};
use crate::repositories::MembersRepository;
use crate::routes::AppState;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    Extension, Json,
};
use std::sync::Arc;
use tracing::instrument;
use uuid::Uuid;

/// Longest guid accepted from callers.
const MAX_GUID_LENGTH: usize = 128;

/// List all members that have not been deleted.
#[instrument(skip_all, name = "academy.api.list_members")]
pub async fn list_members(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<MemberResponse>>, ApiError> {
    let rows = MembersRepository::list(&state.pool).await?;

    Ok(Json(rows.into_iter().map(MemberResponse::from).collect()))
}

/// Get one member by guid.
#[instrument(skip_all, name = "academy.api.get_member")]
pub async fn get_member(
    State(state): State<Arc<AppState>>,
    Path(guid): Path<String>,
) -> Result<Json<MemberResponse>, ApiError> {
    let row = MembersRepository::find_by_guid(&state.pool, &guid)
        .await?
        .ok_or_else(|| ApiError::NotFound("Member not found".to_string()))?;

    Ok(Json(row.into()))
}

/// Create a member with the `PENDING` role.
///
/// The guid defaults to a fresh UUID when the caller does not supply one.
#[instrument(skip_all, name = "academy.api.create_member")]
pub async fn create_member(
    State(state): State<Arc<AppState>>,
    Json(req): Json<CreateMemberRequest>,
) -> Result<(StatusCode, Json<MemberResponse>), ApiError> {
    let name = required_field(req.name, "name")?;
    let email = required_field(req.email, "email")?;
    validate_email(&email)?;

    let guid = match req.guid {
        Some(guid) => validate_guid(guid.trim())?.to_string(),
        None => Uuid::new_v4().to_string(),
    };

    let row = MembersRepository::create(&state.pool, &name, &email, &guid).await?;

    Ok((StatusCode::CREATED, Json(row.into())))
}

/// Overwrite name, email and role of a member.
#[instrument(skip_all, name = "academy.api.update_member")]
pub async fn update_member(
    State(state): State<Arc<AppState>>,
    Path(guid): Path<String>,
    Json(req): Json<UpdateMemberRequest>,
) -> Result<Json<MemberResponse>, ApiError> {
    let name = required_field(req.name, "name")?;
    let email = required_field(req.email, "email")?;
    let role = required_field(req.role, "role")?;
    validate_email(&email)?;

    let row = MembersRepository::update(&state.pool, &guid, &name, &email, &role)
        .await?
        .ok_or_else(|| ApiError::NotFound("Member not found".to_string()))?;

    Ok(Json(row.into()))
}

/// Soft delete a member.
#[instrument(skip_all, name = "academy.api.delete_member")]
pub async fn delete_member(
    State(state): State<Arc<AppState>>,
    Path(guid): Path<String>,
) -> Result<StatusCode, ApiError> {
    if MembersRepository::soft_delete(&state.pool, &guid).await? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(ApiError::NotFound("Member not found".to_string()))
    }
}

/// Look up the member whose guid equals the token subject.
#[instrument(skip_all, name = "academy.api.identify_member")]
pub async fn identify_member(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<AccessClaims>,
) -> Result<Json<IdentifyResponse>, ApiError> {
    let row = MembersRepository::find_by_guid(&state.pool, &claims.sub)
        .await?
        .ok_or_else(|| {
            tracing::debug!(target: "academy.api.members", "No member for token subject");
            ApiError::NotFound("Member not found".to_string())
        })?;

    Ok(Json(IdentifyResponse {
        name: row.name,
        role: row.role,
        email: row.email,
        refid: claims.sub,
    }))
}

fn validate_email(email: &str) -> Result<(), ApiError> {
    match email.split_once('@') {
        Some((local, domain)) if !local.is_empty() && !domain.is_empty() => Ok(()),
        _ => Err(ApiError::BadRequest("Invalid email value".to_string())),
    }
}

fn validate_guid(guid: &str) -> Result<&str, ApiError> {
    if guid.is_empty() || guid.len() > MAX_GUID_LENGTH {
        return Err(ApiError::BadRequest("Invalid guid value".to_string()));
    }
    if !guid
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
    {
        return Err(ApiError::BadRequest("Invalid guid value".to_string()));
    }
    Ok(guid)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_email() {
        assert!(validate_email("ada@example.com").is_ok());
        assert!(validate_email("ada").is_err());
        assert!(validate_email("@example.com").is_err());
        assert!(validate_email("ada@").is_err());
    }

    #[test]
    fn test_validate_guid() {
        assert!(validate_guid("7335d417-61da-459d-899c-0a01c76a2f94").is_ok());
        assert!(validate_guid("tz4a98xxat96iws9zmbrgj3a").is_ok());
        assert!(validate_guid("").is_err());
        assert!(validate_guid("has space").is_err());
        assert!(validate_guid("../etc").is_err());
        assert!(validate_guid(&"a".repeat(MAX_GUID_LENGTH + 1)).is_err());
    }
}
