/// User administration endpoints (admin role required)
///
/// - `GET /v1/admin/users?limit=&offset=` - list accounts, newest first
/// - `DELETE /v1/admin/users/:id` - delete an account; its releases stay,
///   without an owner

use crate::{
    app::AppState,
    error::{ApiError, ApiResult},
    routes::auth::UserResponse,
};
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Extension, Json,
};
use reltrack_shared::auth::authorization::{require, Capability, Principal};
use serde::Deserialize;
use uuid::Uuid;

const DEFAULT_PAGE_SIZE: i64 = 50;
const MAX_PAGE_SIZE: i64 = 200;

#[derive(Debug, Deserialize)]
pub struct Pagination {
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

impl Pagination {
    fn bounds(&self) -> (i64, i64) {
        let limit = self.limit.unwrap_or(DEFAULT_PAGE_SIZE).clamp(1, MAX_PAGE_SIZE);
        let offset = self.offset.unwrap_or(0).max(0);
        (limit, offset)
    }
}

pub async fn list_users(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Query(page): Query<Pagination>,
) -> ApiResult<Json<Vec<UserResponse>>> {
    require(&principal, Capability::ManageUsers)?;

    let (limit, offset) = page.bounds();
    let users = state.users.list(limit, offset).await?;

    Ok(Json(users.into_iter().map(UserResponse::from).collect()))
}

/// Deletes a user
///
/// Admins can't delete themselves, so there is always someone left to
/// administer the tracker.
pub async fn delete_user(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Path(id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    require(&principal, Capability::ManageUsers)?;

    if id == principal.user_id {
        return Err(ApiError::BadRequest("Cannot delete your own account".to_string()));
    }

    if !state.users.delete(id).await? {
        return Err(ApiError::NotFound(format!("User {} not found", id)));
    }

    tracing::info!(user_id = %id, by = %principal.user_id, "User deleted");
    Ok(StatusCode::NO_CONTENT)
}
