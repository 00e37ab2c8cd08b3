/// Release endpoints
///
/// - `GET /v1/releases` - releases visible to the caller
/// - `POST /v1/releases` - record a release by hand (admin)
/// - `PATCH /v1/releases/:id` - change status (owner or admin)
/// - `DELETE /v1/releases/:id` - delete (owner or admin)

use crate::{app::AppState, error::ApiResult};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    Extension, Json,
};
use reltrack_shared::{
    auth::authorization::Principal,
    models::release::{CreateRelease, Release, ReleaseStatus},
};
use serde::Deserialize;
use uuid::Uuid;

/// Create release request
#[derive(Debug, Deserialize)]
pub struct CreateReleaseRequest {
    pub project_name: String,

    pub version: String,

    #[serde(default)]
    pub status: ReleaseStatus,

    /// Owner; defaults to the caller
    pub owner_id: Option<Uuid>,
}

/// Status change request
#[derive(Debug, Deserialize)]
pub struct UpdateStatusRequest {
    pub status: ReleaseStatus,
}

/// Lists releases, newest first
///
/// Admins see every release; everyone else sees the ones they own.
pub async fn list_releases(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
) -> ApiResult<Json<Vec<Release>>> {
    let releases = state.releases.list(&principal).await?;
    Ok(Json(releases))
}

/// Records a release
///
/// # Errors
///
/// - `403 Forbidden`: caller isn't an admin
/// - `422 Unprocessable Entity`: empty name or version
pub async fn create_release(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Json(req): Json<CreateReleaseRequest>,
) -> ApiResult<(StatusCode, Json<Release>)> {
    let release = state
        .releases
        .create(
            &principal,
            CreateRelease {
                project_name: req.project_name,
                version: req.version,
                status: req.status,
                owner_id: req.owner_id,
            },
        )
        .await?;

    Ok((StatusCode::CREATED, Json(release)))
}

/// Changes a release's status
///
/// Any status may follow any other.
pub async fn update_release_status(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Path(id): Path<Uuid>,
    Json(req): Json<UpdateStatusRequest>,
) -> ApiResult<Json<Release>> {
    let release = state
        .releases
        .update_status(id, req.status, &principal)
        .await?;
    Ok(Json(release))
}

pub async fn delete_release(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Path(id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    state.releases.delete(id, &principal).await?;
    Ok(StatusCode::NO_CONTENT)
}
