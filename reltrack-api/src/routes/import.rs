/// Bulk import endpoint
///
/// ```text
/// POST /v1/releases/import-scan
/// Content-Type: application/json
///
/// {
///   "rows": [ ...rows selected from a scan response... ],
///   "status": "Planned"
/// }
/// ```
///
/// Rows whose (project, version) is already tracked are skipped, so the same
/// selection can be submitted twice without creating duplicates.

use crate::{app::AppState, error::ApiResult};
use axum::{
    extract::{rejection::JsonRejection, State},
    Extension, Json,
};
use reltrack_shared::{
    auth::authorization::{require, Capability, Principal},
    import::{ImportReport, ImportRequest},
};

/// Imports selected scan rows as releases
///
/// # Response
///
/// `200 OK` with the per-row report when every row was created or skipped.
///
/// # Errors
///
/// - `207 Multi-Status`: some rows failed; `details` carries the full report
/// - `400 Bad Request`: empty selection
/// - `403 Forbidden`: caller isn't an admin, whatever the body holds
/// - `422 Unprocessable Entity`: body isn't an import request
pub async fn import_scan(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    body: Result<Json<ImportRequest>, JsonRejection>,
) -> ApiResult<Json<ImportReport>> {
    require(&principal, Capability::ImportReleases)?;
    let Json(req) = body?;

    let report = state
        .importer
        .import_selected(&req.rows, req.status, &principal)
        .await?
        .into_result()?;

    Ok(Json(report))
}
