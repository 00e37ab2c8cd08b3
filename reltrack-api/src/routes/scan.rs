/// Manifest scan endpoint
///
/// ```text
/// POST /v1/scan
/// Content-Type: multipart/form-data; boundary=...
///
/// file=<requirements.txt or pyproject.toml>
/// ```
///
/// The format is taken from the file name, falling back to the part's
/// content type. Nothing is stored; the rows come back for the caller to
/// review and, if they choose, send to `POST /v1/releases/import-scan`.

use crate::{
    app::AppState,
    error::{ApiError, ApiResult},
};
use axum::{
    extract::{Multipart, State},
    Extension, Json,
};
use bytes::Bytes;
use reltrack_shared::{
    auth::authorization::{require, Capability, Principal},
    scan::ScanResultRow,
};
use serde::Serialize;

/// Name of the multipart part carrying the manifest
pub const FILE_FIELD: &str = "file";

/// Scan response
#[derive(Debug, Serialize)]
pub struct ScanResponse {
    /// Uploaded file name, if the client sent one
    pub filename: Option<String>,

    /// One row per distinct package, in manifest order
    pub rows: Vec<ScanResultRow>,
}

struct Upload {
    filename: Option<String>,
    content_type: Option<String>,
    data: Bytes,
}

async fn read_upload(mut multipart: Multipart) -> ApiResult<Upload> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::BadRequest(format!("Invalid multipart body: {}", e)))?
    {
        if field.name() != Some(FILE_FIELD) {
            continue;
        }

        let filename = field.file_name().map(str::to_string);
        let content_type = field.content_type().map(str::to_string);
        let data = field
            .bytes()
            .await
            .map_err(|e| ApiError::BadRequest(format!("Failed to read upload: {}", e)))?;

        return Ok(Upload {
            filename,
            content_type,
            data,
        });
    }

    Err(ApiError::BadRequest(format!(
        "Missing multipart field '{}'",
        FILE_FIELD
    )))
}

/// Scans an uploaded manifest against the package registry
///
/// Packages the registry can't answer for still get a row, with empty
/// resolved fields and a `lookup` status saying why.
///
/// # Errors
///
/// - `400 Bad Request`: no `file` part
/// - `403 Forbidden`: caller may not scan
/// - `415 Unsupported Media Type`: neither name nor content type is a known manifest
/// - `422 Unprocessable Entity`: the manifest doesn't parse
/// - `503 Service Unavailable`: the registry was unreachable for every package
pub async fn scan_manifest(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    multipart: Multipart,
) -> ApiResult<Json<ScanResponse>> {
    require(&principal, Capability::Scan)?;
    let upload = read_upload(multipart).await?;

    tracing::debug!(
        user_id = %principal.user_id,
        filename = ?upload.filename,
        content_type = ?upload.content_type,
        size = upload.data.len(),
        "Manifest uploaded"
    );

    let rows = state
        .scanner
        .scan_upload(
            &upload.data,
            upload.filename.as_deref(),
            upload.content_type.as_deref(),
        )
        .await?;

    Ok(Json(ScanResponse {
        filename: upload.filename,
        rows,
    }))
}
