/// Error handling for the API server
///
/// This module provides a unified error type that maps to HTTP responses.
/// All handlers should return `Result<T, ApiError>` which automatically
/// converts to appropriate HTTP status codes. Every error raised by
/// `reltrack-shared` has a `From` conversion here, so handlers just use `?`.
///
/// # Example
///
/// ```ignore
/// use reltrack_api::error::{ApiError, ApiResult};
/// use axum::Json;
///
/// async fn handler(state: AppState) -> ApiResult<Json<Vec<Release>>> {
///     let releases = state.releases.list(&principal).await?;
///     Ok(Json(releases))
/// }
/// ```

use axum::{
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use reltrack_shared::auth::authorization::AuthzError;
use reltrack_shared::auth::gate::GateError;
use reltrack_shared::auth::jwt::JwtError;
use reltrack_shared::auth::password::PasswordError;
use reltrack_shared::import::{ImportError, ImportReport};
use reltrack_shared::manifest::ManifestError;
use reltrack_shared::releases::ReleaseError;
use reltrack_shared::scan::ScanError;
use reltrack_shared::store::StoreError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// API result type alias
pub type ApiResult<T> = Result<T, ApiError>;

/// Unified API error type
#[derive(Debug)]
pub enum ApiError {
    /// Bad request (400)
    BadRequest(String),

    /// Unauthorized (401)
    Unauthorized(String),

    /// Forbidden (403)
    Forbidden(String),

    /// Not found (404)
    NotFound(String),

    /// Conflict (409) - e.g., duplicate email
    Conflict(String),

    /// Unsupported media type (415) - manifest format not recognized
    UnsupportedFormat(String),

    /// Unprocessable entity (422) - validation errors
    ValidationError(Vec<ValidationErrorDetail>),

    /// Unprocessable entity (422) - manifest couldn't be parsed
    MalformedManifest(String),

    /// Multi-status (207) - some imported rows failed
    PartialImport(ImportReport),

    /// Internal server error (500)
    InternalError(String),

    /// Service unavailable (503) - package registry unreachable for the whole scan
    ServiceUnavailable(String),
}

/// Validation error detail
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationErrorDetail {
    /// Field that failed validation
    pub field: String,

    /// Error message
    pub message: String,
}

impl ValidationErrorDetail {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

/// Error response format
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Error code (e.g., "bad_request", "unauthorized")
    pub error: String,

    /// Human-readable error message
    pub message: String,

    /// Validation errors, or the per-row report of a partial import
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ApiError::BadRequest(msg) => write!(f, "Bad request: {}", msg),
            ApiError::Unauthorized(msg) => write!(f, "Unauthorized: {}", msg),
            ApiError::Forbidden(msg) => write!(f, "Forbidden: {}", msg),
            ApiError::NotFound(msg) => write!(f, "Not found: {}", msg),
            ApiError::Conflict(msg) => write!(f, "Conflict: {}", msg),
            ApiError::UnsupportedFormat(msg) => write!(f, "Unsupported format: {}", msg),
            ApiError::ValidationError(errors) => {
                write!(f, "Validation failed: {} errors", errors.len())
            }
            ApiError::MalformedManifest(msg) => write!(f, "Malformed manifest: {}", msg),
            ApiError::PartialImport(report) => write!(
                f,
                "Partial import: {} of {} rows failed",
                report.failed_count(),
                report.rows.len()
            ),
            ApiError::InternalError(msg) => write!(f, "Internal error: {}", msg),
            ApiError::ServiceUnavailable(msg) => write!(f, "Service unavailable: {}", msg),
        }
    }
}

impl std::error::Error for ApiError {}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_code, message, details) = match self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "bad_request", msg, None),
            ApiError::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, "unauthorized", msg, None),
            ApiError::Forbidden(msg) => (StatusCode::FORBIDDEN, "forbidden", msg, None),
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, "not_found", msg, None),
            ApiError::Conflict(msg) => (StatusCode::CONFLICT, "conflict", msg, None),
            ApiError::UnsupportedFormat(msg) => (
                StatusCode::UNSUPPORTED_MEDIA_TYPE,
                "unsupported_format",
                msg,
                None,
            ),
            ApiError::ValidationError(errors) => (
                StatusCode::UNPROCESSABLE_ENTITY,
                "validation_error",
                "Request validation failed".to_string(),
                serde_json::to_value(errors).ok(),
            ),
            ApiError::MalformedManifest(msg) => (
                StatusCode::UNPROCESSABLE_ENTITY,
                "malformed_manifest",
                msg,
                None,
            ),
            ApiError::PartialImport(report) => (
                StatusCode::MULTI_STATUS,
                "partial_import",
                format!(
                    "{} of {} rows failed to import",
                    report.failed_count(),
                    report.rows.len()
                ),
                serde_json::to_value(report).ok(),
            ),
            ApiError::InternalError(msg) => {
                // Log internal errors but don't expose details to clients
                tracing::error!("Internal error: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal_error",
                    "An internal error occurred".to_string(),
                    None,
                )
            }
            ApiError::ServiceUnavailable(msg) => (
                StatusCode::SERVICE_UNAVAILABLE,
                "service_unavailable",
                msg,
                None,
            ),
        };

        let body = Json(ErrorResponse {
            error: error_code.to_string(),
            message,
            details,
        });

        (status, body).into_response()
    }
}

/// Convert validator errors to API errors
impl From<validator::ValidationErrors> for ApiError {
    fn from(errors: validator::ValidationErrors) -> Self {
        let mut details: Vec<ValidationErrorDetail> = errors
            .field_errors()
            .into_iter()
            .flat_map(|(field, errs)| {
                errs.iter().map(move |e| {
                    let message = e
                        .message
                        .as_ref()
                        .map(|m| m.to_string())
                        .unwrap_or_else(|| format!("Invalid value ({})", e.code));
                    ValidationErrorDetail::new(field.to_string(), message)
                })
            })
            .collect();
        details.sort_by(|a, b| a.field.cmp(&b.field));

        ApiError::ValidationError(details)
    }
}

/// Convert store errors to API errors
impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Conflict(msg) => ApiError::Conflict(msg),
            StoreError::Validation(msg) => {
                ApiError::ValidationError(vec![ValidationErrorDetail::new("body", msg)])
            }
            StoreError::Database(err) => ApiError::InternalError(format!("Database error: {}", err)),
        }
    }
}

/// Convert gate errors to API errors
impl From<GateError> for ApiError {
    fn from(err: GateError) -> Self {
        match err {
            GateError::Unauthenticated(msg) => ApiError::Unauthorized(msg),
            GateError::Forbidden { required } => {
                ApiError::Forbidden(format!("Requires {} role", required))
            }
            GateError::Issue(err) => err.into(),
            GateError::Store(err) => err.into(),
        }
    }
}

/// Convert authorization errors to API errors
impl From<AuthzError> for ApiError {
    fn from(err: AuthzError) -> Self {
        ApiError::Forbidden(err.to_string())
    }
}

/// Convert password errors to API errors
impl From<PasswordError> for ApiError {
    fn from(err: PasswordError) -> Self {
        ApiError::InternalError(format!("Password operation failed: {}", err))
    }
}

/// Convert JWT errors to API errors
impl From<JwtError> for ApiError {
    fn from(err: JwtError) -> Self {
        match err {
            JwtError::Expired => ApiError::Unauthorized("Token expired".to_string()),
            JwtError::InvalidIssuer => ApiError::Unauthorized("Invalid token issuer".to_string()),
            JwtError::ValidationError(msg) => ApiError::Unauthorized(format!("Invalid token: {}", msg)),
            JwtError::CreateError(msg) => ApiError::InternalError(format!("Token signing failed: {}", msg)),
        }
    }
}

/// Convert release errors to API errors
impl From<ReleaseError> for ApiError {
    fn from(err: ReleaseError) -> Self {
        match err {
            ReleaseError::NotFound(id) => ApiError::NotFound(format!("Release {} not found", id)),
            ReleaseError::Forbidden(err) => err.into(),
            ReleaseError::Invalid(msg) => {
                ApiError::ValidationError(vec![ValidationErrorDetail::new("body", msg)])
            }
            ReleaseError::Store(err) => err.into(),
        }
    }
}

/// Convert manifest errors to API errors
impl From<ManifestError> for ApiError {
    fn from(err: ManifestError) -> Self {
        match err {
            ManifestError::UnsupportedFormat(msg) => ApiError::UnsupportedFormat(msg),
            ManifestError::MalformedManifest(msg) => ApiError::MalformedManifest(msg),
        }
    }
}

/// Convert scan errors to API errors
impl From<ScanError> for ApiError {
    fn from(err: ScanError) -> Self {
        match err {
            ScanError::Manifest(err) => err.into(),
            ScanError::Resolve(err) => {
                ApiError::ServiceUnavailable(err.to_string())
            }
        }
    }
}

/// Convert JSON body rejections to API errors
///
/// Well-formed JSON of the wrong shape is a validation failure; anything
/// else (syntax, content type) is a bad request.
impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        match rejection {
            JsonRejection::JsonDataError(err) => {
                ApiError::ValidationError(vec![ValidationErrorDetail::new("body", err.body_text())])
            }
            other => ApiError::BadRequest(other.body_text()),
        }
    }
}

/// Convert import errors to API errors
impl From<ImportError> for ApiError {
    fn from(err: ImportError) -> Self {
        match err {
            ImportError::Forbidden(err) => err.into(),
            ImportError::EmptySelection => ApiError::BadRequest(err.to_string()),
            ImportError::PartialImport(report) => ApiError::PartialImport(report),
        }
    }
}
