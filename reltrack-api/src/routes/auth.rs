/// Authentication endpoints
///
/// This module provides user account endpoints:
/// - Registration
/// - Login
/// - Current user profile
///
/// # Endpoints
///
/// - `POST /v1/auth/register` - Register new user
/// - `POST /v1/auth/login` - Login and get a session token
/// - `GET /v1/auth/me` - Profile of the token holder

use crate::{
    app::AppState,
    error::{ApiError, ApiResult, ValidationErrorDetail},
};
use axum::{extract::State, http::StatusCode, Extension, Json};
use reltrack_shared::{
    auth::{authorization::Principal, password},
    models::user::{CreateUser, User, UserRole},
};
use serde::{Deserialize, Serialize};
use validator::Validate;

const INVALID_CREDENTIALS: &str = "Invalid email or password";

/// Register request
#[derive(Debug, Deserialize, Validate)]
pub struct RegisterRequest {
    /// Display name
    #[validate(length(min = 1, max = 100, message = "Name must be 1 to 100 characters"))]
    pub name: String,

    /// Email address
    #[validate(email(message = "Invalid email format"))]
    pub email: String,

    /// Password (policy checked separately)
    pub password: String,

    /// Requested role; only `user` may be self-assigned
    #[serde(default)]
    pub role: Option<UserRole>,
}

/// Login request
#[derive(Debug, Deserialize, Validate)]
pub struct LoginRequest {
    /// Email address
    #[validate(email(message = "Invalid email format"))]
    pub email: String,

    /// Password
    pub password: String,

    /// Role the caller expects to act as
    #[serde(default)]
    pub as_role: Option<UserRole>,
}

/// Public view of a user
#[derive(Debug, Serialize)]
pub struct UserResponse {
    pub id: String,
    pub name: String,
    pub email: String,
    pub role: UserRole,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

impl From<User> for UserResponse {
    fn from(user: User) -> Self {
        Self {
            id: user.id.to_string(),
            name: user.name,
            email: user.email,
            role: user.role,
            created_at: user.created_at,
        }
    }
}

/// Session response for register and login
#[derive(Debug, Serialize)]
pub struct AuthResponse {
    /// Bearer token
    pub access_token: String,

    /// Token lifetime in seconds
    pub expires_in: i64,

    pub user: UserResponse,
}

fn session(state: &AppState, user: User) -> ApiResult<AuthResponse> {
    let access_token = state.gate.issue(&user)?;

    Ok(AuthResponse {
        access_token,
        expires_in: state.config.jwt.expiration_seconds,
        user: user.into(),
    })
}

/// Register a new user
///
/// # Endpoint
///
/// ```text
/// POST /v1/auth/register
/// Content-Type: application/json
///
/// {
///   "name": "Ada",
///   "email": "ada@example.com",
///   "password": "correct horse"
/// }
/// ```
///
/// # Errors
///
/// - `403 Forbidden`: `role` was `admin`
/// - `409 Conflict`: Email already exists
/// - `422 Unprocessable Entity`: Validation failed
pub async fn register(
    State(state): State<AppState>,
    Json(req): Json<RegisterRequest>,
) -> ApiResult<(StatusCode, Json<AuthResponse>)> {
    if req.role == Some(UserRole::Admin) {
        return Err(ApiError::Forbidden(
            "Admin accounts cannot be self-registered".to_string(),
        ));
    }

    req.validate()?;

    password::validate_password(&req.password)
        .map_err(|e| ApiError::ValidationError(vec![ValidationErrorDetail::new("password", e)]))?;

    let password_hash = password::hash_password(&req.password)?;

    let user = state
        .users
        .create(CreateUser {
            name: req.name.trim().to_string(),
            email: req.email,
            password_hash,
            role: UserRole::User,
        })
        .await?;

    tracing::info!(user_id = %user.id, "User registered");

    Ok((StatusCode::CREATED, Json(session(&state, user)?)))
}

/// Login endpoint
///
/// Every credential mismatch gets the same message so callers can't probe
/// which emails exist.
///
/// # Errors
///
/// - `401 Unauthorized`: Invalid credentials
/// - `403 Forbidden`: `as_role` differs from the account's role
pub async fn login(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> ApiResult<Json<AuthResponse>> {
    req.validate()?;

    let user = state
        .users
        .find_by_email(&req.email)
        .await?
        .ok_or_else(|| ApiError::Unauthorized(INVALID_CREDENTIALS.to_string()))?;

    let valid = password::verify_password(&req.password, &user.password_hash)?;
    if !valid {
        tracing::debug!(user_id = %user.id, "Login with wrong password");
        return Err(ApiError::Unauthorized(INVALID_CREDENTIALS.to_string()));
    }

    if let Some(expected) = req.as_role {
        if expected != user.role {
            return Err(ApiError::Forbidden(format!(
                "Account does not have the {} role",
                expected
            )));
        }
    }

    Ok(Json(session(&state, user)?))
}

/// Current user profile
pub async fn me(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
) -> ApiResult<Json<UserResponse>> {
    let user = state
        .users
        .find_by_id(principal.user_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("User not found".to_string()))?;

    Ok(Json(user.into()))
}
