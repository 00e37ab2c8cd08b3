//! Common test utilities for integration tests
//!
//! This module provides shared infrastructure for integration tests:
//! - An in-memory store and a scripted registry, so no database or network
//! - Test admin/user creation with session tokens
//! - Request helpers for JSON and multipart bodies

#![allow(dead_code)]

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use axum::Router;
use chrono::{TimeZone, Utc};
use reltrack_api::app::{build_router, AppState};
use reltrack_api::config::Config;
use reltrack_shared::auth::password;
use reltrack_shared::models::user::{CreateUser, User, UserRole};
use reltrack_shared::registry::{LookupError, PackageMetadata, RegistryLookup};
use reltrack_shared::store::{MemoryStore, UserStore};
use serde_json::Value;
use std::sync::Arc;
use tower::ServiceExt;

pub const TEST_SECRET: &str = "integration-test-secret-of-at-least-32-bytes";
pub const TEST_PASSWORD: &str = "correct horse battery";

const BOUNDARY: &str = "reltrack-test-boundary";

/// Registry stand-in
///
/// - names starting with `missing` → not found
/// - names starting with `offline` → registry unreachable
/// - anything else resolves to `1.0.0`, except `requests` (`2.31.0`)
pub struct StubRegistry;

#[async_trait]
impl RegistryLookup for StubRegistry {
    fn name(&self) -> &str {
        "stub"
    }

    async fn lookup(&self, package: &str) -> Result<PackageMetadata, LookupError> {
        if package.starts_with("missing") {
            return Err(LookupError::NotFound(package.to_string()));
        }
        if package.starts_with("offline") {
            return Err(LookupError::Unreachable("connection refused".to_string()));
        }

        let latest_version = if package == "requests" { "2.31.0" } else { "1.0.0" };
        Ok(PackageMetadata {
            latest_version: latest_version.to_string(),
            release_date: Some(Utc.with_ymd_and_hms(2023, 5, 22, 15, 12, 42).unwrap()),
            repo_url: Some(format!("https://github.com/example/{}", package)),
            index_url: Some(format!("https://pypi.org/project/{}/", package)),
            homepage: None,
        })
    }
}

/// Test context containing all necessary resources
pub struct TestContext {
    pub store: MemoryStore,
    pub app: Router,
    pub state: AppState,
    pub admin: User,
    pub admin_token: String,
    pub user: User,
    pub user_token: String,
}

impl TestContext {
    /// Creates a context with one admin and one regular user
    pub async fn new() -> Self {
        let config = Config::from_vars(|key| match key {
            "JWT_SECRET" => Some(TEST_SECRET.to_string()),
            _ => None,
        })
        .expect("Test config should load");

        let store = MemoryStore::new();
        let state = AppState::new(
            config,
            Arc::new(store.clone()),
            Arc::new(store.clone()),
            Arc::new(StubRegistry),
        );
        let app = build_router(state.clone());

        let admin = create_user(&store, "admin@example.com", UserRole::Admin).await;
        let user = create_user(&store, "user@example.com", UserRole::User).await;

        let admin_token = state.gate.issue(&admin).expect("Failed to issue admin token");
        let user_token = state.gate.issue(&user).expect("Failed to issue user token");

        Self {
            store,
            app,
            state,
            admin,
            admin_token,
            user,
            user_token,
        }
    }

    /// Sends a request through the router and decodes the JSON body
    ///
    /// Empty bodies decode to `Value::Null`.
    pub async fn send(&self, request: Request<Body>) -> (StatusCode, Value) {
        let response = self.app.clone().oneshot(request).await.expect("Router failed");
        let status = response.status();
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("Failed to read body");

        let json = if body.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&body).unwrap_or_else(|_| {
                panic!("Non-JSON body ({}): {}", status, String::from_utf8_lossy(&body))
            })
        };
        (status, json)
    }
}

/// Creates a user directly in the store
pub async fn create_user(store: &MemoryStore, email: &str, role: UserRole) -> User {
    UserStore::create(
        store,
        CreateUser {
            name: email.split('@').next().unwrap_or("user").to_string(),
            email: email.to_string(),
            password_hash: password::hash_password(TEST_PASSWORD).expect("Hash should succeed"),
            role,
        },
    )
    .await
    .expect("Failed to create test user")
}

/// Builds a request with an optional bearer token and JSON body
pub fn json_request(method: &str, uri: &str, token: Option<&str>, body: Option<Value>) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
    }

    match body {
        Some(body) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    }
}

/// Builds a multipart upload with a single `file` part
pub fn upload_request(token: &str, filename: &str, content_type: &str, content: &str) -> Request<Body> {
    let body = format!(
        "--{b}\r\n\
         Content-Disposition: form-data; name=\"file\"; filename=\"{f}\"\r\n\
         Content-Type: {ct}\r\n\
         \r\n\
         {c}\r\n\
         --{b}--\r\n",
        b = BOUNDARY,
        f = filename,
        ct = content_type,
        c = content,
    );

    Request::builder()
        .method("POST")
        .uri("/v1/scan")
        .header(header::AUTHORIZATION, format!("Bearer {}", token))
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={}", BOUNDARY),
        )
        .body(Body::from(body))
        .unwrap()
}
