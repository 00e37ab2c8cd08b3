/// Integration tests for the Reltrack API
///
/// These tests drive the full router end-to-end against the in-memory store
/// and a stub registry:
/// - Account registration, login and the session gate
/// - Release listing scope and owner/admin checks
/// - Manifest scanning over multipart upload
/// - Importing scan rows, including idempotence and partial failure

mod common;

use axum::http::StatusCode;
use common::{json_request, upload_request, TestContext, TEST_PASSWORD};
use reltrack_shared::store::{ReleaseStore, UserStore};
use serde_json::{json, Value};

async fn create_release(ctx: &TestContext, project: &str, version: &str, owner: Option<&str>) -> Value {
    let mut body = json!({ "project_name": project, "version": version });
    if let Some(owner) = owner {
        body["owner_id"] = json!(owner);
    }

    let (status, release) = ctx
        .send(json_request("POST", "/v1/releases", Some(&ctx.admin_token), Some(body)))
        .await;
    assert_eq!(status, StatusCode::CREATED, "{}", release);
    release
}

#[tokio::test]
async fn test_health() {
    let ctx = TestContext::new().await;

    let (status, body) = ctx.send(json_request("GET", "/health", None, None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["database"], "connected");
}

#[tokio::test]
async fn test_register_then_me() {
    let ctx = TestContext::new().await;

    let (status, body) = ctx
        .send(json_request(
            "POST",
            "/v1/auth/register",
            None,
            Some(json!({
                "name": "Ada",
                "email": "Ada@Example.com",
                "password": "long enough password"
            })),
        ))
        .await;
    assert_eq!(status, StatusCode::CREATED, "{}", body);
    assert_eq!(body["user"]["email"], "ada@example.com");
    assert_eq!(body["user"]["role"], "user");
    assert!(body["user"].get("password_hash").is_none());

    let token = body["access_token"].as_str().unwrap().to_string();
    let (status, me) = ctx
        .send(json_request("GET", "/v1/auth/me", Some(&token), None))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(me["email"], "ada@example.com");
    assert_eq!(me["name"], "Ada");
}

#[tokio::test]
async fn test_register_rejections() {
    let ctx = TestContext::new().await;

    let (status, body) = ctx
        .send(json_request(
            "POST",
            "/v1/auth/register",
            None,
            Some(json!({
                "name": "Mallory",
                "email": "mallory@example.com",
                "password": "long enough password",
                "role": "admin"
            })),
        ))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"], "forbidden");
    assert!(ctx.store.find_by_email("mallory@example.com").await.unwrap().is_none());

    let (status, _) = ctx
        .send(json_request(
            "POST",
            "/v1/auth/register",
            None,
            Some(json!({
                "name": "Dup",
                "email": "USER@example.com",
                "password": "long enough password"
            })),
        ))
        .await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, body) = ctx
        .send(json_request(
            "POST",
            "/v1/auth/register",
            None,
            Some(json!({
                "name": "Bad",
                "email": "not-an-email",
                "password": "short"
            })),
        ))
        .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["error"], "validation_error");
    assert_eq!(body["details"][0]["field"], "email");
}

#[tokio::test]
async fn test_login() {
    let ctx = TestContext::new().await;

    let (status, body) = ctx
        .send(json_request(
            "POST",
            "/v1/auth/login",
            None,
            Some(json!({ "email": "user@example.com", "password": TEST_PASSWORD })),
        ))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["access_token"].is_string());
    assert_eq!(body["user"]["role"], "user");

    let (wrong_password, body) = ctx
        .send(json_request(
            "POST",
            "/v1/auth/login",
            None,
            Some(json!({ "email": "user@example.com", "password": "nope nope nope" })),
        ))
        .await;
    assert_eq!(wrong_password, StatusCode::UNAUTHORIZED);
    let message = body["message"].clone();

    let (unknown_email, body) = ctx
        .send(json_request(
            "POST",
            "/v1/auth/login",
            None,
            Some(json!({ "email": "ghost@example.com", "password": TEST_PASSWORD })),
        ))
        .await;
    assert_eq!(unknown_email, StatusCode::UNAUTHORIZED);
    assert_eq!(body["message"], message);

    let (status, _) = ctx
        .send(json_request(
            "POST",
            "/v1/auth/login",
            None,
            Some(json!({
                "email": "user@example.com",
                "password": TEST_PASSWORD,
                "as_role": "admin"
            })),
        ))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_session_required() {
    let ctx = TestContext::new().await;

    let (status, body) = ctx.send(json_request("GET", "/v1/releases", None, None)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "unauthorized");

    let (status, _) = ctx
        .send(json_request("GET", "/v1/releases", Some("not.a.jwt"), None))
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_release_scope_and_ownership() {
    let ctx = TestContext::new().await;
    let user_id = ctx.user.id.to_string();

    let mine = create_release(&ctx, "requests", "2.31.0", Some(&user_id)).await;
    let theirs = create_release(&ctx, "flask", "3.0.0", None).await;
    assert_eq!(theirs["owner_id"], json!(ctx.admin.id.to_string()));

    // Users see only their own releases, admins see everything
    let (status, listed) = ctx
        .send(json_request("GET", "/v1/releases", Some(&ctx.user_token), None))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(listed.as_array().unwrap().len(), 1);
    assert_eq!(listed[0]["id"], mine["id"]);

    let (_, listed) = ctx
        .send(json_request("GET", "/v1/releases", Some(&ctx.admin_token), None))
        .await;
    assert_eq!(listed.as_array().unwrap().len(), 2);

    // Only admins record releases by hand
    let (status, _) = ctx
        .send(json_request(
            "POST",
            "/v1/releases",
            Some(&ctx.user_token),
            Some(json!({ "project_name": "django", "version": "5.0" })),
        ))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    // Owner may change status; any status may follow any other
    let uri = format!("/v1/releases/{}", mine["id"].as_str().unwrap());
    let (status, updated) = ctx
        .send(json_request("PATCH", &uri, Some(&ctx.user_token), Some(json!({ "status": "Archived" }))))
        .await;
    assert_eq!(status, StatusCode::OK, "{}", updated);
    assert_eq!(updated["status"], "Archived");

    let (status, updated) = ctx
        .send(json_request("PATCH", &uri, Some(&ctx.user_token), Some(json!({ "status": "In Development" }))))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(updated["status"], "In Development");

    // But not on someone else's release
    let other_uri = format!("/v1/releases/{}", theirs["id"].as_str().unwrap());
    let (status, _) = ctx
        .send(json_request("PATCH", &other_uri, Some(&ctx.user_token), Some(json!({ "status": "Released" }))))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = ctx
        .send(json_request("DELETE", &other_uri, Some(&ctx.user_token), None))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_missing_release_is_not_found_before_forbidden() {
    let ctx = TestContext::new().await;
    let uri = format!("/v1/releases/{}", uuid::Uuid::new_v4());

    let (status, body) = ctx
        .send(json_request("PATCH", &uri, Some(&ctx.user_token), Some(json!({ "status": "Released" }))))
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "not_found");

    let (status, _) = ctx.send(json_request("DELETE", &uri, Some(&ctx.admin_token), None)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_delete_release() {
    let ctx = TestContext::new().await;
    let release = create_release(&ctx, "numpy", "1.26.0", None).await;
    let uri = format!("/v1/releases/{}", release["id"].as_str().unwrap());

    let (status, body) = ctx.send(json_request("DELETE", &uri, Some(&ctx.admin_token), None)).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    assert_eq!(body, Value::Null);

    let (status, _) = ctx.send(json_request("DELETE", &uri, Some(&ctx.admin_token), None)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_scan_requirements_upload() {
    let ctx = TestContext::new().await;
    let manifest = "# deps\nrequests==2.28.0\nmissing-pkg>=1.0\n-r other.txt\nflask\n";

    let (status, body) = ctx
        .send(upload_request(&ctx.user_token, "requirements.txt", "text/plain", manifest))
        .await;
    assert_eq!(status, StatusCode::OK, "{}", body);
    assert_eq!(body["filename"], "requirements.txt");

    let rows = body["rows"].as_array().unwrap();
    let names: Vec<&str> = rows.iter().map(|r| r["name"].as_str().unwrap()).collect();
    assert_eq!(names, vec!["requests", "missing-pkg", "flask"]);

    assert_eq!(rows[0]["spec"], "==2.28.0");
    assert_eq!(rows[0]["latest_version"], "2.31.0");
    assert_eq!(rows[0]["lookup"], "resolved");

    assert_eq!(rows[1]["lookup"], "not_found");
    assert_eq!(rows[1]["latest_version"], Value::Null);
    assert_eq!(rows[1]["repo_url"], Value::Null);

    // Scans are read-only
    assert_eq!(ctx.store.release_count().await, 0);
}

#[tokio::test]
async fn test_scan_pyproject_by_content_type() {
    let ctx = TestContext::new().await;
    let manifest = "[project]\nname = \"demo\"\ndependencies = [\"httpx>=0.25\", \"rich\"]\n";

    let (status, body) = ctx
        .send(upload_request(&ctx.user_token, "upload", "application/toml", manifest))
        .await;
    assert_eq!(status, StatusCode::OK, "{}", body);

    let rows = body["rows"].as_array().unwrap();
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0]["name"], "httpx");
    assert_eq!(rows[0]["spec"], ">=0.25");
}

#[tokio::test]
async fn test_scan_errors() {
    let ctx = TestContext::new().await;

    let (status, body) = ctx
        .send(upload_request(&ctx.user_token, "setup.py", "text/x-python", "from setuptools import setup\n"))
        .await;
    assert_eq!(status, StatusCode::UNSUPPORTED_MEDIA_TYPE);
    assert_eq!(body["error"], "unsupported_format");

    let (status, body) = ctx
        .send(upload_request(&ctx.user_token, "pyproject.toml", "application/toml", "[project\nbroken"))
        .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["error"], "malformed_manifest");

    let (status, body) = ctx
        .send(upload_request(&ctx.user_token, "requirements.txt", "text/plain", "offline-a\noffline-b\n"))
        .await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["error"], "service_unavailable");

    let (status, _) = ctx
        .send(upload_request("bogus", "requirements.txt", "text/plain", "requests\n"))
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_scan_then_import_is_idempotent() {
    let ctx = TestContext::new().await;

    let (_, scan) = ctx
        .send(upload_request(&ctx.admin_token, "requirements.txt", "text/plain", "requests==2.28.0\nmissing-thing>=3.1\n"))
        .await;
    let rows = scan["rows"].clone();

    let request = json!({ "rows": rows, "status": "In Development" });
    let (status, report) = ctx
        .send(json_request("POST", "/v1/releases/import-scan", Some(&ctx.admin_token), Some(request.clone())))
        .await;
    assert_eq!(status, StatusCode::OK, "{}", report);

    let outcomes = report["rows"].as_array().unwrap();
    assert_eq!(outcomes.len(), 2);
    assert_eq!(outcomes[0]["outcome"], "created");
    assert_eq!(outcomes[0]["version"], "2.31.0");
    assert_eq!(outcomes[0]["detail"]["status"], "In Development");
    // Unresolved row falls back to the version in its specifier
    assert_eq!(outcomes[1]["version"], "3.1");

    let (status, report) = ctx
        .send(json_request("POST", "/v1/releases/import-scan", Some(&ctx.admin_token), Some(request)))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert!(report["rows"]
        .as_array()
        .unwrap()
        .iter()
        .all(|r| r["outcome"] == "skipped"));

    assert_eq!(ctx.store.release_count().await, 2);
}

#[tokio::test]
async fn test_import_rejections() {
    let ctx = TestContext::new().await;
    let rows = json!([{ "name": "requests", "spec": "==2.28.0", "latest_version": "2.31.0" }]);

    let (status, _) = ctx
        .send(json_request(
            "POST",
            "/v1/releases/import-scan",
            Some(&ctx.user_token),
            Some(json!({ "rows": rows })),
        ))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = ctx
        .send(json_request(
            "POST",
            "/v1/releases/import-scan",
            Some(&ctx.user_token),
            Some(json!({ "rows": [] })),
        ))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = ctx
        .send(json_request(
            "POST",
            "/v1/releases/import-scan",
            Some(&ctx.admin_token),
            Some(json!({ "rows": [] })),
        ))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "bad_request");

    assert_eq!(ctx.store.release_count().await, 0);
}

#[tokio::test]
async fn test_import_forbidden_before_body_is_read() {
    let ctx = TestContext::new().await;
    let bad_status = json!({ "rows": [{ "name": "alpha" }], "status": "Shipped" });

    // A non-admin is refused whatever the body holds
    let (status, body) = ctx
        .send(json_request(
            "POST",
            "/v1/releases/import-scan",
            Some(&ctx.user_token),
            Some(bad_status.clone()),
        ))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"], "forbidden");

    let (status, body) = ctx
        .send(json_request(
            "POST",
            "/v1/releases/import-scan",
            Some(&ctx.user_token),
            Some(json!("not an import")),
        ))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"], "forbidden");

    // An admin gets the JSON error body for the same payload
    let (status, body) = ctx
        .send(json_request(
            "POST",
            "/v1/releases/import-scan",
            Some(&ctx.admin_token),
            Some(bad_status),
        ))
        .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["error"], "validation_error");
    assert_eq!(body["details"][0]["field"], "body");

    assert_eq!(ctx.store.release_count().await, 0);
}

#[tokio::test]
async fn test_partial_import_reports_every_row() {
    let ctx = TestContext::new().await;
    let rows = json!([
        { "name": "requests", "latest_version": "2.31.0" },
        { "name": "   ", "latest_version": "1.0" }
    ]);

    let (status, body) = ctx
        .send(json_request(
            "POST",
            "/v1/releases/import-scan",
            Some(&ctx.admin_token),
            Some(json!({ "rows": rows })),
        ))
        .await;
    assert_eq!(status, StatusCode::MULTI_STATUS, "{}", body);
    assert_eq!(body["error"], "partial_import");

    let report = body["details"]["rows"].as_array().unwrap();
    assert_eq!(report[0]["outcome"], "created");
    assert_eq!(report[1]["outcome"], "failed");

    // The good row stays imported
    let found = ctx
        .store
        .find_by_project_and_version("requests", "2.31.0")
        .await
        .unwrap();
    assert!(found.is_some());
}

#[tokio::test]
async fn test_admin_user_management() {
    let ctx = TestContext::new().await;

    let (status, _) = ctx
        .send(json_request("GET", "/v1/admin/users", Some(&ctx.user_token), None))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, users) = ctx
        .send(json_request("GET", "/v1/admin/users", Some(&ctx.admin_token), None))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(users.as_array().unwrap().len(), 2);

    let owned = create_release(&ctx, "pandas", "2.1.0", Some(&ctx.user.id.to_string())).await;

    let uri = format!("/v1/admin/users/{}", ctx.user.id);
    let (status, _) = ctx.send(json_request("DELETE", &uri, Some(&ctx.admin_token), None)).await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    // The deleted user's session dies with the account
    let (status, _) = ctx
        .send(json_request("GET", "/v1/auth/me", Some(&ctx.user_token), None))
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    // Their release survives without an owner
    let id = owned["id"].as_str().unwrap().parse().unwrap();
    let release = ReleaseStore::find_by_id(&ctx.store, id).await.unwrap().unwrap();
    assert_eq!(release.owner_id, None);

    let (status, _) = ctx.send(json_request("DELETE", &uri, Some(&ctx.admin_token), None)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let self_uri = format!("/v1/admin/users/{}", ctx.admin.id);
    let (status, _) = ctx.send(json_request("DELETE", &self_uri, Some(&ctx.admin_token), None)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}
