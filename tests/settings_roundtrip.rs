use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use rosterd::auth::token::TokenService;
use rosterd::http::{router, AppState};
use serde_json::{json, Value};
use std::path::PathBuf;
use std::time::{SystemTime, UNIX_EPOCH};
use tower::ServiceExt;

fn temp_dir(prefix: &str) -> PathBuf {
    let p = std::env::temp_dir().join(format!(
        "{}-{}",
        prefix,
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("clock")
            .as_nanos()
    ));
    std::fs::create_dir_all(&p).expect("create temp dir");
    p
}

fn test_app() -> Router {
    let conn = rosterd::db::open_db(&temp_dir("rosterd-settings-http")).expect("open db");
    rosterd::db::seed_default_admin(&conn).expect("seed admin");
    let state = AppState::new(conn, TokenService::new("test-secret"));
    router(state)
}

async fn request(
    app: &Router,
    method: &str,
    path: &str,
    token: Option<&str>,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(path);
    if let Some(t) = token {
        builder = builder.header("authorization", format!("Bearer {t}"));
    }
    let req = match body {
        Some(v) => builder
            .header("content-type", "application/json")
            .body(Body::from(v.to_string()))
            .expect("request"),
        None => builder.body(Body::empty()).expect("request"),
    };
    let resp = app.clone().oneshot(req).await.expect("response");
    let status = resp.status();
    let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX)
        .await
        .expect("read body");
    let value: Value = if bytes.is_empty() {
        json!({})
    } else {
        serde_json::from_slice(&bytes).expect("json body")
    };
    (status, value)
}

async fn login(app: &Router, username: &str, password: &str) -> String {
    let (status, body) = request(
        app,
        "POST",
        "/api/auth/login",
        None,
        Some(json!({ "username": username, "password": password })),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "login failed: {body}");
    body["data"]["token"].as_str().expect("token").to_string()
}

#[tokio::test]
async fn admin_writes_settings_teachers_read_them() {
    let app = test_app();
    let admin = login(&app, "admin", "admin").await;

    let (status, _) = request(
        &app,
        "POST",
        "/api/auth/register",
        Some(&admin),
        Some(json!({
            "username": "teach",
            "email": "teach@example.com",
            "password": "chalk",
            "role": "teacher",
        })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let teacher = login(&app, "teach", "chalk").await;

    let (status, _) = request(
        &app,
        "PUT",
        "/api/settings/school_name",
        Some(&teacher),
        Some(json!({ "value": "Northside" })),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = request(
        &app,
        "PUT",
        "/api/settings/school_name",
        Some(&admin),
        Some(json!({ "value": "Northside" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    // Upsert: a second write replaces the value.
    let (status, _) = request(
        &app,
        "PUT",
        "/api/settings/school_name",
        Some(&admin),
        Some(json!({ "value": "Northside Elementary" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = request(&app, "GET", "/api/settings", Some(&teacher), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["school_name"], "Northside Elementary");
}
