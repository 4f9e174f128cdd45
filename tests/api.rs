use axum::body::{to_bytes, Body};
use axum::http::{Method, Request, StatusCode};
use axum::Router;
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceExt;

use telemetry_query::api;
use telemetry_query::infra::config::Settings;
use telemetry_query::state::AppState;

// 默认配置没有数据库凭据，执行请求在连接阶段失败，不会写任何文件
fn app() -> Router {
    api::router(Arc::new(AppState::new(Settings::default())))
}

async fn call(app: &Router, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let builder = Request::builder().method(method).uri(uri);
    let request = match body {
        Some(body) => builder
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, value)
}

async fn validate_window(app: &Router, table: &str, start: &str, end: &str) -> Value {
    let (status, body) = call(
        app,
        Method::POST,
        &format!("/api/tables/{}/window", table),
        Some(json!({ "start": start, "end": end })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    body
}

#[tokio::test]
async fn fresh_session_previews_a_bare_select() {
    let app = app();
    let (status, body) = call(&app, Method::GET, "/api/tables/host_data/session", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["window_state"], "Unvalidated");
    assert_eq!(body["window_label"], "Validate Dates");
    assert_eq!(body["max_span_days"], 31);
    assert_eq!(body["query"]["sql"], "SELECT * FROM host_data");
}

#[tokio::test]
async fn conditions_require_a_validated_window() {
    let app = app();
    let (status, body) = call(
        &app,
        Method::POST,
        "/api/tables/job_data/conditions",
        Some(json!({ "column": "account", "operator": "=", "value": "GROUP12" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("valid time window"));
}

#[tokio::test]
async fn condition_lifecycle_drives_the_query_preview() {
    let app = app();
    let window = validate_window(&app, "job_data", "2024-01-01 00:00:00", "2024-01-10").await;
    assert_eq!(window["window_state"], "Valid");

    let (status, body) = call(
        &app,
        Method::POST,
        "/api/tables/job_data/conditions",
        Some(json!({ "column": "account", "operator": "=", "value": "group12" })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["conditions"][0]["display"], "account = 'GROUP12'");
    let id = body["conditions"][0]["id"].clone();

    let (status, query) = call(&app, Method::GET, "/api/tables/job_data/query", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        query["sql"],
        "SELECT * FROM job_data WHERE account = %s AND start_time BETWEEN %s AND %s"
    );
    assert_eq!(
        query["params"],
        json!(["GROUP12", "2024-01-01 00:00:00", "2024-01-10 00:00:00"])
    );

    let (status, body) = call(
        &app,
        Method::POST,
        "/api/tables/job_data/conditions/remove",
        Some(json!({ "ids": [id] })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["removed"], 1);
    assert_eq!(body["session"]["conditions"], json!([]));
}

#[tokio::test]
async fn invalid_values_and_operators_are_rejected() {
    let app = app();
    validate_window(&app, "host_data", "2024-01-01 00:00:00", "2024-01-02 00:00:00").await;

    let (status, body) = call(
        &app,
        Method::POST,
        "/api/tables/host_data/conditions",
        Some(json!({ "column": "host", "operator": "=", "value": "server9" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("NODE"));

    let (status, _) = call(
        &app,
        Method::POST,
        "/api/tables/host_data/conditions",
        Some(json!({ "column": "host", "operator": "BETWEEN", "value": "NODE1" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (_, session) = call(&app, Method::GET, "/api/tables/host_data/session", None).await;
    assert_eq!(session["conditions"], json!([]));
}

#[tokio::test]
async fn window_too_large_is_reported_in_the_session() {
    let app = app();
    let body = validate_window(&app, "host_data", "2024-01-01 00:00:00", "2024-03-01 00:00:00").await;
    assert_eq!(body["window_state"], "WindowTooLarge");
    assert_eq!(body["window_label"], "Time Window Too Large");
    assert_eq!(body["query"]["sql"], "SELECT * FROM host_data");

    let (status, _) = call(
        &app,
        Method::POST,
        "/api/tables/host_data/window",
        Some(json!({ "start": "yesterday", "end": "today" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn options_apply_atomically() {
    let app = app();
    let (status, body) = call(
        &app,
        Method::PUT,
        "/api/tables/job_data/options",
        Some(json!({
            "columns": ["jid", "ncores"],
            "distinct": true,
            "order_by": { "column": "ncores", "direction": "DESC" },
            "limit": 50,
            "in_clause": { "column": "jid", "values": "job1, JOB2" }
        })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        body["query"]["sql"],
        "SELECT DISTINCT jid, ncores FROM job_data WHERE jid IN (%s, %s) ORDER BY ncores DESC LIMIT 50"
    );

    let (status, _) = call(
        &app,
        Method::PUT,
        "/api/tables/job_data/options",
        Some(json!({ "in_clause": { "column": "jid", "values": "JOB1,ABC" } })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (_, session) = call(&app, Method::GET, "/api/tables/job_data/session", None).await;
    assert_eq!(session["distinct"], true);
    assert_eq!(session["limit"], 50);
}

#[tokio::test]
async fn unknown_columns_surface_as_query_errors() {
    let app = app();
    let (status, body) = call(
        &app,
        Method::PUT,
        "/api/tables/host_data/options",
        Some(json!({ "columns": ["host", "ncores"] })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["query"].is_null());
    assert!(body["query_error"].as_str().unwrap().contains("ncores"));

    let (status, _) = call(&app, Method::GET, "/api/tables/host_data/query", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn unknown_table_is_a_client_error() {
    let app = app();
    let (status, _) = call(&app, Method::GET, "/api/tables/users/session", None).await;
    assert!(status.is_client_error());
}

#[tokio::test]
async fn execute_requires_a_valid_window() {
    let app = app();
    let (status, body) = call(&app, Method::POST, "/api/tables/job_data/execute", Some(json!({}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["state"], "Failed");
}

#[tokio::test]
async fn execute_without_credentials_is_unavailable() {
    let app = app();
    validate_window(&app, "job_data", "2024-01-01", "2024-01-10").await;
    let (status, body) = call(&app, Method::POST, "/api/tables/job_data/execute", Some(json!({}))).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["state"], "Failed");
    assert!(body["error"]
        .as_str()
        .unwrap()
        .contains("database credentials are missing"));
}

#[tokio::test]
async fn execute_rejects_output_dirs_outside_the_root() {
    let app = app();
    validate_window(&app, "job_data", "2024-01-01", "2024-01-10").await;
    for dir in ["/etc", "../x"] {
        let (status, body) = call(
            &app,
            Method::POST,
            "/api/tables/job_data/execute",
            Some(json!({ "output_dir": dir })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["state"], "Failed");
        assert!(body["error"].as_str().unwrap().contains(dir));
    }
}
