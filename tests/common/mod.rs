//! Common helpers for the HTTP integration tests.
//!
//! Every test builds a fresh router over in-memory repositories and drives it
//! with `tower::ServiceExt::oneshot`, so no server or database is needed.
//!
//! # Note
//!
//! Each file under `tests/` is compiled as its own crate, so helpers used by
//! only some of them would otherwise trigger dead code warnings.

#![allow(dead_code)]

use axum::Router;
use axum::body::Body;
use axum::http::{Method, Request, StatusCode, header};
use http_body_util::BodyExt;
use serde_json::{Value, json};
use tower::ServiceExt;

use tasklink_api::api::{AppConfig, AppState, create_router};
use tasklink_api::infrastructure::Repositories;

// =============================================================================
// Router Creation Helpers
// =============================================================================

/// Creates a router over empty in-memory repositories.
pub fn create_test_router() -> Router {
    create_router(AppState::from_repositories(Repositories::in_memory()))
}

/// Creates a router with a custom application configuration.
pub fn create_test_router_with_config(config: AppConfig) -> Router {
    create_router(AppState::with_config(Repositories::in_memory(), config))
}

// =============================================================================
// Request Helpers
// =============================================================================

/// Sends one request and returns the status with the decoded JSON body.
///
/// Empty bodies decode to `Value::Null`.
pub async fn send(
    router: &Router,
    method: Method,
    uri: &str,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let builder = Request::builder().method(method).uri(uri);
    let request = match body {
        Some(body) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string())),
        None => builder.body(Body::empty()),
    }
    .unwrap();

    let response = router.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, value)
}

pub async fn get(router: &Router, uri: &str) -> (StatusCode, Value) {
    send(router, Method::GET, uri, None).await
}

pub async fn post(router: &Router, uri: &str, body: Value) -> (StatusCode, Value) {
    send(router, Method::POST, uri, Some(body)).await
}

pub async fn put(router: &Router, uri: &str, body: Value) -> (StatusCode, Value) {
    send(router, Method::PUT, uri, Some(body)).await
}

pub async fn delete(router: &Router, uri: &str) -> (StatusCode, Value) {
    send(router, Method::DELETE, uri, None).await
}

/// Percent-encodes a query parameter value.
pub fn encode(value: &str) -> String {
    value
        .bytes()
        .map(|byte| match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => {
                (byte as char).to_string()
            }
            other => format!("%{other:02X}"),
        })
        .collect()
}

/// Builds `path?name=value&...` with encoded values.
pub fn with_query(path: &str, parameters: &[(&str, &str)]) -> String {
    let query = parameters
        .iter()
        .map(|(name, value)| format!("{name}={}", encode(value)))
        .collect::<Vec<_>>()
        .join("&");
    format!("{path}?{query}")
}

// =============================================================================
// Fixture Helpers
// =============================================================================

/// Creates a user through the API and returns its document.
pub async fn create_user(router: &Router, name: &str, email: &str) -> Value {
    let (status, body) = post(
        router,
        "/api/users",
        json!({ "name": name, "email": email }),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "create_user failed: {body}");
    body["data"].clone()
}

/// Creates a task through the API and returns its document.
pub async fn create_task(router: &Router, body: Value) -> Value {
    let (status, response) = post(router, "/api/tasks", body).await;
    assert_eq!(status, StatusCode::CREATED, "create_task failed: {response}");
    response["data"].clone()
}

/// Creates a pending, unassigned task with the given name and deadline.
pub async fn create_named_task(router: &Router, name: &str, deadline: &str) -> Value {
    create_task(router, json!({ "name": name, "deadline": deadline })).await
}

pub async fn fetch_task(router: &Router, id: &str) -> Value {
    let (status, body) = get(router, &format!("/api/tasks/{id}")).await;
    assert_eq!(status, StatusCode::OK, "fetch_task failed: {body}");
    body["data"].clone()
}

pub async fn fetch_user(router: &Router, id: &str) -> Value {
    let (status, body) = get(router, &format!("/api/users/{id}")).await;
    assert_eq!(status, StatusCode::OK, "fetch_user failed: {body}");
    body["data"].clone()
}

/// The `_id` of a document as a string.
pub fn id_of(document: &Value) -> String {
    document["_id"].as_str().unwrap().to_string()
}
