//! Integration tests for the `/api/tasks` endpoints.

mod common;

use axum::http::{Method, StatusCode};
use rstest::rstest;
use serde_json::json;

use common::{
    create_named_task, create_task, create_test_router, create_user, delete, fetch_task, get, id_of,
    post, put, send,
};

// =============================================================================
// POST /api/tasks
// =============================================================================

#[rstest]
#[tokio::test]
async fn test_create_task_applies_defaults() {
    let router = create_test_router();

    let (status, body) = post(
        &router,
        "/api/tasks",
        json!({ "name": "Write report", "deadline": "2026-12-01T00:00:00.000Z" }),
    )
    .await;

    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["message"], "Task created successfully");
    let task = &body["data"];
    assert!(task["_id"].is_string());
    assert_eq!(task["name"], "Write report");
    assert_eq!(task["description"], "");
    assert_eq!(task["deadline"], "2026-12-01T00:00:00.000Z");
    assert_eq!(task["completed"], false);
    assert_eq!(task["assignedUser"], "");
    assert_eq!(task["assignedUserName"], "unassigned");
    assert!(task["dateCreated"].is_string());
}

#[rstest]
#[tokio::test]
async fn test_create_task_accepts_epoch_millis_deadline() {
    let router = create_test_router();

    let task = create_task(
        &router,
        json!({ "name": "Epoch", "deadline": 1_767_225_600_000_i64 }),
    )
    .await;

    assert_eq!(task["deadline"], "2026-01-01T00:00:00.000Z");
}

#[rstest]
#[case(json!({ "deadline": "2026-12-01" }), "name")]
#[case(json!({ "name": "   ", "deadline": "2026-12-01" }), "name")]
#[case(json!({ "name": "No deadline" }), "deadline")]
#[case(json!({ "name": "Bad deadline", "deadline": "someday" }), "deadline")]
#[case(json!({ "name": "Flag", "deadline": "2026-12-01", "completed": "maybe" }), "completed")]
#[tokio::test]
async fn test_create_task_validation_errors(
    #[case] body: serde_json::Value,
    #[case] field: &str,
) {
    let router = create_test_router();

    let (status, response) = post(&router, "/api/tasks", body).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(response["message"], "Validation Error");
    let errors = response["data"].as_array().unwrap();
    assert!(
        errors.iter().any(|error| error["field"] == field),
        "expected an error on {field}: {response}"
    );
}

#[rstest]
#[tokio::test]
async fn test_create_task_rejects_malformed_json() {
    let router = create_test_router();

    let request = axum::http::Request::builder()
        .method("POST")
        .uri("/api/tasks")
        .header("content-type", "application/json")
        .body(axum::body::Body::from("{ not json"))
        .unwrap();
    let response = tower::ServiceExt::oneshot(router, request).await.unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[rstest]
#[tokio::test]
async fn test_create_task_rejects_array_body() {
    let router = create_test_router();

    let (status, body) = post(
        &router,
        "/api/tasks",
        json!(["Write", "d", "2027-01-01", false, ""]),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "Validation Error");
    assert_eq!(body["data"][0]["field"], "body");
    let (_, listing) = get(&router, "/api/tasks").await;
    assert_eq!(listing["data"], json!([]));
}

#[rstest]
#[tokio::test]
async fn test_replace_task_rejects_array_body() {
    let router = create_test_router();
    let task = create_named_task(&router, "Write", "2027-01-01").await;
    let uri = format!("/api/tasks/{}", id_of(&task));

    let (status, body) = put(&router, &uri, json!(["Other", "d", "2027-01-01", true, ""])).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "Validation Error");
    assert_eq!(fetch_task(&router, &id_of(&task)).await["name"], "Write");
}

#[rstest]
#[tokio::test]
async fn test_create_task_with_unknown_assignee_is_rejected() {
    let router = create_test_router();

    let (status, body) = post(
        &router,
        "/api/tasks",
        json!({
            "name": "Orphan",
            "deadline": "2026-12-01",
            "assignedUser": uuid::Uuid::now_v7().to_string(),
        }),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "Validation Error");
    assert_eq!(body["data"][0]["field"], "assignedUser");
}

#[rstest]
#[tokio::test]
async fn test_create_task_with_assignee_uses_user_name() {
    let router = create_test_router();
    let user = create_user(&router, "Ada", "ada@example.com").await;

    let task = create_task(
        &router,
        json!({
            "name": "Assigned",
            "deadline": "2026-12-01",
            "assignedUser": id_of(&user),
            "assignedUserName": "Somebody Else",
        }),
    )
    .await;

    assert_eq!(task["assignedUser"], user["_id"]);
    assert_eq!(task["assignedUserName"], "Ada");
}

// =============================================================================
// GET /api/tasks/{id}
// =============================================================================

#[rstest]
#[tokio::test]
async fn test_get_task_returns_document() {
    let router = create_test_router();
    let task = create_named_task(&router, "Lookup", "2026-12-01").await;

    let (status, body) = get(&router, &format!("/api/tasks/{}", id_of(&task))).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "OK");
    assert_eq!(body["data"], task);
}

#[rstest]
#[case("not-a-uuid")]
#[case("0190a1b2-0000-7000-8000-000000000000")]
#[tokio::test]
async fn test_get_task_not_found(#[case] id: &str) {
    let router = create_test_router();

    let (status, body) = get(&router, &format!("/api/tasks/{id}")).await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["message"], "Task not found");
    assert!(body["data"].is_null());
}

// =============================================================================
// PUT /api/tasks/{id}
// =============================================================================

#[rstest]
#[tokio::test]
async fn test_replace_task_updates_fields() {
    let router = create_test_router();
    let task = create_task(
        &router,
        json!({ "name": "Draft", "description": "first", "deadline": "2026-12-01" }),
    )
    .await;
    let id = id_of(&task);

    let (status, body) = put(
        &router,
        &format!("/api/tasks/{id}"),
        json!({ "name": "Final", "deadline": "2027-01-01", "completed": true }),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "Task updated successfully");
    let updated = &body["data"];
    assert_eq!(updated["_id"], task["_id"]);
    assert_eq!(updated["name"], "Final");
    assert_eq!(updated["description"], "first");
    assert_eq!(updated["deadline"], "2027-01-01T00:00:00.000Z");
    assert_eq!(updated["completed"], true);
    assert_eq!(updated["dateCreated"], task["dateCreated"]);
    assert_eq!(fetch_task(&router, &id).await, *updated);
}

#[rstest]
#[tokio::test]
async fn test_replace_missing_task_is_not_found() {
    let router = create_test_router();

    let (status, body) = put(
        &router,
        &format!("/api/tasks/{}", uuid::Uuid::now_v7()),
        json!({ "name": "Ghost", "deadline": "2026-12-01" }),
    )
    .await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["message"], "Task not found");
}

#[rstest]
#[tokio::test]
async fn test_replace_task_with_invalid_body() {
    let router = create_test_router();
    let task = create_named_task(&router, "Keep", "2026-12-01").await;

    let (status, body) = put(
        &router,
        &format!("/api/tasks/{}", id_of(&task)),
        json!({ "name": "" }),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "Validation Error");
    assert_eq!(fetch_task(&router, &id_of(&task)).await["name"], "Keep");
}

// =============================================================================
// DELETE /api/tasks/{id}
// =============================================================================

#[rstest]
#[tokio::test]
async fn test_delete_task_returns_removed_document() {
    let router = create_test_router();
    let task = create_named_task(&router, "Disposable", "2026-12-01").await;
    let uri = format!("/api/tasks/{}", id_of(&task));

    let (status, body) = delete(&router, &uri).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "Task deleted successfully");
    assert_eq!(body["data"]["_id"], task["_id"]);

    let (status, _) = get(&router, &uri).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, body) = delete(&router, &uri).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["message"], "Task not found");
}

// =============================================================================
// Miscellaneous Routes
// =============================================================================

#[rstest]
#[tokio::test]
async fn test_health_and_index() {
    let router = create_test_router();

    let (status, body) = get(&router, "/health").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");

    let (status, body) = get(&router, "/api").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["tasks"], "/api/tasks");
    assert_eq!(body["data"]["users"], "/api/users");
}

#[rstest]
#[tokio::test]
async fn test_unknown_route_is_not_found() {
    let router = create_test_router();

    let (status, body) = get(&router, "/api/projects").await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["message"], "Route not found");
}

#[rstest]
#[tokio::test]
async fn test_unsupported_method_is_enveloped() {
    let router = create_test_router();

    let (status, body) = send(&router, Method::PATCH, "/api/tasks", Some(json!({}))).await;

    assert_eq!(status, StatusCode::METHOD_NOT_ALLOWED);
    assert_eq!(body["message"], "Method not allowed");
    assert_eq!(body["data"], json!(null));
}

#[rstest]
#[case("/api/tasks?skip=1&skip=2")]
#[case("/api/users?limit=1&limit=2")]
#[tokio::test]
async fn test_repeated_query_parameter_is_enveloped(#[case] uri: &str) {
    let router = create_test_router();

    let (status, body) = get(&router, uri).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "Invalid query string");
    assert!(body["data"].is_string());
}
