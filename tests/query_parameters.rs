//! Integration tests for `where`, `sort`, `select`, `skip`, `limit` and
//! `count` on the list endpoints.

mod common;

use axum::Router;
use axum::http::StatusCode;
use rstest::{fixture, rstest};
use serde_json::{Value, json};

use common::{
    create_named_task, create_task, create_test_router, create_test_router_with_config, get,
    with_query,
};
use tasklink_api::api::AppConfig;

/// Three tasks with distinct deadlines; "Beta" is completed.
#[fixture]
async fn seeded_router() -> Router {
    let router = create_test_router();
    create_named_task(&router, "Gamma", "2026-03-01").await;
    create_task(
        &router,
        json!({ "name": "Beta", "deadline": "2026-02-01", "completed": true }),
    )
    .await;
    create_named_task(&router, "Alpha", "2026-01-01").await;
    router
}

fn names(body: &Value) -> Vec<&str> {
    body["data"]
        .as_array()
        .unwrap()
        .iter()
        .map(|task| task["name"].as_str().unwrap())
        .collect()
}

#[rstest]
#[tokio::test]
async fn test_list_without_parameters_keeps_insertion_order(
    #[future] seeded_router: Router,
) {
    let router = seeded_router.await;

    let (status, body) = get(&router, "/api/tasks").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "OK");
    assert_eq!(names(&body), vec!["Gamma", "Beta", "Alpha"]);
}

#[rstest]
#[case(r#"{"completed": false}"#, vec!["Gamma", "Alpha"])]
#[case(r#"{"completed": true}"#, vec!["Beta"])]
#[case(r#"{"name": {"$in": ["Alpha", "Beta"]}}"#, vec!["Beta", "Alpha"])]
#[case(r#"{"name": {"$ne": "Beta"}}"#, vec!["Gamma", "Alpha"])]
#[case(r#"{"deadline": {"$lt": "2026-02-15"}}"#, vec!["Beta", "Alpha"])]
#[case(r#"{"name": {"$regex": "^a", "$options": "i"}}"#, vec!["Alpha"])]
#[case(r#"{"$or": [{"name": "Gamma"}, {"completed": true}]}"#, vec!["Gamma", "Beta"])]
#[case(r#"{"name": "Nobody"}"#, vec![])]
#[tokio::test]
async fn test_where_filters(
    #[future] seeded_router: Router,
    #[case] filter: &str,
    #[case] expected: Vec<&str>,
) {
    let router = seeded_router.await;

    let (status, body) = get(&router, &with_query("/api/tasks", &[("where", filter)])).await;

    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(names(&body), expected);
}

#[rstest]
#[case(r#"{"deadline": 1}"#, vec!["Alpha", "Beta", "Gamma"])]
#[case(r#"{"deadline": -1}"#, vec!["Gamma", "Beta", "Alpha"])]
#[case(r#"{"completed": -1, "name": 1}"#, vec!["Beta", "Alpha", "Gamma"])]
#[tokio::test]
async fn test_sort(
    #[future] seeded_router: Router,
    #[case] sort: &str,
    #[case] expected: Vec<&str>,
) {
    let router = seeded_router.await;

    let (status, body) = get(&router, &with_query("/api/tasks", &[("sort", sort)])).await;

    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(names(&body), expected);
}

#[rstest]
#[tokio::test]
async fn test_skip_and_limit_apply_after_sort(#[future] seeded_router: Router) {
    let router = seeded_router.await;

    let uri = with_query(
        "/api/tasks",
        &[("sort", r#"{"name": 1}"#), ("skip", "1"), ("limit", "1")],
    );
    let (status, body) = get(&router, &uri).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(names(&body), vec!["Beta"]);
}

#[rstest]
#[tokio::test]
async fn test_select_inclusion_keeps_id(#[future] seeded_router: Router) {
    let router = seeded_router.await;

    let uri = with_query(
        "/api/tasks",
        &[("select", r#"{"name": 1}"#), ("limit", "1")],
    );
    let (status, body) = get(&router, &uri).await;

    assert_eq!(status, StatusCode::OK);
    let task = body["data"][0].as_object().unwrap();
    let mut keys: Vec<&str> = task.keys().map(String::as_str).collect();
    keys.sort_unstable();
    assert_eq!(keys, vec!["_id", "name"]);
}

#[rstest]
#[tokio::test]
async fn test_select_exclusion(#[future] seeded_router: Router) {
    let router = seeded_router.await;

    let uri = with_query(
        "/api/tasks",
        &[("select", r#"{"_id": 0, "description": 0}"#)],
    );
    let (status, body) = get(&router, &uri).await;

    assert_eq!(status, StatusCode::OK);
    for task in body["data"].as_array().unwrap() {
        assert!(task.get("_id").is_none());
        assert!(task.get("description").is_none());
        assert!(task.get("name").is_some());
    }
}

#[rstest]
#[tokio::test]
async fn test_select_on_get_by_id() {
    let router = create_test_router();
    let task = create_named_task(&router, "Single", "2026-05-01").await;
    let id = task["_id"].as_str().unwrap();

    let uri = with_query(&format!("/api/tasks/{id}"), &[("select", r#"{"deadline": 1}"#)]);
    let (status, body) = get(&router, &uri).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        body["data"],
        json!({ "_id": id, "deadline": "2026-05-01T00:00:00.000Z" })
    );
}

#[rstest]
#[tokio::test]
async fn test_count_ignores_window(#[future] seeded_router: Router) {
    let router = seeded_router.await;

    let uri = with_query(
        "/api/tasks",
        &[
            ("where", r#"{"completed": false}"#),
            ("skip", "1"),
            ("limit", "1"),
            ("count", "true"),
        ],
    );
    let (status, body) = get(&router, &uri).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"], json!({ "count": 2 }));
}

#[rstest]
#[tokio::test]
async fn test_count_other_than_true_lists(#[future] seeded_router: Router) {
    let router = seeded_router.await;

    let (status, body) = get(&router, &with_query("/api/tasks", &[("count", "false")])).await;

    assert_eq!(status, StatusCode::OK);
    assert!(body["data"].is_array());
}

#[rstest]
#[tokio::test]
async fn test_default_task_limit() {
    let router = create_test_router_with_config(AppConfig {
        default_task_limit: Some(2),
    });
    for name in ["One", "Two", "Three"] {
        create_named_task(&router, name, "2026-01-01").await;
    }

    let (_, body) = get(&router, "/api/tasks").await;
    assert_eq!(names(&body), vec!["One", "Two"]);

    let (_, body) = get(&router, &with_query("/api/tasks", &[("limit", "0")])).await;
    assert_eq!(names(&body).len(), 3);

    let (_, body) = get(&router, &with_query("/api/tasks", &[("limit", "3")])).await;
    assert_eq!(names(&body).len(), 3);
}

#[rstest]
#[case("where", "{broken", "Invalid JSON in where")]
#[case("where", r#"{"name": {"$bogus": 1}}"#, "Invalid where clause")]
#[case("sort", "[1]", "Invalid JSON in sort")]
#[case("select", "{", "Invalid JSON in select")]
#[case("skip", "-2", "Invalid skip")]
#[case("limit", "many", "Invalid limit")]
#[tokio::test]
async fn test_malformed_parameters_are_bad_requests(
    #[case] parameter: &str,
    #[case] value: &str,
    #[case] message: &str,
) {
    let router = create_test_router();

    for path in ["/api/tasks", "/api/users"] {
        let (status, body) = get(&router, &with_query(path, &[(parameter, value)])).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "{path}: {body}");
        assert_eq!(body["message"], message);
    }
}

#[rstest]
#[tokio::test]
async fn test_user_queries_on_pending_tasks() {
    let router = create_test_router();
    let task = create_named_task(&router, "Owned", "2026-01-01").await;
    let task_id = task["_id"].as_str().unwrap();
    let (status, _) = common::post(
        &router,
        "/api/users",
        json!({ "name": "Holder", "email": "holder@example.com", "pendingTasks": [task_id] }),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    common::create_user(&router, "Idle", "idle@example.com").await;

    let filter = json!({ "pendingTasks": task_id }).to_string();
    let (status, body) = get(&router, &with_query("/api/users", &[("where", filter.as_str())])).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(names(&body), vec!["Holder"]);
}
