//! HTTP endpoint integration tests against PostgreSQL
//!
//! Drive the full application router with `tower::ServiceExt::oneshot`.

use axum::{
    body::Body,
    http::{Method, Request, StatusCode},
    Router,
};
use serde_json::{json, Value};
use serial_test::serial;
use tower::ServiceExt;
use uuid::Uuid;

use crate::common::TestApp;

mod common;

async fn call(
    router: &Router,
    method: Method,
    uri: &str,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let builder = Request::builder().method(method).uri(uri);
    let request = match body {
        Some(body) => builder
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = router.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let json = if body.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&body).unwrap()
    };
    (status, json)
}

#[tokio::test]
#[serial]
#[ignore = "requires a PostgreSQL database (TEST_DATABASE_URL)"]
async fn test_health_check() {
    let app = TestApp::new().await.unwrap();
    let router = app.test_router();

    let response = router
        .oneshot(
            Request::builder()
                .uri("/health")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
#[serial]
#[ignore = "requires a PostgreSQL database (TEST_DATABASE_URL)"]
async fn test_user_lifecycle() {
    let app = TestApp::new().await.unwrap();
    let router = app.test_router();

    let (status, user) = call(
        &router,
        Method::POST,
        "/users",
        Some(json!({"name": "John Doe", "email": "john@x.com"})),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    let id = user["id"].as_str().unwrap().to_string();

    let (status, listed) = call(&router, Method::GET, "/users", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(listed, json!([user]));

    let (status, updated) = call(
        &router,
        Method::PUT,
        &format!("/users/{}", id),
        Some(json!({"email": "johnny@x.com"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(updated["email"], "johnny@x.com");
    assert_eq!(updated["name"], "John Doe");

    let (status, _) = call(&router, Method::DELETE, &format!("/users/{}", id), None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, body) = call(&router, Method::GET, &format!("/users/{}", id), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"]["code"], "NOT_FOUND");

    app.cleanup().await.unwrap();
}

#[tokio::test]
#[serial]
#[ignore = "requires a PostgreSQL database (TEST_DATABASE_URL)"]
async fn test_duplicate_group_name_is_conflict() {
    let app = TestApp::new().await.unwrap();
    let router = app.test_router();

    let (status, _) = call(&router, Method::POST, "/groups", Some(json!({"name": "G"}))).await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, body) = call(&router, Method::POST, "/groups", Some(json!({"name": "G"}))).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"]["code"], "CONFLICT");
    assert_eq!(app.count(r#""group""#).await.unwrap(), 1);

    app.cleanup().await.unwrap();
}

#[tokio::test]
#[serial]
#[ignore = "requires a PostgreSQL database (TEST_DATABASE_URL)"]
async fn test_group_with_users_round_trip() {
    let app = TestApp::new().await.unwrap();
    let router = app.test_router();

    let (status, created) = call(
        &router,
        Method::POST,
        "/groups/with-users",
        Some(json!({
            "group": {"name": "Engineering"},
            "users": [
                {"name": "U1", "email": "u1@x.com"},
                {"name": "U2", "email": "u2@x.com"}
            ]
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    let group_id = created["group"]["id"].as_str().unwrap().to_string();

    let (status, view) = call(
        &router,
        Method::GET,
        &format!("/groups/{}/users", group_id),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(view, created);

    let (status, _) = call(
        &router,
        Method::DELETE,
        &format!("/groups/{}/with-users", group_id),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    assert_eq!(app.count(r#""user""#).await.unwrap(), 0);
    assert_eq!(app.count(r#""group""#).await.unwrap(), 0);

    app.cleanup().await.unwrap();
}

#[tokio::test]
#[serial]
#[ignore = "requires a PostgreSQL database (TEST_DATABASE_URL)"]
async fn test_failed_aggregate_request_leaves_no_rows() {
    let app = TestApp::new().await.unwrap();
    let router = app.test_router();

    let (status, _) = call(
        &router,
        Method::POST,
        "/users/with-group",
        Some(json!({
            "user": {"name": "John", "email": "john@x.com"},
            "groupId": Uuid::now_v7()
        })),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = call(
        &router,
        Method::POST,
        "/groups/with-users",
        Some(json!({
            "group": {"name": "G"},
            "users": [
                {"name": "U1", "email": "same@x.com"},
                {"name": "U2", "email": "same@x.com"}
            ]
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);

    assert_eq!(app.count(r#""user""#).await.unwrap(), 0);
    assert_eq!(app.count(r#""group""#).await.unwrap(), 0);
    assert_eq!(app.count("user_groups").await.unwrap(), 0);

    app.cleanup().await.unwrap();
}
