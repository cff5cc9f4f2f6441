//! HTTP API tests driven through the router without a socket.

use axum::Router;
use axum::body::{Body, to_bytes};
use axum::http::{Method, Request, StatusCode, header};
use conecta_server::create_app;
use conecta_server::state::Config;
use serde_json::{Value, json};
use tower::ServiceExt;

const OWNER_EMAIL: &str = "ana@conecta.test";

async fn app() -> Router {
    let config = Config {
        owner_email: Some(OWNER_EMAIL.to_string()),
        ..Config::in_memory()
    };
    let (router, _pool) = create_app(config).await.unwrap();
    router
}

async fn send(
    app: &Router,
    method: Method,
    uri: &str,
    token: Option<&str>,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let mut request = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        request = request.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }
    let request = match body {
        Some(body) => request
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => request.body(Body::empty()).unwrap(),
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, value)
}

/// Register and sign in, returning the session token.
async fn sign_up(app: &Router, email: &str, name: &str) -> String {
    let (status, user) = send(
        app,
        Method::POST,
        "/api/auth/register",
        None,
        Some(json!({ "email": email, "password": "secret123", "name": name })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "register failed: {user}");

    let (status, session) = send(
        app,
        Method::POST,
        "/api/auth/login",
        None,
        Some(json!({ "email": email, "password": "secret123" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    session["token"].as_str().unwrap().to_string()
}

#[tokio::test]
async fn health_needs_no_session() {
    let app = app().await;
    let response = app
        .clone()
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    assert_eq!(&body[..], b"OK");
}

#[tokio::test]
async fn requests_without_a_session_are_rejected() {
    let app = app().await;
    let (status, body) = send(&app, Method::GET, "/api/tasks", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert!(body["error"].is_string());

    let (status, _) = send(&app, Method::GET, "/api/users/me", Some("not-a-jwt"), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn registration_assigns_roles() {
    let app = app().await;
    let owner = sign_up(&app, OWNER_EMAIL, "Ana").await;
    let member = sign_up(&app, "carlos@conecta.test", "Carlos").await;

    let (status, me) = send(&app, Method::GET, "/api/users/me", Some(&owner), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(me["role"], "owner");

    let (_, me) = send(&app, Method::GET, "/api/users/me", Some(&member), None).await;
    assert_eq!(me["role"], "member");
    assert_eq!(me["points"], 0);
}

#[tokio::test]
async fn auth_failures_carry_friendly_messages() {
    let app = app().await;
    let (status, body) = send(
        &app,
        Method::POST,
        "/api/auth/register",
        None,
        Some(json!({ "email": "x@conecta.test", "password": "123", "name": "X" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "The password must have at least 6 characters.");

    sign_up(&app, "dup@conecta.test", "Dup").await;
    let (status, _) = send(
        &app,
        Method::POST,
        "/api/auth/register",
        None,
        Some(json!({ "email": "dup@conecta.test", "password": "secret123", "name": "Dup" })),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, body) = send(
        &app,
        Method::POST,
        "/api/auth/login",
        None,
        Some(json!({ "email": "dup@conecta.test", "password": "wrong-password" })),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "Incorrect email or password.");
}

#[tokio::test]
async fn only_owners_create_tasks() {
    let app = app().await;
    let owner = sign_up(&app, OWNER_EMAIL, "Ana").await;
    let member = sign_up(&app, "luana@conecta.test", "Luana").await;

    let task = json!({
        "title": "Ship v1",
        "channel": "#general",
        "responsible": ["@Luana"],
        "points": 30,
        "deadline": "25/12/2024"
    });

    let (status, _) = send(&app, Method::POST, "/api/tasks", Some(&member), Some(task.clone())).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, created) = send(&app, Method::POST, "/api/tasks", Some(&owner), Some(task)).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(created["status"], "pending");

    let (status, pending) = send(&app, Method::GET, "/api/tasks/pending", Some(&member), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(pending.as_array().unwrap().len(), 1);

    let id = created["id"].as_str().unwrap();
    let (status, done) = send(
        &app,
        Method::POST,
        &format!("/api/tasks/{id}/complete"),
        Some(&member),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(done["status"], "completed");

    let (_, me) = send(&app, Method::GET, "/api/users/me", Some(&member), None).await;
    assert_eq!(me["points"], 30);
}

#[tokio::test]
async fn signed_out_sessions_stop_working() {
    let app = app().await;
    let token = sign_up(&app, "mari@conecta.test", "Mari").await;

    let (status, _) = send(&app, Method::POST, "/api/auth/logout", Some(&token), None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, _) = send(&app, Method::GET, "/api/users/me", Some(&token), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn calendar_rejects_impossible_dates() {
    let app = app().await;
    let owner = sign_up(&app, OWNER_EMAIL, "Ana").await;

    let (status, _) = send(&app, Method::GET, "/api/calendar/31/2/2025", Some(&owner), None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, reminder) = send(
        &app,
        Method::POST,
        "/api/reminders",
        Some(&owner),
        Some(json!({ "title": "Kickoff", "date": "03/03/2025", "type": "meeting", "time": "10:00" })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(reminder["type"], "meeting");

    let (status, agenda) = send(&app, Method::GET, "/api/calendar/3/3/2025", Some(&owner), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(agenda["reminders"].as_array().unwrap().len(), 1);
    assert!(agenda["tasks"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn assistant_runs_in_demo_mode_without_a_key() {
    let app = app().await;
    let owner = sign_up(&app, OWNER_EMAIL, "Ana").await;

    let (status, turn) = send(
        &app,
        Method::POST,
        "/api/assistant",
        Some(&owner),
        Some(json!({ "message": "Create a task for Luana" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(turn["action"], "NO_ACTION");
    assert_eq!(turn["applied"], false);
    assert_eq!(turn["reply"]["sender"], "assistant");

    let (status, tasks) = send(&app, Method::GET, "/api/tasks", Some(&owner), None).await;
    assert_eq!(status, StatusCode::OK);
    assert!(tasks.as_array().unwrap().is_empty());
}
