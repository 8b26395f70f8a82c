//! Request pipeline tests driven through the full router with
//! `tower::ServiceExt::oneshot`. These exercise the paths that resolve
//! before any query runs: auth rejection, body validation, rate limiting.

use axum::body::{to_bytes, Body};
use axum::http::{header, Request, StatusCode};
use axum::response::Response;
use axum::Router;
use serde_json::{json, Value};
use tower::ServiceExt;
use uuid::Uuid;

use fintrack::app::app;
use fintrack::auth::{generate_token, Claims};
use fintrack::config::AppConfig;
use fintrack::database::models::Role;
use fintrack::state::AppState;

fn test_app() -> Router {
    app(AppState::fake(AppConfig::test()))
}

async fn body_json(response: Response) -> Value {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

fn post_json(uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

#[tokio::test]
async fn test_root_reports_service_metadata() {
    let response = test_app().oneshot(get("/")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["name"], "fintrack");
}

#[tokio::test]
async fn test_unknown_route_is_404() {
    let response = test_app().oneshot(get("/api/nope")).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_protected_route_requires_token() {
    let response = test_app().oneshot(get("/api/transactions")).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let body = body_json(response).await;
    assert_eq!(body["success"], false);
    assert_eq!(body["message"], "Missing Authorization header");
}

#[tokio::test]
async fn test_non_bearer_scheme_rejected() {
    let request = Request::builder()
        .uri("/api/transactions")
        .header(header::AUTHORIZATION, "Basic dXNlcjpwYXNz")
        .body(Body::empty())
        .unwrap();
    let response = test_app().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_expired_token_rejected() {
    let config = AppConfig::test();
    let token = generate_token(
        &Claims::new(Uuid::new_v4(), Role::User, -1),
        &config.security.jwt_secret,
    )
    .unwrap();

    let request = Request::builder()
        .uri("/api/analytics/dashboard")
        .header(header::AUTHORIZATION, format!("Bearer {}", token))
        .body(Body::empty())
        .unwrap();
    let response = app(AppState::fake(config)).oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let body = body_json(response).await;
    assert_eq!(body["message"], "Token expired");
}

#[tokio::test]
async fn test_garbage_token_rejected() {
    let request = Request::builder()
        .uri("/api/categories")
        .header(header::AUTHORIZATION, "Bearer not.a.jwt")
        .body(Body::empty())
        .unwrap();
    let response = test_app().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let body = body_json(response).await;
    assert_eq!(body["message"], "Invalid token");
}

#[tokio::test]
async fn test_login_validation_reports_fields() {
    let request = post_json("/api/auth/login", json!({ "email": "", "password": "" }));
    let response = test_app().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = body_json(response).await;
    assert_eq!(body["success"], false);
    assert!(body["errors"]["email"].is_string());
    assert!(body["errors"]["password"].is_string());
}

#[tokio::test]
async fn test_register_validation_reports_fields() {
    let request = post_json(
        "/api/auth/register",
        json!({ "email": "not-an-email", "password": "short", "name": "" }),
    );
    let response = test_app().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = body_json(response).await;
    assert!(body["errors"]["email"].is_string());
    assert!(body["errors"]["password"].is_string());
    assert!(body["errors"]["name"].is_string());
}

#[tokio::test]
async fn test_auth_rate_limit_kicks_in() {
    let mut config = AppConfig::test();
    config.rate_limit.enabled = true;
    let app = app(AppState::fake(config));

    // Auth window admits 5 attempts; all are malformed so they stop at
    // validation and never reach the pool.
    for _ in 0..5 {
        let request = post_json("/api/auth/login", json!({ "email": "", "password": "" }));
        let response = app.clone().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    let request = post_json("/api/auth/login", json!({ "email": "", "password": "" }));
    let response = app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
    let body = body_json(response).await;
    assert_eq!(body["success"], false);
    assert!(body["message"].as_str().unwrap().starts_with("Too many requests"));
}

#[tokio::test]
async fn test_rate_limit_disabled_in_test_preset() {
    let app = test_app();
    for _ in 0..8 {
        let request = post_json("/api/auth/login", json!({ "email": "", "password": "" }));
        let response = app.clone().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
}
