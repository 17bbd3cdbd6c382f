use axum::http::{HeaderName, HeaderValue, StatusCode, header};
use axum_test::multipart::{MultipartForm, Part};
use serde_json::{Value, json};

use super::common::{self, bearer};

#[tokio::test]
async fn test_health_check() {
    let app = common::spawn_app().await;

    let response = app.server.get("/health").await;

    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body["code"], "OPERATION_SUCCESSFUL");
    assert_eq!(body["message"], "Service is healthy");
    assert_eq!(body["data"]["status"], "ok");
    assert_eq!(body["data"]["version"], app.context.settings.server.version.as_str());
}

#[tokio::test]
async fn test_unknown_route_returns_envelope() {
    let app = common::spawn_app().await;

    let response = app.server.get("/no/such/thing").await;

    response.assert_status_not_found();
    let body: Value = response.json();
    assert_eq!(body["code"], "NOT_FOUND");
    assert_eq!(body["message"], "Resource not found");
}

#[tokio::test]
async fn test_non_json_body_is_rejected() {
    let app = common::spawn_app().await;

    let response = app
        .server
        .post("/auth/login")
        .add_header(header::CONTENT_TYPE, HeaderValue::from_static("text/plain"))
        .text("email=admin@example.com")
        .await;

    response.assert_status(StatusCode::UNSUPPORTED_MEDIA_TYPE);
    let body: Value = response.json();
    assert_eq!(body["code"], "BAD_REQUEST");
    assert_eq!(body["message"], "Content-Type must be application/json");
}

#[tokio::test]
async fn test_multipart_only_accepted_for_uploads() {
    let app = common::spawn_app().await;
    let token = app.access_token().await;
    let form = MultipartForm::new()
        .add_text("name", "Sneaky")
        .add_part("file", Part::bytes(b"a,b\n".to_vec()).file_name("data.csv"));

    let response = app
        .server
        .post("/tags")
        .add_header(header::AUTHORIZATION, bearer(&token))
        .multipart(form)
        .await;

    response.assert_status(StatusCode::UNSUPPORTED_MEDIA_TYPE);
}

#[tokio::test]
async fn test_json_with_charset_is_accepted() {
    let app = common::spawn_app().await;

    let response = app
        .server
        .post("/auth/login")
        .add_header(
            header::CONTENT_TYPE,
            HeaderValue::from_static("application/json; charset=utf-8"),
        )
        .bytes(
            json!({ "email": common::TEST_EMAIL, "password": common::TEST_PASSWORD })
                .to_string()
                .into(),
        )
        .await;

    response.assert_status_ok();
}

#[tokio::test]
async fn test_cors_preflight() {
    let app = common::spawn_app().await;

    let response = app
        .server
        .method(axum::http::Method::OPTIONS, "/datasets")
        .add_header(header::ORIGIN, HeaderValue::from_static("https://portal.example.org"))
        .add_header(header::ACCESS_CONTROL_REQUEST_METHOD, HeaderValue::from_static("POST"))
        .add_header(
            header::ACCESS_CONTROL_REQUEST_HEADERS,
            HeaderValue::from_static("authorization,content-type"),
        )
        .await;

    response.assert_status_ok();
    assert_eq!(response.header(header::ACCESS_CONTROL_ALLOW_ORIGIN), "*");
    assert_eq!(response.header(header::ACCESS_CONTROL_MAX_AGE), "86400");
}

#[tokio::test]
async fn test_request_id_is_generated_and_propagated() {
    let app = common::spawn_app().await;
    let request_id = HeaderName::from_static("x-request-id");

    let generated = app.server.get("/health").await;
    assert!(!generated.header(request_id.clone()).is_empty());

    let echoed = app
        .server
        .get("/health")
        .add_header(request_id.clone(), HeaderValue::from_static("trace-me-123"))
        .await;
    assert_eq!(echoed.header(request_id), "trace-me-123");
}

#[tokio::test]
async fn test_body_over_limit_is_rejected() {
    let mut settings = common::test_settings();
    settings.storage.max_upload_size = 64;
    let app = common::spawn_app_with(settings).await;

    let response = app
        .server
        .post("/auth/register")
        .json(&json!({
            "name": "x".repeat(200),
            "username": "someone",
            "email": "someone@example.com",
            "password": "long-enough-password",
        }))
        .await;

    response.assert_status_bad_request();
    assert_eq!(response.json::<Value>()["message"], "Invalid request body");
}
