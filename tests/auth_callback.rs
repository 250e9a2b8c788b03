use axum::http::StatusCode;
use httpmock::Method::POST;
use httpmock::MockServer;
use serde_json::json;
use tower::ServiceExt;

mod common;
use common::{get, location, make_app, set_cookie};

use felon_entrepreneur::config::{AuthConfig, Config, EmailConfig};

fn backend_config(server: &MockServer) -> Config {
    Config {
        auth: Some(AuthConfig {
            base_url: server.base_url(),
            client_id: Some("client".to_string()),
            client_secret: Some("secret".to_string()),
        }),
        email: Some(EmailConfig {
            api_key: "email-key".to_string(),
            base_url: Some(server.base_url()),
            from_address: "noreply@felonentrepreneur.com".to_string(),
            admin_address: "admin@felonentrepreneur.com".to_string(),
        }),
        ..Config::default()
    }
}

#[tokio::test]
async fn new_user_lands_on_name_page_with_a_session() {
    let server = MockServer::start_async().await;
    let token_mock = server
        .mock_async(|when, then| {
            when.method(POST).path("/oauth/token");
            then.status(200).json_body(json!({
                "access_token": "upstream",
                "user": {"id": "user-9", "email": "new@example.com"},
            }));
        })
        .await;
    let email_mock = server
        .mock_async(|when, then| {
            when.method(POST).path("/emails");
            then.status(200).json_body(json!({"id": "msg-1"}));
        })
        .await;

    let app = make_app(backend_config(&server)).await;
    let response = app
        .router
        .clone()
        .oneshot(get("/auth/callback?code=abc"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), "/onboarding/name");
    assert!(set_cookie(&response).starts_with("fe_session="));
    token_mock.assert_hits(1);
    email_mock.assert_hits(1);

    let profile = app.state.profiles.get("user-9").await.unwrap().unwrap();
    assert_eq!(profile.onboarding_step, Some(0));
    assert_eq!(profile.email, "new@example.com");
}

#[tokio::test]
async fn returning_user_lands_on_their_current_step() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(POST).path("/oauth/token");
            then.status(200).json_body(json!({
                "access_token": "upstream",
                "user": {"id": "user-9", "email": "new@example.com"},
            }));
        })
        .await;
    let email_mock = server
        .mock_async(|when, then| {
            when.method(POST).path("/emails");
            then.status(200).json_body(json!({"id": "msg-1"}));
        })
        .await;

    let app = make_app(backend_config(&server)).await;
    app.state
        .profiles
        .ensure_profile("user-9", "new@example.com")
        .await
        .unwrap();
    app.state.profiles.advance_step("user-9", 4).await.unwrap();

    let response = app
        .router
        .clone()
        .oneshot(get("/auth/callback?code=abc"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), "/app/home");
    // No signup notification for an existing profile.
    email_mock.assert_hits(0);
}

#[tokio::test]
async fn missing_code_redirects_to_login() {
    let server = MockServer::start_async().await;
    let app = make_app(backend_config(&server)).await;

    let response = app
        .router
        .clone()
        .oneshot(get("/auth/callback"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), "/auth/login?error=missing_code");
}

#[tokio::test]
async fn failed_exchange_redirects_to_login() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(POST).path("/oauth/token");
            then.status(401).json_body(json!({"error": "invalid_grant"}));
        })
        .await;

    let app = make_app(backend_config(&server)).await;
    let response = app
        .router
        .clone()
        .oneshot(get("/auth/callback?code=bad"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), "/auth/login?error=exchange_failed");
}

#[tokio::test]
async fn notification_failure_never_blocks_signup() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(POST).path("/oauth/token");
            then.status(200).json_body(json!({
                "access_token": "upstream",
                "user": {"id": "user-9", "email": "new@example.com"},
            }));
        })
        .await;
    let email_mock = server
        .mock_async(|when, then| {
            when.method(POST).path("/emails");
            then.status(500).json_body(json!({"error": "smtp down"}));
        })
        .await;

    let app = make_app(backend_config(&server)).await;
    let response = app
        .router
        .clone()
        .oneshot(get("/auth/callback?code=abc"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), "/onboarding/name");
    email_mock.assert_hits(1);
    assert!(app.state.profiles.get("user-9").await.unwrap().is_some());
}
