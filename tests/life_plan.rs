use std::time::Duration;

use axum::http::StatusCode;
use serde_json::json;
use tower::ServiceExt;

mod common;
use common::{authed_get, authed_post, body_json, make_app, seed_session};

use felon_entrepreneur::config::Config;
use felon_entrepreneur::generation::GenerationJob;
use felon_entrepreneur::interfaces::scheduler::ScheduledJob;

fn generation_job(state: &felon_entrepreneur::daemon::AppState) -> GenerationJob {
    GenerationJob::new(
        state.profiles.clone(),
        state.answers.clone(),
        state.life_plans.clone(),
        Duration::from_secs(60),
    )
}

#[tokio::test]
async fn generate_enqueues_then_job_completes_it() {
    let app = make_app(Config::default()).await;
    let token = seed_session(&app.state, "user-1", "dee@example.com").await;
    app.state
        .profiles
        .set_preferred_name("user-1", "Dee")
        .await
        .unwrap();
    app.router
        .clone()
        .oneshot(authed_post(
            "/api/onboarding/answers",
            &token,
            &json!({"question": "goal", "value": "steady work"}),
        ))
        .await
        .unwrap();

    let response = app
        .router
        .clone()
        .oneshot(authed_get("/api/life-plan/status", &token))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let response = app
        .router
        .clone()
        .oneshot(authed_post("/api/life-plan/generate", &token, &json!({})))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::ACCEPTED);
    assert_eq!(body_json(response).await["status"], "queued");

    let response = app
        .router
        .clone()
        .oneshot(authed_get("/api/life-plan/status", &token))
        .await
        .unwrap();
    assert_eq!(body_json(response).await["status"], "queued");

    generation_job(&app.state).run().await.unwrap();

    let response = app
        .router
        .clone()
        .oneshot(authed_get("/api/life-plan/status", &token))
        .await
        .unwrap();
    assert_eq!(body_json(response).await["status"], "complete");

    let response = app
        .router
        .clone()
        .oneshot(authed_get("/api/life-plan/summary", &token))
        .await
        .unwrap();
    let value = body_json(response).await;
    assert_eq!(value["status"], "complete");
    assert_eq!(value["title"], "A first-year plan for Dee");
    assert!(value["summary"].as_str().unwrap().contains("Dee"));
}

#[tokio::test]
async fn generate_is_idempotent_once_complete() {
    let app = make_app(Config::default()).await;
    let token = seed_session(&app.state, "user-1", "dee@example.com").await;

    app.router
        .clone()
        .oneshot(authed_post("/api/life-plan/generate", &token, &json!({})))
        .await
        .unwrap();
    generation_job(&app.state).run().await.unwrap();

    let first = app
        .state
        .life_plans
        .current_version("user-1")
        .await
        .unwrap()
        .unwrap();

    let response = app
        .router
        .clone()
        .oneshot(authed_post("/api/life-plan/generate", &token, &json!({})))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["status"], "complete");

    let second = app
        .state
        .life_plans
        .current_version("user-1")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(first.id, second.id);
}

#[tokio::test]
async fn queued_versions_are_claimed_exactly_once() {
    let app = make_app(Config::default()).await;
    app.state
        .profiles
        .ensure_profile("user-a", "a@example.com")
        .await
        .unwrap();
    app.state
        .profiles
        .ensure_profile("user-b", "b@example.com")
        .await
        .unwrap();

    app.state.life_plans.enqueue_version("user-a").await.unwrap();
    app.state.life_plans.enqueue_version("user-b").await.unwrap();

    let first = app.state.life_plans.claim_next().await.unwrap().unwrap();
    let second = app.state.life_plans.claim_next().await.unwrap().unwrap();
    assert_ne!(first.id, second.id);
    assert_eq!(first.status, "processing");
    assert_eq!(second.status, "processing");
    assert!(app.state.life_plans.claim_next().await.unwrap().is_none());
}

#[tokio::test]
async fn generation_fails_cleanly_without_a_profile() {
    let app = make_app(Config::default()).await;
    app.state.life_plans.enqueue_version("ghost").await.unwrap();

    generation_job(&app.state).run().await.unwrap();

    let version = app
        .state
        .life_plans
        .current_version("ghost")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(version.status, "failed");
    assert_eq!(version.error.as_deref(), Some("no profile for user"));
}

#[tokio::test]
async fn failed_plan_can_be_regenerated() {
    let app = make_app(Config::default()).await;
    let token = seed_session(&app.state, "user-1", "dee@example.com").await;

    let queued = app.state.life_plans.enqueue_version("user-1").await.unwrap();
    let claimed = app.state.life_plans.claim_next().await.unwrap().unwrap();
    assert_eq!(claimed.id, queued.id);
    app.state
        .life_plans
        .fail_version(claimed.id, "backend offline")
        .await
        .unwrap();

    let response = app
        .router
        .clone()
        .oneshot(authed_get("/api/life-plan/status", &token))
        .await
        .unwrap();
    assert_eq!(body_json(response).await["status"], "error");

    // A fresh generate call replaces the failed version with a new queued one.
    let response = app
        .router
        .clone()
        .oneshot(authed_post("/api/life-plan/generate", &token, &json!({})))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::ACCEPTED);
    let current = app
        .state
        .life_plans
        .current_version("user-1")
        .await
        .unwrap()
        .unwrap();
    assert_ne!(current.id, claimed.id);
    assert_eq!(current.status, "queued");
}
