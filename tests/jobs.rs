use std::sync::Arc;

use axum::http::StatusCode;
use httpmock::Method::GET;
use httpmock::MockServer;
use serde_json::json;
use tower::ServiceExt;

mod common;
use common::{authed_get, body_json, make_app, seed_session, with_stub_jobs, StubJobSearch};

use felon_entrepreneur::config::{Config, JobSearchConfig};
use felon_entrepreneur::tiers::Tier;

#[tokio::test]
async fn search_goes_through_the_hosted_api_with_zip_coordinates() {
    let server = MockServer::start_async().await;
    let search_mock = server
        .mock_async(|when, then| {
            when.method(GET)
                .path("/search")
                .header("x-rapidapi-key", "jobs-key")
                .header("x-rapidapi-host", "jobs.example.com")
                .query_param("query", "line cook")
                .query_param("lat", "27.9506")
                .query_param("lng", "-82.4572");
            then.status(200).json_body(json!({
                "data": (0..7).map(|idx| json!({
                    "job_id": format!("j{idx}"),
                    "job_title": format!("Line Cook {idx}"),
                    "employer_name": "Diner",
                    "job_city": "Tampa",
                    "job_state": "FL",
                })).collect::<Vec<_>>(),
            }));
        })
        .await;

    let config = Config {
        jobs: Some(JobSearchConfig {
            api_key: "jobs-key".to_string(),
            api_host: "jobs.example.com".to_string(),
            base_url: Some(server.base_url()),
        }),
        ..Config::default()
    };
    let app = make_app(config).await;
    let token = seed_session(&app.state, "user-1", "dee@example.com").await;
    app.state
        .profiles
        .set_zip_code("user-1", "33602")
        .await
        .unwrap();

    let response = app
        .router
        .clone()
        .oneshot(authed_get("/api/jobs/search?query=line%20cook", &token))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let value = body_json(response).await;
    // Starter tier clamps the seven upstream postings to five.
    assert_eq!(value["count"], 5);
    assert_eq!(value["jobs"][0]["location"], "Tampa, FL");
    search_mock.assert_hits(1);
}

#[tokio::test]
async fn tier_quota_drives_the_search_limit() {
    let app = make_app(Config::default()).await;
    let stub = Arc::new(StubJobSearch::new());
    let (router, state) = with_stub_jobs(app.state.clone(), stub.clone());
    let token = seed_session(&state, "user-1", "dee@example.com").await;

    let response = router
        .clone()
        .oneshot(authed_get("/api/jobs/search?query=driver", &token))
        .await
        .unwrap();
    assert_eq!(body_json(response).await["count"], 5);

    state.profiles.set_tier("user-1", Tier::Pro).await.unwrap();
    let response = router
        .clone()
        .oneshot(authed_get("/api/jobs/search?query=driver", &token))
        .await
        .unwrap();
    assert_eq!(body_json(response).await["count"], 50);

    let last = stub.last.lock().await.clone();
    let (query, near, limit) = last.unwrap();
    assert_eq!(query, "driver");
    assert!(near.is_none());
    assert_eq!(limit, 50);
}

#[tokio::test]
async fn unknown_zip_falls_back_to_keyword_search() {
    let app = make_app(Config::default()).await;
    let stub = Arc::new(StubJobSearch::new());
    let (router, state) = with_stub_jobs(app.state.clone(), stub.clone());
    let token = seed_session(&state, "user-1", "dee@example.com").await;

    let response = router
        .clone()
        .oneshot(authed_get("/api/jobs/search?query=cook&zip=00000", &token))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let last = stub.last.lock().await.clone();
    let (_, near, _) = last.unwrap();
    assert!(near.is_none());
}

#[tokio::test]
async fn blank_query_and_missing_provider_are_rejected() {
    let app = make_app(Config::default()).await;
    let token = seed_session(&app.state, "user-1", "dee@example.com").await;

    let response = app
        .router
        .clone()
        .oneshot(authed_get("/api/jobs/search?query=%20", &token))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);

    let response = app
        .router
        .clone()
        .oneshot(authed_get("/api/jobs/search?query=cook", &token))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
}

#[tokio::test]
async fn catalogs_unlock_with_tier() {
    let app = make_app(Config::default()).await;
    let token = seed_session(&app.state, "user-1", "dee@example.com").await;

    let response = app
        .router
        .clone()
        .oneshot(authed_get("/api/courses", &token))
        .await
        .unwrap();
    let starter_courses = body_json(response).await["courses"]
        .as_array()
        .unwrap()
        .len();

    app.state.profiles.set_tier("user-1", Tier::Pro).await.unwrap();
    let response = app
        .router
        .clone()
        .oneshot(authed_get("/api/courses", &token))
        .await
        .unwrap();
    let pro_courses = body_json(response).await["courses"].as_array().unwrap().len();
    assert!(pro_courses > starter_courses);

    let response = app
        .router
        .clone()
        .oneshot(authed_get("/api/shop", &token))
        .await
        .unwrap();
    assert_eq!(
        body_json(response).await["items"].as_array().unwrap().len(),
        4
    );
}
