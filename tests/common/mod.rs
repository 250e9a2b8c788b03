#![allow(dead_code)]

use std::sync::Arc;

use axum::body::Body;
use axum::http::{header, Request};
use axum::Router;
use http_body_util::BodyExt;
use serde_json::Value;
use tempfile::NamedTempFile;

use felon_entrepreneur::config::Config;
use felon_entrepreneur::daemon::{build_router, build_state, AppState};

pub struct TestApp {
    pub router: Router,
    pub state: AppState,
    // Keeps the backing SQLite file alive for the test's duration.
    pub db: NamedTempFile,
}

pub async fn make_app(config: Config) -> TestApp {
    let db = NamedTempFile::new().unwrap();
    let state = build_state(db.path().to_str().unwrap(), config)
        .await
        .unwrap();
    TestApp {
        router: build_router(state.clone()),
        state,
        db,
    }
}

pub fn dev_config() -> Config {
    Config {
        dev_endpoints: Some(true),
        ..Config::default()
    }
}

/// Create a profile (step 0) and a live session for it, returning the
/// bearer token.
pub async fn seed_session(state: &AppState, user_id: &str, email: &str) -> String {
    state.profiles.ensure_profile(user_id, email).await.unwrap();
    state
        .sessions
        .create_session(user_id, email, 3600)
        .await
        .unwrap()
}

pub fn get(uri: &str) -> Request<Body> {
    Request::builder()
        .method("GET")
        .uri(uri)
        .body(Body::empty())
        .unwrap()
}

pub fn authed_get(uri: &str, token: &str) -> Request<Body> {
    Request::builder()
        .method("GET")
        .uri(uri)
        .header(header::AUTHORIZATION, format!("Bearer {token}"))
        .body(Body::empty())
        .unwrap()
}

pub fn authed_post(uri: &str, token: &str, body: &Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::AUTHORIZATION, format!("Bearer {token}"))
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

pub async fn body_json(response: axum::response::Response) -> Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

pub fn location(response: &axum::response::Response) -> String {
    response
        .headers()
        .get(header::LOCATION)
        .and_then(|value| value.to_str().ok())
        .unwrap_or_default()
        .to_string()
}

pub fn set_cookie(response: &axum::response::Response) -> String {
    response
        .headers()
        .get(header::SET_COOKIE)
        .and_then(|value| value.to_str().ok())
        .unwrap_or_default()
        .to_string()
}

/// Stub job-search provider recording the last call and returning
/// exactly `limit` postings.
pub struct StubJobSearch {
    pub last: tokio::sync::Mutex<Option<(String, Option<(f64, f64)>, usize)>>,
}

impl StubJobSearch {
    pub fn new() -> Self {
        Self {
            last: tokio::sync::Mutex::new(None),
        }
    }
}

#[async_trait::async_trait]
impl felon_entrepreneur::interfaces::providers::JobSearchProvider for StubJobSearch {
    async fn search(
        &self,
        query: &str,
        near: Option<felon_entrepreneur::geo::Coordinates>,
        limit: usize,
    ) -> felon_entrepreneur::error::Result<
        Vec<felon_entrepreneur::interfaces::providers::JobPosting>,
    > {
        let mut guard = self.last.lock().await;
        *guard = Some((
            query.to_string(),
            near.map(|coords| (coords.lat, coords.lng)),
            limit,
        ));
        Ok((0..limit)
            .map(|idx| felon_entrepreneur::interfaces::providers::JobPosting {
                id: format!("job-{idx}"),
                title: format!("Job {idx}"),
                employer: "Employer".to_string(),
                location: None,
                url: None,
                is_remote: false,
            })
            .collect())
    }
}

pub fn with_stub_jobs(mut state: AppState, stub: Arc<StubJobSearch>) -> (Router, AppState) {
    state.jobs = Some(stub);
    (build_router(state.clone()), state)
}
