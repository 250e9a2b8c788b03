use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::{Json, Query, State},
    http::{header, HeaderMap, HeaderValue, StatusCode},
    response::{Html, IntoResponse, Redirect, Response},
    routing::{get, post},
    Router,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::answers::AnswerStore;
use crate::auth::{self, AuthClient};
use crate::catalog;
use crate::config::Config;
use crate::error::{FelonEntrepreneurError, Result};
use crate::generation::GenerationJob;
use crate::geo::{self, Coordinates};
use crate::interfaces::providers::{JobSearchProvider, SignupNotifier};
use crate::life_plan::{LifePlanStore, PlanStatus};
use crate::onboarding::{
    guard, route_for_step, validate_path_choice, validate_preferred_name, validate_zip, Guard,
    StepRoute,
};
use crate::profiles::{Profile, ProfileStore};
use crate::providers::email::EmailApiNotifier;
use crate::providers::jobsearch::JobSearchClient;
use crate::scheduler::Scheduler;
use crate::sessions::SessionStore;
use crate::tiers::Tier;

const SESSION_COOKIE: &str = "fe_session";

const ERROR_PAGE: &str = "<!doctype html>\
<html><head><title>Something went wrong</title></head>\
<body><h1>Something went wrong</h1>\
<p>We could not finish signing you in. Please try again.</p></body></html>";

#[derive(Clone)]
pub struct AppState {
    pub profiles: Arc<ProfileStore>,
    pub life_plans: Arc<LifePlanStore>,
    pub answers: Arc<AnswerStore>,
    pub sessions: Arc<SessionStore>,
    pub auth: Option<Arc<AuthClient>>,
    pub jobs: Option<Arc<dyn JobSearchProvider>>,
    pub notifier: Option<Arc<dyn SignupNotifier>>,
    pub config: Arc<Config>,
}

struct CurrentUser {
    profile: Profile,
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
}

#[derive(Deserialize)]
struct CallbackQuery {
    code: Option<String>,
}

#[derive(Deserialize)]
struct NameSubmit {
    preferred_name: String,
}

#[derive(Deserialize)]
struct ZipSubmit {
    zip_code: String,
}

#[derive(Deserialize)]
struct PathSubmit {
    path: String,
}

#[derive(Deserialize)]
struct AnswerSubmit {
    question: String,
    value: Value,
}

#[derive(Deserialize)]
struct JobsQuery {
    query: String,
    zip: Option<String>,
}

#[derive(Deserialize)]
struct TierParams {
    tier: String,
}

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/auth/login", get(auth_login))
        .route("/auth/callback", get(auth_callback))
        .route("/auth/logout", post(auth_logout))
        .route("/onboarding/name", get(onboarding_name))
        .route("/onboarding/zip", get(onboarding_zip))
        .route("/onboarding/path", get(onboarding_path))
        .route("/onboarding/generating", get(onboarding_generating))
        .route("/app/home", get(app_home))
        .route("/api/onboarding/name", post(submit_name))
        .route("/api/onboarding/zip", post(submit_zip))
        .route("/api/onboarding/path", post(submit_path))
        .route("/api/onboarding/answers", post(submit_answer))
        .route("/api/onboarding/recap", get(onboarding_recap))
        .route("/api/life-plan/generate", post(life_plan_generate))
        .route("/api/life-plan/status", get(life_plan_status))
        .route("/api/life-plan/summary", get(life_plan_summary))
        .route("/api/jobs/search", get(jobs_search))
        .route("/api/employment", get(employment))
        .route("/api/courses", get(courses))
        .route("/api/shop", get(shop))
        .route("/api/dev/set-tier", get(dev_set_tier_get).post(dev_set_tier_post))
        .with_state(state)
}

async fn health() -> Json<Value> {
    Json(json!({"status": "ok"}))
}

async fn auth_login() -> Html<&'static str> {
    // The real login page is rendered by the web front end; this route
    // exists so error redirects land somewhere sensible.
    Html("<!doctype html><html><body><h1>Sign in</h1></body></html>")
}

async fn auth_callback(
    State(state): State<AppState>,
    Query(query): Query<CallbackQuery>,
) -> Response {
    let code = query
        .code
        .map(|code| code.trim().to_string())
        .filter(|code| !code.is_empty());
    let Some(code) = code else {
        return Redirect::to(&auth::login_redirect("missing_code")).into_response();
    };

    match handle_callback(&state, &code).await {
        Ok(response) => response,
        Err(err) => {
            tracing::error!(error = %err, "auth callback failed");
            (StatusCode::INTERNAL_SERVER_ERROR, Html(ERROR_PAGE)).into_response()
        }
    }
}

async fn handle_callback(state: &AppState, code: &str) -> Result<Response> {
    let Some(auth_client) = &state.auth else {
        return Err(FelonEntrepreneurError::Config(
            "auth backend not configured".to_string(),
        ));
    };

    let identity = match auth_client.exchange_code(code).await {
        Ok(identity) => identity,
        Err(err) => {
            tracing::warn!(error = %err, "code exchange failed");
            return Ok(Redirect::to(&auth::login_redirect("exchange_failed")).into_response());
        }
    };

    let (profile, created) = state
        .profiles
        .ensure_profile(&identity.subject, &identity.email)
        .await?;
    if created {
        if let Some(notifier) = &state.notifier {
            // Best-effort side effect: a failed notification must never
            // block the signup flow.
            if let Err(err) = notifier.notify_signup(&identity.email).await {
                tracing::warn!(error = %err, "admin signup notification failed");
            }
        }
    }

    let token = state
        .sessions
        .create_session(
            &identity.subject,
            &identity.email,
            state.config.session_ttl_seconds(),
        )
        .await?;

    let destination = route_for_step(profile.onboarding_step).path();
    let mut response = Redirect::to(destination).into_response();
    let cookie = format!("{SESSION_COOKIE}={token}; Path=/; HttpOnly; SameSite=Lax");
    response.headers_mut().insert(
        header::SET_COOKIE,
        HeaderValue::from_str(&cookie)
            .map_err(|e| FelonEntrepreneurError::Runtime(e.to_string()))?,
    );
    Ok(response)
}

async fn auth_logout(State(state): State<AppState>, headers: HeaderMap) -> Response {
    if let Some(token) = extract_token(&headers) {
        let _ = state.sessions.revoke(&token).await;
    }
    let mut response = Json(json!({"status": "ok"})).into_response();
    let expired = format!("{SESSION_COOKIE}=; Path=/; HttpOnly; Max-Age=0");
    if let Ok(value) = HeaderValue::from_str(&expired) {
        response.headers_mut().insert(header::SET_COOKIE, value);
    }
    response
}

async fn onboarding_name(State(state): State<AppState>, headers: HeaderMap) -> Response {
    page_response(&state, &headers, StepRoute::Name).await
}

async fn onboarding_zip(State(state): State<AppState>, headers: HeaderMap) -> Response {
    page_response(&state, &headers, StepRoute::Zip).await
}

async fn onboarding_path(State(state): State<AppState>, headers: HeaderMap) -> Response {
    page_response(&state, &headers, StepRoute::PathChoice).await
}

async fn onboarding_generating(State(state): State<AppState>, headers: HeaderMap) -> Response {
    page_response(&state, &headers, StepRoute::Generating).await
}

async fn app_home(State(state): State<AppState>, headers: HeaderMap) -> Response {
    page_response(&state, &headers, StepRoute::Home).await
}

/// Shared page guard: unauthenticated visitors go to login, everyone else
/// is held to the canonical route for their stored step.
async fn page_response(state: &AppState, headers: &HeaderMap, page: StepRoute) -> Response {
    let user = match current_user(state, headers).await {
        Ok(user) => user,
        Err(_) => return Redirect::to(&auth::login_redirect("signin_required")).into_response(),
    };

    match guard(user.profile.onboarding_step, page) {
        Guard::Proceed => Json(json!({
            "page": page.path(),
            "step": user.profile.onboarding_step,
            "preferred_name": user.profile.preferred_name,
        }))
        .into_response(),
        Guard::Redirect(route) => Redirect::to(route.path()).into_response(),
    }
}

async fn submit_name(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(payload): Json<NameSubmit>,
) -> Response {
    let user = match current_user(&state, &headers).await {
        Ok(user) => user,
        Err(err) => return err.into_response(),
    };
    let name = match validate_preferred_name(&payload.preferred_name) {
        Ok(name) => name,
        Err(err) => return validation_error(err),
    };

    let result = async {
        state
            .profiles
            .set_preferred_name(&user.profile.user_id, &name)
            .await?;
        state
            .profiles
            .advance_step(&user.profile.user_id, StepRoute::Name.submit_target())
            .await
    }
    .await;
    advance_response(result)
}

async fn submit_zip(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(payload): Json<ZipSubmit>,
) -> Response {
    let user = match current_user(&state, &headers).await {
        Ok(user) => user,
        Err(err) => return err.into_response(),
    };
    let zip = match validate_zip(&payload.zip_code) {
        Ok(zip) => zip,
        Err(err) => return validation_error(err),
    };

    let result = async {
        state
            .profiles
            .set_zip_code(&user.profile.user_id, &zip)
            .await?;
        state
            .profiles
            .advance_step(&user.profile.user_id, StepRoute::Zip.submit_target())
            .await
    }
    .await;
    advance_response(result)
}

async fn submit_path(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(payload): Json<PathSubmit>,
) -> Response {
    let user = match current_user(&state, &headers).await {
        Ok(user) => user,
        Err(err) => return err.into_response(),
    };
    let path = match validate_path_choice(&payload.path) {
        Ok(path) => path,
        Err(err) => return validation_error(err),
    };

    let result = async {
        state
            .profiles
            .set_path_choice(&user.profile.user_id, path.as_str())
            .await?;
        state
            .profiles
            .advance_step(&user.profile.user_id, StepRoute::PathChoice.submit_target())
            .await
    }
    .await;
    advance_response(result)
}

fn advance_response(result: Result<crate::profiles::AdvanceOutcome>) -> Response {
    match result {
        Ok(outcome) => {
            let step = outcome.step();
            Json(json!({
                "status": "ok",
                "advanced": matches!(outcome, crate::profiles::AdvanceOutcome::Advanced { .. }),
                "step": step,
                "next": route_for_step(Some(step)).path(),
            }))
            .into_response()
        }
        Err(err) => internal_error(err),
    }
}

async fn submit_answer(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(payload): Json<AnswerSubmit>,
) -> Response {
    let user = match current_user(&state, &headers).await {
        Ok(user) => user,
        Err(err) => return err.into_response(),
    };
    let question = payload.question.trim().to_string();
    if question.is_empty() {
        return validation_error(FelonEntrepreneurError::Runtime(
            "question must not be empty".to_string(),
        ));
    }

    match state
        .answers
        .upsert_answer(&user.profile.user_id, &question, &payload.value)
        .await
    {
        Ok(()) => Json(json!({"status": "ok"})).into_response(),
        Err(err) => internal_error(err),
    }
}

async fn onboarding_recap(State(state): State<AppState>, headers: HeaderMap) -> Response {
    let user = match current_user(&state, &headers).await {
        Ok(user) => user,
        Err(err) => return err.into_response(),
    };
    let step = user.profile.onboarding_step.unwrap_or(0);
    if step < StepRoute::Generating.expected_step() {
        return (
            StatusCode::CONFLICT,
            Json(ErrorResponse {
                error: "onboarding incomplete".to_string(),
            }),
        )
            .into_response();
    }

    let answers = match state.answers.list_answers(&user.profile.user_id).await {
        Ok(answers) => answers,
        Err(err) => return internal_error(err),
    };
    let entries: Vec<Value> = answers
        .iter()
        .map(|answer| json!({"question": answer.question, "value": answer.value}))
        .collect();

    // Viewing the recap marks onboarding fully done (step 5), but only
    // once the user has actually reached the app (step 4+); the same
    // conditional write keeps this from skipping the generating step.
    if step >= StepRoute::Home.expected_step() {
        if let Err(err) = state.profiles.advance_step(&user.profile.user_id, 5).await {
            tracing::warn!(error = %err, "recap step advance failed");
        }
    }

    Json(json!({"entries": entries})).into_response()
}

async fn life_plan_generate(State(state): State<AppState>, headers: HeaderMap) -> Response {
    let user = match current_user(&state, &headers).await {
        Ok(user) => user,
        Err(err) => return err.into_response(),
    };

    let current = match state.life_plans.current_version(&user.profile.user_id).await {
        Ok(current) => current,
        Err(err) => return internal_error(err),
    };

    if let Some(version) = &current {
        match PlanStatus::from_version(version) {
            // Idempotent entry: a finished plan is never re-generated here.
            PlanStatus::Complete => {
                return (StatusCode::OK, Json(json!({"status": "complete"}))).into_response()
            }
            PlanStatus::Queued => {
                return (StatusCode::ACCEPTED, Json(json!({"status": "queued"}))).into_response()
            }
            PlanStatus::Processing => {
                return (StatusCode::ACCEPTED, Json(json!({"status": "processing"})))
                    .into_response()
            }
            PlanStatus::Error => {}
        }
    }

    match state.life_plans.enqueue_version(&user.profile.user_id).await {
        Ok(_) => (StatusCode::ACCEPTED, Json(json!({"status": "queued"}))).into_response(),
        Err(err) => internal_error(err),
    }
}

async fn life_plan_status(State(state): State<AppState>, headers: HeaderMap) -> Response {
    let user = match current_user(&state, &headers).await {
        Ok(user) => user,
        Err(err) => return err.into_response(),
    };

    match state.life_plans.current_version(&user.profile.user_id).await {
        Ok(Some(version)) => Json(json!({
            "status": PlanStatus::from_version(&version).as_str(),
        }))
        .into_response(),
        Ok(None) => (
            StatusCode::NOT_FOUND,
            Json(ErrorResponse {
                error: "no life plan".to_string(),
            }),
        )
            .into_response(),
        Err(err) => internal_error(err),
    }
}

async fn life_plan_summary(State(state): State<AppState>, headers: HeaderMap) -> Response {
    let user = match current_user(&state, &headers).await {
        Ok(user) => user,
        Err(err) => return err.into_response(),
    };

    match state.life_plans.current_version(&user.profile.user_id).await {
        Ok(Some(version)) => {
            let status = PlanStatus::from_version(&version);
            let payload: Option<Value> = version
                .payload
                .as_deref()
                .and_then(|raw| serde_json::from_str(raw).ok());
            let title = payload
                .as_ref()
                .and_then(|p| p.get("title"))
                .cloned()
                .unwrap_or(Value::Null);
            let summary = payload
                .as_ref()
                .and_then(|p| p.get("summary"))
                .cloned()
                .unwrap_or(Value::Null);
            Json(json!({
                "status": status.as_str(),
                "title": title,
                "summary": summary,
            }))
            .into_response()
        }
        Ok(None) => (
            StatusCode::NOT_FOUND,
            Json(ErrorResponse {
                error: "no life plan".to_string(),
            }),
        )
            .into_response(),
        Err(err) => internal_error(err),
    }
}

async fn jobs_search(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(params): Query<JobsQuery>,
) -> Response {
    let user = match current_user(&state, &headers).await {
        Ok(user) => user,
        Err(err) => return err.into_response(),
    };
    let query = params.query.trim();
    if query.is_empty() {
        return validation_error(FelonEntrepreneurError::Runtime(
            "query must not be empty".to_string(),
        ));
    }
    let Some(provider) = &state.jobs else {
        return (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(ErrorResponse {
                error: "job search not configured".to_string(),
            }),
        )
            .into_response();
    };

    let near: Option<Coordinates> = params
        .zip
        .as_deref()
        .or(user.profile.zip_code.as_deref())
        .and_then(geo::zip_coordinates);
    let limit = user.profile.tier.job_search_limit();

    match provider.search(query, near, limit).await {
        Ok(jobs) => Json(json!({"count": jobs.len(), "jobs": jobs})).into_response(),
        Err(err) => (
            StatusCode::BAD_GATEWAY,
            Json(ErrorResponse {
                error: err.to_string(),
            }),
        )
            .into_response(),
    }
}

async fn employment(State(state): State<AppState>, headers: HeaderMap) -> Response {
    let user = match current_user(&state, &headers).await {
        Ok(user) => user,
        Err(err) => return err.into_response(),
    };

    // Independent read-only queries, batched concurrently.
    let (answers, version) = tokio::join!(
        state.answers.list_answers(&user.profile.user_id),
        state.life_plans.current_version(&user.profile.user_id),
    );
    let answers = match answers {
        Ok(answers) => answers,
        Err(err) => return internal_error(err),
    };
    let version = match version {
        Ok(version) => version,
        Err(err) => return internal_error(err),
    };

    let life_plan = version.map(|version| {
        json!({
            "status": PlanStatus::from_version(&version).as_str(),
        })
    });

    Json(json!({
        "profile": {
            "email": user.profile.email,
            "preferred_name": user.profile.preferred_name,
            "zip_code": user.profile.zip_code,
            "path": user.profile.path_choice,
            "tier": user.profile.tier.as_str(),
        },
        "answers": answers
            .iter()
            .map(|answer| json!({"question": answer.question, "value": answer.value}))
            .collect::<Vec<Value>>(),
        "life_plan": life_plan,
    }))
    .into_response()
}

async fn courses(State(state): State<AppState>, headers: HeaderMap) -> Response {
    let user = match current_user(&state, &headers).await {
        Ok(user) => user,
        Err(err) => return err.into_response(),
    };
    Json(json!({"courses": catalog::courses_for(user.profile.tier)})).into_response()
}

async fn shop(State(state): State<AppState>, headers: HeaderMap) -> Response {
    let user = match current_user(&state, &headers).await {
        Ok(user) => user,
        Err(err) => return err.into_response(),
    };
    Json(json!({"items": catalog::shop_for(user.profile.tier)})).into_response()
}

async fn dev_set_tier_get(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(params): Query<TierParams>,
) -> Response {
    apply_dev_tier(&state, &headers, &params.tier).await
}

async fn dev_set_tier_post(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(params): Json<TierParams>,
) -> Response {
    apply_dev_tier(&state, &headers, &params.tier).await
}

async fn apply_dev_tier(state: &AppState, headers: &HeaderMap, tier: &str) -> Response {
    if !state.config.dev_endpoints_enabled() {
        return StatusCode::NOT_FOUND.into_response();
    }
    let user = match current_user(state, headers).await {
        Ok(user) => user,
        Err(err) => return err.into_response(),
    };
    let tier: Tier = match tier.parse() {
        Ok(tier) => tier,
        Err(()) => {
            return validation_error(FelonEntrepreneurError::Runtime(
                "unknown tier".to_string(),
            ))
        }
    };

    match state.profiles.set_tier(&user.profile.user_id, tier).await {
        Ok(_) => Json(json!({"status": "ok", "tier": tier.as_str()})).into_response(),
        Err(err) => internal_error(err),
    }
}

/// Resolve the caller's session to a server-trusted profile. A token
/// whose user row cannot be loaded is revoked on the spot: an
/// unverifiable session is treated as logged-out, never trusted.
async fn current_user(
    state: &AppState,
    headers: &HeaderMap,
) -> std::result::Result<CurrentUser, (StatusCode, Json<ErrorResponse>)> {
    let Some(token) = extract_token(headers) else {
        return Err(unauthorized());
    };
    let session = match state.sessions.lookup(&token).await {
        Ok(session) => session,
        Err(_) => return Err(unauthorized()),
    };
    let Some(session) = session else {
        return Err(unauthorized());
    };

    match state.profiles.get(&session.user_id).await {
        Ok(Some(profile)) => Ok(CurrentUser { profile }),
        Ok(None) | Err(_) => {
            let _ = state.sessions.revoke(&token).await;
            Err(unauthorized())
        }
    }
}

fn extract_token(headers: &HeaderMap) -> Option<String> {
    let bearer = headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty());
    if bearer.is_some() {
        return bearer;
    }

    let cookies = headers
        .get(header::COOKIE)
        .and_then(|value| value.to_str().ok())?;
    for part in cookies.split(';') {
        let mut kv = part.trim().splitn(2, '=');
        if kv.next() == Some(SESSION_COOKIE) {
            let value = kv.next().unwrap_or("").trim();
            if !value.is_empty() {
                return Some(value.to_string());
            }
        }
    }
    None
}

fn unauthorized() -> (StatusCode, Json<ErrorResponse>) {
    (
        StatusCode::UNAUTHORIZED,
        Json(ErrorResponse {
            error: "Unauthorized".to_string(),
        }),
    )
}

fn validation_error(err: FelonEntrepreneurError) -> Response {
    (
        StatusCode::UNPROCESSABLE_ENTITY,
        Json(ErrorResponse {
            error: err.to_string(),
        }),
    )
        .into_response()
}

fn internal_error(err: FelonEntrepreneurError) -> Response {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(ErrorResponse {
            error: err.to_string(),
        }),
    )
        .into_response()
}

pub async fn build_state(db_path: &str, config: Config) -> Result<AppState> {
    let profiles = Arc::new(ProfileStore::new(db_path).await?);
    let life_plans = Arc::new(LifePlanStore::new(db_path).await?);
    let answers = Arc::new(AnswerStore::new(db_path).await?);
    let sessions = Arc::new(SessionStore::new(db_path).await?);

    let auth = match &config.auth {
        Some(cfg) => Some(Arc::new(AuthClient::new(cfg)?)),
        None => None,
    };
    let jobs: Option<Arc<dyn JobSearchProvider>> = match &config.jobs {
        Some(cfg) => Some(Arc::new(JobSearchClient::new(cfg)?)),
        None => None,
    };
    let notifier: Option<Arc<dyn SignupNotifier>> = match &config.email {
        Some(cfg) => Some(Arc::new(EmailApiNotifier::new(cfg)?)),
        None => None,
    };

    Ok(AppState {
        profiles,
        life_plans,
        answers,
        sessions,
        auth,
        jobs,
        notifier,
        config: Arc::new(config),
    })
}

pub async fn run(host: &str, port: u16, db_path: &str, config: Config) -> Result<()> {
    run_with_shutdown(host, port, db_path, config, futures::future::pending::<()>()).await
}

pub async fn run_with_shutdown<F>(
    host: &str,
    port: u16,
    db_path: &str,
    config: Config,
    shutdown: F,
) -> Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let generation_interval = Duration::from_secs(config.generation_interval_seconds());
    let state = build_state(db_path, config).await?;

    let mut scheduler = Scheduler::new();
    scheduler.register_job(Arc::new(GenerationJob::new(
        state.profiles.clone(),
        state.answers.clone(),
        state.life_plans.clone(),
        generation_interval,
    )));
    scheduler.start();

    let app = build_router(state);

    let addr = format!("{host}:{port}");
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|e| FelonEntrepreneurError::Runtime(e.to_string()))?;
    tracing::info!(addr = %addr, "daemon listening");

    let shutdown = async move {
        shutdown.await;
        scheduler.stop().await;
    };

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await
        .map_err(|e| FelonEntrepreneurError::Runtime(e.to_string()))?;

    Ok(())
}
