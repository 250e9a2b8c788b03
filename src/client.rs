use std::time::Duration;

use reqwest::header::AUTHORIZATION;
use reqwest::StatusCode;
use serde_json::Value;

use crate::error::{FelonEntrepreneurError, Result};
use crate::life_plan::PlanStatus;

/// Typed HTTP client for the daemon, used by the CLI and the poller.
pub struct DaemonClient {
    base_url: String,
    token: String,
    http: reqwest::Client,
}

impl DaemonClient {
    pub fn new(base_url: impl Into<String>, token: impl Into<String>) -> Result<Self> {
        let http = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(3))
            .timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| FelonEntrepreneurError::Runtime(e.to_string()))?;
        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token: token.into(),
            http,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    fn with_auth(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        if self.token.trim().is_empty() {
            request
        } else {
            request.header(AUTHORIZATION, format!("Bearer {}", self.token))
        }
    }

    pub async fn health(&self) -> Result<String> {
        let response = self
            .http
            .get(self.url("/health"))
            .send()
            .await
            .map_err(|e| FelonEntrepreneurError::Http(e.to_string()))?;
        response
            .text()
            .await
            .map_err(|e| FelonEntrepreneurError::Http(e.to_string()))
    }

    /// Current plan status; `None` when no plan exists yet (404).
    pub async fn life_plan_status(&self) -> Result<Option<PlanStatus>> {
        let response = self
            .with_auth(self.http.get(self.url("/api/life-plan/status")))
            .send()
            .await
            .map_err(|e| FelonEntrepreneurError::Http(e.to_string()))?;

        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !response.status().is_success() {
            return Err(FelonEntrepreneurError::Http(format!(
                "status endpoint returned {}",
                response.status()
            )));
        }

        let value: Value = response
            .json()
            .await
            .map_err(|e| FelonEntrepreneurError::Serialization(e.to_string()))?;
        let status = value
            .get("status")
            .and_then(|v| v.as_str())
            .and_then(PlanStatus::parse)
            .ok_or_else(|| {
                FelonEntrepreneurError::Serialization("unrecognized plan status".to_string())
            })?;
        Ok(Some(status))
    }

    /// Kick off generation. Any non-2xx response is an error.
    pub async fn start_generation(&self) -> Result<()> {
        let response = self
            .with_auth(self.http.post(self.url("/api/life-plan/generate")))
            .send()
            .await
            .map_err(|e| FelonEntrepreneurError::Http(e.to_string()))?;
        if !response.status().is_success() {
            return Err(FelonEntrepreneurError::Http(format!(
                "generate endpoint returned {}",
                response.status()
            )));
        }
        Ok(())
    }

    pub async fn life_plan_summary(&self) -> Result<Value> {
        self.get_json("/api/life-plan/summary").await
    }

    pub async fn search_jobs(&self, query: &str, zip: Option<&str>) -> Result<Value> {
        let mut path = format!("/api/jobs/search?query={}", urlencoding::encode(query));
        if let Some(zip) = zip {
            path.push_str(&format!("&zip={}", urlencoding::encode(zip)));
        }
        self.get_json(&path).await
    }

    pub async fn recap(&self) -> Result<Value> {
        self.get_json("/api/onboarding/recap").await
    }

    pub async fn employment(&self) -> Result<Value> {
        self.get_json("/api/employment").await
    }

    async fn get_json(&self, path: &str) -> Result<Value> {
        let response = self
            .with_auth(self.http.get(self.url(path)))
            .send()
            .await
            .map_err(|e| FelonEntrepreneurError::Http(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let value: Value = response.json().await.unwrap_or_default();
            if let Some(error) = value.get("error").and_then(|v| v.as_str()) {
                return Err(FelonEntrepreneurError::Http(error.to_string()));
            }
            return Err(FelonEntrepreneurError::Http(format!(
                "daemon returned {status}"
            )));
        }

        response
            .json()
            .await
            .map_err(|e| FelonEntrepreneurError::Serialization(e.to_string()))
    }
}
