use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;

use crate::config::JobSearchConfig;
use crate::error::{FelonEntrepreneurError, Result};
use crate::geo::Coordinates;
use crate::interfaces::providers::{JobPosting, JobSearchProvider};

/// Client for the hosted job-search API (key + host header auth).
pub struct JobSearchClient {
    http: reqwest::Client,
    api_key: String,
    api_host: String,
    base_url: String,
}

impl JobSearchClient {
    pub fn new(config: &JobSearchConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(3))
            .timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| FelonEntrepreneurError::Runtime(e.to_string()))?;
        let base_url = config
            .base_url
            .clone()
            .unwrap_or_else(|| format!("https://{}", config.api_host));
        Ok(Self {
            http,
            api_key: config.api_key.clone(),
            api_host: config.api_host.clone(),
            base_url,
        })
    }
}

#[async_trait]
impl JobSearchProvider for JobSearchClient {
    async fn search(
        &self,
        query: &str,
        near: Option<Coordinates>,
        limit: usize,
    ) -> Result<Vec<JobPosting>> {
        let mut url = format!(
            "{}/search?query={}",
            self.base_url.trim_end_matches('/'),
            urlencoding::encode(query)
        );
        if let Some(coords) = near {
            url.push_str(&format!("&lat={}&lng={}", coords.lat, coords.lng));
        }

        let response = self
            .http
            .get(url)
            .header("x-rapidapi-key", &self.api_key)
            .header("x-rapidapi-host", &self.api_host)
            .send()
            .await
            .map_err(|e| FelonEntrepreneurError::Http(e.to_string()))?;

        if !response.status().is_success() {
            return Err(FelonEntrepreneurError::Http(format!(
                "job search returned {}",
                response.status()
            )));
        }

        let value: Value = response
            .json()
            .await
            .map_err(|e| FelonEntrepreneurError::Serialization(e.to_string()))?;
        Ok(parse_postings(&value, limit))
    }
}

fn parse_postings(value: &Value, limit: usize) -> Vec<JobPosting> {
    let Some(items) = value.get("data").and_then(|v| v.as_array()) else {
        return Vec::new();
    };

    items
        .iter()
        .take(limit)
        .filter_map(|item| {
            let title = item.get("job_title").and_then(|v| v.as_str())?;
            let employer = item
                .get("employer_name")
                .and_then(|v| v.as_str())
                .unwrap_or("Unknown employer");
            let id = item
                .get("job_id")
                .and_then(|v| v.as_str())
                .unwrap_or(title)
                .to_string();
            let city = item.get("job_city").and_then(|v| v.as_str());
            let state = item.get("job_state").and_then(|v| v.as_str());
            let location = match (city, state) {
                (Some(city), Some(state)) => Some(format!("{city}, {state}")),
                (Some(city), None) => Some(city.to_string()),
                (None, Some(state)) => Some(state.to_string()),
                (None, None) => None,
            };
            Some(JobPosting {
                id,
                title: title.to_string(),
                employer: employer.to_string(),
                location,
                url: item
                    .get("job_apply_link")
                    .and_then(|v| v.as_str())
                    .map(|v| v.to_string()),
                is_remote: item
                    .get("job_is_remote")
                    .and_then(|v| v.as_bool())
                    .unwrap_or(false),
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_and_clamps_postings() {
        let value = json!({
            "data": [
                {"job_id": "a", "job_title": "Line Cook", "employer_name": "Diner",
                 "job_city": "Tampa", "job_state": "FL", "job_is_remote": false},
                {"job_id": "b", "job_title": "Driver", "employer_name": "Fleet Co"},
                {"job_id": "c", "job_title": "Welder", "employer_name": "Yard"},
            ]
        });
        let postings = parse_postings(&value, 2);
        assert_eq!(postings.len(), 2);
        assert_eq!(postings[0].location.as_deref(), Some("Tampa, FL"));
        assert!(postings[1].location.is_none());
    }

    #[test]
    fn missing_data_is_empty() {
        assert!(parse_postings(&json!({"status": "ok"}), 5).is_empty());
    }
}
