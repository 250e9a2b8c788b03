use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::Path;

use crate::error::{FelonEntrepreneurError, Result};

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AuthConfig {
    pub base_url: String,
    pub client_id: Option<String>,
    pub client_secret: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct JobSearchConfig {
    pub api_key: String,
    pub api_host: String,
    pub base_url: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct EmailConfig {
    pub api_key: String,
    pub base_url: Option<String>,
    pub from_address: String,
    pub admin_address: String,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    pub auth: Option<AuthConfig>,
    pub jobs: Option<JobSearchConfig>,
    pub email: Option<EmailConfig>,
    pub dev_endpoints: Option<bool>,
    pub generation_poll_seconds: Option<u64>,
    pub session_ttl_minutes: Option<i64>,
}

impl Config {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path.as_ref())
            .map_err(|e| FelonEntrepreneurError::Config(e.to_string()))?;
        let config: Config = serde_json::from_str(&content)
            .map_err(|e| FelonEntrepreneurError::Config(e.to_string()))?;
        Ok(config)
    }

    /// Assemble configuration from `FE_*` environment variables. Sections
    /// whose required variables are absent stay `None` and the daemon runs
    /// with that collaborator disabled.
    pub fn from_env() -> Self {
        let auth = env_var("FE_AUTH_BASE_URL").map(|base_url| AuthConfig {
            base_url,
            client_id: env_var("FE_AUTH_CLIENT_ID"),
            client_secret: env_var("FE_AUTH_CLIENT_SECRET"),
        });

        let jobs = match (env_var("FE_JOBS_API_KEY"), env_var("FE_JOBS_API_HOST")) {
            (Some(api_key), Some(api_host)) => Some(JobSearchConfig {
                api_key,
                api_host,
                base_url: env_var("FE_JOBS_BASE_URL"),
            }),
            _ => None,
        };

        let email = match (
            env_var("FE_EMAIL_API_KEY"),
            env_var("FE_EMAIL_FROM"),
            env_var("FE_ADMIN_EMAIL"),
        ) {
            (Some(api_key), Some(from_address), Some(admin_address)) => Some(EmailConfig {
                api_key,
                base_url: env_var("FE_EMAIL_BASE_URL"),
                from_address,
                admin_address,
            }),
            _ => None,
        };

        Config {
            auth,
            jobs,
            email,
            dev_endpoints: env_var("FE_DEV_ENDPOINTS").map(|v| v == "1" || v == "true"),
            generation_poll_seconds: env_var("FE_GENERATION_POLL_SECONDS")
                .and_then(|v| v.parse().ok()),
            session_ttl_minutes: env_var("FE_SESSION_TTL_MINUTES").and_then(|v| v.parse().ok()),
        }
    }

    pub fn load(path: Option<&str>) -> Result<Self> {
        match path {
            Some(path) => Self::from_file(path),
            None => Ok(Self::from_env()),
        }
    }

    pub fn dev_endpoints_enabled(&self) -> bool {
        self.dev_endpoints.unwrap_or(false)
    }

    pub fn generation_interval_seconds(&self) -> u64 {
        self.generation_poll_seconds.unwrap_or(2).max(1)
    }

    pub fn session_ttl_seconds(&self) -> i64 {
        self.session_ttl_minutes.unwrap_or(60 * 24 * 7).max(1) * 60
    }
}

fn env_var(name: &str) -> Option<String> {
    env::var(name)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}
