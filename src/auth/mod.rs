//! Code exchange against the auth backend and login-redirect helpers.

use std::time::Duration;

use serde_json::{json, Value};

use crate::config::AuthConfig;
use crate::error::{FelonEntrepreneurError, Result};

pub const LOGIN_ROUTE: &str = "/auth/login";

#[derive(Debug, Clone)]
pub struct AuthIdentity {
    pub subject: String,
    pub email: String,
}

pub struct AuthClient {
    http: reqwest::Client,
    base_url: String,
    client_id: Option<String>,
    client_secret: Option<String>,
}

impl AuthClient {
    pub fn new(config: &AuthConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(3))
            .timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| FelonEntrepreneurError::Runtime(e.to_string()))?;
        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            client_id: config.client_id.clone(),
            client_secret: config.client_secret.clone(),
        })
    }

    /// Exchange an authorization code for the subject identity. A non-2xx
    /// response or a malformed body is an auth error; nothing is retried.
    pub async fn exchange_code(&self, code: &str) -> Result<AuthIdentity> {
        let body = json!({
            "grant_type": "authorization_code",
            "code": code,
            "client_id": self.client_id,
            "client_secret": self.client_secret,
        });

        let response = self
            .http
            .post(format!("{}/oauth/token", self.base_url))
            .json(&body)
            .send()
            .await
            .map_err(|e| FelonEntrepreneurError::Http(e.to_string()))?;

        if !response.status().is_success() {
            return Err(FelonEntrepreneurError::Auth(format!(
                "code exchange returned {}",
                response.status()
            )));
        }

        let value: Value = response
            .json()
            .await
            .map_err(|e| FelonEntrepreneurError::Serialization(e.to_string()))?;

        let subject = value
            .get("user")
            .and_then(|user| user.get("id"))
            .and_then(|v| v.as_str())
            .ok_or_else(|| {
                FelonEntrepreneurError::Auth("token response missing user id".to_string())
            })?;
        let email = value
            .get("user")
            .and_then(|user| user.get("email"))
            .and_then(|v| v.as_str())
            .ok_or_else(|| {
                FelonEntrepreneurError::Auth("token response missing user email".to_string())
            })?;

        Ok(AuthIdentity {
            subject: subject.to_string(),
            email: email.to_string(),
        })
    }
}

pub fn login_redirect(reason: &str) -> String {
    format!("{LOGIN_ROUTE}?error={}", urlencoding::encode(reason))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn login_redirect_encodes_reason() {
        assert_eq!(
            login_redirect("exchange failed"),
            "/auth/login?error=exchange%20failed"
        );
    }
}
