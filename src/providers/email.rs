use std::time::Duration;

use async_trait::async_trait;
use serde_json::json;
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;

use crate::config::EmailConfig;
use crate::error::{FelonEntrepreneurError, Result};
use crate::interfaces::providers::SignupNotifier;

const DEFAULT_BASE_URL: &str = "https://api.resend.com";

/// Sends the admin signup notification through the email-delivery API.
pub struct EmailApiNotifier {
    http: reqwest::Client,
    api_key: String,
    base_url: String,
    from_address: String,
    admin_address: String,
}

impl EmailApiNotifier {
    pub fn new(config: &EmailConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(3))
            .timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| FelonEntrepreneurError::Runtime(e.to_string()))?;
        Ok(Self {
            http,
            api_key: config.api_key.clone(),
            base_url: config
                .base_url
                .clone()
                .unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
            from_address: config.from_address.clone(),
            admin_address: config.admin_address.clone(),
        })
    }
}

#[async_trait]
impl SignupNotifier for EmailApiNotifier {
    async fn notify_signup(&self, email: &str) -> Result<()> {
        let signed_up_at = OffsetDateTime::now_utc()
            .format(&Rfc3339)
            .unwrap_or_default();
        let body = json!({
            "from": self.from_address,
            "to": [self.admin_address],
            "subject": "New Felon Entrepreneur signup",
            "text": format!("{email} signed up at {signed_up_at}"),
        });

        let response = self
            .http
            .post(format!("{}/emails", self.base_url.trim_end_matches('/')))
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| FelonEntrepreneurError::Http(e.to_string()))?;

        if !response.status().is_success() {
            return Err(FelonEntrepreneurError::Http(format!(
                "email delivery returned {}",
                response.status()
            )));
        }
        Ok(())
    }
}
