use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::geo::Coordinates;

/// Normalized job posting returned by a search provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobPosting {
    pub id: String,
    pub title: String,
    pub employer: String,
    pub location: Option<String>,
    pub url: Option<String>,
    pub is_remote: bool,
}

#[async_trait]
pub trait JobSearchProvider: Send + Sync {
    async fn search(
        &self,
        query: &str,
        near: Option<Coordinates>,
        limit: usize,
    ) -> Result<Vec<JobPosting>>;
}

/// Fires the admin notification when a new profile is created. Callers
/// treat delivery as best-effort; a failure never blocks signup.
#[async_trait]
pub trait SignupNotifier: Send + Sync {
    async fn notify_signup(&self, email: &str) -> Result<()>;
}
