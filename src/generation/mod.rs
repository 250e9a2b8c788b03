//! Server-side life-plan generation: the payload builder and the
//! scheduled job that drains queued versions.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};

use crate::answers::{AnswerItem, AnswerStore};
use crate::error::Result;
use crate::interfaces::scheduler::ScheduledJob;
use crate::life_plan::LifePlanStore;
use crate::onboarding::PathChoice;
use crate::profiles::{Profile, ProfileStore};

pub mod poller;

// Upper bound on versions drained per tick so one tick cannot monopolize
// the scheduler when a backlog builds up.
const MAX_PER_TICK: usize = 8;

/// Build the plan payload for a profile from its questionnaire answers.
/// Deterministic for a given profile and answer set.
pub fn build_plan(profile: &Profile, answers: &[AnswerItem]) -> Value {
    let name = profile
        .preferred_name
        .as_deref()
        .unwrap_or(profile.email.as_str());
    let path: Option<PathChoice> = profile
        .path_choice
        .as_deref()
        .and_then(|value| value.parse().ok());

    let summary = match path {
        Some(PathChoice::Business) => format!(
            "{name} is building toward business ownership. This plan sequences the first year: stabilize income, form the entity, and land the first three customers."
        ),
        Some(PathChoice::Employment) => format!(
            "{name} is building toward stable employment. This plan sequences the first year: land fair-chance work, build a record, and grow into better roles."
        ),
        None => format!("{name} is mapping out the first year after release."),
    };

    let goals: Vec<Value> = answers
        .iter()
        .map(|answer| {
            json!({
                "question": answer.question,
                "answer": answer.value,
            })
        })
        .collect();

    let milestones = match path {
        Some(PathChoice::Business) => vec![
            "Open a business checking account",
            "Register the LLC and get an EIN",
            "Write a one-page business plan",
            "Land the first paying customer",
        ],
        _ => vec![
            "Finish a fair-chance-friendly resume",
            "Apply to five openings near home",
            "Complete the first interview",
            "Hold a role for ninety days",
        ],
    };

    json!({
        "title": format!("A first-year plan for {name}"),
        "summary": summary,
        "sections": [
            {"heading": "Where you are", "items": goals},
            {"heading": "Milestones", "items": milestones},
        ],
        "zip_code": profile.zip_code,
        "path": profile.path_choice,
    })
}

/// Drains queued life-plan versions: claims each with a conditional
/// `queued -> processing` update, builds the payload, and records the
/// terminal status.
pub struct GenerationJob {
    profiles: Arc<ProfileStore>,
    answers: Arc<AnswerStore>,
    life_plans: Arc<LifePlanStore>,
    interval: Duration,
}

impl GenerationJob {
    pub fn new(
        profiles: Arc<ProfileStore>,
        answers: Arc<AnswerStore>,
        life_plans: Arc<LifePlanStore>,
        interval: Duration,
    ) -> Self {
        Self {
            profiles,
            answers,
            life_plans,
            interval,
        }
    }

    async fn process_one(&self) -> Result<bool> {
        let Some(version) = self.life_plans.claim_next().await? else {
            return Ok(false);
        };

        let profile = self.profiles.get(&version.user_id).await?;
        match profile {
            Some(profile) => {
                let answers = self.answers.list_answers(&version.user_id).await?;
                let payload = build_plan(&profile, &answers);
                self.life_plans.complete_version(version.id, &payload).await?;
                tracing::info!(user_id = %version.user_id, version = version.id, "life plan generated");
            }
            None => {
                self.life_plans
                    .fail_version(version.id, "no profile for user")
                    .await?;
                tracing::warn!(user_id = %version.user_id, version = version.id, "life plan failed: missing profile");
            }
        }
        Ok(true)
    }
}

#[async_trait]
impl ScheduledJob for GenerationJob {
    fn name(&self) -> &str {
        "life_plan_generation"
    }

    fn interval(&self) -> Duration {
        self.interval
    }

    async fn run(&self) -> Result<()> {
        for _ in 0..MAX_PER_TICK {
            if !self.process_one().await? {
                break;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tiers::Tier;

    fn profile(path: Option<&str>) -> Profile {
        Profile {
            user_id: "u1".to_string(),
            email: "dee@example.com".to_string(),
            preferred_name: Some("Dee".to_string()),
            zip_code: Some("33602".to_string()),
            path_choice: path.map(|p| p.to_string()),
            onboarding_step: Some(3),
            tier: Tier::Starter,
            created_at: 0,
            updated_at: 0,
        }
    }

    #[test]
    fn plan_is_deterministic_and_path_aware() {
        let business = build_plan(&profile(Some("business")), &[]);
        let employment = build_plan(&profile(Some("employment")), &[]);
        assert_eq!(business, build_plan(&profile(Some("business")), &[]));
        assert_ne!(business["summary"], employment["summary"]);
        assert_eq!(business["title"], "A first-year plan for Dee");
    }

    #[test]
    fn answers_land_in_first_section() {
        let answers = vec![AnswerItem {
            question: "goal".to_string(),
            value: serde_json::json!("steady work"),
            updated_at: 0,
        }];
        let plan = build_plan(&profile(None), &answers);
        let items = plan["sections"][0]["items"].as_array().unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0]["question"], "goal");
    }
}
