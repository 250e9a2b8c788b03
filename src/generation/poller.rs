//! Client-side observer for the generation job: a cancellable poll loop
//! with a fixed interval and a maximum attempt ceiling.

use std::future::Future;
use std::time::Duration;

use crate::client::DaemonClient;
use crate::error::Result;
use crate::life_plan::PlanStatus;

#[derive(Debug, Clone, Copy)]
pub struct PollSettings {
    pub interval: Duration,
    pub max_attempts: u32,
}

impl Default for PollSettings {
    fn default() -> Self {
        Self {
            interval: Duration::from_millis(1500),
            max_attempts: 200,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollOutcome {
    Complete,
    Failed(String),
    Cancelled,
    TimedOut,
}

/// Drive generation to completion. Idempotent entry: if the plan is
/// already complete nothing is re-triggered. A failed start (non-2xx)
/// reports `Failed` without ever starting the poll interval. The abort
/// future cancels the loop between polls; the attempt ceiling bounds it.
pub async fn watch_generation<F>(
    client: &DaemonClient,
    settings: PollSettings,
    abort: F,
) -> Result<PollOutcome>
where
    F: Future<Output = ()>,
{
    if let Some(PlanStatus::Complete) = client.life_plan_status().await? {
        return Ok(PollOutcome::Complete);
    }

    if let Err(err) = client.start_generation().await {
        return Ok(PollOutcome::Failed(err.to_string()));
    }

    // First poll lands one interval after the kick-off, not immediately.
    let start = tokio::time::Instant::now() + settings.interval;
    let mut tick = tokio::time::interval_at(start, settings.interval);
    tokio::pin!(abort);

    for _ in 0..settings.max_attempts {
        tokio::select! {
            _ = &mut abort => return Ok(PollOutcome::Cancelled),
            _ = tick.tick() => {
                match client.life_plan_status().await {
                    Ok(Some(PlanStatus::Complete)) => return Ok(PollOutcome::Complete),
                    Ok(Some(PlanStatus::Error)) => {
                        return Ok(PollOutcome::Failed(
                            "generation failed, refresh to retry".to_string(),
                        ))
                    }
                    // queued, processing, not-yet-created, or a transient
                    // fetch error: keep polling until the ceiling.
                    Ok(_) | Err(_) => {}
                }
            }
        }
    }

    Ok(PollOutcome::TimedOut)
}
