//! Plan-completion waiter
//!
//! Polls the plan activity of a deployment until no component has a pending
//! plan, with a growing interval and a monotonic deadline. Giving up on the
//! deadline only stops waiting; the remote plan keeps running.

use crate::clock::Clock;
use crate::error::RemoteFailure;
use crate::provider::{DeploymentApi, backoff_delay, backoff_multiplier};
use crate::retry::classify;
use deployflow_config::PollSettings;
use deployflow_core::wire::{PlanActivity, PlanStatus, StepStatus};
use std::time::Duration;

/// Polling configuration
#[derive(Debug, Clone, PartialEq)]
pub struct PollConfig {
    /// First wait between polls
    pub interval: Duration,
    /// Longest wait between polls
    pub max_interval: Duration,
    pub multiplier: f64,
    /// Deadline measured from the start of the wait
    pub timeout: Duration,
    /// Consecutive failed polls tolerated before giving up
    pub max_poll_errors: u32,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self::from(&PollSettings::default())
    }
}

impl From<&PollSettings> for PollConfig {
    fn from(settings: &PollSettings) -> Self {
        Self {
            interval: Duration::from_millis(settings.interval_ms),
            max_interval: Duration::from_millis(settings.max_interval_ms),
            multiplier: backoff_multiplier(settings.multiplier),
            timeout: Duration::from_secs(settings.timeout_secs),
            max_poll_errors: settings.max_poll_errors,
        }
    }
}

impl PollConfig {
    /// Wait after poll number `poll` (0-based)
    pub fn interval_for_poll(&self, poll: u32) -> Duration {
        backoff_delay(self.interval, self.multiplier, poll, self.max_interval)
    }
}

/// Why waiting for a plan ended without success
#[derive(Debug, Clone, PartialEq)]
pub enum WaitError {
    /// The deadline passed while a plan was still pending
    Timeout { elapsed: Duration },
    /// The plan failed, or plan progress could not be queried
    Failed(RemoteFailure),
}

/// Block until every plan of `deployment_id` has finished
pub async fn wait_for_plan_completion(
    api: &dyn DeploymentApi,
    clock: &dyn Clock,
    config: &PollConfig,
    deployment_id: &str,
) -> Result<(), WaitError> {
    let started = clock.now();
    let mut poll: u32 = 0;
    let mut consecutive_errors: u32 = 0;

    loop {
        match api.plan_activity(deployment_id).await {
            Ok(activities) => {
                consecutive_errors = 0;
                let failed = plan_failures(&activities);
                if !failed.is_empty() {
                    tracing::warn!(deployment_id, failures = failed.len(), "plan failed");
                    return Err(WaitError::Failed(RemoteFailure::PlanFailed {
                        diagnostics: failed,
                    }));
                }
                let pending = activities
                    .iter()
                    .filter(|a| a.status == PlanStatus::Pending)
                    .count();
                if pending == 0 {
                    tracing::info!(deployment_id, polls = poll + 1, "plan completed");
                    return Ok(());
                }
                tracing::debug!(deployment_id, pending, poll, "plan still pending");
            }
            Err(error) => {
                consecutive_errors += 1;
                if !error.is_transient() || consecutive_errors > config.max_poll_errors {
                    return Err(WaitError::Failed(classify(error, consecutive_errors)));
                }
                tracing::warn!(
                    deployment_id,
                    consecutive_errors,
                    error = %error,
                    "plan status query failed"
                );
            }
        }

        let elapsed = clock.now().saturating_duration_since(started);
        if elapsed >= config.timeout {
            tracing::warn!(deployment_id, elapsed_secs = elapsed.as_secs(), "gave up waiting for plan");
            return Err(WaitError::Timeout { elapsed });
        }

        let remaining = config.timeout - elapsed;
        clock.sleep(config.interval_for_poll(poll).min(remaining)).await;
        poll = poll.saturating_add(1);
    }
}

/// One diagnostic line per failed step of every failed plan
fn plan_failures(activities: &[PlanActivity]) -> Vec<String> {
    let mut diagnostics = Vec::new();
    for activity in activities.iter().filter(|a| a.status == PlanStatus::Error) {
        let component = format!("{} {}", activity.kind, activity.ref_id);
        let mut described = false;
        for step in activity
            .steps
            .iter()
            .filter(|s| s.status == StepStatus::Error)
        {
            let messages: Vec<&str> = step.info_log.iter().map(|m| m.message.as_str()).collect();
            if messages.is_empty() {
                diagnostics.push(format!("{}: {}", component, step.step_id));
            } else {
                diagnostics.push(format!(
                    "{}: {}: {}",
                    component,
                    step.step_id,
                    messages.join(", ")
                ));
            }
            described = true;
        }
        if !described {
            diagnostics.push(format!("{}: plan failed", component));
        }
    }
    diagnostics
}
