//! Control-plane client trait

use crate::error::{ApiError, ApiResult};
use async_trait::async_trait;
use deployflow_config::RetrySettings;
use deployflow_core::wire::{
    ClusterCredentials, DeploymentCreateRequest, DeploymentCreateResponse, DeploymentGetResponse,
    DeploymentUpdateRequest, DeploymentUpdateResponse, PayloadOverrides, PlanActivity,
};
use std::time::Duration;

/// Remote control plane that provisions deployments
///
/// Implementations own transport and authentication. Every call reports
/// failures as [`ApiError`] so the retry policy can classify them.
#[async_trait]
pub trait DeploymentApi: Send + Sync {
    /// Submit a new deployment.
    ///
    /// Resubmitting with a `request_id` the remote side has already seen must
    /// return the deployment created for it instead of creating another one.
    async fn create(
        &self,
        request: &DeploymentCreateRequest,
        request_id: &str,
        overrides: &PayloadOverrides,
    ) -> ApiResult<DeploymentCreateResponse>;

    /// Replace the plan of an existing deployment
    async fn update(
        &self,
        deployment_id: &str,
        request: &DeploymentUpdateRequest,
        request_id: &str,
        overrides: &PayloadOverrides,
    ) -> ApiResult<DeploymentUpdateResponse>;

    /// Full snapshot of a deployment, including metadata
    async fn get(&self, deployment_id: &str) -> ApiResult<DeploymentGetResponse>;

    /// Progress of the latest plan of every component
    async fn plan_activity(&self, deployment_id: &str) -> ApiResult<Vec<PlanActivity>>;

    /// Stop every component of a deployment
    async fn shutdown(&self, deployment_id: &str) -> ApiResult<()>;

    /// Issue new search-engine credentials out of band
    async fn reset_elasticsearch_password(
        &self,
        deployment_id: &str,
        ref_id: &str,
    ) -> ApiResult<ClusterCredentials> {
        let _ = ref_id;
        Err(ApiError::Unsupported(format!(
            "password reset for deployment {}",
            deployment_id
        )))
    }
}

/// Retry configuration for control-plane calls
#[derive(Debug, Clone, PartialEq)]
pub struct RetryConfig {
    /// Maximum number of attempts, the first one included
    pub max_attempts: u32,

    /// Initial delay between retries
    pub initial_delay: Duration,

    /// Maximum delay between retries
    pub max_delay: Duration,

    /// Backoff multiplier
    pub backoff_multiplier: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
            backoff_multiplier: 2.0,
        }
    }
}

impl RetryConfig {
    /// Delay before retry number `retry` (0-based)
    pub fn delay_for_retry(&self, retry: u32) -> Duration {
        backoff_delay(self.initial_delay, self.backoff_multiplier, retry, self.max_delay)
    }
}

/// Growth factor usable for backoff; anything below 1 or not finite means a
/// fixed delay
pub(crate) fn backoff_multiplier(multiplier: f64) -> f64 {
    if multiplier.is_finite() && multiplier >= 1.0 {
        multiplier
    } else {
        1.0
    }
}

/// `initial * multiplier^step`, capped at `max`
pub(crate) fn backoff_delay(
    initial: Duration,
    multiplier: f64,
    step: u32,
    max: Duration,
) -> Duration {
    let exponent = i32::try_from(step).unwrap_or(i32::MAX);
    let delay = initial.as_secs_f64() * backoff_multiplier(multiplier).powi(exponent);
    Duration::try_from_secs_f64(delay).map_or(max, |delay| delay.min(max))
}

impl From<&RetrySettings> for RetryConfig {
    fn from(settings: &RetrySettings) -> Self {
        Self {
            max_attempts: settings.max_attempts.max(1),
            initial_delay: Duration::from_millis(settings.initial_delay_ms),
            max_delay: Duration::from_millis(settings.max_delay_ms),
            backoff_multiplier: backoff_multiplier(settings.backoff_multiplier),
        }
    }
}
