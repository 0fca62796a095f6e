//! Retry policy for control-plane calls
//!
//! Transient failures are retried with exponential backoff up to
//! [`RetryConfig::max_attempts`]; everything else fails on the first attempt.
//! The result is always one of the [`RemoteFailure`] classes.

use crate::clock::Clock;
use crate::error::{ApiError, ApiResult, RemoteFailure};
use crate::provider::RetryConfig;
use std::future::Future;

/// Classify a failed call after `attempts` attempts
pub fn classify(error: ApiError, attempts: u32) -> RemoteFailure {
    if error.is_transient() {
        RemoteFailure::Transient {
            source: error,
            attempts,
        }
    } else {
        RemoteFailure::Terminal { source: error }
    }
}

/// Run `call` until it succeeds, fails terminally, or runs out of attempts
pub async fn with_retry<T, F, Fut>(
    clock: &dyn Clock,
    config: &RetryConfig,
    operation: &str,
    mut call: F,
) -> Result<T, RemoteFailure>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = ApiResult<T>>,
{
    let max_attempts = config.max_attempts.max(1);
    let mut attempt = 1;

    loop {
        let error = match call().await {
            Ok(value) => return Ok(value),
            Err(error) => error,
        };

        if !error.is_transient() || attempt >= max_attempts {
            tracing::debug!(operation, attempt, error = %error, "remote call failed");
            return Err(classify(error, attempt));
        }

        let mut delay = config.delay_for_retry(attempt - 1);
        if let ApiError::RateLimited {
            retry_after: Some(hint),
        } = &error
        {
            delay = delay.max(*hint);
        }

        tracing::warn!(
            operation,
            attempt,
            max_attempts,
            delay_ms = delay.as_millis() as u64,
            error = %error,
            "remote call failed, retrying"
        );
        clock.sleep(delay).await;
        attempt += 1;
    }
}
