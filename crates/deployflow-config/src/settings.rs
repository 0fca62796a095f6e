//! Controller settings
//!
//! ```yaml
//! poll:
//!   interval_ms: 2000
//!   timeout_secs: 2400
//! retry:
//!   max_attempts: 5
//! state_dir: /var/lib/deployflow
//! defaults:
//!   apm:
//!     instance_configuration_id: gcp.apm.1
//!     memory_per_node: 1g
//! ```
//!
//! Every field is optional.

use deployflow_core::ExpandDefaults;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub poll: PollSettings,
    pub retry: RetrySettings,
    /// Directory holding the local deployment state files
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state_dir: Option<PathBuf>,
    pub defaults: ExpandDefaults,
}

/// Plan-completion polling
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PollSettings {
    /// First wait between plan-status queries (ms)
    #[serde(default = "default_poll_interval")]
    pub interval_ms: u64,
    /// Longest wait between plan-status queries (ms)
    #[serde(default = "default_poll_max_interval")]
    pub max_interval_ms: u64,
    #[serde(default = "default_poll_multiplier")]
    pub multiplier: f64,
    /// Give up waiting after this long
    #[serde(default = "default_poll_timeout")]
    pub timeout_secs: u64,
    /// Consecutive failed status queries tolerated before giving up
    #[serde(default = "default_max_poll_errors")]
    pub max_poll_errors: u32,
}

fn default_poll_interval() -> u64 {
    2000
}
fn default_poll_max_interval() -> u64 {
    30000
}
fn default_poll_multiplier() -> f64 {
    1.5
}
fn default_poll_timeout() -> u64 {
    40 * 60
}
fn default_max_poll_errors() -> u32 {
    3
}

impl Default for PollSettings {
    fn default() -> Self {
        Self {
            interval_ms: default_poll_interval(),
            max_interval_ms: default_poll_max_interval(),
            multiplier: default_poll_multiplier(),
            timeout_secs: default_poll_timeout(),
            max_poll_errors: default_max_poll_errors(),
        }
    }
}

/// Retries of transient remote-call failures
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrySettings {
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    #[serde(default = "default_initial_delay")]
    pub initial_delay_ms: u64,
    #[serde(default = "default_max_delay")]
    pub max_delay_ms: u64,
    #[serde(default = "default_backoff_multiplier")]
    pub backoff_multiplier: f64,
}

fn default_max_attempts() -> u32 {
    3
}
fn default_initial_delay() -> u64 {
    1000
}
fn default_max_delay() -> u64 {
    30000
}
fn default_backoff_multiplier() -> f64 {
    2.0
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            initial_delay_ms: default_initial_delay(),
            max_delay_ms: default_max_delay(),
            backoff_multiplier: default_backoff_multiplier(),
        }
    }
}
