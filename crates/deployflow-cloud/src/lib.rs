//! Deployflow lifecycle controller
//!
//! Manages hosted search deployments declaratively: a flat model goes in,
//! the control plane is driven until the plans it started have finished,
//! and the observed deployment is recorded back as a flat model.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────┐
//! │                deployflow-cloud                 │
//! │  ┌──────────────────────────────────────────┐   │
//! │  │          DeploymentController            │   │
//! │  │   create / read / update / delete        │   │
//! │  └──────────────────────────────────────────┘   │
//! │  ┌────────────┐ ┌────────────┐ ┌────────────┐   │
//! │  │   retry    │ │   waiter   │ │   state    │   │
//! │  └────────────┘ └────────────┘ └────────────┘   │
//! └───────┬─────────────────────────────┬───────────┘
//!         │                             │
//! ┌───────▼───────┐             ┌───────▼───────┐
//! │ DeploymentApi │             │  StateStore   │
//! │ (control      │             │ (JSON files)  │
//! │  plane)       │             │               │
//! └───────────────┘             └───────────────┘
//! ```

pub mod clock;
pub mod credentials;
pub mod error;
pub mod lifecycle;
pub mod provider;
pub mod retry;
pub mod state;
pub mod waiter;

// Re-exports
pub use clock::{Clock, TokioClock};
pub use credentials::CredentialBundle;
pub use error::{
    ApiError, ApiResult, DeploymentError, OperationError, RemoteFailure, Result, ResumeAction,
    StateError,
};
pub use lifecycle::{DeploymentController, generate_request_id};
pub use provider::{DeploymentApi, RetryConfig};
pub use retry::{classify, with_retry};
pub use state::{DeploymentState, FileStateStore, LifecycleState, MemoryStateStore, StateStore};
pub use waiter::{PollConfig, WaitError, wait_for_plan_completion};
