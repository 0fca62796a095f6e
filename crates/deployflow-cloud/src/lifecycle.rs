//! Deployment lifecycle controller
//!
//! Drives create, read, update and delete of one managed deployment against
//! a [`DeploymentApi`], recording progress in a [`StateStore`] so that an
//! interrupted operation can be resumed with the same request ID.
//!
//! ```text
//! Absent ──create──▶ Creating ──plan done──▶ Active ──update──▶ Updating
//!                       │                      ▲                   │
//!                       └──plan failed──▶ Failed ◀──plan failed────┘
//! Active ──delete──▶ Deleting ──▶ Deleted
//! ```

use crate::clock::{Clock, TokioClock};
use crate::credentials::CredentialBundle;
use crate::error::{
    CREATE, DELETE, DeploymentError, OperationError, READ, RemoteFailure, Result, TRACK_CREATE,
    TRACK_DELETE, TRACK_UPDATE, UPDATE,
};
use crate::provider::{DeploymentApi, RetryConfig};
use crate::retry::with_retry;
use crate::state::{DeploymentState, FileStateStore, LifecycleState, StateStore};
use crate::waiter::{PollConfig, WaitError, wait_for_plan_completion};
use deployflow_config::{ConfigError, Settings};
use deployflow_core::wire::{ClusterCredentials, DeploymentCreateRequest};
use deployflow_core::{
    Block, ExpandDefaults, expand_create, expand_update, flatten_deployment, payload_overrides,
    schema,
};
use rand::distributions::Alphanumeric;
use rand::{Rng, thread_rng};
use std::sync::Arc;
use tracing::{debug, info, warn};

const REQUEST_ID_LEN: usize = 64;

/// Generate a fresh idempotency key for a create or update submission
pub fn generate_request_id() -> String {
    thread_rng()
        .sample_iter(&Alphanumeric)
        .take(REQUEST_ID_LEN)
        .map(char::from)
        .collect()
}

pub struct DeploymentController {
    api: Arc<dyn DeploymentApi>,
    store: Arc<dyn StateStore>,
    clock: Arc<dyn Clock>,
    defaults: ExpandDefaults,
    retry: RetryConfig,
    poll: PollConfig,
}

impl DeploymentController {
    pub fn new(api: Arc<dyn DeploymentApi>, store: Arc<dyn StateStore>) -> Self {
        Self {
            api,
            store,
            clock: Arc::new(TokioClock),
            defaults: ExpandDefaults::default(),
            retry: RetryConfig::default(),
            poll: PollConfig::default(),
        }
    }

    /// Controller with file-backed state and tuning from `settings`
    pub fn from_settings(
        api: Arc<dyn DeploymentApi>,
        settings: &Settings,
    ) -> std::result::Result<Self, ConfigError> {
        let dir = deployflow_config::state_dir(settings)?;
        Ok(Self::new(api, Arc::new(FileStateStore::new(dir)))
            .with_defaults(settings.defaults.clone())
            .with_retry(RetryConfig::from(&settings.retry))
            .with_poll(PollConfig::from(&settings.poll)))
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_defaults(mut self, defaults: ExpandDefaults) -> Self {
        self.defaults = defaults;
        self
    }

    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_poll(mut self, poll: PollConfig) -> Self {
        self.poll = poll;
        self
    }

    /// Recorded state for `key`, without contacting the control plane
    pub async fn state(&self, key: &str) -> Result<DeploymentState> {
        self.load(key, READ).await
    }

    /// Create the deployment described by `desired`.
    ///
    /// The request ID is persisted before submission. Rerunning after an
    /// interrupted create resubmits with the same ID, so the control plane
    /// returns the deployment it already started instead of creating another.
    pub async fn create(&self, key: &str, desired: &Block) -> Result<DeploymentState> {
        let mut state = self.load(key, CREATE).await?;
        let resumable = match state.lifecycle {
            LifecycleState::Absent | LifecycleState::Deleted | LifecycleState::Creating => true,
            LifecycleState::Failed => state.id.is_none(),
            _ => false,
        };
        if !resumable {
            return Err(OperationError::new(
                CREATE,
                DeploymentError::InvalidTransition {
                    from: state.lifecycle,
                    operation: "create",
                },
            ));
        }

        let request = expand_create(desired, &self.defaults)
            .map_err(|e| OperationError::new(CREATE, e.into()))?;
        let overrides =
            payload_overrides(desired).map_err(|e| OperationError::new(CREATE, e.into()))?;

        let request_id = request_id_for(desired, &state);
        // A replayed response may omit secrets an earlier attempt recorded
        let recorded = if state.request_id() == Some(request_id.as_str()) {
            CredentialBundle::from_attributes(&state.attributes)
        } else {
            CredentialBundle::default()
        };
        state.attributes.insert(schema::REQUEST_ID, request_id.as_str());
        state.transition(LifecycleState::Creating);
        self.save(key, &state, CREATE).await?;
        info!(key, request_id = %request_id, "submitting deployment");

        let api = &*self.api;
        let (submitted, rid, ov) = (&request, request_id.as_str(), &overrides);
        let response = match with_retry(&*self.clock, &self.retry, "create", move || {
            api.create(submitted, rid, ov)
        })
        .await
        {
            Ok(response) => response,
            Err(source) => {
                state.transition(LifecycleState::Failed);
                let error = DeploymentError::Submission {
                    request_id: request_id.clone(),
                    source,
                };
                return Err(self.fail(key, &state, OperationError::new(CREATE, error)).await);
            }
        };

        let Some(deployment_id) = response.id.clone().filter(|id| !id.is_empty()) else {
            state.transition(LifecycleState::Failed);
            let error = DeploymentError::InvalidResponse {
                request_id: request_id.clone(),
                message: "no deployment identifier in the creation response".to_string(),
            };
            return Err(self.fail(key, &state, OperationError::new(CREATE, error)).await);
        };

        // Secrets only come with this response
        let mut credentials = recorded;
        credentials.merge(CredentialBundle::from_create_response(&response));
        state.id = Some(deployment_id.clone());
        credentials.write_to(&mut state.attributes);
        self.save(key, &state, CREATE).await?;
        info!(
            key,
            deployment_id = %deployment_id,
            request_id = %request_id,
            replayed = response.created == Some(false),
            "deployment accepted"
        );

        if let Err(error) = self.track(&deployment_id, Some(&request_id)).await {
            if matches!(error, DeploymentError::PlanFailed { .. }) {
                state.transition(LifecycleState::Failed);
            }
            return Err(self
                .fail(key, &state, OperationError::new(TRACK_CREATE, error))
                .await);
        }

        let mut missing_credentials = None;
        if !credentials.has_elasticsearch() {
            match self.reset_credentials(&deployment_id, &request).await {
                Ok(reset) => {
                    credentials.set_elasticsearch(&reset);
                    credentials.write_to(&mut state.attributes);
                }
                Err(error) => missing_credentials = Some(error),
            }
        }

        match self.fetch(&deployment_id).await {
            Ok(Some(flat)) => {
                state.apply_read(flat);
                state.discard_request_id();
                state.transition(LifecycleState::Active);
            }
            Ok(None) => {
                warn!(key, deployment_id = %deployment_id, "deployment vanished right after creation");
                state.clear(LifecycleState::Deleted);
            }
            Err(error) => {
                return Err(self.fail(key, &state, OperationError::new(CREATE, error)).await);
            }
        }
        self.save(key, &state, CREATE).await?;

        if let Some(error) = missing_credentials {
            return Err(OperationError::new(CREATE, error));
        }
        info!(key, deployment_id = %deployment_id, "deployment created");
        Ok(state)
    }

    /// Refresh the recorded state from the control plane.
    ///
    /// A deployment that no longer exists, or has no running component, is
    /// recorded as deleted.
    pub async fn read(&self, key: &str) -> Result<DeploymentState> {
        let mut state = self.load(key, READ).await?;
        let Some(deployment_id) = state.id.clone() else {
            return Ok(state);
        };

        match self.fetch(&deployment_id).await {
            Ok(Some(flat)) => state.apply_read(flat),
            Ok(None) => {
                info!(key, deployment_id = %deployment_id, "deployment is gone");
                state.clear(LifecycleState::Deleted);
            }
            Err(error) => return Err(OperationError::new(READ, error)),
        }
        self.save(key, &state, READ).await?;
        Ok(state)
    }

    /// Bring the deployment in line with `desired`
    pub async fn update(&self, key: &str, desired: &Block) -> Result<DeploymentState> {
        let mut state = self.load(key, UPDATE).await?;
        let deployment_id = match (&state.id, state.lifecycle) {
            (
                Some(id),
                LifecycleState::Active | LifecycleState::Updating | LifecycleState::Failed,
            ) => id.clone(),
            _ => {
                return Err(OperationError::new(
                    UPDATE,
                    DeploymentError::InvalidTransition {
                        from: state.lifecycle,
                        operation: "update",
                    },
                ));
            }
        };

        let request = expand_update(desired, &self.defaults)
            .map_err(|e| OperationError::new(UPDATE, e.into()))?;
        let overrides =
            payload_overrides(desired).map_err(|e| OperationError::new(UPDATE, e.into()))?;

        if state.lifecycle == LifecycleState::Active
            && expand_update(&state.attributes, &self.defaults).is_ok_and(|current| current == request)
        {
            debug!(key, deployment_id = %deployment_id, "deployment already up to date");
            return Ok(state);
        }

        let request_id = request_id_for(desired, &state);
        state.attributes.insert(schema::REQUEST_ID, request_id.as_str());
        state.transition(LifecycleState::Updating);
        self.save(key, &state, UPDATE).await?;
        info!(key, deployment_id = %deployment_id, request_id = %request_id, "submitting update");

        let api = &*self.api;
        let (id, submitted, rid, ov) = (
            deployment_id.as_str(),
            &request,
            request_id.as_str(),
            &overrides,
        );
        if let Err(source) = with_retry(&*self.clock, &self.retry, "update", move || {
            api.update(id, submitted, rid, ov)
        })
        .await
        {
            state.transition(LifecycleState::Failed);
            let error = DeploymentError::Submission {
                request_id: request_id.clone(),
                source,
            };
            return Err(self.fail(key, &state, OperationError::new(UPDATE, error)).await);
        }

        if let Err(error) = self.track(&deployment_id, Some(&request_id)).await {
            if matches!(error, DeploymentError::PlanFailed { .. }) {
                state.transition(LifecycleState::Failed);
            }
            return Err(self
                .fail(key, &state, OperationError::new(TRACK_UPDATE, error))
                .await);
        }

        match self.fetch(&deployment_id).await {
            Ok(Some(flat)) => {
                state.apply_read(flat);
                state.discard_request_id();
                state.transition(LifecycleState::Active);
            }
            Ok(None) => state.clear(LifecycleState::Deleted),
            Err(error) => {
                return Err(self.fail(key, &state, OperationError::new(UPDATE, error)).await);
            }
        }
        self.save(key, &state, UPDATE).await?;
        info!(key, deployment_id = %deployment_id, "deployment updated");
        Ok(state)
    }

    /// Shut the deployment down and forget it.
    ///
    /// Deleting something that is already gone succeeds.
    pub async fn delete(&self, key: &str) -> Result<DeploymentState> {
        let mut state = self.load(key, DELETE).await?;
        let Some(deployment_id) = state.id.clone() else {
            debug!(key, lifecycle = %state.lifecycle, "nothing to delete");
            return Ok(state);
        };

        state.transition(LifecycleState::Deleting);
        self.save(key, &state, DELETE).await?;
        info!(key, deployment_id = %deployment_id, "shutting down deployment");

        let api = &*self.api;
        let id = deployment_id.as_str();
        match with_retry(&*self.clock, &self.retry, "shutdown", move || api.shutdown(id)).await {
            Ok(()) => {}
            Err(source) if source.is_not_found() => {
                debug!(key, deployment_id = %deployment_id, "deployment already gone");
            }
            Err(source) => {
                state.transition(LifecycleState::Failed);
                let error = DeploymentError::Remote {
                    deployment_id: deployment_id.clone(),
                    source,
                };
                return Err(self.fail(key, &state, OperationError::new(DELETE, error)).await);
            }
        }

        match self.track(&deployment_id, None).await {
            Ok(()) => {}
            Err(DeploymentError::Tracking { source, .. }) if source.is_not_found() => {}
            Err(error) => {
                return Err(self
                    .fail(key, &state, OperationError::new(TRACK_DELETE, error))
                    .await);
            }
        }

        state.clear(LifecycleState::Deleted);
        self.save(key, &state, DELETE).await?;
        info!(key, deployment_id = %deployment_id, "deployment deleted");
        Ok(state)
    }

    async fn load(&self, key: &str, prefix: &'static str) -> Result<DeploymentState> {
        self.store
            .load(key)
            .await
            .map(Option::unwrap_or_default)
            .map_err(|e| OperationError::new(prefix, e.into()))
    }

    async fn save(&self, key: &str, state: &DeploymentState, prefix: &'static str) -> Result<()> {
        self.store
            .save(key, state)
            .await
            .map_err(|e| OperationError::new(prefix, e.into()))
    }

    /// Record `state` after a failure, keeping the original error first
    async fn fail(
        &self,
        key: &str,
        state: &DeploymentState,
        mut error: OperationError,
    ) -> OperationError {
        warn!(key, lifecycle = %state.lifecycle, error = %error, "operation failed");
        if let Err(save_error) = self.store.save(key, state).await {
            error.push(save_error.into());
        }
        error
    }

    /// Wait until the plans started by the last submission have finished
    async fn track(
        &self,
        deployment_id: &str,
        request_id: Option<&str>,
    ) -> std::result::Result<(), DeploymentError> {
        let request_id = request_id.map(str::to_string);
        match wait_for_plan_completion(&*self.api, &*self.clock, &self.poll, deployment_id).await {
            Ok(()) => Ok(()),
            Err(WaitError::Timeout { elapsed }) => Err(DeploymentError::PlanTimeout {
                deployment_id: deployment_id.to_string(),
                request_id,
                elapsed,
            }),
            Err(WaitError::Failed(RemoteFailure::PlanFailed { diagnostics })) => {
                Err(DeploymentError::PlanFailed {
                    deployment_id: deployment_id.to_string(),
                    request_id,
                    diagnostics,
                })
            }
            Err(WaitError::Failed(source)) => Err(DeploymentError::Tracking {
                deployment_id: deployment_id.to_string(),
                request_id,
                source,
            }),
        }
    }

    /// Read the deployment and flatten it; `None` once it no longer exists
    async fn fetch(&self, deployment_id: &str) -> std::result::Result<Option<Block>, DeploymentError> {
        let api = &*self.api;
        let response =
            match with_retry(&*self.clock, &self.retry, "get", move || api.get(deployment_id))
                .await
            {
                Ok(response) => response,
                Err(source) if source.is_not_found() => return Ok(None),
                Err(source) => {
                    return Err(DeploymentError::Remote {
                        deployment_id: deployment_id.to_string(),
                        source,
                    });
                }
            };

        if !response.resources.has_running_resources() {
            return Ok(None);
        }
        Ok(Some(flatten_deployment(&response)?))
    }

    /// Obtain search-engine credentials the creation response did not carry
    async fn reset_credentials(
        &self,
        deployment_id: &str,
        request: &DeploymentCreateRequest,
    ) -> std::result::Result<ClusterCredentials, DeploymentError> {
        let unavailable = |message: String| DeploymentError::CredentialExtraction {
            deployment_id: deployment_id.to_string(),
            message,
        };

        let Some(ref_id) = request
            .resources
            .elasticsearch
            .first()
            .map(|r| r.ref_id.as_str())
        else {
            return Err(unavailable("no elasticsearch component".to_string()));
        };

        info!(deployment_id, ref_id, "resetting elasticsearch password");
        let api = &*self.api;
        let credentials = with_retry(&*self.clock, &self.retry, "reset password", move || {
            api.reset_elasticsearch_password(deployment_id, ref_id)
        })
        .await
        .map_err(|e| unavailable(format!("password reset failed: {}", e)))?;

        let complete = [&credentials.username, &credentials.password]
            .iter()
            .all(|v| v.as_deref().is_some_and(|s| !s.is_empty()));
        if !complete {
            return Err(unavailable(
                "password reset returned incomplete credentials".to_string(),
            ));
        }
        Ok(credentials)
    }
}

/// Request ID for the next submission: the caller's, then the one recorded by
/// an interrupted attempt, then a fresh one
fn request_id_for(desired: &Block, state: &DeploymentState) -> String {
    desired
        .get(schema::REQUEST_ID)
        .and_then(|v| v.as_str())
        .filter(|id| !id.is_empty())
        .or_else(|| state.request_id())
        .map(str::to_string)
        .unwrap_or_else(generate_request_id)
}
