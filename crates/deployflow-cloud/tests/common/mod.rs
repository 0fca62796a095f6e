#![allow(dead_code)]

use async_trait::async_trait;
use deployflow_cloud::{
    ApiError, ApiResult, Clock, DeploymentApi, DeploymentController, MemoryStateStore,
    PollConfig, RetryConfig, StateStore,
};
use deployflow_core::testing::{deployment_snapshot, resource_id};
use deployflow_core::wire::{
    ClusterCredentials, DeploymentCreateRequest, DeploymentCreateResponse, DeploymentGetResponse,
    DeploymentPayloadResources, DeploymentResource, DeploymentUpdateRequest,
    DeploymentUpdateResponse, PayloadOverrides, PlanActivity, PlanStatus, PlanStepInfo,
    StepStatus,
};
use deployflow_core::{Block, ComponentKind};
use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::{Arc, Mutex, Once};
use std::time::{Duration, Instant};

static TRACING: Once = Once::new();

pub fn init_tracing() {
    TRACING.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    });
}

/// Where an injected failure strikes relative to the remote side accepting
/// the request
#[derive(Debug, Clone)]
pub enum Fault {
    BeforeAccept(ApiError),
    AfterAccept(ApiError),
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct CallCounts {
    pub create: u32,
    pub update: u32,
    pub get: u32,
    pub plan_activity: u32,
    pub shutdown: u32,
    pub reset: u32,
}

struct Hosted {
    name: String,
    resources: DeploymentPayloadResources,
    running: bool,
    pending_polls: u32,
    plan_error: Option<String>,
}

#[derive(Default)]
struct Inner {
    deployments: BTreeMap<String, Hosted>,
    by_request: HashMap<String, DeploymentCreateResponse>,
    next_id: u32,
    calls: CallCounts,
    create_faults: VecDeque<Fault>,
    update_faults: VecDeque<Fault>,
    get_faults: VecDeque<ApiError>,
    poll_faults: VecDeque<ApiError>,
    shutdown_faults: VecDeque<ApiError>,
    pending_polls: u32,
    plan_error: Option<String>,
    withhold_credentials: bool,
    replay_without_secrets: bool,
    reset_supported: bool,
    last_update: Option<DeploymentUpdateRequest>,
}

/// In-memory control plane honoring request-ID idempotency
#[derive(Default)]
pub struct FakeControlPlane {
    inner: Mutex<Inner>,
}

impl FakeControlPlane {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    fn with<T>(&self, f: impl FnOnce(&mut Inner) -> T) -> T {
        f(&mut self.inner.lock().unwrap())
    }

    pub fn calls(&self) -> CallCounts {
        self.with(|inner| inner.calls)
    }

    pub fn deployment_count(&self) -> usize {
        self.with(|inner| inner.deployments.len())
    }

    pub fn last_update(&self) -> Option<DeploymentUpdateRequest> {
        self.with(|inner| inner.last_update.clone())
    }

    pub fn fail_create(&self, fault: Fault) {
        self.with(|inner| inner.create_faults.push_back(fault));
    }

    pub fn fail_update(&self, fault: Fault) {
        self.with(|inner| inner.update_faults.push_back(fault));
    }

    pub fn fail_get(&self, error: ApiError) {
        self.with(|inner| inner.get_faults.push_back(error));
    }

    pub fn fail_poll(&self, error: ApiError) {
        self.with(|inner| inner.poll_faults.push_back(error));
    }

    pub fn fail_shutdown(&self, error: ApiError) {
        self.with(|inner| inner.shutdown_faults.push_back(error));
    }

    /// Polls that report a new plan as still pending
    pub fn set_pending_polls(&self, polls: u32) {
        self.with(|inner| inner.pending_polls = polls);
    }

    /// Make the next submitted plan fail with `message`
    pub fn fail_next_plan(&self, message: &str) {
        self.with(|inner| inner.plan_error = Some(message.to_string()));
    }

    pub fn withhold_credentials(&self) {
        self.with(|inner| inner.withhold_credentials = true);
    }

    /// Answer replayed requests without the secrets of the first response
    pub fn replay_without_secrets(&self) {
        self.with(|inner| inner.replay_without_secrets = true);
    }

    pub fn support_password_reset(&self) {
        self.with(|inner| inner.reset_supported = true);
    }

    /// Let every plan of `deployment_id` run to completion
    pub fn finish_plans(&self, deployment_id: &str) {
        self.with(|inner| {
            if let Some(hosted) = inner.deployments.get_mut(deployment_id) {
                hosted.pending_polls = 0;
            }
        });
    }

    /// Delete a deployment behind the controller's back
    pub fn forget(&self, deployment_id: &str) {
        self.with(|inner| inner.deployments.remove(deployment_id));
    }

    /// Stop every component behind the controller's back
    pub fn stop(&self, deployment_id: &str) {
        self.with(|inner| {
            if let Some(hosted) = inner.deployments.get_mut(deployment_id) {
                hosted.running = false;
            }
        });
    }
}

fn created_resources(
    deployment_id: &str,
    resources: &DeploymentPayloadResources,
    withhold_credentials: bool,
) -> Vec<DeploymentResource> {
    resources
        .ref_ids()
        .into_iter()
        .map(|(kind, ref_id)| {
            let credentials = (kind == ComponentKind::Elasticsearch && !withhold_credentials)
                .then(|| ClusterCredentials {
                    username: Some("elastic".to_string()),
                    password: Some(format!("secret-{}", deployment_id)),
                });
            let secret_token =
                (kind == ComponentKind::Apm).then(|| format!("token-{}", deployment_id));
            DeploymentResource {
                kind,
                ref_id: ref_id.to_string(),
                id: Some(resource_id(deployment_id, ref_id)),
                region: None,
                credentials,
                secret_token,
            }
        })
        .collect()
}

#[async_trait]
impl DeploymentApi for FakeControlPlane {
    async fn create(
        &self,
        request: &DeploymentCreateRequest,
        request_id: &str,
        overrides: &PayloadOverrides,
    ) -> ApiResult<DeploymentCreateResponse> {
        self.with(|inner| {
            inner.calls.create += 1;
            let fault = inner.create_faults.pop_front();
            if let Some(Fault::BeforeAccept(error)) = fault {
                return Err(error);
            }

            let response = match inner.by_request.get(request_id) {
                Some(earlier) => {
                    let mut replay = DeploymentCreateResponse {
                        created: Some(false),
                        ..earlier.clone()
                    };
                    if inner.replay_without_secrets {
                        for resource in &mut replay.resources {
                            resource.credentials = None;
                            resource.secret_token = None;
                        }
                    }
                    replay
                }
                None => {
                    inner.next_id += 1;
                    let id = format!("d{}", inner.next_id);
                    let mut request = request.clone();
                    request.apply_overrides(overrides);
                    let name = request.name.clone().unwrap_or_default();
                    let response = DeploymentCreateResponse {
                        id: Some(id.clone()),
                        name: Some(name.clone()),
                        created: Some(true),
                        resources: created_resources(
                            &id,
                            &request.resources,
                            inner.withhold_credentials,
                        ),
                    };
                    inner.deployments.insert(
                        id,
                        Hosted {
                            name,
                            resources: request.resources,
                            running: true,
                            pending_polls: inner.pending_polls,
                            plan_error: inner.plan_error.take(),
                        },
                    );
                    inner
                        .by_request
                        .insert(request_id.to_string(), response.clone());
                    response
                }
            };

            match fault {
                Some(Fault::AfterAccept(error)) => Err(error),
                _ => Ok(response),
            }
        })
    }

    async fn update(
        &self,
        deployment_id: &str,
        request: &DeploymentUpdateRequest,
        _request_id: &str,
        overrides: &PayloadOverrides,
    ) -> ApiResult<DeploymentUpdateResponse> {
        self.with(|inner| {
            inner.calls.update += 1;
            let fault = inner.update_faults.pop_front();
            if let Some(Fault::BeforeAccept(error)) = fault {
                return Err(error);
            }

            let mut request = request.clone();
            request.apply_overrides(overrides);
            let pending_polls = inner.pending_polls;
            let plan_error = inner.plan_error.take();
            let hosted = inner
                .deployments
                .get_mut(deployment_id)
                .ok_or_else(|| ApiError::NotFound(deployment_id.to_string()))?;
            if let Some(name) = &request.name {
                hosted.name = name.clone();
            }
            hosted.resources = request.resources.clone();
            hosted.running = true;
            hosted.pending_polls = pending_polls;
            hosted.plan_error = plan_error;
            let response = DeploymentUpdateResponse {
                id: Some(deployment_id.to_string()),
                name: Some(hosted.name.clone()),
                resources: Vec::new(),
            };
            inner.last_update = Some(request);

            match fault {
                Some(Fault::AfterAccept(error)) => Err(error),
                _ => Ok(response),
            }
        })
    }

    async fn get(&self, deployment_id: &str) -> ApiResult<DeploymentGetResponse> {
        self.with(|inner| {
            inner.calls.get += 1;
            if let Some(error) = inner.get_faults.pop_front() {
                return Err(error);
            }
            let hosted = inner
                .deployments
                .get(deployment_id)
                .ok_or_else(|| ApiError::NotFound(deployment_id.to_string()))?;
            if !hosted.running {
                return Ok(DeploymentGetResponse {
                    id: Some(deployment_id.to_string()),
                    name: Some(hosted.name.clone()),
                    ..Default::default()
                });
            }
            Ok(deployment_snapshot(
                deployment_id,
                &hosted.name,
                &hosted.resources,
            ))
        })
    }

    async fn plan_activity(&self, deployment_id: &str) -> ApiResult<Vec<PlanActivity>> {
        self.with(|inner| {
            inner.calls.plan_activity += 1;
            if let Some(error) = inner.poll_faults.pop_front() {
                return Err(error);
            }
            let hosted = inner
                .deployments
                .get_mut(deployment_id)
                .ok_or_else(|| ApiError::NotFound(deployment_id.to_string()))?;

            let status = if hosted.pending_polls > 0 {
                hosted.pending_polls -= 1;
                PlanStatus::Pending
            } else if hosted.plan_error.is_some() {
                PlanStatus::Error
            } else {
                PlanStatus::Success
            };
            let steps = match (&hosted.plan_error, status) {
                (Some(message), PlanStatus::Error) => {
                    vec![PlanStepInfo::new("allocate", StepStatus::Error).with_message(message)]
                }
                _ => Vec::new(),
            };

            Ok(hosted
                .resources
                .ref_ids()
                .into_iter()
                .map(|(kind, ref_id)| PlanActivity {
                    kind,
                    ref_id: ref_id.to_string(),
                    resource_id: Some(resource_id(deployment_id, ref_id)),
                    status,
                    steps: steps.clone(),
                })
                .collect())
        })
    }

    async fn shutdown(&self, deployment_id: &str) -> ApiResult<()> {
        self.with(|inner| {
            inner.calls.shutdown += 1;
            if let Some(error) = inner.shutdown_faults.pop_front() {
                return Err(error);
            }
            let hosted = inner
                .deployments
                .get_mut(deployment_id)
                .ok_or_else(|| ApiError::NotFound(deployment_id.to_string()))?;
            hosted.running = false;
            hosted.pending_polls = 0;
            hosted.plan_error = None;
            Ok(())
        })
    }

    async fn reset_elasticsearch_password(
        &self,
        deployment_id: &str,
        _ref_id: &str,
    ) -> ApiResult<ClusterCredentials> {
        self.with(|inner| {
            inner.calls.reset += 1;
            if !inner.reset_supported {
                return Err(ApiError::Unsupported("password reset".to_string()));
            }
            if !inner.deployments.contains_key(deployment_id) {
                return Err(ApiError::NotFound(deployment_id.to_string()));
            }
            Ok(ClusterCredentials {
                username: Some("elastic".to_string()),
                password: Some(format!("reset-{}", deployment_id)),
            })
        })
    }
}

/// Clock that only moves when something sleeps on it
pub struct ManualClock {
    base: Instant,
    offset: Mutex<Duration>,
    sleeps: Mutex<Vec<Duration>>,
}

impl ManualClock {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            base: Instant::now(),
            offset: Mutex::new(Duration::ZERO),
            sleeps: Mutex::new(Vec::new()),
        })
    }

    pub fn sleeps(&self) -> Vec<Duration> {
        self.sleeps.lock().unwrap().clone()
    }

    pub fn elapsed(&self) -> Duration {
        *self.offset.lock().unwrap()
    }
}

#[async_trait]
impl Clock for ManualClock {
    fn now(&self) -> Instant {
        self.base + *self.offset.lock().unwrap()
    }

    async fn sleep(&self, duration: Duration) {
        *self.offset.lock().unwrap() += duration;
        self.sleeps.lock().unwrap().push(duration);
    }
}

/// Deployment settings shared by the scenario builders
#[derive(Debug, Clone)]
pub struct Fixture {
    pub region: String,
    pub version: String,
}

impl Default for Fixture {
    fn default() -> Self {
        Self {
            region: "us-east-1".to_string(),
            version: "7.10.1".to_string(),
        }
    }
}

impl Fixture {
    fn parse(yaml: &str) -> Block {
        serde_yaml::from_str(yaml).unwrap()
    }

    /// One search engine with 1g nodes and one APM server
    pub fn search_with_apm(&self, name: &str) -> Block {
        Self::parse(&format!(
            r#"
name: {name}
region: {region}
version: "{version}"
elasticsearch:
  - topology:
      - memory_per_node: 1g
apm:
  - {{}}
"#,
            name = name,
            region = self.region,
            version = self.version,
        ))
    }

    /// Search engine plus an APM server whose debug flag differs between the
    /// component and its topology entry
    pub fn apm_debug(&self, name: &str, component: bool, topology: bool) -> Block {
        Self::parse(&format!(
            r#"
name: {name}
region: {region}
version: "{version}"
elasticsearch:
  - topology:
      - memory_per_node: 1g
apm:
  - config:
      - debug_enabled: {component}
    topology:
      - memory_per_node: 0.5g
        config:
          - debug_enabled: {topology}
"#,
            name = name,
            region = self.region,
            version = self.version,
            component = component,
            topology = topology,
        ))
    }
}

pub struct Harness {
    pub api: Arc<FakeControlPlane>,
    pub store: Arc<MemoryStateStore>,
    pub clock: Arc<ManualClock>,
    pub controller: DeploymentController,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_retry(RetryConfig {
            max_attempts: 3,
            initial_delay: Duration::from_millis(100),
            max_delay: Duration::from_secs(1),
            backoff_multiplier: 2.0,
        })
    }

    pub fn with_retry(retry: RetryConfig) -> Self {
        init_tracing();
        let api = FakeControlPlane::new();
        let store = Arc::new(MemoryStateStore::new());
        let clock = ManualClock::new();
        let controller = controller(api.clone(), store.clone(), clock.clone()).with_retry(retry);
        Self {
            api,
            store,
            clock,
            controller,
        }
    }
}

pub fn poll_config() -> PollConfig {
    PollConfig {
        interval: Duration::from_secs(2),
        max_interval: Duration::from_secs(10),
        multiplier: 2.0,
        timeout: Duration::from_secs(60),
        max_poll_errors: 2,
    }
}

pub fn controller(
    api: Arc<FakeControlPlane>,
    store: Arc<dyn StateStore>,
    clock: Arc<ManualClock>,
) -> DeploymentController {
    DeploymentController::new(api, store)
        .with_clock(clock)
        .with_poll(poll_config())
}
