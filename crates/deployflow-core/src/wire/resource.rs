//! Component payloads (requests) and resource infos (responses)

use super::component::{ComponentType, Plan};
use serde::{Deserialize, Serialize};

/// One component as submitted on create/update
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(bound = "")]
pub struct ResourcePayload<C: ComponentType> {
    pub ref_id: String,
    pub region: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub elasticsearch_cluster_ref_id: Option<String>,
    pub plan: Plan<C>,
}

/// One component as returned by a read
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(bound = "")]
pub struct ResourceInfo<C: ComponentType> {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ref_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub elasticsearch_cluster_ref_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub info: Option<ClusterInfo<C>>,
}

impl<C: ComponentType> ResourceInfo<C> {
    /// Plan the component currently runs, if any.
    ///
    /// A component without one was removed or never provisioned.
    pub fn current_plan(&self) -> Option<&Plan<C>> {
        self.info
            .as_ref()?
            .plan_info
            .as_ref()?
            .current
            .as_ref()?
            .plan
            .as_ref()
    }

    pub fn metadata(&self) -> Option<&ClusterMetadata> {
        self.info.as_ref()?.metadata.as_ref()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(bound = "")]
pub struct ClusterInfo<C: ComponentType> {
    /// Remote-assigned resource ID
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// Display name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<ClusterMetadata>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub plan_info: Option<PlanInfo<C>>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClusterMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ports: Option<ClusterPorts>,
}

impl ClusterMetadata {
    pub fn http_endpoint(&self) -> Option<String> {
        let endpoint = self.endpoint.as_deref().filter(|e| !e.is_empty())?;
        let port = self.ports.as_ref()?.http?;
        Some(format!("http://{}:{}", endpoint, port))
    }

    pub fn https_endpoint(&self) -> Option<String> {
        let endpoint = self.endpoint.as_deref().filter(|e| !e.is_empty())?;
        let port = self.ports.as_ref()?.https?;
        Some(format!("https://{}:{}", endpoint, port))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClusterPorts {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub http: Option<u16>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub https: Option<u16>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(bound = "")]
pub struct PlanInfo<C: ComponentType> {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current: Option<PlanAttempt<C>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pending: Option<PlanAttempt<C>>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub history: Vec<PlanAttempt<C>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(bound = "")]
pub struct PlanAttempt<C: ComponentType> {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub plan: Option<Plan<C>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub healthy: Option<bool>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub plan_attempt_log: Vec<PlanStepInfo>,
}

/// One step of a plan attempt
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlanStepInfo {
    pub step_id: String,
    pub status: StepStatus,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub info_log: Vec<PlanStepLogMessage>,
}

impl PlanStepInfo {
    pub fn new(step_id: impl Into<String>, status: StepStatus) -> Self {
        Self {
            step_id: step_id.into(),
            status,
            info_log: Vec::new(),
        }
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.info_log.push(PlanStepLogMessage {
            message: message.into(),
        });
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepStatus {
    Success,
    Warning,
    Error,
    Pending,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlanStepLogMessage {
    pub message: String,
}
