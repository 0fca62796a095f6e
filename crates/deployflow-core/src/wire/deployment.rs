//! Deployment-level requests and responses

use super::component::{
    Apm, AppSearch, ComponentType, Configuration, Elasticsearch, EnterpriseSearch, Kibana,
};
use super::resource::{PlanStepInfo, ResourceInfo, ResourcePayload};
use crate::kind::ComponentKind;
use serde::{Deserialize, Serialize};

/// Components submitted on create/update
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DeploymentPayloadResources {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub elasticsearch: Vec<ResourcePayload<Elasticsearch>>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub kibana: Vec<ResourcePayload<Kibana>>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub apm: Vec<ResourcePayload<Apm>>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub enterprise_search: Vec<ResourcePayload<EnterpriseSearch>>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub appsearch: Vec<ResourcePayload<AppSearch>>,
}

impl DeploymentPayloadResources {
    /// Apply the version and region overrides to every component
    pub fn apply_overrides(&mut self, overrides: &PayloadOverrides) {
        override_payloads(&mut self.elasticsearch, overrides);
        override_payloads(&mut self.kibana, overrides);
        override_payloads(&mut self.apm, overrides);
        override_payloads(&mut self.enterprise_search, overrides);
        override_payloads(&mut self.appsearch, overrides);
    }

    /// `(kind, ref_id)` of every submitted component
    pub fn ref_ids(&self) -> Vec<(ComponentKind, &str)> {
        let mut out = Vec::new();
        collect_ref_ids(&self.elasticsearch, &mut out);
        collect_ref_ids(&self.kibana, &mut out);
        collect_ref_ids(&self.apm, &mut out);
        collect_ref_ids(&self.enterprise_search, &mut out);
        collect_ref_ids(&self.appsearch, &mut out);
        out
    }
}

fn override_payloads<C: ComponentType>(
    payloads: &mut [ResourcePayload<C>],
    overrides: &PayloadOverrides,
) {
    for payload in payloads {
        if let Some(region) = &overrides.region {
            payload.region = region.clone();
        }
        if let Some(version) = &overrides.version {
            payload
                .plan
                .config
                .get_or_insert_with(Configuration::default)
                .version = Some(version.clone());
        }
    }
}

fn collect_ref_ids<'a, C: ComponentType>(
    payloads: &'a [ResourcePayload<C>],
    out: &mut Vec<(ComponentKind, &'a str)>,
) {
    out.extend(payloads.iter().map(|p| (C::KIND, p.ref_id.as_str())));
}

/// Fields that take precedence over the values nested in each component
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PayloadOverrides {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DeploymentCreateRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub resources: DeploymentPayloadResources,
}

impl DeploymentCreateRequest {
    pub fn apply_overrides(&mut self, overrides: &PayloadOverrides) {
        if let Some(name) = &overrides.name {
            self.name = Some(name.clone());
        }
        self.resources.apply_overrides(overrides);
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DeploymentUpdateRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Remove components that are not part of the request
    pub prune_orphans: bool,
    pub resources: DeploymentPayloadResources,
}

impl DeploymentUpdateRequest {
    pub fn apply_overrides(&mut self, overrides: &PayloadOverrides) {
        if let Some(name) = &overrides.name {
            self.name = Some(name.clone());
        }
        self.resources.apply_overrides(overrides);
    }
}

/// Component as reported in a create/update response
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeploymentResource {
    pub kind: ComponentKind,
    pub ref_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,
    /// Only present in the creation response
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub credentials: Option<ClusterCredentials>,
    /// Only present in the creation response
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secret_token: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClusterCredentials {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeploymentCreateResponse {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// False when the request ID matched an earlier submission
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created: Option<bool>,
    #[serde(default)]
    pub resources: Vec<DeploymentResource>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeploymentUpdateResponse {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default)]
    pub resources: Vec<DeploymentResource>,
}

/// Components returned by a read
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DeploymentResourceInfos {
    #[serde(default)]
    pub elasticsearch: Vec<ResourceInfo<Elasticsearch>>,
    #[serde(default)]
    pub kibana: Vec<ResourceInfo<Kibana>>,
    #[serde(default)]
    pub apm: Vec<ResourceInfo<Apm>>,
    #[serde(default)]
    pub enterprise_search: Vec<ResourceInfo<EnterpriseSearch>>,
    #[serde(default)]
    pub appsearch: Vec<ResourceInfo<AppSearch>>,
}

impl DeploymentResourceInfos {
    /// Whether any component still runs a plan
    pub fn has_running_resources(&self) -> bool {
        fn any<C: ComponentType>(infos: &[ResourceInfo<C>]) -> bool {
            infos.iter().any(|r| r.current_plan().is_some())
        }
        any(&self.elasticsearch)
            || any(&self.kibana)
            || any(&self.apm)
            || any(&self.enterprise_search)
            || any(&self.appsearch)
    }
}

/// Full snapshot returned by the resource-info query
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DeploymentGetResponse {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default)]
    pub resources: DeploymentResourceInfos,
}

/// Progress of the latest plan of one component
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlanActivity {
    pub kind: ComponentKind,
    pub ref_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource_id: Option<String>,
    pub status: PlanStatus,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub steps: Vec<PlanStepInfo>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlanStatus {
    Pending,
    Success,
    Error,
}
