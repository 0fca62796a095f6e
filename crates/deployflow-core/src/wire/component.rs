//! Per-component plan, topology and configuration
//!
//! Every component kind shares the same plan layout. What differs is the set
//! of system settings its configuration accepts and the node-type flags its
//! topology entries carry; [`ComponentType`] binds those per kind.

use crate::kind::ComponentKind;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fmt::Debug;

/// Binds a component kind to its kind-specific wire types
pub trait ComponentType: Debug + Clone + Copy + Default + PartialEq + Send + Sync + 'static {
    const KIND: ComponentKind;

    /// Kind-specific configuration settings
    type SystemSettings: Debug
        + Clone
        + Default
        + PartialEq
        + Serialize
        + DeserializeOwned
        + Send
        + Sync;

    /// Kind-specific node role flags of a topology entry
    type NodeType: Debug + Clone + Default + PartialEq + Serialize + DeserializeOwned + Send + Sync;
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Elasticsearch;

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Kibana;

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Apm;

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct EnterpriseSearch;

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct AppSearch;

impl ComponentType for Elasticsearch {
    const KIND: ComponentKind = ComponentKind::Elasticsearch;
    type SystemSettings = NoSystemSettings;
    type NodeType = ElasticsearchNodeType;
}

impl ComponentType for Kibana {
    const KIND: ComponentKind = ComponentKind::Kibana;
    type SystemSettings = NoSystemSettings;
    type NodeType = NoNodeType;
}

impl ComponentType for Apm {
    const KIND: ComponentKind = ComponentKind::Apm;
    type SystemSettings = ApmSystemSettings;
    type NodeType = NoNodeType;
}

impl ComponentType for EnterpriseSearch {
    const KIND: ComponentKind = ComponentKind::EnterpriseSearch;
    type SystemSettings = SessionKeySystemSettings;
    type NodeType = EnterpriseSearchNodeType;
}

impl ComponentType for AppSearch {
    const KIND: ComponentKind = ComponentKind::AppSearch;
    type SystemSettings = SessionKeySystemSettings;
    type NodeType = AppSearchNodeType;
}

/// Kinds without system settings
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct NoSystemSettings {}

/// Kinds without node role flags
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct NoNodeType {}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ApmSystemSettings {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub debug_enabled: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secret_token: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SessionKeySystemSettings {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secret_session_key: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ElasticsearchNodeType {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub master: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ingest: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ml: Option<bool>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EnterpriseSearchNodeType {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub appserver: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub connector: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub worker: Option<bool>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AppSearchNodeType {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub appserver: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub worker: Option<bool>,
}

/// Raw user settings shared by all kinds
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UserSettings {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_settings_yaml: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_settings_override_yaml: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_settings_json: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_settings_override_json: Option<serde_json::Value>,
}

/// Component or topology-entry configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(bound = "")]
pub struct Configuration<C: ComponentType> {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(flatten)]
    pub user_settings: UserSettings,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system_settings: Option<C::SystemSettings>,
}

/// Size of one node group
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TopologySize {
    /// Resource the value counts, e.g. `memory`
    pub resource: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<i32>,
}

impl TopologySize {
    /// Memory allocation of `megabytes`; `None` when the count does not fit
    /// the wire value
    pub fn memory(megabytes: u32) -> Option<Self> {
        let value = i32::try_from(megabytes).ok()?;
        Some(Self {
            resource: crate::memory::MEMORY_RESOURCE.to_string(),
            value: Some(value),
        })
    }

    /// Size value when it represents a real allocation
    pub fn allocated(&self) -> Option<u32> {
        self.value
            .filter(|v| *v > 0)
            .and_then(|v| u32::try_from(v).ok())
    }
}

/// Sizing and placement of one node group
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(bound = "")]
pub struct TopologyElement<C: ComponentType> {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub instance_configuration_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<TopologySize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub zone_count: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub node_type: Option<C::NodeType>,
    /// Overrides the plan-level configuration for this entry only
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub config: Option<Configuration<C>>,
}

/// Desired configuration of one component
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(bound = "")]
pub struct Plan<C: ComponentType> {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub config: Option<Configuration<C>>,
    #[serde(default)]
    pub cluster_topology: Vec<TopologyElement<C>>,
}

impl<C: ComponentType> Plan<C> {
    pub fn version(&self) -> Option<&str> {
        self.config.as_ref().and_then(|c| c.version.as_deref())
    }
}
