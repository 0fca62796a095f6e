//! Expansion defaults
//!
//! Values the expander injects when a flat block leaves them unset. Passed
//! explicitly so callers (and tests) control them per deployment.

use crate::kind::ComponentKind;
use serde::{Deserialize, Serialize};

/// Topology defaults for one component kind
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TopologyDefaults {
    pub instance_configuration_id: String,
    pub memory_per_node: String,
    #[serde(default = "default_zone_count")]
    pub zone_count: i32,
}

fn default_zone_count() -> i32 {
    1
}

impl TopologyDefaults {
    pub fn new(instance_configuration_id: impl Into<String>, memory_per_node: impl Into<String>) -> Self {
        Self {
            instance_configuration_id: instance_configuration_id.into(),
            memory_per_node: memory_per_node.into(),
            zone_count: default_zone_count(),
        }
    }
}

/// Defaults for every component kind
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExpandDefaults {
    pub elasticsearch: TopologyDefaults,
    pub kibana: TopologyDefaults,
    pub apm: TopologyDefaults,
    pub enterprise_search: TopologyDefaults,
    pub app_search: TopologyDefaults,
}

impl Default for ExpandDefaults {
    fn default() -> Self {
        Self {
            elasticsearch: TopologyDefaults::new("aws.data.highio.i3", "4g"),
            kibana: TopologyDefaults::new("aws.kibana.r5d", "1g"),
            apm: TopologyDefaults::new("aws.apm.r5d", "0.5g"),
            enterprise_search: TopologyDefaults::new("aws.enterprisesearch.m5d", "2g"),
            app_search: TopologyDefaults::new("aws.appsearch.m5d", "2g"),
        }
    }
}

impl ExpandDefaults {
    pub fn for_kind(&self, kind: ComponentKind) -> &TopologyDefaults {
        match kind {
            ComponentKind::Elasticsearch => &self.elasticsearch,
            ComponentKind::Kibana => &self.kibana,
            ComponentKind::Apm => &self.apm,
            ComponentKind::EnterpriseSearch => &self.enterprise_search,
            ComponentKind::AppSearch => &self.app_search,
        }
    }
}
