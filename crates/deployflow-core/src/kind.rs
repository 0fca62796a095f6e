//! Component kinds

use serde::{Deserialize, Serialize};

/// Kind of service a component instance provides
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ComponentKind {
    Elasticsearch,
    Kibana,
    Apm,
    EnterpriseSearch,
    #[serde(rename = "appsearch")]
    AppSearch,
}

impl ComponentKind {
    /// All kinds in expansion and flattening order
    pub const ALL: [ComponentKind; 5] = [
        ComponentKind::Elasticsearch,
        ComponentKind::Kibana,
        ComponentKind::Apm,
        ComponentKind::EnterpriseSearch,
        ComponentKind::AppSearch,
    ];

    /// Name of the repeated block in the flat model
    pub fn flat_key(&self) -> &'static str {
        match self {
            ComponentKind::Elasticsearch => "elasticsearch",
            ComponentKind::Kibana => "kibana",
            ComponentKind::Apm => "apm",
            ComponentKind::EnterpriseSearch => "enterprise_search",
            ComponentKind::AppSearch => "app_search",
        }
    }

    /// Reference ID used when a block does not set one
    pub fn default_ref_id(&self) -> String {
        format!("main-{}", self.flat_key())
    }

    /// Whether components of this kind link to a search-engine component
    pub fn links_to_elasticsearch(&self) -> bool {
        !matches!(self, ComponentKind::Elasticsearch)
    }
}

impl std::fmt::Display for ComponentKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.flat_key())
    }
}
