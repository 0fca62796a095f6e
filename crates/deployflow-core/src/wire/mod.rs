//! Wire model
//!
//! Nested request/response representation exchanged with the remote control
//! plane. Every optional wire field is an explicit `Option`, so a zero value
//! and an absent value stay distinguishable all the way through expansion and
//! flattening.

pub mod component;
pub mod deployment;
pub mod resource;

pub use component::{
    Apm, ApmSystemSettings, AppSearch, AppSearchNodeType, ComponentType, Configuration,
    Elasticsearch, ElasticsearchNodeType, EnterpriseSearch, EnterpriseSearchNodeType, Kibana,
    NoNodeType, NoSystemSettings, Plan, SessionKeySystemSettings, TopologyElement, TopologySize,
    UserSettings,
};
pub use deployment::{
    ClusterCredentials, DeploymentCreateRequest, DeploymentCreateResponse, DeploymentGetResponse,
    DeploymentPayloadResources, DeploymentResource, DeploymentResourceInfos,
    DeploymentUpdateRequest, DeploymentUpdateResponse, PayloadOverrides, PlanActivity, PlanStatus,
};
pub use resource::{
    ClusterInfo, ClusterMetadata, ClusterPorts, PlanAttempt, PlanInfo, PlanStepInfo,
    PlanStepLogMessage, ResourceInfo, ResourcePayload, StepStatus,
};
