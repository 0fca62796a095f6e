//! Snapshot builders for tests
//!
//! Turns submitted payloads into the read snapshot a control plane would
//! report once their plans have been applied.

use crate::wire::{
    ClusterInfo, ClusterMetadata, ClusterPorts, ComponentType, DeploymentGetResponse,
    DeploymentPayloadResources, DeploymentResourceInfos, PlanAttempt, PlanInfo, ResourceInfo,
    ResourcePayload,
};

pub const HTTP_PORT: u16 = 9200;
pub const HTTPS_PORT: u16 = 9243;

/// Resource ID assigned to the component `ref_id` of deployment `deployment_id`
pub fn resource_id(deployment_id: &str, ref_id: &str) -> String {
    format!("{}-{}", deployment_id, ref_id)
}

/// Host name reported for a provisioned component
pub fn endpoint_host(resource_id: &str, region: &str) -> String {
    format!("{}.{}.deployflow.test", resource_id, region)
}

/// A component running `payload` as its current plan
pub fn provisioned<C: ComponentType>(
    deployment_id: &str,
    payload: &ResourcePayload<C>,
) -> ResourceInfo<C> {
    let id = resource_id(deployment_id, &payload.ref_id);
    ResourceInfo {
        ref_id: Some(payload.ref_id.clone()),
        region: Some(payload.region.clone()),
        elasticsearch_cluster_ref_id: payload.elasticsearch_cluster_ref_id.clone(),
        info: Some(ClusterInfo {
            metadata: Some(ClusterMetadata {
                endpoint: Some(endpoint_host(&id, &payload.region)),
                ports: Some(ClusterPorts {
                    http: Some(HTTP_PORT),
                    https: Some(HTTPS_PORT),
                }),
            }),
            id: Some(id),
            name: payload.display_name.clone(),
            status: Some("started".to_string()),
            plan_info: Some(PlanInfo {
                current: Some(PlanAttempt {
                    plan: Some(payload.plan.clone()),
                    healthy: Some(true),
                    plan_attempt_log: Vec::new(),
                }),
                ..Default::default()
            }),
        }),
    }
}

fn provision_all<C: ComponentType>(
    deployment_id: &str,
    payloads: &[ResourcePayload<C>],
) -> Vec<ResourceInfo<C>> {
    payloads
        .iter()
        .map(|p| provisioned(deployment_id, p))
        .collect()
}

/// Read snapshot of a deployment whose every submitted component is running
pub fn deployment_snapshot(
    id: &str,
    name: &str,
    resources: &DeploymentPayloadResources,
) -> DeploymentGetResponse {
    DeploymentGetResponse {
        id: Some(id.to_string()),
        name: Some(name.to_string()),
        resources: DeploymentResourceInfos {
            elasticsearch: provision_all(id, &resources.elasticsearch),
            kibana: provision_all(id, &resources.kibana),
            apm: provision_all(id, &resources.apm),
            enterprise_search: provision_all(id, &resources.enterprise_search),
            appsearch: provision_all(id, &resources.appsearch),
        },
    }
}
