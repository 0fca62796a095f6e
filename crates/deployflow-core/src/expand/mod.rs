//! Expander: flat model → wire model
//!
//! Builds complete create/update requests from the flat attribute tree.
//! Unset attributes are resolved from [`ExpandDefaults`] and from the
//! deployment's own `name`/`region`/`version`, so a block only needs to carry
//! what differs. A topology entry's `config` replaces the component-level
//! `config` for that entry only; the two are never deep-merged.

mod reader;

use crate::attr::{AttrValue, Block, Scalar};
use crate::defaults::{ExpandDefaults, TopologyDefaults};
use crate::error::{ModelError, Result};
use crate::kind::ComponentKind;
use crate::memory::parse_memory;
use crate::schema;
use crate::wire::{
    ComponentType, Configuration, DeploymentCreateRequest, DeploymentPayloadResources,
    DeploymentUpdateRequest, PayloadOverrides, Plan, ResourcePayload, TopologyElement,
    TopologySize, UserSettings,
};
use crate::wire::{Apm, AppSearch, Elasticsearch, EnterpriseSearch, Kibana};
use reader::Reader;
use serde_json::{Map, Value};
use std::collections::HashSet;

/// Top-level values that take precedence over component-level ones
#[derive(Debug, Clone, Copy)]
struct DeploymentFields<'a> {
    name: Option<&'a str>,
    region: Option<&'a str>,
    version: Option<&'a str>,
}

/// Expand the flat model into a create request
pub fn expand_create(flat: &Block, defaults: &ExpandDefaults) -> Result<DeploymentCreateRequest> {
    let root = Reader::root(flat);
    let resources = expand_resources(&root, defaults)?;
    Ok(DeploymentCreateRequest {
        name: root.non_empty_str(schema::NAME)?.map(str::to_string),
        resources,
    })
}

/// Expand the flat model into an update request.
///
/// Components missing from the flat model are pruned remotely.
pub fn expand_update(flat: &Block, defaults: &ExpandDefaults) -> Result<DeploymentUpdateRequest> {
    let root = Reader::root(flat);
    let resources = expand_resources(&root, defaults)?;
    Ok(DeploymentUpdateRequest {
        name: root.non_empty_str(schema::NAME)?.map(str::to_string),
        prune_orphans: true,
        resources,
    })
}

/// Top-level `name`/`version`/`region` submitted alongside the request
pub fn payload_overrides(flat: &Block) -> Result<PayloadOverrides> {
    let root = Reader::root(flat);
    Ok(PayloadOverrides {
        name: root.non_empty_str(schema::NAME)?.map(str::to_string),
        version: root.non_empty_str(schema::VERSION)?.map(str::to_string),
        region: root.non_empty_str(schema::REGION)?.map(str::to_string),
    })
}

fn expand_resources(root: &Reader<'_>, defaults: &ExpandDefaults) -> Result<DeploymentPayloadResources> {
    let deployment = DeploymentFields {
        name: root.non_empty_str(schema::NAME)?,
        region: root.non_empty_str(schema::REGION)?,
        version: root.non_empty_str(schema::VERSION)?,
    };

    let resources = DeploymentPayloadResources {
        elasticsearch: expand_components::<Elasticsearch>(root, deployment, defaults)?,
        kibana: expand_components::<Kibana>(root, deployment, defaults)?,
        apm: expand_components::<Apm>(root, deployment, defaults)?,
        enterprise_search: expand_components::<EnterpriseSearch>(root, deployment, defaults)?,
        appsearch: expand_components::<AppSearch>(root, deployment, defaults)?,
    };

    validate_references(&resources)?;
    tracing::debug!(components = resources.ref_ids().len(), "expanded deployment resources");
    Ok(resources)
}

fn expand_components<C: ComponentType>(
    root: &Reader<'_>,
    deployment: DeploymentFields<'_>,
    defaults: &ExpandDefaults,
) -> Result<Vec<ResourcePayload<C>>> {
    let blocks = root.blocks(C::KIND.flat_key())?;
    let mut seen = HashSet::new();
    let mut payloads = Vec::with_capacity(blocks.len());

    for block in &blocks {
        let payload = expand_component::<C>(block, deployment, defaults.for_kind(C::KIND))?;
        if !seen.insert(payload.ref_id.clone()) {
            return Err(ModelError::validation(
                block.path_of(schema::REF_ID),
                format!("duplicate {} ref_id \"{}\"", C::KIND, payload.ref_id),
            ));
        }
        payloads.push(payload);
    }

    Ok(payloads)
}

fn expand_component<C: ComponentType>(
    block: &Reader<'_>,
    deployment: DeploymentFields<'_>,
    defaults: &TopologyDefaults,
) -> Result<ResourcePayload<C>> {
    let kind = C::KIND;

    let ref_id = block
        .non_empty_str(schema::REF_ID)?
        .map(str::to_string)
        .unwrap_or_else(|| kind.default_ref_id());

    let own_region = block.non_empty_str(schema::REGION)?;
    let region = deployment.region.or(own_region).ok_or_else(|| {
        ModelError::validation(block.path_of(schema::REGION), "region is required")
    })?;

    let own_version = block.non_empty_str(schema::VERSION)?;
    let version = deployment.version.or(own_version).ok_or_else(|| {
        ModelError::validation(block.path_of(schema::VERSION), "version is required")
    })?;

    let display_name = block
        .non_empty_str(schema::DISPLAY_NAME)?
        .or(deployment.name)
        .map(str::to_string);

    let elasticsearch_cluster_ref_id = if kind.links_to_elasticsearch() {
        Some(
            block
                .non_empty_str(schema::ELASTICSEARCH_CLUSTER_REF_ID)?
                .map(str::to_string)
                .unwrap_or_else(|| ComponentKind::Elasticsearch.default_ref_id()),
        )
    } else {
        if block.block().contains(schema::ELASTICSEARCH_CLUSTER_REF_ID) {
            return Err(ModelError::validation(
                block.path_of(schema::ELASTICSEARCH_CLUSTER_REF_ID),
                "not supported on elasticsearch components",
            ));
        }
        None
    };

    let mut config = expand_config::<C>(block)?.unwrap_or_default();
    config.version = Some(version.to_string());

    Ok(ResourcePayload {
        ref_id,
        region: region.to_string(),
        display_name,
        elasticsearch_cluster_ref_id,
        plan: Plan {
            config: Some(config),
            cluster_topology: expand_topology::<C>(block, defaults)?,
        },
    })
}

fn expand_topology<C: ComponentType>(
    component: &Reader<'_>,
    defaults: &TopologyDefaults,
) -> Result<Vec<TopologyElement<C>>> {
    let blocks = component.blocks(schema::TOPOLOGY)?;
    if blocks.is_empty() {
        let empty = Block::new();
        let reader = Reader::new(&empty, format!("{}.0", component.path_of(schema::TOPOLOGY)));
        return Ok(vec![expand_topology_element(&reader, defaults)?]);
    }

    blocks
        .iter()
        .map(|block| expand_topology_element(block, defaults))
        .collect()
}

fn expand_topology_element<C: ComponentType>(
    block: &Reader<'_>,
    defaults: &TopologyDefaults,
) -> Result<TopologyElement<C>> {
    let instance_configuration_id = block
        .non_empty_str(schema::INSTANCE_CONFIGURATION_ID)?
        .unwrap_or(&defaults.instance_configuration_id);

    let memory = block
        .non_empty_str(schema::MEMORY_PER_NODE)?
        .unwrap_or(&defaults.memory_per_node);
    let memory_path = block.path_of(schema::MEMORY_PER_NODE);
    let megabytes =
        parse_memory(memory).map_err(|e| ModelError::validation(&memory_path, e.to_string()))?;
    let size = TopologySize::memory(megabytes).ok_or_else(|| {
        ModelError::validation(&memory_path, "too large for a topology size")
    })?;

    let zone_count = block
        .int(schema::ZONE_COUNT)?
        .unwrap_or_else(|| i64::from(defaults.zone_count));
    let zone_count = i32::try_from(zone_count)
        .ok()
        .filter(|n| *n >= 1)
        .ok_or_else(|| {
            ModelError::validation(
                block.path_of(schema::ZONE_COUNT),
                format!("must be at least 1, got {}", zone_count),
            )
        })?;

    Ok(TopologyElement {
        instance_configuration_id: Some(instance_configuration_id.to_string()),
        size: Some(size),
        zone_count: Some(zone_count),
        node_type: expand_node_type::<C>(block)?,
        config: expand_config::<C>(block)?,
    })
}

fn expand_node_type<C: ComponentType>(block: &Reader<'_>) -> Result<Option<C::NodeType>> {
    let mut roles = Map::new();
    for key in block.block().iter().map(|(k, _)| k) {
        let Some(role) = key.strip_prefix(schema::NODE_TYPE_PREFIX) else {
            continue;
        };
        if let Some(flag) = block.bool(key)? {
            roles.insert(role.to_string(), Value::Bool(flag));
        }
    }

    if roles.is_empty() {
        return Ok(None);
    }

    serde_json::from_value(Value::Object(roles))
        .map(Some)
        .map_err(|e| {
            ModelError::validation(
                block.path(),
                format!("unsupported node type for {}: {}", C::KIND, e),
            )
        })
}

/// Expand the optional `config` block of a component or topology entry.
///
/// A block whose fields are all empty expands to no configuration at all.
fn expand_config<C: ComponentType>(parent: &Reader<'_>) -> Result<Option<Configuration<C>>> {
    let Some(config) = parent.optional_block(schema::CONFIG)? else {
        return Ok(None);
    };

    let user_settings = UserSettings {
        user_settings_yaml: config
            .non_empty_str(schema::USER_SETTINGS_YAML)?
            .map(str::to_string),
        user_settings_override_yaml: config
            .non_empty_str(schema::USER_SETTINGS_OVERRIDE_YAML)?
            .map(str::to_string),
        user_settings_json: config.json_object(schema::USER_SETTINGS_JSON)?,
        user_settings_override_json: config.json_object(schema::USER_SETTINGS_OVERRIDE_JSON)?,
    };

    let mut system = Map::new();
    for (key, value) in config.block().iter() {
        if schema::USER_SETTINGS.contains(&key.as_str()) {
            continue;
        }
        let json = match value {
            AttrValue::Scalar(Scalar::Bool(b)) => Value::Bool(*b),
            AttrValue::Scalar(Scalar::Int(n)) => Value::from(*n),
            AttrValue::Scalar(Scalar::Str(s)) if s.is_empty() => continue,
            AttrValue::Scalar(Scalar::Str(s)) => Value::String(s.clone()),
            other => {
                return Err(ModelError::validation(
                    config.path_of(key),
                    format!("expected a scalar, found {}", other.kind_name()),
                ));
            }
        };
        system.insert(key.clone(), json);
    }

    let system_settings = if system.is_empty() {
        None
    } else {
        let settings = serde_json::from_value(Value::Object(system)).map_err(|e| {
            ModelError::validation(
                config.path(),
                format!("unsupported {} setting: {}", C::KIND, e),
            )
        })?;
        Some(settings)
    };

    if user_settings == UserSettings::default() && system_settings.is_none() {
        return Ok(None);
    }

    Ok(Some(Configuration {
        version: None,
        user_settings,
        system_settings,
    }))
}

/// Every `elasticsearch_cluster_ref_id` must name a submitted search-engine
/// component
fn validate_references(resources: &DeploymentPayloadResources) -> Result<()> {
    if resources.elasticsearch.is_empty() {
        return Err(ModelError::validation(
            ComponentKind::Elasticsearch.flat_key(),
            "at least one elasticsearch block is required",
        ));
    }

    let known: HashSet<&str> = resources
        .elasticsearch
        .iter()
        .map(|p| p.ref_id.as_str())
        .collect();

    check_links(&resources.kibana, &known)?;
    check_links(&resources.apm, &known)?;
    check_links(&resources.enterprise_search, &known)?;
    check_links(&resources.appsearch, &known)?;
    Ok(())
}

fn check_links<C: ComponentType>(payloads: &[ResourcePayload<C>], known: &HashSet<&str>) -> Result<()> {
    for (i, payload) in payloads.iter().enumerate() {
        let Some(target) = payload.elasticsearch_cluster_ref_id.as_deref() else {
            continue;
        };
        if !known.contains(target) {
            return Err(ModelError::validation(
                format!(
                    "{}.{}.{}",
                    C::KIND.flat_key(),
                    i,
                    schema::ELASTICSEARCH_CLUSTER_REF_ID
                ),
                format!("references unknown elasticsearch ref_id \"{}\"", target),
            ));
        }
    }
    Ok(())
}
