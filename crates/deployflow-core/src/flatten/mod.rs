//! Flattener: wire model → flat model
//!
//! Produces the canonical flat shape of a read snapshot. The output only
//! carries attributes that hold a real value, so flattening the same snapshot
//! twice yields the same tree and an expand/flatten round trip is stable:
//!
//! - components without a current plan are omitted
//! - topology entries without an allocated size are omitted
//! - a configuration with every field empty becomes no block at all
//! - `display_name` is omitted when empty or equal to the deployment name
//!
//! JSON settings come back compact with sorted keys. A declared value in any
//! other layout reads back as different text with the same meaning, and
//! expands to the same request.

use crate::attr::{AttrValue, Block};
use crate::error::{ModelError, Result};
use crate::memory::{MEMORY_RESOURCE, memory_to_state};
use crate::schema;
use crate::wire::{
    ComponentType, Configuration, DeploymentGetResponse, ResourceInfo, TopologyElement,
    UserSettings,
};
use serde::Serialize;
use serde_json::Value;

/// Flatten a read snapshot into the flat model
pub fn flatten_deployment(response: &DeploymentGetResponse) -> Result<Block> {
    let mut flat = Block::new();
    let name = response.name.as_deref().filter(|n| !n.is_empty());
    if let Some(name) = name {
        flat.insert(schema::NAME, name);
    }

    let resources = &response.resources;
    if let Some(es) = resources
        .elasticsearch
        .iter()
        .find(|r| r.current_plan().is_some())
    {
        if let Some(region) = es.region.as_deref().filter(|r| !r.is_empty()) {
            flat.insert(schema::REGION, region);
        }
        if let Some(version) = es.current_plan().and_then(|p| p.version()) {
            flat.insert(schema::VERSION, version);
        }
    }

    insert_components(&mut flat, flatten_resources(&resources.elasticsearch, name)?);
    insert_components(&mut flat, flatten_resources(&resources.kibana, name)?);
    insert_components(&mut flat, flatten_resources(&resources.apm, name)?);
    insert_components(&mut flat, flatten_resources(&resources.enterprise_search, name)?);
    insert_components(&mut flat, flatten_resources(&resources.appsearch, name)?);

    Ok(flat)
}

fn insert_components(flat: &mut Block, (key, blocks): (&'static str, Vec<Block>)) {
    if !blocks.is_empty() {
        flat.insert(key, blocks);
    }
}

/// Flatten every provisioned component of one kind, keyed by its block name
pub fn flatten_resources<C: ComponentType>(
    infos: &[ResourceInfo<C>],
    deployment_name: Option<&str>,
) -> Result<(&'static str, Vec<Block>)> {
    let key = C::KIND.flat_key();
    let mut blocks = Vec::new();

    for info in infos {
        let Some(plan) = info.current_plan() else {
            continue;
        };
        let path = format!("{}.{}", key, blocks.len());
        let mut block = Block::new();

        if let Some(cluster) = &info.info {
            if let Some(display) = cluster.name.as_deref() {
                if !display.is_empty() && Some(display) != deployment_name {
                    block.insert(schema::DISPLAY_NAME, display);
                }
            }
            if let Some(id) = cluster.id.as_deref().filter(|id| !id.is_empty()) {
                block.insert(schema::RESOURCE_ID, id);
            }
        }

        insert_non_empty(&mut block, schema::REF_ID, info.ref_id.as_deref());
        insert_non_empty(&mut block, schema::REGION, info.region.as_deref());
        insert_non_empty(&mut block, schema::VERSION, plan.version());
        if C::KIND.links_to_elasticsearch() {
            insert_non_empty(
                &mut block,
                schema::ELASTICSEARCH_CLUSTER_REF_ID,
                info.elasticsearch_cluster_ref_id.as_deref(),
            );
        }

        if let Some(metadata) = info.metadata() {
            if let Some(url) = metadata.http_endpoint() {
                block.insert(schema::HTTP_ENDPOINT, url);
            }
            if let Some(url) = metadata.https_endpoint() {
                block.insert(schema::HTTPS_ENDPOINT, url);
            }
        }

        let topology = plan
            .cluster_topology
            .iter()
            .filter_map(|element| {
                flatten_topology_element(element, &format!("{}.{}", path, schema::TOPOLOGY))
                    .transpose()
            })
            .collect::<Result<Vec<_>>>()?;
        if !topology.is_empty() {
            block.insert(schema::TOPOLOGY, topology);
        }

        if let Some(config) = plan.config.as_ref() {
            if let Some(config) = flatten_config(config, &path)? {
                block.insert(schema::CONFIG, vec![config]);
            }
        }

        blocks.push(block);
    }

    tracing::trace!(kind = C::KIND.flat_key(), count = blocks.len(), "flattened components");
    Ok((key, blocks))
}

fn insert_non_empty(block: &mut Block, key: &str, value: Option<&str>) {
    if let Some(value) = value.filter(|v| !v.is_empty()) {
        block.insert(key, value);
    }
}

/// Flatten one topology entry, or nothing when it allocates no capacity
fn flatten_topology_element<C: ComponentType>(
    element: &TopologyElement<C>,
    path: &str,
) -> Result<Option<Block>> {
    let Some(size) = element.size.as_ref() else {
        return Ok(None);
    };
    let Some(allocated) = size.allocated() else {
        return Ok(None);
    };

    let mut block = Block::new();
    insert_non_empty(
        &mut block,
        schema::INSTANCE_CONFIGURATION_ID,
        element.instance_configuration_id.as_deref(),
    );
    if size.resource == MEMORY_RESOURCE {
        block.insert(schema::MEMORY_PER_NODE, memory_to_state(allocated));
    }
    if let Some(zones) = element.zone_count {
        block.insert(schema::ZONE_COUNT, i64::from(zones));
    }

    if let Some(node_type) = &element.node_type {
        if let Value::Object(roles) = to_json(node_type, path)? {
            for (role, flag) in roles {
                if let Value::Bool(flag) = flag {
                    block.insert(format!("{}{}", schema::NODE_TYPE_PREFIX, role), flag);
                }
            }
        }
    }

    if let Some(config) = element.config.as_ref() {
        if let Some(config) = flatten_config(config, path)? {
            block.insert(schema::CONFIG, vec![config]);
        }
    }

    Ok(Some(block))
}

/// Flatten a configuration into a `config` block; `None` when every field is
/// empty
pub fn flatten_config<C: ComponentType>(
    config: &Configuration<C>,
    path: &str,
) -> Result<Option<Block>> {
    let mut block = Block::new();
    let UserSettings {
        user_settings_yaml,
        user_settings_override_yaml,
        user_settings_json,
        user_settings_override_json,
    } = &config.user_settings;

    insert_non_empty(&mut block, schema::USER_SETTINGS_YAML, user_settings_yaml.as_deref());
    insert_non_empty(
        &mut block,
        schema::USER_SETTINGS_OVERRIDE_YAML,
        user_settings_override_yaml.as_deref(),
    );
    insert_json(&mut block, schema::USER_SETTINGS_JSON, user_settings_json.as_ref());
    insert_json(
        &mut block,
        schema::USER_SETTINGS_OVERRIDE_JSON,
        user_settings_override_json.as_ref(),
    );

    if let Some(system) = &config.system_settings {
        if let Value::Object(settings) = to_json(system, path)? {
            for (key, value) in settings {
                let value = match value {
                    Value::Bool(b) => AttrValue::from(b),
                    Value::String(s) if s.is_empty() => continue,
                    Value::String(s) => AttrValue::from(s),
                    Value::Number(n) => match n.as_i64() {
                        Some(n) => AttrValue::from(n),
                        None => AttrValue::from(n.to_string()),
                    },
                    _ => continue,
                };
                block.insert(key, value);
            }
        }
    }

    Ok((!block.is_empty()).then_some(block))
}

/// JSON settings render compactly with sorted keys, so equal maps always
/// produce equal strings
fn insert_json(block: &mut Block, key: &str, value: Option<&Value>) {
    let Some(value) = value else {
        return;
    };
    let empty = match value {
        Value::Null => true,
        Value::Object(map) => map.is_empty(),
        _ => false,
    };
    if !empty {
        block.insert(key, value.to_string());
    }
}

fn to_json<T: Serialize>(value: &T, path: &str) -> Result<Value> {
    serde_json::to_value(value).map_err(|e| ModelError::validation(path, e.to_string()))
}
