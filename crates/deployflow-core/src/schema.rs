//! Flat attribute names

pub const NAME: &str = "name";
pub const REGION: &str = "region";
pub const VERSION: &str = "version";
pub const REQUEST_ID: &str = "request_id";

/// Credential bundle attributes, only ever known from the creation response
pub const ELASTICSEARCH_USERNAME: &str = "elasticsearch_username";
pub const ELASTICSEARCH_PASSWORD: &str = "elasticsearch_password";
pub const APM_SECRET_TOKEN: &str = "apm_secret_token";

/// Top-level attributes a read cannot reproduce and must carry over
pub const NON_READABLE: [&str; 4] = [
    REQUEST_ID,
    ELASTICSEARCH_USERNAME,
    ELASTICSEARCH_PASSWORD,
    APM_SECRET_TOKEN,
];

pub const DISPLAY_NAME: &str = "display_name";
pub const REF_ID: &str = "ref_id";
pub const RESOURCE_ID: &str = "resource_id";
pub const ELASTICSEARCH_CLUSTER_REF_ID: &str = "elasticsearch_cluster_ref_id";
pub const HTTP_ENDPOINT: &str = "http_endpoint";
pub const HTTPS_ENDPOINT: &str = "https_endpoint";
pub const TOPOLOGY: &str = "topology";
pub const CONFIG: &str = "config";

pub const INSTANCE_CONFIGURATION_ID: &str = "instance_configuration_id";
pub const MEMORY_PER_NODE: &str = "memory_per_node";
pub const ZONE_COUNT: &str = "zone_count";
/// Prefix of topology node-role flags, e.g. `node_type_worker`
pub const NODE_TYPE_PREFIX: &str = "node_type_";

pub const USER_SETTINGS_YAML: &str = "user_settings_yaml";
pub const USER_SETTINGS_OVERRIDE_YAML: &str = "user_settings_override_yaml";
pub const USER_SETTINGS_JSON: &str = "user_settings_json";
pub const USER_SETTINGS_OVERRIDE_JSON: &str = "user_settings_override_json";

pub const USER_SETTINGS: [&str; 4] = [
    USER_SETTINGS_YAML,
    USER_SETTINGS_OVERRIDE_YAML,
    USER_SETTINGS_JSON,
    USER_SETTINGS_OVERRIDE_JSON,
];
