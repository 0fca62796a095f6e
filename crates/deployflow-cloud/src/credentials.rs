//! Credential bundle
//!
//! Secrets the control plane hands out only in the creation response. They
//! are copied into top-level flat attributes right away; no later read can
//! recover them.

use deployflow_core::wire::{ClusterCredentials, DeploymentCreateResponse};
use deployflow_core::{Block, ComponentKind, schema};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CredentialBundle {
    pub elasticsearch_username: Option<String>,
    pub elasticsearch_password: Option<String>,
    pub apm_secret_token: Option<String>,
}

impl CredentialBundle {
    /// Capture whatever secrets the creation response carries
    pub fn from_create_response(response: &DeploymentCreateResponse) -> Self {
        let mut bundle = Self::default();

        let search = response
            .resources
            .iter()
            .filter(|r| r.kind == ComponentKind::Elasticsearch)
            .find_map(|r| r.credentials.as_ref());
        if let Some(credentials) = search {
            bundle.set_elasticsearch(credentials);
        }

        bundle.apm_secret_token = response
            .resources
            .iter()
            .filter(|r| r.kind == ComponentKind::Apm)
            .find_map(|r| r.secret_token.clone())
            .filter(|t| !t.is_empty());

        bundle
    }

    /// Secrets an earlier attempt already recorded as flat attributes
    pub fn from_attributes(attributes: &Block) -> Self {
        let read = |key: &str| attributes.attr(key).filter(|v| !v.is_empty());
        Self {
            elasticsearch_username: read(schema::ELASTICSEARCH_USERNAME),
            elasticsearch_password: read(schema::ELASTICSEARCH_PASSWORD),
            apm_secret_token: read(schema::APM_SECRET_TOKEN),
        }
    }

    /// Fill every secret this bundle lacks from `other`
    pub fn merge(&mut self, other: Self) {
        if !self.has_elasticsearch() && other.has_elasticsearch() {
            self.elasticsearch_username = other.elasticsearch_username;
            self.elasticsearch_password = other.elasticsearch_password;
        }
        if self.apm_secret_token.is_none() {
            self.apm_secret_token = other.apm_secret_token;
        }
    }

    pub fn set_elasticsearch(&mut self, credentials: &ClusterCredentials) {
        self.elasticsearch_username = credentials.username.clone().filter(|u| !u.is_empty());
        self.elasticsearch_password = credentials.password.clone().filter(|p| !p.is_empty());
    }

    /// Whether both search-engine credentials are known
    pub fn has_elasticsearch(&self) -> bool {
        self.elasticsearch_username.is_some() && self.elasticsearch_password.is_some()
    }

    /// Store the known secrets as top-level flat attributes
    pub fn write_to(&self, attributes: &mut Block) {
        let fields = [
            (schema::ELASTICSEARCH_USERNAME, &self.elasticsearch_username),
            (schema::ELASTICSEARCH_PASSWORD, &self.elasticsearch_password),
            (schema::APM_SECRET_TOKEN, &self.apm_secret_token),
        ];
        for (key, value) in fields {
            if let Some(value) = value {
                attributes.insert(key, value.as_str());
            }
        }
    }
}
