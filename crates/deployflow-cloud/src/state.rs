//! Local deployment state
//!
//! One state record per managed deployment, keyed by a caller-chosen name.
//! The file store keeps each record in `<state dir>/<key>.json` and the
//! previous revision in `<key>.json.backup`. A new revision is written to
//! `<key>.json.tmp` and renamed into place, so the record on disk is always
//! complete.

use crate::error::StateError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use deployflow_core::{Block, schema};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::sync::Mutex;

const STATE_VERSION: u32 = 1;
const STATE_EXTENSION: &str = "json";
const BACKUP_EXTENSION: &str = "json.backup";
const TEMP_EXTENSION: &str = "json.tmp";

pub type StateResult<T> = std::result::Result<T, StateError>;

/// Lifecycle of a managed deployment
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LifecycleState {
    /// Never created
    #[default]
    Absent,
    Creating,
    Active,
    Updating,
    Deleting,
    /// Deleted locally or found gone remotely
    Deleted,
    /// The last create or update did not complete
    Failed,
}

impl std::fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LifecycleState::Absent => write!(f, "absent"),
            LifecycleState::Creating => write!(f, "creating"),
            LifecycleState::Active => write!(f, "active"),
            LifecycleState::Updating => write!(f, "updating"),
            LifecycleState::Deleting => write!(f, "deleting"),
            LifecycleState::Deleted => write!(f, "deleted"),
            LifecycleState::Failed => write!(f, "failed"),
        }
    }
}

/// Recorded state of one deployment
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeploymentState {
    /// Remote identifier, set once the create submission returned it
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    pub lifecycle: LifecycleState,

    /// Flat model as last read, plus the attributes a read cannot reproduce
    #[serde(default)]
    pub attributes: Block,

    pub updated_at: DateTime<Utc>,
}

impl Default for DeploymentState {
    fn default() -> Self {
        Self {
            id: None,
            lifecycle: LifecycleState::Absent,
            attributes: Block::new(),
            updated_at: Utc::now(),
        }
    }
}

impl DeploymentState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn transition(&mut self, lifecycle: LifecycleState) {
        tracing::debug!(from = %self.lifecycle, to = %lifecycle, id = ?self.id, "lifecycle transition");
        self.lifecycle = lifecycle;
        self.updated_at = Utc::now();
    }

    /// Pending request identifier, if one is recorded
    pub fn request_id(&self) -> Option<&str> {
        self.attributes
            .get(schema::REQUEST_ID)
            .and_then(|v| v.as_str())
            .filter(|id| !id.is_empty())
    }

    /// Replace the attributes with a fresh read, keeping the ones a read
    /// cannot reproduce
    pub fn apply_read(&mut self, mut flat: Block) {
        flat.carry_over(&self.attributes, &schema::NON_READABLE);
        self.attributes = flat;
        self.updated_at = Utc::now();
    }

    /// Drop the request identifier once its operation is confirmed complete
    pub fn discard_request_id(&mut self) {
        self.attributes.remove(schema::REQUEST_ID);
    }

    /// Forget the remote deployment entirely
    pub fn clear(&mut self, lifecycle: LifecycleState) {
        self.id = None;
        self.attributes = Block::new();
        self.transition(lifecycle);
    }

    /// Whether a remote deployment is known to exist
    pub fn exists(&self) -> bool {
        self.id.is_some()
            && !matches!(
                self.lifecycle,
                LifecycleState::Absent | LifecycleState::Deleted
            )
    }
}

/// Persistence of deployment state records
#[async_trait]
pub trait StateStore: Send + Sync {
    /// Load the record for `key`, `None` when there is none
    async fn load(&self, key: &str) -> StateResult<Option<DeploymentState>>;

    /// Replace the record for `key`
    async fn save(&self, key: &str, state: &DeploymentState) -> StateResult<()>;
}

/// On-disk record layout
#[derive(Debug, Serialize, Deserialize)]
struct StateFile {
    version: u32,
    deployment: DeploymentState,
}

/// JSON-file state store
pub struct FileStateStore {
    dir: PathBuf,
}

impl FileStateStore {
    pub fn new(dir: impl AsRef<Path>) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn state_path(&self, key: &str) -> StateResult<PathBuf> {
        validate_key(key)?;
        Ok(self.dir.join(format!("{}.{}", key, STATE_EXTENSION)))
    }

    fn backup_path(&self, key: &str) -> StateResult<PathBuf> {
        validate_key(key)?;
        Ok(self.dir.join(format!("{}.{}", key, BACKUP_EXTENSION)))
    }

    fn temp_path(&self, key: &str) -> StateResult<PathBuf> {
        validate_key(key)?;
        Ok(self.dir.join(format!("{}.{}", key, TEMP_EXTENSION)))
    }

    async fn ensure_dir(&self) -> StateResult<()> {
        if !self.dir.exists() {
            fs::create_dir_all(&self.dir).await?;
            tracing::debug!("Created state directory: {}", self.dir.display());
        }
        Ok(())
    }
}

fn validate_key(key: &str) -> StateResult<()> {
    let valid = !key.is_empty()
        && key
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == '.')
        && !key.starts_with('.');
    if valid {
        Ok(())
    } else {
        Err(StateError::InvalidKey(key.to_string()))
    }
}

#[async_trait]
impl StateStore for FileStateStore {
    async fn load(&self, key: &str) -> StateResult<Option<DeploymentState>> {
        let path = self.state_path(key)?;
        let path = if path.exists() {
            path
        } else {
            let backup = self.backup_path(key)?;
            if !backup.exists() {
                tracing::debug!(key, "state file not found");
                return Ok(None);
            }
            tracing::warn!(key, "state file missing, loading {}", backup.display());
            backup
        };

        let content = fs::read_to_string(&path).await?;
        let file: StateFile = serde_json::from_str(&content)?;

        if file.version > STATE_VERSION {
            return Err(StateError::UnsupportedVersion {
                found: file.version,
                supported: STATE_VERSION,
            });
        }

        tracing::debug!(key, lifecycle = %file.deployment.lifecycle, "loaded state");
        Ok(Some(file.deployment))
    }

    async fn save(&self, key: &str, state: &DeploymentState) -> StateResult<()> {
        self.ensure_dir().await?;

        let path = self.state_path(key)?;
        let backup = self.backup_path(key)?;
        let temp = self.temp_path(key)?;

        let file = StateFile {
            version: STATE_VERSION,
            deployment: state.clone(),
        };
        fs::write(&temp, serde_json::to_string_pretty(&file)?).await?;

        // The primary stays in place until the new revision replaces it
        if path.exists() {
            fs::copy(&path, &backup).await?;
        }
        fs::rename(&temp, &path).await?;

        tracing::debug!(key, lifecycle = %state.lifecycle, "saved state");
        Ok(())
    }
}

/// In-memory state store
#[derive(Default)]
pub struct MemoryStateStore {
    states: Mutex<HashMap<String, DeploymentState>>,
}

impl MemoryStateStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl StateStore for MemoryStateStore {
    async fn load(&self, key: &str) -> StateResult<Option<DeploymentState>> {
        Ok(self.states.lock().await.get(key).cloned())
    }

    async fn save(&self, key: &str, state: &DeploymentState) -> StateResult<()> {
        self.states
            .lock()
            .await
            .insert(key.to_string(), state.clone());
        Ok(())
    }
}
