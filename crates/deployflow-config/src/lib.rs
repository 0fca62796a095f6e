pub mod error;
pub mod settings;

pub use error::*;
pub use settings::{PollSettings, RetrySettings, Settings};

use deployflow_core::Block;
use serde::de::DeserializeOwned;
use std::path::{Path, PathBuf};

/// Environment variable naming a settings file directly
pub const CONFIG_PATH_ENV: &str = "DEPLOYFLOW_CONFIG_PATH";

const SETTINGS_CANDIDATES: [&str; 4] = [
    "deployflow.local.yaml",
    ".deployflow.local.yaml",
    "deployflow.yaml",
    ".deployflow.yaml",
];

/// Deployflow's directory under the user config dir, created on demand
pub fn get_config_dir() -> Result<PathBuf> {
    let config_dir = dirs::config_dir()
        .ok_or(ConfigError::ConfigDirNotFound)?
        .join("deployflow");

    if !config_dir.exists() {
        std::fs::create_dir_all(&config_dir)?;
    }

    Ok(config_dir)
}

/// Find the settings file.
///
/// Search order:
/// 1. `DEPLOYFLOW_CONFIG_PATH`
/// 2. current directory: deployflow.local.yaml, .deployflow.local.yaml, deployflow.yaml, .deployflow.yaml
/// 3. `./.deployflow/`, same order
/// 4. `~/.config/deployflow/deployflow.yaml`
pub fn find_settings_file() -> Result<PathBuf> {
    if let Ok(config_path) = std::env::var(CONFIG_PATH_ENV) {
        let path = PathBuf::from(config_path);
        if path.exists() {
            return Ok(path);
        }
    }

    let current_dir = std::env::current_dir()?;

    for filename in &SETTINGS_CANDIDATES {
        let path = current_dir.join(filename);
        if path.exists() {
            return Ok(path);
        }
    }

    let project_dir = current_dir.join(".deployflow");
    if project_dir.is_dir() {
        for filename in &SETTINGS_CANDIDATES {
            let path = project_dir.join(filename);
            if path.exists() {
                return Ok(path);
            }
        }
    }

    if let Some(config_dir) = dirs::config_dir() {
        let global = config_dir.join("deployflow").join("deployflow.yaml");
        if global.exists() {
            return Ok(global);
        }
    }

    Err(ConfigError::SettingsFileNotFound)
}

fn read_yaml<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let content = std::fs::read_to_string(path)?;
    serde_yaml::from_str(&content).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

pub fn load_settings(path: &Path) -> Result<Settings> {
    let settings = read_yaml(path)?;
    tracing::debug!(path = %path.display(), "loaded settings");
    Ok(settings)
}

/// Load the discovered settings file, or the defaults when there is none
pub fn load_settings_or_default() -> Result<Settings> {
    match find_settings_file() {
        Ok(path) => load_settings(&path),
        Err(ConfigError::SettingsFileNotFound) => {
            tracing::debug!("no settings file found, using defaults");
            Ok(Settings::default())
        }
        Err(e) => Err(e),
    }
}

/// Directory for local deployment state: `state_dir` when set, else
/// `<config dir>/state`
pub fn state_dir(settings: &Settings) -> Result<PathBuf> {
    match &settings.state_dir {
        Some(dir) => Ok(dir.clone()),
        None => Ok(get_config_dir()?.join("state")),
    }
}

/// Load a declared deployment (YAML or JSON) as a flat attribute tree
pub fn load_flat_model(path: &Path) -> Result<Block> {
    read_yaml(path)
}
