use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("config directory not found")]
    ConfigDirNotFound,

    #[error(
        "settings file not found. Looked in:\n\
        - current directory: deployflow.local.yaml, .deployflow.local.yaml, deployflow.yaml, .deployflow.yaml\n\
        - ./.deployflow/\n\
        - ~/.config/deployflow/deployflow.yaml\n\
        Set DEPLOYFLOW_CONFIG_PATH to point at a file directly"
    )]
    SettingsFileNotFound,

    #[error("failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, ConfigError>;
