//! Model error types

use thiserror::Error;

/// Errors raised while reading, expanding or addressing the flat model
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ModelError {
    /// A flat attribute failed validation; `path` is the dotted attribute path
    #[error("invalid attribute \"{path}\": {message}")]
    Validation { path: String, message: String },

    #[error("invalid attribute path \"{path}\": {message}")]
    InvalidPath { path: String, message: String },

    #[error("invalid memory size \"{value}\": {message}")]
    InvalidMemorySize { value: String, message: String },
}

impl ModelError {
    pub fn validation(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Validation {
            path: path.into(),
            message: message.into(),
        }
    }

    pub fn invalid_path(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidPath {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Attribute path the error refers to, if any
    pub fn path(&self) -> Option<&str> {
        match self {
            Self::Validation { path, .. } | Self::InvalidPath { path, .. } => Some(path),
            Self::InvalidMemorySize { .. } => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, ModelError>;
