//! Control-plane and lifecycle error types

use crate::state::LifecycleState;
use deployflow_core::ModelError;
use std::fmt;
use std::time::Duration;
use thiserror::Error;

pub(crate) const CREATE: &str = "failed creating deployment";
pub(crate) const TRACK_CREATE: &str = "failed tracking create progress";
pub(crate) const READ: &str = "failed reading deployment";
pub(crate) const UPDATE: &str = "failed updating deployment";
pub(crate) const TRACK_UPDATE: &str = "failed tracking update progress";
pub(crate) const DELETE: &str = "failed deleting deployment";
pub(crate) const TRACK_DELETE: &str = "failed tracking shutdown progress";

/// Errors reported by a control-plane client
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ApiError {
    #[error("resource not found: {0}")]
    NotFound(String),

    #[error("rate limited{}", retry_hint(.retry_after))]
    RateLimited { retry_after: Option<Duration> },

    #[error("service unavailable: {0}")]
    Unavailable(String),

    #[error("request rejected ({status}): {message}")]
    Rejected { status: u16, message: String },

    #[error("server error ({status}): {message}")]
    Server { status: u16, message: String },

    #[error("operation not supported: {0}")]
    Unsupported(String),
}

fn retry_hint(retry_after: &Option<Duration>) -> String {
    retry_after
        .map(|d| format!(", retry after {:?}", d))
        .unwrap_or_default()
}

impl ApiError {
    /// Failures that may succeed when the same call is repeated
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            ApiError::RateLimited { .. } | ApiError::Unavailable(_) | ApiError::Server { .. }
        )
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, ApiError::NotFound(_))
    }
}

pub type ApiResult<T> = std::result::Result<T, ApiError>;

/// Classified outcome of a failed remote call
#[derive(Error, Debug, Clone, PartialEq)]
pub enum RemoteFailure {
    /// Network or rate-limit failure that persisted through every retry
    #[error("{source} (gave up after {attempts} attempts)")]
    Transient {
        #[source]
        source: ApiError,
        attempts: u32,
    },

    /// The request was accepted but the resulting plan failed
    #[error("plan failed: {}", .diagnostics.join("; "))]
    PlanFailed { diagnostics: Vec<String> },

    /// Rejected before any remote state change
    #[error("{source}")]
    Terminal {
        #[source]
        source: ApiError,
    },
}

impl RemoteFailure {
    /// Whether the remote side may hold a partially applied request that a
    /// resubmission with the same request ID would pick up
    pub fn requires_resume(&self) -> bool {
        matches!(self, RemoteFailure::Transient { .. })
    }

    pub fn api_error(&self) -> Option<&ApiError> {
        match self {
            RemoteFailure::Transient { source, .. } | RemoteFailure::Terminal { source } => {
                Some(source)
            }
            RemoteFailure::PlanFailed { .. } => None,
        }
    }

    pub fn is_not_found(&self) -> bool {
        self.api_error().is_some_and(ApiError::is_not_found)
    }
}

/// Local state persistence errors
#[derive(Error, Debug)]
pub enum StateError {
    #[error("invalid state key \"{0}\"")]
    InvalidKey(String),

    #[error("state file version {found} is newer than supported version {supported}")]
    UnsupportedVersion { found: u32, supported: u32 },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// One failure of a lifecycle operation
#[derive(Error, Debug)]
pub enum DeploymentError {
    #[error(transparent)]
    Validation(#[from] ModelError),

    #[error("request \"{request_id}\" failed: {source}")]
    Submission {
        request_id: String,
        #[source]
        source: RemoteFailure,
    },

    #[error("unexpected response to request \"{request_id}\": {message}")]
    InvalidResponse { request_id: String, message: String },

    #[error(
        "deployment {deployment_id} plan did not complete within {elapsed:?}{}",
        request_note(.request_id)
    )]
    PlanTimeout {
        deployment_id: String,
        request_id: Option<String>,
        elapsed: Duration,
    },

    #[error(
        "deployment {deployment_id} plan failed{}: {}",
        request_note(.request_id),
        .diagnostics.join("; ")
    )]
    PlanFailed {
        deployment_id: String,
        request_id: Option<String>,
        diagnostics: Vec<String>,
    },

    #[error("lost track of deployment {deployment_id}{}: {source}", request_note(.request_id))]
    Tracking {
        deployment_id: String,
        request_id: Option<String>,
        #[source]
        source: RemoteFailure,
    },

    #[error("deployment {deployment_id}: {source}")]
    Remote {
        deployment_id: String,
        #[source]
        source: RemoteFailure,
    },

    #[error("deployment {deployment_id} was created but its credentials are unavailable: {message}")]
    CredentialExtraction {
        deployment_id: String,
        message: String,
    },

    #[error("cannot {operation} a deployment in state {from}")]
    InvalidTransition {
        from: LifecycleState,
        operation: &'static str,
    },

    #[error("set \"request_id\" to \"{request_id}\" to {action}")]
    Resume {
        request_id: String,
        action: ResumeAction,
    },

    #[error("state store error: {0}")]
    State(#[from] StateError),
}

/// What rerunning with a recorded request ID picks up
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResumeAction {
    Create,
    Update,
}

impl ResumeAction {
    fn for_prefix(prefix: &str) -> Self {
        match prefix {
            UPDATE | TRACK_UPDATE => Self::Update,
            _ => Self::Create,
        }
    }
}

impl fmt::Display for ResumeAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Create => write!(f, "recreate the deployment resources"),
            Self::Update => write!(f, "resume the pending update"),
        }
    }
}

fn request_note(request_id: &Option<String>) -> String {
    request_id
        .as_deref()
        .map(|id| format!(" (request_id \"{}\")", id))
        .unwrap_or_default()
}

impl DeploymentError {
    /// Request ID a resubmission must reuse, when the remote side may hold
    /// unfinished work for it
    pub fn resume_request_id(&self) -> Option<&str> {
        match self {
            DeploymentError::Submission { request_id, source } if source.requires_resume() => {
                Some(request_id.as_str())
            }
            DeploymentError::InvalidResponse { request_id, .. } => Some(request_id.as_str()),
            DeploymentError::PlanTimeout { request_id, .. }
            | DeploymentError::Tracking { request_id, .. } => request_id.as_deref(),
            _ => None,
        }
    }
}

/// Failure of a whole lifecycle operation: a prefix naming the operation and
/// every error it ran into, including the resume guidance when one applies
#[derive(Debug)]
pub struct OperationError {
    prefix: &'static str,
    errors: Vec<DeploymentError>,
}

impl OperationError {
    /// Wrap `error`, appending resume guidance when it calls for it
    pub fn new(prefix: &'static str, error: DeploymentError) -> Self {
        let resume = error.resume_request_id().map(|id| DeploymentError::Resume {
            request_id: id.to_string(),
            action: ResumeAction::for_prefix(prefix),
        });
        let mut errors = vec![error];
        errors.extend(resume);
        Self { prefix, errors }
    }

    pub fn push(&mut self, error: DeploymentError) {
        self.errors.push(error);
    }

    pub fn prefix(&self) -> &str {
        self.prefix
    }

    pub fn errors(&self) -> &[DeploymentError] {
        &self.errors
    }

    /// The error that failed the operation
    pub fn primary(&self) -> Option<&DeploymentError> {
        self.errors.first()
    }

    /// Request ID named by the resume guidance, if any
    pub fn resume_request_id(&self) -> Option<&str> {
        self.errors.iter().find_map(|e| match e {
            DeploymentError::Resume { request_id, .. } => Some(request_id.as_str()),
            _ => None,
        })
    }
}

impl fmt::Display for OperationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.errors.len() {
            1 => write!(f, "{}: 1 error occurred:", self.prefix)?,
            n => write!(f, "{}: {} errors occurred:", self.prefix, n)?,
        }
        for error in &self.errors {
            write!(f, "\n\t* {}", error)?;
        }
        Ok(())
    }
}

impl std::error::Error for OperationError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.errors
            .first()
            .map(|e| e as &(dyn std::error::Error + 'static))
    }
}

pub type Result<T> = std::result::Result<T, OperationError>;
