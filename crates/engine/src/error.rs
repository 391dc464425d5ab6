use pledge_api::ApiError;
use pledge_util::PayloadError;
use thiserror::Error;

/// Errors reported by a [`PromiseStore`](crate::PromiseStore).
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StoreError {
    #[error("promise '{0}' not found")]
    NotFound(String),
    #[error("promise '{0}' already exists")]
    AlreadyExists(String),
    #[error("promise '{0}' is already completed")]
    AlreadyCompleted(String),
    #[error("promise store returned HTTP {status}: {message}")]
    Unexpected { status: u16, message: String },
    #[error("promise store unreachable: {0}")]
    Transport(String),
    #[error("promise store response could not be read: {0}")]
    InvalidResponse(String),
}

impl StoreError {
    /// Map a REST client failure for promise `id` onto store semantics.
    pub fn from_api(id: &str, error: ApiError) -> Self {
        match error {
            ApiError::Status { status, message } => match status.as_u16() {
                404 => Self::NotFound(id.to_string()),
                403 => Self::AlreadyCompleted(id.to_string()),
                409 => Self::AlreadyExists(id.to_string()),
                other => Self::Unexpected { status: other, message },
            },
            ApiError::Transport(error) => Self::Transport(error.to_string()),
            other => Self::InvalidResponse(other.to_string()),
        }
    }
}

/// Errors surfaced to workflow code and to callers of the runtime.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Payload(#[from] PayloadError),
    #[error("no workflow registered under '{0}'")]
    UnknownWorkflow(String),
    #[error("promise '{id}' was rejected: {reason}")]
    Rejected { id: String, reason: String },
    #[error("step '{name}' failed: {message}")]
    StepFailed { name: String, message: String },
    #[error("invocation '{invocation_id}' completed before promise '{id}'")]
    Superseded { id: String, invocation_id: String },
    #[error("invocation '{id}' belongs to workflow '{stored}', not '{requested}'")]
    WorkflowMismatch { id: String, stored: String, requested: String },
}
