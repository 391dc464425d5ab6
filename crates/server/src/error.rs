use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use pledge_engine::{EngineError, StoreError};
use pledge_util::PayloadError;
use thiserror::Error;
use tracing::warn;

/// Errors returned by request handlers, rendered as plain-text responses.
#[derive(Debug, Error)]
pub enum ServerError {
    #[error(transparent)]
    Engine(#[from] EngineError),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Payload(#[from] PayloadError),
}

impl ServerError {
    pub fn status_code(&self) -> StatusCode {
        let store_error = match self {
            Self::Store(error) | Self::Engine(EngineError::Store(error)) => error,
            Self::Engine(EngineError::Payload(_)) | Self::Payload(_) => return StatusCode::BAD_REQUEST,
            Self::Engine(EngineError::WorkflowMismatch { .. }) => return StatusCode::CONFLICT,
            Self::Engine(_) => return StatusCode::INTERNAL_SERVER_ERROR,
        };
        match store_error {
            StoreError::NotFound(_) => StatusCode::NOT_FOUND,
            StoreError::AlreadyExists(_) | StoreError::AlreadyCompleted(_) => StatusCode::CONFLICT,
            StoreError::Unexpected { .. } | StoreError::Transport(_) | StoreError::InvalidResponse(_) => StatusCode::BAD_GATEWAY,
        }
    }
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let message = self.to_string();
        warn!(status = status.as_u16(), error = %message, "request failed");
        (status, message).into_response()
    }
}
