use pledge_util::{ConfigError, redact_sensitive};
use reqwest::StatusCode;
use thiserror::Error;

/// Errors returned by the HTTP clients in this crate.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("HTTP {status}: {message}")]
    Status { status: StatusCode, message: String },
    #[error("network error: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("unexpected response body: {0}")]
    Decode(serde_json::Error),
    #[error("invalid base URL: {0}")]
    InvalidBaseUrl(String),
    #[error("invalid {0} header value")]
    InvalidHeader(&'static str),
    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl ApiError {
    pub(crate) fn from_status(status: StatusCode, body: &str) -> Self {
        let message = if body.trim().is_empty() {
            status.canonical_reason().unwrap_or("request failed").to_string()
        } else {
            redact_sensitive(body.trim())
        };
        Self::Status { status, message }
    }

    /// HTTP status of a non-success response, if this error came from one.
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            Self::Status { status, .. } => Some(*status),
            Self::Transport(error) => error.status(),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_bodies_fall_back_to_reason_phrase() {
        let error = ApiError::from_status(StatusCode::NOT_FOUND, "  ");
        assert_eq!(error.to_string(), "HTTP 404 Not Found: Not Found");
        assert_eq!(error.status(), Some(StatusCode::NOT_FOUND));
    }

    #[test]
    fn bodies_are_redacted() {
        let error = ApiError::from_status(StatusCode::UNAUTHORIZED, "bad token dapi0123456789abcdef0123");
        assert_eq!(error.to_string(), "HTTP 401 Unauthorized: bad token dapi<redacted>");
    }
}
