//! Pledge API client utilities.
//!
//! This crate provides two lightweight HTTP clients:
//!
//! - [`PromiseStoreClient`] for the durable promise store (Resonate-compatible
//!   REST: `POST /promises`, `PATCH /promises/{id}`, `GET /promises/{id}`)
//! - [`JobsClient`] for triggering Databricks jobs via `run-now`
//!
//! Both validate their base URL up front, carry a consistent User-Agent, and
//! surface non-success responses as [`ApiError::Status`] so callers can map
//! store semantics (not found, already completed) onto their own errors.
//!
//! # Example
//!
//! ```ignore
//! use pledge_api::JobsClient;
//! use pledge_types::RunNowRequest;
//!
//! async fn trigger() -> Result<(), pledge_api::ApiError> {
//!     let client = JobsClient::from_env()?;
//!     let run = client.run_now(&RunNowRequest::new(42)).await?;
//!     println!("run id: {}", run.run_id);
//!     Ok(())
//! }
//! ```

mod base_url;
mod error;
mod jobs;
mod netrc;
mod promises;

pub use base_url::{normalize_base_url, validate_base_url};
pub use error::ApiError;
pub use jobs::{DATABRICKS_HOST_ENV, DATABRICKS_TOKEN_ENV, JobsClient};
pub use promises::{DEFAULT_STORE_URL, PromiseStoreClient, STORE_TOKEN_ENV, STORE_URL_ENV};
pub use reqwest::StatusCode;

use std::env;

use reqwest::{Response, header};
use serde::de::DeserializeOwned;

fn user_agent() -> String {
    format!("pledge/{}; {}", env!("CARGO_PKG_VERSION"), env::consts::OS)
}

fn bearer_headers(token: Option<&str>) -> Result<header::HeaderMap, ApiError> {
    let mut default_headers = header::HeaderMap::new();
    if let Some(token) = token {
        let mut value = header::HeaderValue::from_str(&format!("Bearer {token}")).map_err(|_| ApiError::InvalidHeader("authorization"))?;
        value.set_sensitive(true);
        default_headers.insert(header::AUTHORIZATION, value);
    }
    default_headers.insert(header::ACCEPT, header::HeaderValue::from_static("application/json"));
    Ok(default_headers)
}

/// Decode a JSON body, or turn a non-success status into [`ApiError::Status`].
async fn decode_json<T: DeserializeOwned>(response: Response) -> Result<T, ApiError> {
    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(ApiError::from_status(status, &body));
    }
    let bytes = response.bytes().await?;
    serde_json::from_slice(&bytes).map_err(ApiError::Decode)
}
