//! HTTP surface for the data pipeline.
//!
//! - `GET /run?id&url` starts (or re-checks) a `data_pipeline` invocation
//! - `POST /resolve?id&value` completes the promise a job run was handed
//! - `GET /healthz` reports liveness

pub mod config;
pub mod error;
pub mod http;
pub mod pipeline;
pub mod routes;

pub use config::{ServerSettings, StoreMode};
pub use error::ServerError;
pub use http::{PledgeServer, RunningPledgeServer};
pub use pipeline::{
    CompletionNotifier, DATA_PIPELINE, DataPipelineArgs, DatabricksJobTrigger, JobTrigger, LogNotifier, register_data_pipeline,
};
pub use routes::{AppState, router};
