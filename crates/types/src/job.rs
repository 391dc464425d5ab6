//! Databricks Jobs API payloads.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Request body for `POST /api/2.1/jobs/run-now`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunNowRequest {
    pub job_id: i64,
    /// Widget values handed to the notebook task; omitted when empty.
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub notebook_params: IndexMap<String, String>,
}

impl RunNowRequest {
    pub fn new(job_id: i64) -> Self {
        Self {
            job_id,
            notebook_params: IndexMap::new(),
        }
    }

    pub fn with_notebook_param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.notebook_params.insert(key.into(), value.into());
        self
    }
}

/// Response body of `run-now`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunNowResponse {
    pub run_id: i64,
    #[serde(default)]
    pub number_in_job: Option<i64>,
}
