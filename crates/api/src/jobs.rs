use std::time::Duration;

use pledge_types::{RunNowRequest, RunNowResponse};
use pledge_util::{env_var_trimmed, require_env};
use reqwest::{Client, Method, RequestBuilder, header};
use tracing::{debug, info};

use crate::{ApiError, base_url, bearer_headers, decode_json, netrc, user_agent};

pub const DATABRICKS_HOST_ENV: &str = "DATABRICKS_HOST";
pub const DATABRICKS_TOKEN_ENV: &str = "DATABRICKS_TOKEN";

/// Workspace domains accepted for non-local `DATABRICKS_HOST` values.
const ALLOWED_DATABRICKS_DOMAINS: &[&str] = &["cloud.databricks.com", "azuredatabricks.net", "gcp.databricks.com"];

const RUN_NOW_PATH: &str = "/api/2.1/jobs/run-now";

#[derive(Debug, Clone)]
/// Thin wrapper around a configured `reqwest::Client` for the Databricks Jobs API.
pub struct JobsClient {
    pub base_url: String,
    pub http: Client,
    pub user_agent: String,
}

impl JobsClient {
    /// Construct a client for `host`, authenticating with `token` when given.
    pub fn new(host: &str, token: Option<&str>) -> Result<Self, ApiError> {
        let base_url = base_url::normalize_base_url(host);
        base_url::validate_base_url(&base_url, ALLOWED_DATABRICKS_DOMAINS)?;

        let http = Client::builder()
            .default_headers(bearer_headers(token)?)
            .timeout(Duration::from_secs(30))
            .build()?;

        Ok(Self {
            base_url,
            http,
            user_agent: user_agent(),
        })
    }

    /// Construct a [`JobsClient`] from environment variables and `~/.netrc`.
    ///
    /// Resolution order for authentication:
    /// - `DATABRICKS_TOKEN` environment variable
    /// - `~/.netrc` entry whose `machine` is the workspace host
    pub fn from_env() -> Result<Self, ApiError> {
        let host = require_env(DATABRICKS_HOST_ENV)?;
        let token = env_var_trimmed(DATABRICKS_TOKEN_ENV).or_else(|| {
            let normalized = base_url::normalize_base_url(&host);
            let host_name = reqwest::Url::parse(&normalized).ok()?.host_str()?.to_string();
            netrc::netrc_token_for_host(&host_name)
        });
        if token.is_none() {
            debug!(host = %host, "no Databricks token found; requests will be unauthenticated");
        }
        Self::new(&host, token.as_deref())
    }

    /// Build a request for an API-relative path.
    pub fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let url = format!("{}{}", self.base_url, path);
        debug!(%url, "building request");

        self.http
            .request(method, url)
            .header(header::USER_AGENT, &self.user_agent)
    }

    /// Trigger a run of an existing job. Returns as soon as the run is queued.
    pub async fn run_now(&self, request: &RunNowRequest) -> Result<RunNowResponse, ApiError> {
        let response = self.request(Method::POST, RUN_NOW_PATH).json(request).send().await?;
        let run: RunNowResponse = decode_json(response).await?;
        info!(job_id = request.job_id, run_id = run.run_id, "databricks job run queued");
        Ok(run)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_hosts_outside_databricks_domains() {
        let error = JobsClient::new("https://jobs.example.com", None).unwrap_err();
        assert!(matches!(error, ApiError::InvalidBaseUrl(_)));
    }

    #[test]
    fn accepts_bare_workspace_hosts() {
        let client = JobsClient::new("adb-123.4.azuredatabricks.net", Some("dapi-token")).expect("client");
        assert_eq!(client.base_url, "https://adb-123.4.azuredatabricks.net");
    }

    #[test]
    fn from_env_requires_host() {
        temp_env::with_vars([(DATABRICKS_HOST_ENV, None::<&str>), (DATABRICKS_TOKEN_ENV, None)], || {
            let error = JobsClient::from_env().unwrap_err();
            assert_eq!(error.to_string(), "missing required environment variable DATABRICKS_HOST");
        });
    }
}
