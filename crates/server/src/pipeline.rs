//! The `data_pipeline` workflow.
//!
//! 1. create a promise for the job run to resolve
//! 2. trigger the Databricks job, passing `promise_id` and the callback `url`
//!    as notebook parameters
//! 3. suspend until the notebook posts its result to `/resolve`
//! 4. notify and return the delivered value

use std::sync::Arc;

use anyhow::Context as _;
use async_trait::async_trait;
use pledge_api::JobsClient;
use pledge_engine::{Context, Runtime};
use pledge_types::RunNowRequest;
use serde::{Deserialize, Serialize};
use tracing::info;

/// Registered name of the pipeline workflow.
pub const DATA_PIPELINE: &str = "data_pipeline";

/// Notebook parameter carrying the promise id to resolve.
pub const PROMISE_ID_PARAM: &str = "promise_id";
/// Notebook parameter carrying the base URL of this service.
pub const CALLBACK_URL_PARAM: &str = "url";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataPipelineArgs {
    /// Base URL the notebook should call back on.
    pub url: String,
}

/// Starts the external job for an invocation.
#[async_trait]
pub trait JobTrigger: Send + Sync {
    /// Queue a job run that will resolve `promise_id` via `callback_url`. Returns the run id.
    async fn trigger(&self, promise_id: &str, callback_url: &str) -> anyhow::Result<i64>;
}

/// [`JobTrigger`] that calls Databricks `run-now` for a fixed job.
#[derive(Debug, Clone)]
pub struct DatabricksJobTrigger {
    client: JobsClient,
    job_id: i64,
}

impl DatabricksJobTrigger {
    pub fn new(client: JobsClient, job_id: i64) -> Self {
        Self { client, job_id }
    }
}

#[async_trait]
impl JobTrigger for DatabricksJobTrigger {
    async fn trigger(&self, promise_id: &str, callback_url: &str) -> anyhow::Result<i64> {
        let request = RunNowRequest::new(self.job_id)
            .with_notebook_param(PROMISE_ID_PARAM, promise_id)
            .with_notebook_param(CALLBACK_URL_PARAM, callback_url);
        let run = self
            .client
            .run_now(&request)
            .await
            .with_context(|| format!("trigger databricks job {}", self.job_id))?;
        Ok(run.run_id)
    }
}

/// Follow-up once the job has delivered its value.
#[async_trait]
pub trait CompletionNotifier: Send + Sync {
    async fn notify(&self, invocation_id: &str, value: &str) -> anyhow::Result<()>;
}

/// Prints the delivered value.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogNotifier;

#[async_trait]
impl CompletionNotifier for LogNotifier {
    async fn notify(&self, invocation_id: &str, value: &str) -> anyhow::Result<()> {
        info!(invocation_id = %invocation_id, value = %value, "databricks execution finished");
        println!("databricks execution has finished with value {value}");
        Ok(())
    }
}

/// Register the pipeline workflow on `runtime`.
pub fn register_data_pipeline(runtime: &Runtime, trigger: Arc<dyn JobTrigger>, notifier: Arc<dyn CompletionNotifier>) {
    runtime.register(DATA_PIPELINE, move |ctx: Context, args: DataPipelineArgs| {
        let trigger = Arc::clone(&trigger);
        let notifier = Arc::clone(&notifier);
        async move { data_pipeline(ctx, args, trigger.as_ref(), notifier.as_ref()).await }
    });
}

async fn data_pipeline(
    ctx: Context,
    args: DataPipelineArgs,
    trigger: &dyn JobTrigger,
    notifier: &dyn CompletionNotifier,
) -> anyhow::Result<String> {
    let promise = ctx.promise().await?;
    let run_id: i64 = ctx
        .run("run_job", || trigger.trigger(promise.id(), &args.url))
        .await?;
    info!(invocation_id = %ctx.id(), promise_id = %promise.id(), run_id, "waiting for job callback");

    let value: String = promise.wait().await?;
    ctx.run("notify", || notifier.notify(ctx.id(), &value)).await?;
    Ok(value)
}
