use axum::{
    Router,
    extract::{Query, State},
    http::StatusCode,
    routing::{get, post},
};
use pledge_engine::Runtime;
use pledge_util::encode_json_payload;
use serde::Deserialize;
use tracing::info;

use crate::{DATA_PIPELINE, DataPipelineArgs, ServerError};

#[derive(Debug, Clone)]
pub struct AppState {
    pub runtime: Runtime,
}

/// Build the service router.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/run", get(run))
        .route("/resolve", post(resolve))
        .route("/healthz", get(healthz))
        .with_state(state)
}

#[derive(Debug, Deserialize)]
struct RunQuery {
    id: String,
    url: String,
}

/// Start invocation `id` if needed and report whether it has finished.
async fn run(State(state): State<AppState>, Query(query): Query<RunQuery>) -> Result<&'static str, ServerError> {
    let handle = state
        .runtime
        .begin_run(DATA_PIPELINE, &query.id, &DataPipelineArgs { url: query.url })
        .await?;
    let status = handle.status().await?;
    info!(invocation_id = %query.id, status = %status, "run requested");
    Ok(status.message())
}

#[derive(Debug, Deserialize)]
struct ResolveQuery {
    id: String,
    value: String,
}

/// Resolve promise `id` with `value`; the promise id doubles as the idempotency key.
async fn resolve(State(state): State<AppState>, Query(query): Query<ResolveQuery>) -> Result<StatusCode, ServerError> {
    let payload = encode_json_payload(&query.value)?;
    let record = state
        .runtime
        .promises()
        .resolve(&query.id, Some(&query.id), payload)
        .await?;
    info!(promise_id = %record.id, state = ?record.state, "promise resolved via callback");
    Ok(StatusCode::OK)
}

async fn healthz() -> &'static str {
    "ok"
}
