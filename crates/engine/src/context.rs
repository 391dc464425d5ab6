//! Workflow context: deterministic child promises and durable steps.
//!
//! Every durable call made through a [`Context`] consumes the next sequence
//! number, so the n-th call of invocation `foo` always maps to promise `foo.n`.
//! Re-running a workflow therefore finds the records of its earlier calls in
//! the store and replays their outcomes instead of repeating side effects.

use std::{
    future::Future,
    sync::{
        Arc,
        atomic::{AtomicU32, Ordering},
    },
    time::Duration,
};

use pledge_types::{CreatePromise, PromiseState};
use pledge_util::encode_json_payload;
use serde::{Serialize, de::DeserializeOwned};
use tracing::{debug, info, warn};

use crate::{EngineError, PromiseStore, Runtime, runtime::completed_value};

/// Tag recording which step produced a child promise.
const STEP_TAG: &str = "pledge:step";

#[derive(Clone, Debug)]
pub struct Context {
    invocation_id: String,
    runtime: Runtime,
    sequence: Arc<AtomicU32>,
}

impl Context {
    pub(crate) fn new(invocation_id: String, runtime: Runtime) -> Self {
        Self {
            invocation_id,
            runtime,
            sequence: Arc::new(AtomicU32::new(0)),
        }
    }

    /// Id of the invocation this context belongs to.
    pub fn id(&self) -> &str {
        &self.invocation_id
    }

    fn next_child_id(&self) -> String {
        let sequence = self.sequence.fetch_add(1, Ordering::SeqCst) + 1;
        format!("{}.{}", self.invocation_id, sequence)
    }

    fn child_request(&self, id: &str) -> CreatePromise {
        CreatePromise::new(id, self.runtime.config().deadline_millis())
    }

    /// Create a pending promise for an external actor to complete.
    pub async fn promise(&self) -> Result<DurablePromise, EngineError> {
        let id = self.next_child_id();
        let record = self
            .runtime
            .promises()
            .create(self.child_request(&id), Some(&id), false)
            .await?;
        debug!(invocation_id = %self.invocation_id, promise_id = %record.id, state = ?record.state, "durable promise ready");
        Ok(DurablePromise {
            id,
            invocation_id: self.invocation_id.clone(),
            store: self.runtime.promises(),
            poll_interval: self.runtime.config().poll_interval,
        })
    }

    /// Run `step` at most once per invocation, recording its outcome durably.
    ///
    /// When the step's promise is already resolved (a replay after restart),
    /// the stored value is returned and `step` is not called.
    pub async fn run<T, F, Fut>(&self, name: &str, step: F) -> Result<T, EngineError>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = anyhow::Result<T>>,
    {
        let id = self.next_child_id();
        let store = self.runtime.promises();
        let record = store
            .create(self.child_request(&id).with_tag(STEP_TAG, name), Some(&id), false)
            .await?;

        if record.state.is_completed() {
            info!(invocation_id = %self.invocation_id, step = %name, promise_id = %id, "step replayed from store");
            return completed_value(&record);
        }

        match step().await {
            Ok(output) => {
                store.resolve(&id, Some(&id), encode_json_payload(&output)?).await?;
                debug!(invocation_id = %self.invocation_id, step = %name, promise_id = %id, "step completed");
                Ok(output)
            }
            Err(error) => {
                let message = error.to_string();
                warn!(invocation_id = %self.invocation_id, step = %name, error = %message, "step failed");
                store.reject(&id, Some(&id), encode_json_payload(&message)?).await?;
                Err(EngineError::StepFailed {
                    name: name.to_string(),
                    message,
                })
            }
        }
    }
}

/// A child promise awaiting completion by an external actor.
#[derive(Clone)]
pub struct DurablePromise {
    id: String,
    invocation_id: String,
    store: Arc<dyn PromiseStore>,
    poll_interval: Duration,
}

impl std::fmt::Debug for DurablePromise {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DurablePromise").field("id", &self.id).finish_non_exhaustive()
    }
}

impl DurablePromise {
    /// Id to hand to whoever will resolve this promise.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Suspend until the promise completes and decode its value.
    ///
    /// Returns [`EngineError::Superseded`] if the invocation itself is
    /// completed first.
    pub async fn wait<T: DeserializeOwned>(&self) -> Result<T, EngineError> {
        let record = tokio::select! {
            biased;
            record = self.store.await_completion(&self.id, self.poll_interval) => record?,
            root = self.store.await_completion(&self.invocation_id, self.poll_interval) => {
                let root = root?;
                // The promise may have been completed in the same instant.
                let record = self.store.get(&self.id).await?;
                if record.state.is_pending() {
                    info!(invocation_id = %self.invocation_id, promise_id = %self.id, state = ?root.state, "invocation completed while waiting");
                    return Err(EngineError::Superseded {
                        id: self.id.clone(),
                        invocation_id: self.invocation_id.clone(),
                    });
                }
                record
            }
        };
        if record.state != PromiseState::Resolved {
            warn!(promise_id = %self.id, state = ?record.state, "durable promise did not resolve");
        }
        completed_value(&record)
    }
}
