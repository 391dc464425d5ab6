//! Workflow registry and invocation lifecycle.
//!
//! An invocation is a root promise whose id is the invocation id and whose
//! parameter records the workflow name and arguments. Starting an invocation
//! creates that promise idempotently and, when it is still pending and no
//! local task is driving it, spawns the workflow. The workflow's return value
//! completes the root promise.

use std::{
    collections::{HashMap, HashSet},
    future::Future,
    pin::Pin,
    sync::{Arc, Mutex, PoisonError, RwLock},
    time::Duration,
};

use chrono::Utc;
use pledge_api::PromiseStoreClient;
use pledge_types::{CompletePromise, CreatePromise, INVOKE_TAG, PromiseRecord, PromiseState, RunStatus};
use pledge_util::{decode_json_payload, encode_json_payload};
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::{Context, EngineError, LocalPromiseStore, PromiseStore, RemotePromiseStore, StoreError};

/// Default interval between store polls while waiting on a promise.
const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(1);
/// Default lifetime of promises created by the runtime.
const DEFAULT_PROMISE_TIMEOUT: Duration = Duration::from_secs(60 * 60 * 24 * 30);

type WorkflowFuture = Pin<Box<dyn Future<Output = anyhow::Result<Value>> + Send>>;
type WorkflowFn = Arc<dyn Fn(Context, Value) -> WorkflowFuture + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RuntimeConfig {
    pub poll_interval: Duration,
    pub promise_timeout: Duration,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            poll_interval: DEFAULT_POLL_INTERVAL,
            promise_timeout: DEFAULT_PROMISE_TIMEOUT,
        }
    }
}

impl RuntimeConfig {
    /// Absolute deadline, in epoch milliseconds, for a promise created now.
    pub(crate) fn deadline_millis(&self) -> i64 {
        let timeout = i64::try_from(self.promise_timeout.as_millis()).unwrap_or(i64::MAX);
        Utc::now().timestamp_millis().saturating_add(timeout)
    }
}

/// Parameter stored on root promises.
#[derive(Debug, Serialize, Deserialize)]
struct InvocationParam {
    func: String,
    args: Value,
}

struct RuntimeInner {
    store: Arc<dyn PromiseStore>,
    config: RuntimeConfig,
    workflows: RwLock<HashMap<String, WorkflowFn>>,
    active: Mutex<HashSet<String>>,
}

/// Entry point for registering workflows and starting invocations.
#[derive(Clone)]
pub struct Runtime {
    inner: Arc<RuntimeInner>,
}

impl std::fmt::Debug for Runtime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Runtime").field("config", &self.inner.config).finish_non_exhaustive()
    }
}

impl Runtime {
    pub fn new(store: Arc<dyn PromiseStore>, config: RuntimeConfig) -> Self {
        Self {
            inner: Arc::new(RuntimeInner {
                store,
                config,
                workflows: RwLock::new(HashMap::new()),
                active: Mutex::new(HashSet::new()),
            }),
        }
    }

    /// Runtime backed by an in-process store. Nothing survives the process.
    pub fn local() -> Self {
        Self::new(Arc::new(LocalPromiseStore::new()), RuntimeConfig::default())
    }

    /// Runtime backed by the external promise store.
    pub fn remote(client: PromiseStoreClient, config: RuntimeConfig) -> Self {
        Self::new(Arc::new(RemotePromiseStore::new(client)), config)
    }

    pub fn config(&self) -> RuntimeConfig {
        self.inner.config
    }

    /// The promise store, for callers that complete promises on behalf of external actors.
    pub fn promises(&self) -> Arc<dyn PromiseStore> {
        Arc::clone(&self.inner.store)
    }

    /// Register `workflow` under `name`, replacing any previous registration.
    pub fn register<A, R, F, Fut>(&self, name: &str, workflow: F)
    where
        A: DeserializeOwned + Send + 'static,
        R: Serialize + Send + 'static,
        F: Fn(Context, A) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<R>> + Send + 'static,
    {
        let workflow = Arc::new(workflow);
        let erased: WorkflowFn = Arc::new(move |ctx: Context, args: Value| -> WorkflowFuture {
            let workflow = Arc::clone(&workflow);
            Box::pin(async move {
                let args: A = serde_json::from_value(args)?;
                let output = (*workflow)(ctx, args).await?;
                Ok(serde_json::to_value(output)?)
            })
        });
        self.inner
            .workflows
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(name.to_string(), erased);
        debug!(workflow = %name, "workflow registered");
    }

    fn workflow(&self, name: &str) -> Option<WorkflowFn> {
        self.inner
            .workflows
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(name)
            .cloned()
    }

    /// Start (or resume tracking) invocation `id` of workflow `name` without waiting for it.
    ///
    /// Repeated calls with the same id share one root promise and one task.
    /// If the root promise already exists, its stored arguments win over `args`,
    /// and a pending root started under another workflow name is refused.
    pub async fn begin_run<A: Serialize + ?Sized>(&self, name: &str, id: &str, args: &A) -> Result<InvocationHandle, EngineError> {
        let workflow = self
            .workflow(name)
            .ok_or_else(|| EngineError::UnknownWorkflow(name.to_string()))?;

        let param = encode_json_payload(&InvocationParam {
            func: name.to_string(),
            args: serde_json::to_value(args).map_err(pledge_util::PayloadError::from)?,
        })?;
        let request = CreatePromise::new(id, self.inner.config.deadline_millis())
            .with_param(param)
            .with_tag(INVOKE_TAG, name);
        let record = self.inner.store.create(request, Some(id), false).await?;

        if record.state.is_pending() {
            self.spawn_if_idle(name, workflow, &record)?;
        } else {
            debug!(invocation_id = %id, state = ?record.state, "invocation already completed");
        }

        Ok(self.handle(id))
    }

    /// Handle for an invocation that may have been started elsewhere.
    pub fn handle(&self, id: &str) -> InvocationHandle {
        InvocationHandle {
            id: id.to_string(),
            store: Arc::clone(&self.inner.store),
            poll_interval: self.inner.config.poll_interval,
        }
    }

    fn spawn_if_idle(&self, name: &str, workflow: WorkflowFn, record: &PromiseRecord) -> Result<(), EngineError> {
        let param: InvocationParam = decode_json_payload(&record.param)?;
        if param.func != name {
            return Err(EngineError::WorkflowMismatch {
                id: record.id.clone(),
                stored: param.func,
                requested: name.to_string(),
            });
        }
        let Some(guard) = ActiveGuard::acquire(Arc::clone(&self.inner), &record.id) else {
            debug!(invocation_id = %record.id, "invocation already running locally");
            return Ok(());
        };
        let ctx = Context::new(record.id.clone(), self.clone());
        let store = Arc::clone(&self.inner.store);
        let id = record.id.clone();

        info!(invocation_id = %id, workflow = %param.func, "invocation started");
        tokio::spawn(async move {
            let _guard = guard;
            let completion = match (*workflow)(ctx, param.args).await {
                Ok(output) => encode_json_payload(&output).map(CompletePromise::resolved),
                Err(error) => {
                    warn!(invocation_id = %id, error = %error, "invocation failed");
                    encode_json_payload(&error.to_string()).map(CompletePromise::rejected)
                }
            };
            let result = match completion {
                Ok(completion) => store.complete(&id, completion, Some(&id), false).await,
                Err(error) => Err(StoreError::InvalidResponse(error.to_string())),
            };
            match result {
                Ok(record) => info!(invocation_id = %id, state = ?record.state, "invocation finished"),
                Err(error) => warn!(invocation_id = %id, error = %error, "failed to record invocation outcome"),
            }
        });
        Ok(())
    }
}

/// Marks an invocation as driven by a local task until dropped.
struct ActiveGuard {
    inner: Arc<RuntimeInner>,
    id: String,
}

impl ActiveGuard {
    fn acquire(inner: Arc<RuntimeInner>, id: &str) -> Option<Self> {
        let inserted = inner
            .active
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(id.to_string());
        inserted.then(|| Self { inner, id: id.to_string() })
    }
}

impl Drop for ActiveGuard {
    fn drop(&mut self) {
        self.inner
            .active
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&self.id);
    }
}

/// Handle to an invocation's root promise.
#[derive(Clone)]
pub struct InvocationHandle {
    id: String,
    store: Arc<dyn PromiseStore>,
    poll_interval: Duration,
}

impl std::fmt::Debug for InvocationHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InvocationHandle").field("id", &self.id).finish_non_exhaustive()
    }
}

impl InvocationHandle {
    pub fn id(&self) -> &str {
        &self.id
    }

    /// True once the root promise has left the pending state.
    pub async fn done(&self) -> Result<bool, EngineError> {
        Ok(self.store.get(&self.id).await?.state.is_completed())
    }

    pub async fn status(&self) -> Result<RunStatus, EngineError> {
        Ok(RunStatus::from_done(self.done().await?))
    }

    /// Wait for the invocation to finish and decode its result.
    pub async fn result<T: DeserializeOwned>(&self) -> Result<T, EngineError> {
        let record = self.store.await_completion(&self.id, self.poll_interval).await?;
        completed_value(&record)
    }
}

/// Decode a completed record's value, turning rejections into [`EngineError::Rejected`].
pub(crate) fn completed_value<T: DeserializeOwned>(record: &PromiseRecord) -> Result<T, EngineError> {
    match record.state {
        PromiseState::Resolved => Ok(decode_json_payload(&record.value)?),
        state => {
            let reason = decode_json_payload::<Option<String>>(&record.value)
                .ok()
                .flatten()
                .unwrap_or_else(|| format!("{state:?}"));
            Err(EngineError::Rejected {
                id: record.id.clone(),
                reason,
            })
        }
    }
}
