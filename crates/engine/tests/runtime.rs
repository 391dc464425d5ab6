use std::{
    sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    },
    time::Duration,
};

use pledge_engine::{Context, EngineError, LocalPromiseStore, PromiseStore, Runtime, RuntimeConfig, StoreError};
use pledge_types::{CreatePromise, RunStatus};
use pledge_util::encode_json_payload;
use tokio::sync::mpsc;

fn fast_config() -> RuntimeConfig {
    RuntimeConfig {
        poll_interval: Duration::from_millis(10),
        ..RuntimeConfig::default()
    }
}

/// Registers a workflow that hands its promise id out on `ids` and returns the resolved value.
fn register_waiting_workflow(runtime: &Runtime, starts: Arc<AtomicUsize>, ids: mpsc::UnboundedSender<String>) {
    runtime.register("wait_for_value", move |ctx: Context, _args: serde_json::Value| {
        let starts = Arc::clone(&starts);
        let ids = ids.clone();
        async move {
            starts.fetch_add(1, Ordering::SeqCst);
            let promise = ctx.promise().await?;
            ids.send(promise.id().to_string())?;
            let value: String = promise.wait().await?;
            Ok(value)
        }
    });
}

async fn wait_until_done(runtime: &Runtime, id: &str) {
    tokio::time::timeout(Duration::from_secs(5), async {
        while !runtime.handle(id).done().await.expect("status") {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("invocation finishes");
}

#[tokio::test]
async fn begin_run_twice_reports_in_progress_and_runs_once() {
    let runtime = Runtime::new(Arc::new(LocalPromiseStore::new()), fast_config());
    let starts = Arc::new(AtomicUsize::new(0));
    let (ids_tx, mut ids_rx) = mpsc::unbounded_channel();
    register_waiting_workflow(&runtime, Arc::clone(&starts), ids_tx);

    let first = runtime.begin_run("wait_for_value", "foo", &serde_json::json!({})).await.expect("first start");
    let promise_id = ids_rx.recv().await.expect("promise id");
    assert_eq!(promise_id, "foo.1");
    assert_eq!(first.status().await.expect("status"), RunStatus::InProgress);

    let second = runtime.begin_run("wait_for_value", "foo", &serde_json::json!({})).await.expect("second start");
    assert_eq!(second.status().await.expect("status"), RunStatus::InProgress);
    assert_eq!(starts.load(Ordering::SeqCst), 1);

    runtime
        .promises()
        .resolve(&promise_id, Some(&promise_id), encode_json_payload("hello world").expect("encode"))
        .await
        .expect("resolve");

    let value: String = first.result().await.expect("result");
    assert_eq!(value, "hello world");
    assert_eq!(second.status().await.expect("status"), RunStatus::Done);
    assert_eq!(starts.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn begin_run_after_completion_does_not_restart() {
    let runtime = Runtime::new(Arc::new(LocalPromiseStore::new()), fast_config());
    let runs = Arc::new(AtomicUsize::new(0));
    {
        let runs = Arc::clone(&runs);
        runtime.register("count", move |_ctx: Context, n: u32| {
            let runs = Arc::clone(&runs);
            async move {
                runs.fetch_add(1, Ordering::SeqCst);
                Ok(n * 2)
            }
        });
    }

    let handle = runtime.begin_run("count", "count-1", &21u32).await.expect("start");
    let doubled: u32 = handle.result().await.expect("result");
    assert_eq!(doubled, 42);

    let again = runtime.begin_run("count", "count-1", &99u32).await.expect("restart");
    assert_eq!(again.status().await.expect("status"), RunStatus::Done);
    let stored: u32 = again.result().await.expect("stored result");
    assert_eq!(stored, 42);
    assert_eq!(runs.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn completed_steps_replay_without_running_again() {
    let store = Arc::new(LocalPromiseStore::new());
    let runtime = Runtime::new(store.clone(), fast_config());
    let step_runs = Arc::new(AtomicUsize::new(0));
    {
        let step_runs = Arc::clone(&step_runs);
        runtime.register("replay", move |ctx: Context, _args: ()| {
            let step_runs = Arc::clone(&step_runs);
            async move {
                let run_id: i64 = ctx
                    .run("trigger", || async {
                        step_runs.fetch_add(1, Ordering::SeqCst);
                        Ok(7)
                    })
                    .await?;
                Ok(run_id)
            }
        });
    }

    // A previous process recorded the step before stopping.
    store
        .create(CreatePromise::new("replay-1.1", i64::MAX), Some("replay-1.1"), false)
        .await
        .expect("seed step");
    store
        .resolve("replay-1.1", Some("replay-1.1"), encode_json_payload(&1234i64).expect("encode"))
        .await
        .expect("seed step value");

    let handle = runtime.begin_run("replay", "replay-1", &()).await.expect("start");
    let run_id: i64 = handle.result().await.expect("result");
    assert_eq!(run_id, 1234);
    assert_eq!(step_runs.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn failing_steps_reject_the_invocation() {
    let runtime = Runtime::new(Arc::new(LocalPromiseStore::new()), fast_config());
    runtime.register("broken", |ctx: Context, _args: ()| async move {
        let value: String = ctx
            .run("explode", || async { Err(anyhow::anyhow!("job API unavailable")) })
            .await?;
        Ok(value)
    });

    let handle = runtime.begin_run("broken", "broken-1", &()).await.expect("start");
    let error = handle.result::<String>().await.unwrap_err();
    match error {
        EngineError::Rejected { id, reason } => {
            assert_eq!(id, "broken-1");
            assert_eq!(reason, "step 'explode' failed: job API unavailable");
        }
        other => panic!("unexpected error: {other:?}"),
    }
    wait_until_done(&runtime, "broken-1").await;
}

#[tokio::test]
async fn resolving_unknown_promise_leaves_running_invocations_alone() {
    let runtime = Runtime::new(Arc::new(LocalPromiseStore::new()), fast_config());
    let starts = Arc::new(AtomicUsize::new(0));
    let (ids_tx, mut ids_rx) = mpsc::unbounded_channel();
    register_waiting_workflow(&runtime, Arc::clone(&starts), ids_tx);

    let handle = runtime.begin_run("wait_for_value", "bar", &serde_json::json!({})).await.expect("start");
    ids_rx.recv().await.expect("promise id");

    let error = runtime
        .promises()
        .resolve("nobody", Some("nobody"), encode_json_payload("x").expect("encode"))
        .await
        .unwrap_err();
    assert_eq!(error, StoreError::NotFound("nobody".into()));

    tokio::time::sleep(Duration::from_millis(30)).await;
    assert_eq!(handle.status().await.expect("status"), RunStatus::InProgress);
}

#[tokio::test]
async fn unknown_workflows_are_rejected_before_touching_the_store() {
    let store = Arc::new(LocalPromiseStore::new());
    let runtime = Runtime::new(store.clone(), fast_config());

    let error = runtime.begin_run("missing", "m-1", &()).await.unwrap_err();
    assert!(matches!(error, EngineError::UnknownWorkflow(name) if name == "missing"));
    assert!(store.is_empty().await);
}

#[tokio::test]
async fn completing_the_invocation_releases_a_suspended_wait() {
    let runtime = Runtime::new(Arc::new(LocalPromiseStore::new()), fast_config());
    let (ids_tx, mut ids_rx) = mpsc::unbounded_channel();
    let (outcomes_tx, mut outcomes_rx) = mpsc::unbounded_channel();
    let continuations = Arc::new(AtomicUsize::new(0));
    {
        let continuations = Arc::clone(&continuations);
        runtime.register("wait_then_continue", move |ctx: Context, _args: ()| {
            let ids = ids_tx.clone();
            let outcomes = outcomes_tx.clone();
            let continuations = Arc::clone(&continuations);
            async move {
                let promise = ctx.promise().await?;
                ids.send(promise.id().to_string())?;
                let outcome = promise.wait::<String>().await;
                outcomes.send(matches!(outcome, Err(EngineError::Superseded { .. })))?;
                let value = outcome?;
                continuations.fetch_add(1, Ordering::SeqCst);
                Ok(value)
            }
        });
    }

    let handle = runtime.begin_run("wait_then_continue", "foo", &()).await.expect("start");
    assert_eq!(ids_rx.recv().await.expect("promise id"), "foo.1");

    runtime
        .promises()
        .resolve("foo", Some("foo"), encode_json_payload("hello world").expect("encode"))
        .await
        .expect("resolve invocation");

    let superseded = tokio::time::timeout(Duration::from_secs(5), outcomes_rx.recv())
        .await
        .expect("wait returns")
        .expect("outcome");
    assert!(superseded, "wait should report the completed invocation");
    assert_eq!(continuations.load(Ordering::SeqCst), 0);
    assert_eq!(handle.status().await.expect("status"), RunStatus::Done);
    let value: String = handle.result().await.expect("result");
    assert_eq!(value, "hello world");
}

/// Workflow shaped like the data pipeline: callback promise, then a job step, then the wait.
fn register_job_workflow(runtime: &Runtime, triggers: Arc<AtomicUsize>, ids: mpsc::UnboundedSender<String>) {
    runtime.register("job_then_wait", move |ctx: Context, _args: ()| {
        let triggers = Arc::clone(&triggers);
        let ids = ids.clone();
        async move {
            let promise = ctx.promise().await?;
            let run_id: u32 = ctx
                .run("run_job", || async {
                    triggers.fetch_add(1, Ordering::SeqCst);
                    Ok(7)
                })
                .await?;
            assert_eq!(run_id, 7);
            ids.send(promise.id().to_string())?;
            let value: String = promise.wait().await?;
            Ok(value)
        }
    });
}

#[tokio::test]
async fn pending_invocation_resumes_in_a_new_runtime_without_retriggering() {
    let store = Arc::new(LocalPromiseStore::new());
    let triggers = Arc::new(AtomicUsize::new(0));

    // A process that stops while waiting for the callback: its tasks die with its runtime.
    let first_process = {
        let store = store.clone();
        let triggers = Arc::clone(&triggers);
        std::thread::spawn(move || {
            let process = tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()
                .expect("runtime");
            process.block_on(async move {
                let runtime = Runtime::new(store, fast_config());
                let (ids_tx, mut ids_rx) = mpsc::unbounded_channel();
                register_job_workflow(&runtime, triggers, ids_tx);
                runtime.begin_run("job_then_wait", "foo", &()).await.expect("start");
                ids_rx.recv().await.expect("promise id")
            })
        })
    };
    let promise_id = first_process.join().expect("first process");
    assert_eq!(promise_id, "foo.1");
    assert_eq!(triggers.load(Ordering::SeqCst), 1);

    let runtime = Runtime::new(store.clone(), fast_config());
    let (ids_tx, mut ids_rx) = mpsc::unbounded_channel();
    register_job_workflow(&runtime, Arc::clone(&triggers), ids_tx);

    let handle = runtime.begin_run("job_then_wait", "foo", &()).await.expect("restart");
    assert_eq!(ids_rx.recv().await.expect("promise id"), "foo.1");
    assert_eq!(handle.status().await.expect("status"), RunStatus::InProgress);
    assert_eq!(triggers.load(Ordering::SeqCst), 1, "job step must replay, not run again");

    runtime
        .promises()
        .resolve("foo.1", Some("foo.1"), encode_json_payload("hello world").expect("encode"))
        .await
        .expect("resolve");
    let value: String = handle.result().await.expect("result");
    assert_eq!(value, "hello world");
    assert_eq!(triggers.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn reusing_an_invocation_id_for_another_workflow_is_refused() {
    let runtime = Runtime::new(Arc::new(LocalPromiseStore::new()), fast_config());
    let starts = Arc::new(AtomicUsize::new(0));
    let (ids_tx, mut ids_rx) = mpsc::unbounded_channel();
    register_waiting_workflow(&runtime, Arc::clone(&starts), ids_tx);

    let other_runs = Arc::new(AtomicUsize::new(0));
    {
        let other_runs = Arc::clone(&other_runs);
        runtime.register("other", move |_ctx: Context, _args: serde_json::Value| {
            let other_runs = Arc::clone(&other_runs);
            async move {
                other_runs.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }
        });
    }

    runtime.begin_run("wait_for_value", "shared", &serde_json::json!({"n": 1})).await.expect("start");
    ids_rx.recv().await.expect("promise id");

    let error = runtime.begin_run("other", "shared", &serde_json::json!({})).await.unwrap_err();
    match error {
        EngineError::WorkflowMismatch { id, stored, requested } => {
            assert_eq!(id, "shared");
            assert_eq!(stored, "wait_for_value");
            assert_eq!(requested, "other");
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert_eq!(other_runs.load(Ordering::SeqCst), 0);
    assert_eq!(starts.load(Ordering::SeqCst), 1);
}
