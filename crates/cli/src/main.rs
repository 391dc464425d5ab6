use std::{net::SocketAddr, sync::Arc, time::Duration};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use pledge_api::{JobsClient, PromiseStoreClient};
use pledge_engine::{LocalPromiseStore, Runtime, RuntimeConfig};
use pledge_server::{DatabricksJobTrigger, LogNotifier, PledgeServer, ServerSettings, StoreMode, register_data_pipeline};
use pledge_types::RunNowRequest;
use tracing::info;
use tracing_subscriber::EnvFilter;

const TRIGGER_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Parser)]
#[command(name = "pledge", version, about = "Hand work to a Databricks job and resume when it calls back")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Run the HTTP service until Ctrl-C.
    Serve {
        /// Address to listen on; overrides PLEDGE_BIND.
        #[arg(long)]
        bind: Option<SocketAddr>,
        /// Keep promises in memory instead of the promise store.
        #[arg(long)]
        local: bool,
        #[arg(long, env = "PLEDGE_STORE_TOKEN", hide_env_values = true)]
        store_token: Option<String>,
    },
    /// Ask a running service to start (or report on) an invocation.
    Trigger {
        #[arg(long)]
        id: String,
        /// Base URL of the service.
        #[arg(long)]
        url: String,
    },
    /// Trigger the Databricks job directly, without notebook parameters.
    RunJob {
        #[arg(long, env = "JOB_ID")]
        job_id: i64,
    },
    /// Resolve a promise the way the notebook does when it finishes.
    Callback {
        /// Base URL of the service.
        #[arg(long)]
        url: String,
        #[arg(long)]
        promise_id: String,
        #[arg(long)]
        value: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    match Cli::parse().command {
        Command::Serve { bind, local, store_token } => serve(bind, local, store_token.as_deref()).await,
        Command::Trigger { id, url } => {
            let base = url.trim_end_matches('/');
            match trigger(&id, base).await {
                Ok(body) => {
                    println!("Response: {body}");
                    Ok(())
                }
                Err(error) => {
                    println!("Error calling {base}/run with id={id}: {error:#}");
                    std::process::exit(1);
                }
            }
        }
        Command::RunJob { job_id } => {
            let client = JobsClient::from_env()?;
            let run = client.run_now(&RunNowRequest::new(job_id)).await?;
            println!("Triggered job {job_id}: run {}", run.run_id);
            Ok(())
        }
        Command::Callback { url, promise_id, value } => callback(url.trim_end_matches('/'), &promise_id, &value).await,
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

async fn serve(bind: Option<SocketAddr>, local: bool, store_token: Option<&str>) -> Result<()> {
    let mut settings = ServerSettings::from_env().context("read server settings")?;
    if let Some(bind) = bind {
        settings.bind_address = bind;
    }
    if local {
        settings.store = StoreMode::Local;
    }

    let config = RuntimeConfig {
        poll_interval: settings.poll_interval,
        ..RuntimeConfig::default()
    };
    let runtime = match &settings.store {
        StoreMode::Remote(url) => {
            let client = PromiseStoreClient::new(url, store_token).with_context(|| format!("promise store at {url}"))?;
            Runtime::remote(client, config)
        }
        StoreMode::Local => Runtime::new(Arc::new(LocalPromiseStore::new()), config),
    };

    let jobs = JobsClient::from_env().context("configure databricks client")?;
    register_data_pipeline(
        &runtime,
        Arc::new(DatabricksJobTrigger::new(jobs, settings.job_id)),
        Arc::new(LogNotifier),
    );

    let server = PledgeServer::new(settings.bind_address, runtime).start().await?;
    info!(url = %server.base_url(), store = ?settings.store, job_id = settings.job_id, "serving; press Ctrl-C to stop");
    tokio::signal::ctrl_c().await.context("listen for Ctrl-C")?;
    server.stop().await
}

async fn trigger(id: &str, base: &str) -> Result<String> {
    let client = reqwest::Client::builder().timeout(TRIGGER_TIMEOUT).build()?;
    let response = client
        .get(format!("{base}/run"))
        .query(&[("id", id), ("url", base)])
        .send()
        .await?
        .error_for_status()?;
    Ok(response.text().await?)
}

async fn callback(base: &str, promise_id: &str, value: &str) -> Result<()> {
    let response = reqwest::Client::new()
        .post(format!("{base}/resolve"))
        .query(&[("id", promise_id), ("value", value)])
        .send()
        .await
        .with_context(|| format!("POST {base}/resolve"))?;
    let status = response.status();
    let text = response.text().await.unwrap_or_default();
    anyhow::ensure!(status.is_success(), "resolve {promise_id} failed: {status} {text}");
    println!("{status}");
    Ok(())
}
