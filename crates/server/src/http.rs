//! HTTP server host utilities.

use std::net::SocketAddr;

use anyhow::{Context as _, Result, anyhow};
use pledge_engine::Runtime;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::routes::{AppState, router};

/// Host configuration for a Pledge HTTP server instance.
#[derive(Debug, Clone)]
pub struct PledgeServer {
    bind_address: SocketAddr,
    runtime: Runtime,
}

impl PledgeServer {
    /// Create a new server bound to the provided address.
    ///
    /// Workflows must already be registered on `runtime`.
    pub fn new(bind_address: SocketAddr, runtime: Runtime) -> Self {
        Self { bind_address, runtime }
    }

    /// Start the server and return a handle for runtime inspection and shutdown.
    pub async fn start(self) -> Result<RunningPledgeServer> {
        let cancellation_token = CancellationToken::new();
        let router = router(AppState { runtime: self.runtime });
        let listener = tokio::net::TcpListener::bind(self.bind_address)
            .await
            .with_context(|| format!("bind {}", self.bind_address))?;
        let bound_address = listener.local_addr()?;

        let server_handle = tokio::spawn({
            let shutdown = cancellation_token.child_token();
            async move {
                axum::serve(listener, router)
                    .with_graceful_shutdown(async move {
                        shutdown.cancelled().await;
                    })
                    .await
            }
        });
        info!(address = %bound_address, "pledge server listening");

        Ok(RunningPledgeServer {
            bind_address: bound_address,
            cancellation_token,
            server_handle,
        })
    }
}

/// Runtime handle for a running server.
#[derive(Debug)]
pub struct RunningPledgeServer {
    bind_address: SocketAddr,
    cancellation_token: CancellationToken,
    server_handle: JoinHandle<std::io::Result<()>>,
}

impl RunningPledgeServer {
    /// Return the bound socket address for the running server.
    pub fn bound_address(&self) -> SocketAddr {
        self.bind_address
    }

    /// Base URL clients can use to reach the server.
    pub fn base_url(&self) -> String {
        format!("http://{}", self.bind_address)
    }

    /// Stop the server and wait for in-flight requests to finish.
    pub async fn stop(self) -> Result<()> {
        self.cancellation_token.cancel();
        self.server_handle
            .await
            .map_err(|error| anyhow!("HTTP server task failed: {error}"))?
            .context("HTTP server exited with an error")?;
        info!(address = %self.bind_address, "pledge server stopped");
        Ok(())
    }
}
