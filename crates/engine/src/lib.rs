//! # Pledge Engine
//!
//! A thin durable-workflow client runtime. Durability lives in an external
//! promise store; this crate only derives deterministic promise ids, records
//! step outcomes in the store, and suspends workflows until the promises they
//! wait on are completed by someone else.
//!
//! ## Usage
//!
//! ```rust
//! use pledge_engine::{Context, Runtime};
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> anyhow::Result<()> {
//! let runtime = Runtime::local();
//! runtime.register("greet", |_ctx: Context, name: String| async move { Ok(format!("hello {name}")) });
//!
//! let handle = runtime.begin_run("greet", "greet-1", &"world").await?;
//! let greeting: String = handle.result().await?;
//! assert_eq!(greeting, "hello world");
//! # Ok(())
//! # }
//! ```
//!
//! ## Architecture
//!
//! - **`store`**: the [`PromiseStore`] seam plus the remote (HTTP) and local (in-process) stores
//! - **`runtime`**: workflow registry, invocation start and [`InvocationHandle`]
//! - **`context`**: the [`Context`] handed to workflows, durable steps and [`DurablePromise`]

pub mod context;
pub mod error;
pub mod runtime;
pub mod store;

pub use context::{Context, DurablePromise};
pub use error::{EngineError, StoreError};
pub use runtime::{InvocationHandle, Runtime, RuntimeConfig};
pub use store::{LocalPromiseStore, PromiseStore, RemotePromiseStore};
