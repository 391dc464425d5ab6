//! The promise store seam.
//!
//! Both implementations follow the store's completion rules:
//!
//! - creating an existing id with the same create key returns the existing
//!   record (under `strict`, only while it is still pending)
//! - completing a completed promise with the same complete key returns the
//!   existing record instead of completing it twice
//! - a pending promise past its timeout reads as `REJECTED_TIMEDOUT`

mod local;
mod remote;

use std::time::Duration;

use async_trait::async_trait;
use pledge_types::{CompletePromise, CreatePromise, PromiseRecord, PromiseValue};

use crate::StoreError;

pub use local::LocalPromiseStore;
pub use remote::RemotePromiseStore;

#[async_trait]
pub trait PromiseStore: Send + Sync {
    async fn create(&self, request: CreatePromise, idempotency_key: Option<&str>, strict: bool) -> Result<PromiseRecord, StoreError>;

    async fn complete(
        &self,
        id: &str,
        request: CompletePromise,
        idempotency_key: Option<&str>,
        strict: bool,
    ) -> Result<PromiseRecord, StoreError>;

    async fn get(&self, id: &str) -> Result<PromiseRecord, StoreError>;

    /// Wait until promise `id` leaves the pending state.
    ///
    /// The default implementation polls [`get`](Self::get) every `poll_interval`.
    async fn await_completion(&self, id: &str, poll_interval: Duration) -> Result<PromiseRecord, StoreError> {
        loop {
            let record = self.get(id).await?;
            if record.state.is_completed() {
                return Ok(record);
            }
            tokio::time::sleep(poll_interval).await;
        }
    }

    /// Resolve promise `id` with `value` (non-strict).
    async fn resolve(&self, id: &str, idempotency_key: Option<&str>, value: PromiseValue) -> Result<PromiseRecord, StoreError> {
        self.complete(id, CompletePromise::resolved(value), idempotency_key, false)
            .await
    }

    /// Reject promise `id` with `value` (non-strict).
    async fn reject(&self, id: &str, idempotency_key: Option<&str>, value: PromiseValue) -> Result<PromiseRecord, StoreError> {
        self.complete(id, CompletePromise::rejected(value), idempotency_key, false)
            .await
    }
}
