use std::{collections::HashMap, time::Duration};

use async_trait::async_trait;
use chrono::Utc;
use pledge_types::{CompletePromise, CreatePromise, PromiseRecord, PromiseState};
use tokio::sync::{Mutex, Notify};
use tracing::debug;

use super::PromiseStore;
use crate::StoreError;

/// In-process [`PromiseStore`] for local mode and tests.
///
/// Records live in memory only. Waiters are woken through a [`Notify`] rather
/// than by polling, with the poll interval kept as an upper bound so that
/// timeouts are still observed.
#[derive(Debug, Default)]
pub struct LocalPromiseStore {
    promises: Mutex<HashMap<String, PromiseRecord>>,
    completed: Notify,
}

impl LocalPromiseStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of promises held, pending or not.
    pub async fn len(&self) -> usize {
        self.promises.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

fn now_millis() -> i64 {
    Utc::now().timestamp_millis()
}

/// Move a pending record past its deadline to `REJECTED_TIMEDOUT`.
fn expire_if_due(record: &mut PromiseRecord, now: i64) -> bool {
    if record.state.is_pending() && now >= record.timeout {
        record.state = PromiseState::RejectedTimedout;
        record.completed_on = Some(record.timeout);
        return true;
    }
    false
}

#[async_trait]
impl PromiseStore for LocalPromiseStore {
    async fn create(&self, request: CreatePromise, idempotency_key: Option<&str>, strict: bool) -> Result<PromiseRecord, StoreError> {
        let now = now_millis();
        let mut promises = self.promises.lock().await;

        if let Some(existing) = promises.get_mut(&request.id) {
            if expire_if_due(existing, now) {
                self.completed.notify_waiters();
            }
            let same_key = idempotency_key.is_some() && existing.idempotency_key_for_create.as_deref() == idempotency_key;
            if same_key && (!strict || existing.state.is_pending()) {
                return Ok(existing.clone());
            }
            return Err(StoreError::AlreadyExists(request.id));
        }

        let mut record = PromiseRecord {
            id: request.id.clone(),
            state: PromiseState::Pending,
            param: request.param,
            value: Default::default(),
            timeout: request.timeout,
            idempotency_key_for_create: idempotency_key.map(str::to_string),
            idempotency_key_for_complete: None,
            created_on: Some(now),
            completed_on: None,
            tags: request.tags,
        };
        if expire_if_due(&mut record, now) {
            self.completed.notify_waiters();
        }
        debug!(promise_id = %record.id, state = ?record.state, "local promise created");
        promises.insert(request.id, record.clone());
        Ok(record)
    }

    async fn complete(
        &self,
        id: &str,
        request: CompletePromise,
        idempotency_key: Option<&str>,
        strict: bool,
    ) -> Result<PromiseRecord, StoreError> {
        let now = now_millis();
        let mut promises = self.promises.lock().await;
        let record = promises
            .get_mut(id)
            .ok_or_else(|| StoreError::NotFound(id.to_string()))?;

        if expire_if_due(record, now) {
            self.completed.notify_waiters();
        }

        if record.state.is_completed() {
            let same_key = idempotency_key.is_some() && record.idempotency_key_for_complete.as_deref() == idempotency_key;
            if same_key && (!strict || record.state == request.state) {
                return Ok(record.clone());
            }
            return Err(StoreError::AlreadyCompleted(id.to_string()));
        }

        record.state = request.state;
        record.value = request.value;
        record.idempotency_key_for_complete = idempotency_key.map(str::to_string);
        record.completed_on = Some(now);
        debug!(promise_id = %id, state = ?record.state, "local promise completed");

        let completed = record.clone();
        drop(promises);
        self.completed.notify_waiters();
        Ok(completed)
    }

    async fn get(&self, id: &str) -> Result<PromiseRecord, StoreError> {
        let mut promises = self.promises.lock().await;
        let record = promises
            .get_mut(id)
            .ok_or_else(|| StoreError::NotFound(id.to_string()))?;
        if expire_if_due(record, now_millis()) {
            self.completed.notify_waiters();
        }
        Ok(record.clone())
    }

    async fn await_completion(&self, id: &str, poll_interval: Duration) -> Result<PromiseRecord, StoreError> {
        loop {
            // Register before checking so a completion between the check and the
            // wait is not missed.
            let notified = self.completed.notified();
            let record = self.get(id).await?;
            if record.state.is_completed() {
                return Ok(record);
            }
            tokio::select! {
                _ = notified => {}
                _ = tokio::time::sleep(poll_interval) => {}
            }
        }
    }
}
