use async_trait::async_trait;
use pledge_api::PromiseStoreClient;
use pledge_types::{CompletePromise, CreatePromise, PromiseRecord};
use tracing::debug;

use super::PromiseStore;
use crate::StoreError;

/// [`PromiseStore`] backed by the external promise store over HTTP.
#[derive(Debug, Clone)]
pub struct RemotePromiseStore {
    client: PromiseStoreClient,
}

impl RemotePromiseStore {
    pub fn new(client: PromiseStoreClient) -> Self {
        Self { client }
    }

    pub fn client(&self) -> &PromiseStoreClient {
        &self.client
    }
}

#[async_trait]
impl PromiseStore for RemotePromiseStore {
    async fn create(&self, request: CreatePromise, idempotency_key: Option<&str>, strict: bool) -> Result<PromiseRecord, StoreError> {
        let id = request.id.clone();
        let record = self
            .client
            .create(&request, idempotency_key, strict)
            .await
            .map_err(|error| StoreError::from_api(&id, error))?;
        debug!(promise_id = %record.id, state = ?record.state, "promise created");
        Ok(record)
    }

    async fn complete(
        &self,
        id: &str,
        request: CompletePromise,
        idempotency_key: Option<&str>,
        strict: bool,
    ) -> Result<PromiseRecord, StoreError> {
        let record = self
            .client
            .complete(id, &request, idempotency_key, strict)
            .await
            .map_err(|error| StoreError::from_api(id, error))?;
        debug!(promise_id = %record.id, state = ?record.state, "promise completed");
        Ok(record)
    }

    async fn get(&self, id: &str) -> Result<PromiseRecord, StoreError> {
        self.client
            .get(id)
            .await
            .map_err(|error| StoreError::from_api(id, error))
    }
}
