//! In-memory request store for tests and credential-less local runs.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;
use tracing::warn;

use vmatch_models::{ProcessingRequest, ProcessingResult, RequestId, RequestStatus};

use crate::error::StoreResult;
use crate::repo::RequestStore;

/// Map-backed [`RequestStore`] with the same missing-record semantics as
/// the REST repository: updates against an absent record are a warned no-op.
#[derive(Default)]
pub struct MemoryRequestStore {
    records: RwLock<HashMap<String, ProcessingRequest>>,
}

impl MemoryRequestStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a record, as the upload surface would.
    pub async fn insert(&self, record: ProcessingRequest) {
        let mut records = self.records.write().await;
        records.insert(record.id.as_str().to_string(), record);
    }

    /// Remove a record, as a user-initiated deletion would.
    pub async fn remove(&self, id: &RequestId) {
        let mut records = self.records.write().await;
        records.remove(id.as_str());
    }

    async fn update<F>(&self, id: &RequestId, operation: &str, f: F)
    where
        F: FnOnce(&mut ProcessingRequest),
    {
        let mut records = self.records.write().await;
        match records.get_mut(id.as_str()) {
            Some(record) => {
                f(record);
                record.updated_at = Utc::now();
            }
            None => {
                warn!(request_id = %id, operation, "Request record missing, update skipped");
            }
        }
    }
}

#[async_trait]
impl RequestStore for MemoryRequestStore {
    async fn fetch(&self, id: &RequestId) -> StoreResult<Option<ProcessingRequest>> {
        let records = self.records.read().await;
        Ok(records.get(id.as_str()).cloned())
    }

    async fn mark_processing(&self, id: &RequestId) -> StoreResult<()> {
        self.update(id, "mark_processing", |record| {
            record.status = RequestStatus::Processing;
        })
        .await;
        Ok(())
    }

    async fn complete(&self, id: &RequestId, result: &ProcessingResult) -> StoreResult<()> {
        let result = result.clone();
        self.update(id, "complete_request", move |record| {
            record.status = RequestStatus::Completed;
            record.result = Some(result);
            record.completed_at = Some(Utc::now());
        })
        .await;
        Ok(())
    }

    async fn fail(&self, id: &RequestId, error: &str) -> StoreResult<()> {
        let error = error.to_string();
        self.update(id, "fail_request", move |record| {
            record.status = RequestStatus::Failed;
            record.error_message = Some(error);
        })
        .await;
        Ok(())
    }
}
