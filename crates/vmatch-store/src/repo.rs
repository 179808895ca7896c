//! Typed repository for processing request records.

use async_trait::async_trait;
use chrono::Utc;
use serde_json::json;
use tracing::{info, warn};

use vmatch_models::{ProcessingRequest, ProcessingResult, RequestId, RequestStatus};

use crate::client::RestClient;
use crate::error::{StoreError, StoreResult};
use crate::retry::with_retry;

/// Table holding one row per analysis job.
const REQUESTS_TABLE: &str = "processing_requests";

/// Persistence seam used by the pipeline.
///
/// The pipeline writes a record at exactly three points: status to
/// `processing` before stage 1, then exactly one of `completed` (with the
/// result payload) or `failed` (with an error message). Updates against a
/// record deleted mid-run must be a soft no-op, never an error.
#[async_trait]
pub trait RequestStore: Send + Sync {
    /// Fetch a record by ID.
    async fn fetch(&self, id: &RequestId) -> StoreResult<Option<ProcessingRequest>>;

    /// Transition the record to `processing`.
    async fn mark_processing(&self, id: &RequestId) -> StoreResult<()>;

    /// Attach the final result and transition to `completed`.
    async fn complete(&self, id: &RequestId, result: &ProcessingResult) -> StoreResult<()>;

    /// Record the failure message and transition to `failed`.
    async fn fail(&self, id: &RequestId, error: &str) -> StoreResult<()>;
}

/// PostgREST-backed repository for request records.
#[derive(Clone)]
pub struct RequestRepository {
    client: RestClient,
}

impl RequestRepository {
    /// Create a new repository.
    pub fn new(client: RestClient) -> Self {
        Self { client }
    }

    /// Create from environment variables.
    pub fn from_env() -> StoreResult<Self> {
        Ok(Self::new(RestClient::from_env()?))
    }

    /// Apply a partial update, tolerating a concurrently deleted record.
    async fn patch(&self, operation: &str, id: &RequestId, body: serde_json::Value) -> StoreResult<()> {
        let retry = self.client.config().retry.clone();
        let rows = with_retry(&retry, operation, || async {
            self.client
                .update_by_id(REQUESTS_TABLE, id.as_str(), &body)
                .await
        })
        .await?;

        if rows == 0 {
            warn!(request_id = %id, operation, "Request record missing, update skipped");
        }
        Ok(())
    }
}

#[async_trait]
impl RequestStore for RequestRepository {
    async fn fetch(&self, id: &RequestId) -> StoreResult<Option<ProcessingRequest>> {
        let retry = self.client.config().retry.clone();
        let row = with_retry(&retry, "fetch_request", || async {
            self.client.select_by_id(REQUESTS_TABLE, id.as_str()).await
        })
        .await?;

        match row {
            Some(value) => {
                let record: ProcessingRequest = serde_json::from_value(value)
                    .map_err(|e| StoreError::invalid_response(format!("bad request row: {}", e)))?;
                Ok(Some(record))
            }
            None => Ok(None),
        }
    }

    async fn mark_processing(&self, id: &RequestId) -> StoreResult<()> {
        self.patch(
            "mark_processing",
            id,
            json!({
                "status": RequestStatus::Processing.as_str(),
                "updated_at": Utc::now().to_rfc3339(),
            }),
        )
        .await
    }

    async fn complete(&self, id: &RequestId, result: &ProcessingResult) -> StoreResult<()> {
        let now = Utc::now().to_rfc3339();
        self.patch(
            "complete_request",
            id,
            json!({
                "status": RequestStatus::Completed.as_str(),
                "result": result,
                "completed_at": now,
                "updated_at": now,
            }),
        )
        .await?;
        info!(request_id = %id, "Request marked completed");
        Ok(())
    }

    async fn fail(&self, id: &RequestId, error: &str) -> StoreResult<()> {
        self.patch(
            "fail_request",
            id,
            json!({
                "status": RequestStatus::Failed.as_str(),
                "error_message": error,
                "updated_at": Utc::now().to_rfc3339(),
            }),
        )
        .await?;
        info!(request_id = %id, error, "Request marked failed");
        Ok(())
    }
}
