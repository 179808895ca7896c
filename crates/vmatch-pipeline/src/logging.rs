//! Structured run logging utilities.

use tracing::{error, info, warn};
use vmatch_models::RequestId;

/// Logger carrying the request context through one pipeline run.
#[derive(Debug, Clone)]
pub struct RunLogger {
    request_id: String,
}

impl RunLogger {
    pub fn new(request_id: &RequestId) -> Self {
        Self {
            request_id: request_id.to_string(),
        }
    }

    /// Log the start of a run.
    pub fn start(&self, video_url: &str) {
        info!(
            request_id = %self.request_id,
            video_url,
            "Starting video processing"
        );
    }

    /// Log a stage boundary or progress message.
    pub fn stage(&self, stage: &str, message: &str) {
        info!(
            request_id = %self.request_id,
            stage,
            "{}", message
        );
    }

    /// Log a recoverable problem inside a stage.
    pub fn warning(&self, stage: &str, message: &str) {
        warn!(
            request_id = %self.request_id,
            stage,
            "{}", message
        );
    }

    /// Log a fatal stage error.
    pub fn error(&self, stage: &str, message: &str) {
        error!(
            request_id = %self.request_id,
            stage,
            "{}", message
        );
    }

    /// Log run completion.
    pub fn completion(&self, duration_secs: f64, recommendations: usize) {
        info!(
            request_id = %self.request_id,
            duration_secs,
            recommendations,
            "Processing completed"
        );
    }
}
