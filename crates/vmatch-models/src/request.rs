//! Processing request records and lifecycle status.

use std::collections::HashMap;
use std::fmt;

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::recommendation::MusicRecommendation;

/// Unique identifier for a processing request.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(transparent)]
pub struct RequestId(pub String);

impl RequestId {
    /// Generate a new random request ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Create from an existing string.
    pub fn from_string(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    /// Get the inner string.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Short fragment of the ID used in synthesized text (last `n` chars).
    pub fn tail(&self, n: usize) -> &str {
        let mut start = self.0.len().saturating_sub(n);
        while start < self.0.len() && !self.0.is_char_boundary(start) {
            start += 1;
        }
        &self.0[start..]
    }
}

impl Default for RequestId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for RequestId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for RequestId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Lifecycle status of a processing request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "snake_case")]
pub enum RequestStatus {
    /// Created by the upload surface, not yet picked up
    #[default]
    Pending,
    /// Pipeline run in progress
    Processing,
    /// Pipeline finished, result attached
    Completed,
    /// Pipeline failed, error message attached
    Failed,
    /// Deleted/cancelled by the owning user
    Cancelled,
}

impl RequestStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RequestStatus::Pending => "pending",
            RequestStatus::Processing => "processing",
            RequestStatus::Completed => "completed",
            RequestStatus::Failed => "failed",
            RequestStatus::Cancelled => "cancelled",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            RequestStatus::Completed | RequestStatus::Failed | RequestStatus::Cancelled
        )
    }
}

impl fmt::Display for RequestStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Assembled output of a completed pipeline run.
///
/// Attached to the request record only on `completed`; failed runs carry
/// an error message and no result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ProcessingResult {
    #[serde(default)]
    pub extracted_frames: Vec<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub scene_description: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub scene_mood: Option<String>,

    #[serde(default)]
    pub visual_elements: Vec<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub transcription: Option<String>,

    #[serde(default)]
    pub ambient_tags: Vec<String>,

    #[serde(default)]
    pub recommendations: Vec<MusicRecommendation>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub reasoning: Option<String>,

    /// Wall-clock duration of the run in seconds.
    pub processing_duration: f64,

    /// Model/version labels per stage, as recorded by the run.
    #[serde(default)]
    pub model_versions: HashMap<String, String>,
}

/// A user's video analysis job as persisted in the record store.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ProcessingRequest {
    /// Unique request ID
    pub id: RequestId,

    /// Stored video reference
    pub video_url: String,

    /// Lifecycle status
    #[serde(default)]
    pub status: RequestStatus,

    /// Optional free-text music preference supplied at upload
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_description: Option<String>,

    /// Inclusive year-range filter for recommendations
    #[serde(skip_serializing_if = "Option::is_none")]
    pub music_year_start: Option<i32>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub music_year_end: Option<i32>,

    /// Creation timestamp
    pub created_at: DateTime<Utc>,

    /// Last update timestamp
    pub updated_at: DateTime<Utc>,

    /// Completion timestamp
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,

    /// Error message (if failed)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,

    /// Final result (if completed)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<ProcessingResult>,
}

impl ProcessingRequest {
    /// Create a new pending request record.
    pub fn new(id: RequestId, video_url: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id,
            video_url: video_url.into(),
            status: RequestStatus::Pending,
            user_description: None,
            music_year_start: None,
            music_year_end: None,
            created_at: now,
            updated_at: now,
            completed_at: None,
            error_message: None,
            result: None,
        }
    }

    /// Transition to processing.
    pub fn start(mut self) -> Self {
        self.status = RequestStatus::Processing;
        self.updated_at = Utc::now();
        self
    }

    /// Mark as completed with the final result.
    pub fn complete(mut self, result: ProcessingResult) -> Self {
        self.status = RequestStatus::Completed;
        self.result = Some(result);
        self.completed_at = Some(Utc::now());
        self.updated_at = Utc::now();
        self
    }

    /// Mark as failed.
    pub fn fail(mut self, error: impl Into<String>) -> Self {
        self.status = RequestStatus::Failed;
        self.error_message = Some(error.into());
        self.updated_at = Utc::now();
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_id_tail() {
        let id = RequestId::from_string("abc123xyz9");
        assert_eq!(id.tail(4), "xyz9");
        assert_eq!(id.tail(6), "23xyz9");
        assert_eq!(id.tail(32), "abc123xyz9");
    }

    #[test]
    fn test_status_transitions() {
        let req = ProcessingRequest::new(RequestId::new(), "https://cdn.example/clip.mp4");
        assert_eq!(req.status, RequestStatus::Pending);

        let started = req.start();
        assert_eq!(started.status, RequestStatus::Processing);
        assert!(!started.status.is_terminal());

        let failed = started.fail("boom");
        assert_eq!(failed.status, RequestStatus::Failed);
        assert!(failed.status.is_terminal());
        assert_eq!(failed.error_message.as_deref(), Some("boom"));
        assert!(failed.result.is_none());
    }

    #[test]
    fn test_result_round_trip() {
        let result = ProcessingResult {
            extracted_frames: vec!["a.jpg".into(), "b.jpg".into()],
            scene_description: Some("desc".into()),
            scene_mood: Some("Calm and Contemplative".into()),
            visual_elements: vec!["Lighting".into()],
            transcription: Some("words".into()),
            ambient_tags: vec!["Nature".into(), "Birds".into()],
            recommendations: vec![],
            reasoning: Some("because".into()),
            processing_duration: 1.25,
            model_versions: HashMap::from([("gemini".to_string(), "content-aware".to_string())]),
        };

        let json = serde_json::to_string(&result).unwrap();
        let back: ProcessingResult = serde_json::from_str(&json).unwrap();
        assert_eq!(result, back);
    }

    #[test]
    fn test_status_serde_snake_case() {
        assert_eq!(
            serde_json::to_string(&RequestStatus::Processing).unwrap(),
            "\"processing\""
        );
        let status: RequestStatus = serde_json::from_str("\"cancelled\"").unwrap();
        assert_eq!(status, RequestStatus::Cancelled);
    }
}
