//! Pipeline state accumulator and per-stage partial updates.

use std::collections::HashMap;

use chrono::{Datelike, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::recommendation::MusicRecommendation;
use crate::request::RequestId;

/// Earliest year accepted by the music year filter.
pub const MIN_MUSIC_YEAR: i32 = 1950;

/// Default year window applied when the user supplied none.
const DEFAULT_YEAR_START: i32 = 1980;
const DEFAULT_YEAR_END: i32 = 2024;

/// The single mutable accumulator threaded through all five stages.
///
/// Owned exclusively by one pipeline run; each stage reads the accumulated
/// fields and merges its own [`StateUpdate`] by field-overwrite. Once
/// `error` is set it is authoritative and halts further processing.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ProcessingState {
    /// Immutable, assigned at job start.
    pub request_id: RequestId,

    /// Immutable stored video reference.
    pub video_url: String,

    #[serde(default)]
    pub extracted_frames: Vec<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub transcription: Option<String>,

    #[serde(default)]
    pub ambient_tags: Vec<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub scene_description: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub scene_mood: Option<String>,

    #[serde(default)]
    pub visual_elements: Vec<String>,

    #[serde(default)]
    pub recommendations: Vec<MusicRecommendation>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub reasoning: Option<String>,

    #[serde(default)]
    pub model_versions: HashMap<String, String>,

    /// Optional free-text music preference from the user.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_description: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub music_year_start: Option<i32>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub music_year_end: Option<i32>,

    /// Fatal stage error; authoritative once set.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ProcessingState {
    /// Create a fresh state for one run.
    pub fn new(request_id: RequestId, video_url: impl Into<String>) -> Self {
        Self {
            request_id,
            video_url: video_url.into(),
            extracted_frames: Vec::new(),
            transcription: None,
            ambient_tags: Vec::new(),
            scene_description: None,
            scene_mood: None,
            visual_elements: Vec::new(),
            recommendations: Vec::new(),
            reasoning: None,
            model_versions: HashMap::new(),
            user_description: None,
            music_year_start: None,
            music_year_end: None,
            error: None,
        }
    }

    /// Merge a partial stage update, later fields overwriting earlier ones.
    pub fn apply(&mut self, update: StateUpdate) {
        if let Some(frames) = update.extracted_frames {
            self.extracted_frames = frames;
        }
        if let Some(transcription) = update.transcription {
            self.transcription = Some(transcription);
        }
        if let Some(tags) = update.ambient_tags {
            self.ambient_tags = tags;
        }
        if let Some(description) = update.scene_description {
            self.scene_description = Some(description);
        }
        if let Some(mood) = update.scene_mood {
            self.scene_mood = Some(mood);
        }
        if let Some(elements) = update.visual_elements {
            self.visual_elements = elements;
        }
        if let Some(recommendations) = update.recommendations {
            self.recommendations = recommendations;
        }
        if let Some(reasoning) = update.reasoning {
            self.reasoning = Some(reasoning);
        }
        if let Some(versions) = update.model_versions {
            self.model_versions = versions;
        }
        if let Some(error) = update.error {
            self.error = Some(error);
        }
    }

    /// Effective year window for catalog search, clamped to the valid range.
    pub fn year_range(&self) -> YearRange {
        YearRange::new(
            self.music_year_start.unwrap_or(DEFAULT_YEAR_START),
            self.music_year_end.unwrap_or(DEFAULT_YEAR_END),
        )
        .clamp(Utc::now().year())
    }
}

/// Partial update produced by one stage.
#[derive(Debug, Clone, Default)]
pub struct StateUpdate {
    pub extracted_frames: Option<Vec<String>>,
    pub transcription: Option<String>,
    pub ambient_tags: Option<Vec<String>>,
    pub scene_description: Option<String>,
    pub scene_mood: Option<String>,
    pub visual_elements: Option<Vec<String>>,
    pub recommendations: Option<Vec<MusicRecommendation>>,
    pub reasoning: Option<String>,
    pub model_versions: Option<HashMap<String, String>>,
    pub error: Option<String>,
}

impl StateUpdate {
    /// Update carrying only a fatal stage error.
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            error: Some(message.into()),
            ..Default::default()
        }
    }
}

/// Inclusive year window used to filter catalog searches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct YearRange {
    pub start: i32,
    pub end: i32,
}

impl YearRange {
    pub fn new(start: i32, end: i32) -> Self {
        Self { start, end }
    }

    /// Clamp to [`MIN_MUSIC_YEAR`, `current_year`], preserving start <= end.
    pub fn clamp(self, current_year: i32) -> Self {
        let start = self.start.clamp(MIN_MUSIC_YEAR, current_year);
        let end = self.end.clamp(start, current_year);
        Self { start, end }
    }
}
