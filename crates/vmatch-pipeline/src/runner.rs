//! Pipeline run orchestration.
//!
//! One run is a strictly sequential chain over the five stages, isolated
//! from other runs. The backing record is written at exactly three points:
//! `processing` before stage 1, then exactly one of `completed` or
//! `failed`. A failure is recorded durably before the caller is signaled.

use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use tracing::error;

use vmatch_catalog::CatalogClient;
use vmatch_models::{ProcessingResult, ProcessingState, RequestId};
use vmatch_store::RequestStore;

use crate::config::PipelineConfig;
use crate::error::PipelineResult;
use crate::gemini::SceneModelClient;
use crate::logging::RunLogger;
use crate::stage::{drive_stages, PipelineStage};
use crate::stages::{AmbientStage, FrameStage, MusicStage, SceneStage, TranscriptionStage};

/// One inbound processing trigger.
#[derive(Debug, Clone)]
pub struct RunRequest {
    pub request_id: RequestId,
    pub video_url: String,
    pub user_description: Option<String>,
    pub music_year_start: Option<i32>,
    pub music_year_end: Option<i32>,
}

impl RunRequest {
    pub fn new(request_id: RequestId, video_url: impl Into<String>) -> Self {
        Self {
            request_id,
            video_url: video_url.into(),
            user_description: None,
            music_year_start: None,
            music_year_end: None,
        }
    }
}

/// Outcome of a successful run, returned to the trigger caller.
#[derive(Debug, Clone)]
pub struct RunSummary {
    pub request_id: RequestId,
    pub processing_duration: f64,
    pub recommendations_count: usize,
}

/// Five-stage pipeline bound to a record store and optional AI collaborators.
pub struct Pipeline {
    store: Arc<dyn RequestStore>,
    transcription_api_key: Option<String>,
    scene_model: Option<SceneModelClient>,
    catalog: Option<CatalogClient>,
}

impl Pipeline {
    /// Create a pipeline from explicit configuration.
    pub fn new(config: PipelineConfig, store: Arc<dyn RequestStore>) -> PipelineResult<Self> {
        let scene_model = config.scene_model.map(SceneModelClient::new).transpose()?;
        let catalog = match config.catalog {
            Some(catalog_config) => Some(CatalogClient::new(catalog_config)?),
            None => None,
        };

        Ok(Self {
            store,
            transcription_api_key: config.transcription_api_key,
            scene_model,
            catalog,
        })
    }

    /// Create from environment variables.
    pub fn from_env(store: Arc<dyn RequestStore>) -> PipelineResult<Self> {
        Self::new(PipelineConfig::from_env(), store)
    }

    fn build_stages(&self, epoch_ms: i64) -> Vec<Box<dyn PipelineStage>> {
        vec![
            Box::new(FrameStage { epoch_ms }),
            Box::new(TranscriptionStage {
                api_key: self.transcription_api_key.clone(),
            }),
            Box::new(AmbientStage),
            Box::new(SceneStage {
                model: self.scene_model.clone(),
            }),
            Box::new(MusicStage {
                catalog: self.catalog.clone(),
            }),
        ]
    }

    /// Execute one run to completion or failure.
    pub async fn run(&self, request: RunRequest) -> PipelineResult<RunSummary> {
        // The only clock read feeding synthesis: frame-name suffixes.
        let epoch_ms = Utc::now().timestamp_millis();
        self.run_with_stages(request, self.build_stages(epoch_ms)).await
    }

    async fn run_with_stages(
        &self,
        request: RunRequest,
        stages: Vec<Box<dyn PipelineStage>>,
    ) -> PipelineResult<RunSummary> {
        let started = Instant::now();
        let logger = RunLogger::new(&request.request_id);
        logger.start(&request.video_url);

        let outcome = self.execute(&request, &stages, &logger, started).await;

        match outcome {
            Ok(summary) => Ok(summary),
            Err(e) => {
                // Record the failure durably, then signal the caller.
                if let Err(store_err) = self.store.fail(&request.request_id, &e.to_string()).await {
                    error!(
                        request_id = %request.request_id,
                        "Failed to record failure state: {}",
                        store_err
                    );
                }
                Err(e)
            }
        }
    }

    async fn execute(
        &self,
        request: &RunRequest,
        stages: &[Box<dyn PipelineStage>],
        logger: &RunLogger,
        started: Instant,
    ) -> PipelineResult<RunSummary> {
        self.store.mark_processing(&request.request_id).await?;

        let mut state = ProcessingState::new(request.request_id.clone(), request.video_url.clone());
        state.user_description = request.user_description.clone();
        state.music_year_start = request.music_year_start;
        state.music_year_end = request.music_year_end;

        drive_stages(&mut state, stages, logger).await?;

        let processing_duration = started.elapsed().as_secs_f64();
        let result = assemble_result(&state, processing_duration);
        let recommendations_count = result.recommendations.len();

        self.store.complete(&request.request_id, &result).await?;
        logger.completion(processing_duration, recommendations_count);

        Ok(RunSummary {
            request_id: request.request_id.clone(),
            processing_duration,
            recommendations_count,
        })
    }
}

/// Assemble the result payload from a fully processed state.
fn assemble_result(state: &ProcessingState, processing_duration: f64) -> ProcessingResult {
    ProcessingResult {
        extracted_frames: state.extracted_frames.clone(),
        scene_description: state.scene_description.clone(),
        scene_mood: state.scene_mood.clone(),
        visual_elements: state.visual_elements.clone(),
        transcription: state.transcription.clone(),
        ambient_tags: state.ambient_tags.clone(),
        recommendations: state.recommendations.clone(),
        reasoning: state.reasoning.clone(),
        processing_duration,
        model_versions: state.model_versions.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use vmatch_models::{ProcessingRequest, RequestStatus, StateUpdate};
    use vmatch_store::MemoryRequestStore;

    use crate::error::PipelineError;
    use crate::stage::StagePolicy;

    struct BrokenFrameStage;

    #[async_trait]
    impl PipelineStage for BrokenFrameStage {
        fn name(&self) -> &'static str {
            "extract_frames"
        }

        fn policy(&self) -> StagePolicy {
            StagePolicy::Halting
        }

        fn failure_prefix(&self) -> &'static str {
            "Frame extraction failed"
        }

        async fn run(&self, _state: &ProcessingState) -> PipelineResult<StateUpdate> {
            Err(PipelineError::config_error("synthetic frame error"))
        }
    }

    async fn seeded_store(id: &str, url: &str) -> Arc<MemoryRequestStore> {
        let store = Arc::new(MemoryRequestStore::new());
        store
            .insert(ProcessingRequest::new(RequestId::from_string(id), url))
            .await;
        store
    }

    #[tokio::test]
    async fn test_frame_failure_fails_the_run_with_no_result() {
        let store = seeded_store("abc123xyz9", "https://cdn.example/nature_walk.mp4").await;
        let pipeline = Pipeline::new(
            crate::config::PipelineConfig::offline(),
            Arc::clone(&store) as Arc<dyn RequestStore>,
        )
        .unwrap();

        let request = RunRequest::new(
            RequestId::from_string("abc123xyz9"),
            "https://cdn.example/nature_walk.mp4",
        );

        let err = pipeline
            .run_with_stages(request.clone(), vec![Box::new(BrokenFrameStage)])
            .await
            .unwrap_err();
        assert_eq!(err.stage(), Some("extract_frames"));

        let record = store.fetch(&request.request_id).await.unwrap().unwrap();
        assert_eq!(record.status, RequestStatus::Failed);
        let message = record.error_message.unwrap();
        assert!(message.starts_with("Frame extraction failed"));
        assert!(record.result.is_none());
    }

    #[tokio::test]
    async fn test_run_against_deleted_record_still_completes() {
        // A record deleted before the run starts: status writes are soft
        // no-ops and the caller still gets a summary.
        let store = Arc::new(MemoryRequestStore::new());
        let pipeline = Pipeline::new(
            crate::config::PipelineConfig::offline(),
            Arc::clone(&store) as Arc<dyn RequestStore>,
        )
        .unwrap();

        let request = RunRequest::new(
            RequestId::from_string("abc123xyz9"),
            "https://cdn.example/nature_walk.mp4",
        );
        let summary = pipeline.run(request.clone()).await.unwrap();
        assert_eq!(summary.recommendations_count, 3);
        assert!(store.fetch(&request.request_id).await.unwrap().is_none());
    }
}
