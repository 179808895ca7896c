//! Stage abstraction and the per-stage failure policy machine.
//!
//! Each stage consumes the accumulated state and returns a partial update
//! merged by field-overwrite. Failure handling is declared per stage rather
//! than scattered through stage bodies:
//!
//! - `Halting`: a stage error becomes the state's error and stops the run.
//! - `SelfHealing`: a stage error is replaced by the stage's fallback
//!   update and never surfaces.
//! - `Degrading`: the stage falls back internally on external failures; an
//!   error escaping it means the fallback itself broke, which halts.

use async_trait::async_trait;

use vmatch_models::{ProcessingState, StateUpdate};

use crate::error::{PipelineError, PipelineResult};
use crate::logging::RunLogger;

/// Failure policy of one pipeline stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StagePolicy {
    /// Errors halt the run.
    Halting,
    /// Errors degrade to the stage's fallback update.
    SelfHealing,
    /// External failures fall back internally; escaping errors halt.
    Degrading,
}

/// One unit of the pipeline.
#[async_trait]
pub trait PipelineStage: Send + Sync {
    /// Stage name used in logs and error attribution.
    fn name(&self) -> &'static str;

    /// Failure policy applied by the driver.
    fn policy(&self) -> StagePolicy;

    /// Human-readable prefix for the state error when this stage halts.
    fn failure_prefix(&self) -> &'static str;

    /// Produce this stage's partial update from the accumulated state.
    async fn run(&self, state: &ProcessingState) -> PipelineResult<StateUpdate>;

    /// Fallback update for self-healing stages.
    fn heal(&self, state: &ProcessingState) -> Option<StateUpdate> {
        let _ = state;
        None
    }
}

/// Drive the stages strictly in order, applying each stage's policy.
///
/// Returns the stage error that halted the run, if any; the state's error
/// field is set to the same message before returning.
pub async fn drive_stages(
    state: &mut ProcessingState,
    stages: &[Box<dyn PipelineStage>],
    logger: &RunLogger,
) -> PipelineResult<()> {
    for stage in stages {
        logger.stage(stage.name(), "Stage started");

        match stage.run(state).await {
            Ok(update) => state.apply(update),
            Err(e) => match stage.policy() {
                StagePolicy::SelfHealing => {
                    logger.warning(stage.name(), &format!("Stage degraded to fallback: {}", e));
                    match stage.heal(state) {
                        Some(update) => state.apply(update),
                        None => {
                            state.apply(StateUpdate::error(format!(
                                "{}: {}",
                                stage.failure_prefix(),
                                e
                            )));
                        }
                    }
                }
                StagePolicy::Halting | StagePolicy::Degrading => {
                    state.apply(StateUpdate::error(format!(
                        "{}: {}",
                        stage.failure_prefix(),
                        e
                    )));
                }
            },
        }

        if let Some(message) = state.error.clone() {
            logger.error(stage.name(), &message);
            return Err(PipelineError::stage_failed(stage.name(), message));
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;
    use vmatch_models::RequestId;

    struct FailingStage;

    #[async_trait]
    impl PipelineStage for FailingStage {
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
            Err(PipelineError::config_error("synthetic"))
        }
    }

    struct TrackingStage {
        ran: Arc<AtomicBool>,
    }

    #[async_trait]
    impl PipelineStage for TrackingStage {
        fn name(&self) -> &'static str {
            "transcribe_voice"
        }

        fn policy(&self) -> StagePolicy {
            StagePolicy::SelfHealing
        }

        fn failure_prefix(&self) -> &'static str {
            "Transcription failed"
        }

        async fn run(&self, _state: &ProcessingState) -> PipelineResult<StateUpdate> {
            self.ran.store(true, Ordering::SeqCst);
            Ok(StateUpdate::default())
        }
    }

    struct HealingStage;

    #[async_trait]
    impl PipelineStage for HealingStage {
        fn name(&self) -> &'static str {
            "transcribe_voice"
        }

        fn policy(&self) -> StagePolicy {
            StagePolicy::SelfHealing
        }

        fn failure_prefix(&self) -> &'static str {
            "Transcription failed"
        }

        async fn run(&self, _state: &ProcessingState) -> PipelineResult<StateUpdate> {
            Err(PipelineError::config_error("synthesis exploded"))
        }

        fn heal(&self, _state: &ProcessingState) -> Option<StateUpdate> {
            Some(StateUpdate {
                transcription: Some("fallback text".to_string()),
                ..Default::default()
            })
        }
    }

    fn test_state() -> ProcessingState {
        ProcessingState::new(
            RequestId::from_string("abc123xyz9"),
            "https://cdn.example/nature_walk.mp4",
        )
    }

    #[tokio::test]
    async fn test_halting_stage_stops_the_run() {
        let ran = Arc::new(AtomicBool::new(false));
        let stages: Vec<Box<dyn PipelineStage>> = vec![
            Box::new(FailingStage),
            Box::new(TrackingStage { ran: ran.clone() }),
        ];

        let mut state = test_state();
        let logger = RunLogger::new(&state.request_id);
        let err = drive_stages(&mut state, &stages, &logger)
            .await
            .unwrap_err();

        assert_eq!(err.stage(), Some("extract_frames"));
        let message = state.error.expect("error must be recorded");
        assert!(message.starts_with("Frame extraction failed"));
        // Later stages never execute after a halting failure.
        assert!(!ran.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_self_healing_stage_never_fails_the_run() {
        let stages: Vec<Box<dyn PipelineStage>> = vec![Box::new(HealingStage)];

        let mut state = test_state();
        let logger = RunLogger::new(&state.request_id);
        drive_stages(&mut state, &stages, &logger).await.unwrap();

        assert!(state.error.is_none());
        assert_eq!(state.transcription.as_deref(), Some("fallback text"));
    }
}
