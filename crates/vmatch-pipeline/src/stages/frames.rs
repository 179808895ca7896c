//! Frame reference generator.

use async_trait::async_trait;
use tracing::info;

use vmatch_models::{ProcessingState, StateUpdate};

use crate::error::PipelineResult;
use crate::hash::Seed;
use crate::stage::{PipelineStage, StagePolicy};

/// Fabricates 5-7 synthetic frame references for a video.
///
/// No external calls. The timestamp suffix is captured once by the
/// orchestrator at run start and passed in explicitly, keeping the frame
/// names unique per run without the stage reading the clock.
pub struct FrameStage {
    pub epoch_ms: i64,
}

#[async_trait]
impl PipelineStage for FrameStage {
    fn name(&self) -> &'static str {
        "extract_frames"
    }

    fn policy(&self) -> StagePolicy {
        StagePolicy::Halting
    }

    fn failure_prefix(&self) -> &'static str {
        "Frame extraction failed"
    }

    async fn run(&self, state: &ProcessingState) -> PipelineResult<StateUpdate> {
        let seed = Seed::derive(state.request_id.as_str(), &state.video_url);
        let frames = generate_frames(state.request_id.as_str(), seed, self.epoch_ms);

        info!(
            request_id = %state.request_id,
            count = frames.len(),
            "Extracted frame references"
        );

        Ok(StateUpdate {
            extracted_frames: Some(frames),
            ..Default::default()
        })
    }
}

/// Generate 5-7 unique frame names from the seed and captured timestamp.
pub fn generate_frames(request_id: &str, seed: Seed, epoch_ms: i64) -> Vec<String> {
    let count = 5 + (seed.combined() % 3) as usize;

    (1..=count)
        .map(|i| format!("{}_frame_{:03}_{}.jpg", request_id, i, epoch_ms + i as i64))
        .collect()
}
