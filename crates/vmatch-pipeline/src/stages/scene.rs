//! Scene analysis stage.
//!
//! Uses the external scene model when configured, falling back to
//! deterministic local synthesis on any model failure. This stage never
//! propagates a hard failure to the pipeline.

use async_trait::async_trait;
use tracing::{info, warn};

use vmatch_models::{ProcessingState, StateUpdate};

use crate::error::PipelineResult;
use crate::gemini::{build_prompt, SceneAnalysis, SceneModelClient};
use crate::hash::{char_sum, id_hash};
use crate::stage::{PipelineStage, StagePolicy};

/// Mood vocabulary. The first two entries are the energetic subset, the
/// next two the calm subset; the bias function indexes into those ranges.
pub const MOODS: [&str; 8] = [
    "Energetic and Vibrant",
    "Playful and Lighthearted",
    "Calm and Contemplative",
    "Warm and Inviting",
    "Dramatic and Intense",
    "Mysterious and Intriguing",
    "Cool and Professional",
    "Nostalgic and Reflective",
];

/// Energetic mood subset, selected when ambient tags mention music/rhythm.
pub fn energetic_moods() -> &'static [&'static str] {
    &MOODS[0..2]
}

/// Calm mood subset, selected when ambient tags mention nature/peace.
pub fn calm_moods() -> &'static [&'static str] {
    &MOODS[2..4]
}

const BASE_ELEMENTS: [&str; 15] = [
    "Color Palette",
    "Lighting",
    "Movement",
    "Composition",
    "Depth",
    "Texture",
    "Contrast",
    "Perspective",
    "Focus",
    "Atmosphere",
    "Characters",
    "Objects",
    "Environment",
    "Transitions",
    "Framing",
];

const CONTEXT_ELEMENTS: [&str; 12] = [
    "Dynamic Motion",
    "Static Beauty",
    "Rhythmic Patterns",
    "Organic Flow",
    "Geometric Shapes",
    "Natural Forms",
    "Urban Elements",
    "Rural Scenery",
    "Indoor Ambiance",
    "Outdoor Expanse",
    "Close-ups",
    "Wide Shots",
];

/// Produces a scene description, mood label, and 4-6 visual elements.
pub struct SceneStage {
    pub model: Option<SceneModelClient>,
}

#[async_trait]
impl PipelineStage for SceneStage {
    fn name(&self) -> &'static str {
        "analyze_scene"
    }

    fn policy(&self) -> StagePolicy {
        StagePolicy::Degrading
    }

    fn failure_prefix(&self) -> &'static str {
        "Scene analysis failed"
    }

    async fn run(&self, state: &ProcessingState) -> PipelineResult<StateUpdate> {
        if let Some(model) = &self.model {
            let frame_count = effective_frame_count(state);
            let prompt = build_prompt(
                frame_count,
                state.transcription.as_deref().unwrap_or("audio analysis pending"),
                &join_or(&state.ambient_tags, ", ", "general audio"),
                state.request_id.tail(8),
            );

            match model.analyze(&prompt).await {
                Ok(output) => {
                    let analysis = output.into_analysis();
                    info!(request_id = %state.request_id, mood = %analysis.scene_mood, "Scene model analysis completed");
                    return Ok(analysis_update(analysis));
                }
                Err(e) => {
                    warn!(request_id = %state.request_id, "Scene model call failed, using local synthesis: {}", e);
                }
            }
        }

        let analysis = local_synthesis(state);
        info!(request_id = %state.request_id, mood = %analysis.scene_mood, "Scene synthesized locally");
        Ok(analysis_update(analysis))
    }
}

fn analysis_update(analysis: SceneAnalysis) -> StateUpdate {
    StateUpdate {
        scene_description: Some(analysis.scene_description),
        scene_mood: Some(analysis.scene_mood),
        visual_elements: Some(analysis.visual_elements),
        ..Default::default()
    }
}

fn effective_frame_count(state: &ProcessingState) -> usize {
    if state.extracted_frames.is_empty() {
        5
    } else {
        state.extracted_frames.len()
    }
}

fn join_or(items: &[String], separator: &str, fallback: &str) -> String {
    if items.is_empty() {
        fallback.to_string()
    } else {
        items.join(separator)
    }
}

/// Deterministic local synthesis seeded by the accumulated state.
pub fn local_synthesis(state: &ProcessingState) -> SceneAnalysis {
    let video_hash = id_hash(state.request_id.as_str());
    let url_sum = char_sum(&state.video_url);
    let frame_count = effective_frame_count(state);
    let ambient_context = join_or(&state.ambient_tags, " ", "general");
    let ambient_lower = ambient_context.to_lowercase();
    let transcription = state.transcription.as_deref().unwrap_or("");

    let variant = (video_hash % 3) as usize;
    let variant_hash = video_hash.wrapping_add(variant as u64);

    let scene_description = match variant {
        0 => format!(
            "Dynamic video content featuring {} elements with {} key visual sequences. The footage shows varied lighting and movement patterns with {} pacing throughout.",
            ambient_lower,
            frame_count,
            if transcription.contains("energy") { "high-energy" } else { "moderate" }
        ),
        1 => format!(
            "Cinematic sequence with {} distinct frames showcasing {} atmosphere. The visual narrative includes {} transitions and contextual depth.",
            frame_count,
            ambient_lower,
            if transcription.contains("calm") { "serene" } else { "dynamic" }
        ),
        _ => format!(
            "Rich visual content with {} characteristics across {} analyzed frames. The sequence demonstrates {} storytelling elements.",
            ambient_lower,
            frame_count,
            if transcription.contains("conversation") { "interpersonal" } else { "environmental" }
        ),
    };

    SceneAnalysis {
        scene_description,
        scene_mood: mood_for(variant_hash, &ambient_context),
        visual_elements: visual_elements_for(variant_hash, url_sum, frame_count),
    }
}

/// Mood label biased by ambient context.
///
/// Music/rhythm tags bias into the energetic subset, nature/peace tags
/// into the calm subset; otherwise the whole vocabulary is in play.
pub fn mood_for(hash: u64, ambient_context: &str) -> String {
    let idx = if ambient_context.contains("Music") || ambient_context.contains("Rhythm") {
        (hash % 2) as usize
    } else if ambient_context.contains("Nature") || ambient_context.contains("Peaceful") {
        2 + (hash % 2) as usize
    } else {
        (hash % MOODS.len() as u64) as usize
    };

    MOODS[idx].to_string()
}

/// 4-6 unique visual elements from the base and context pools.
pub fn visual_elements_for(video_hash: u64, url_sum: u64, frame_count: usize) -> Vec<String> {
    let combined = video_hash
        .wrapping_add(url_sum)
        .wrapping_add(frame_count as u64);

    let mut selected: Vec<String> = Vec::new();

    let mut push_unique = |pool: &[&str], start: u64| {
        let mut idx = (start % pool.len() as u64) as usize;
        while selected.iter().any(|s| s == pool[idx]) {
            idx = (idx + 1) % pool.len();
        }
        selected.push(pool[idx].to_string());
    };

    for i in 0..3u64 {
        push_unique(&BASE_ELEMENTS, combined + i * 7);
    }
    for i in 0..3u64 {
        push_unique(&CONTEXT_ELEMENTS, combined + i * 11);
    }

    selected.truncate(4 + (combined % 3) as usize);
    selected
}

#[cfg(test)]
mod tests {
    use super::*;
    use vmatch_models::RequestId;

    fn nature_state() -> ProcessingState {
        let mut state = ProcessingState::new(
            RequestId::from_string("abc123xyz9"),
            "https://cdn.example/nature_walk.mp4",
        );
        state.extracted_frames = (1..=7).map(|i| format!("f{}.jpg", i)).collect();
        state.transcription = Some("Nature documentary style narration.".to_string());
        state.ambient_tags = vec![
            "Nature".to_string(),
            "Birds".to_string(),
            "Wind".to_string(),
            "Water".to_string(),
            "Outdoor".to_string(),
        ];
        state
    }

    #[test]
    fn test_local_synthesis_deterministic() {
        let state = nature_state();
        let a = local_synthesis(&state);
        let b = local_synthesis(&state);
        assert_eq!(a.scene_description, b.scene_description);
        assert_eq!(a.scene_mood, b.scene_mood);
        assert_eq!(a.visual_elements, b.visual_elements);
    }

    #[test]
    fn test_nature_scenario_values() {
        let analysis = local_synthesis(&nature_state());
        // video_hash 49443 % 3 = 0 -> first template, calm mood index 3.
        assert!(analysis.scene_description.starts_with("Dynamic video content featuring nature"));
        assert_eq!(analysis.scene_mood, "Warm and Inviting");
        assert_eq!(
            analysis.visual_elements,
            vec!["Color Palette", "Perspective", "Framing", "Organic Flow"]
        );
    }

    #[test]
    fn test_mood_bias_music() {
        for hash in [0u64, 1, 17, 49443, 987654321] {
            let mood = mood_for(hash, "Music Instruments Rhythm");
            assert!(
                energetic_moods().contains(&mood.as_str()),
                "expected energetic mood, got {}",
                mood
            );
        }
    }

    #[test]
    fn test_mood_bias_nature() {
        for hash in [0u64, 1, 17, 49443, 987654321] {
            let mood = mood_for(hash, "Nature Birds Peaceful");
            assert!(
                calm_moods().contains(&mood.as_str()),
                "expected calm mood, got {}",
                mood
            );
        }
    }

    #[test]
    fn test_visual_element_bounds() {
        for (vh, us, fc) in [(1u64, 1u64, 5usize), (49443, 3365, 7), (12345, 999, 6)] {
            let elements = visual_elements_for(vh, us, fc);
            assert!(
                (4..=6).contains(&elements.len()),
                "element count out of bounds: {:?}",
                elements
            );
            let mut deduped = elements.clone();
            deduped.sort();
            deduped.dedup();
            assert_eq!(deduped.len(), elements.len());
        }
    }
}
