//! Ambient sound tagging stage.

use async_trait::async_trait;
use tracing::info;

use vmatch_models::{ProcessingState, StateUpdate};

use crate::error::PipelineResult;
use crate::hash::Seed;
use crate::stage::{PipelineStage, StagePolicy};
use crate::stages::ContentKind;

/// Fixed 8-group ambient vocabulary.
const TAG_GROUPS: [&[&str]; 8] = [
    &["Music", "Instruments", "Melody", "Rhythm"],
    &["Nature", "Birds", "Wind", "Water", "Outdoor"],
    &["Urban", "Traffic", "City", "Voices", "Machinery"],
    &["Indoor", "Conversation", "Footsteps", "Ambient", "Room tone"],
    &["Electronic", "Synthesizer", "Digital", "Technology"],
    &["Laughter", "Celebration", "Applause", "Joy"],
    &["Peaceful", "Calm", "Meditation", "Silence"],
    &["Energetic", "Movement", "Activity", "Dynamic"],
];

const MUSIC_GROUP: usize = 0;
const NATURE_GROUP: usize = 1;
const URBAN_GROUP: usize = 2;
const ELECTRONIC_GROUP: usize = 4;

/// Produces 3-5 deduplicated ambient tags from the fixed vocabulary.
///
/// The primary group follows the video's content bucket so ambient tags
/// agree with the transcription; general content falls back to pure hash
/// selection. A second hash contributes one cross-group tag, and the
/// final set size is itself hash-derived. Unlike transcription, internal
/// errors here halt the pipeline.
pub struct AmbientStage;

#[async_trait]
impl PipelineStage for AmbientStage {
    fn name(&self) -> &'static str {
        "tag_ambient"
    }

    fn policy(&self) -> StagePolicy {
        StagePolicy::Halting
    }

    fn failure_prefix(&self) -> &'static str {
        "Ambient sound tagging failed"
    }

    async fn run(&self, state: &ProcessingState) -> PipelineResult<StateUpdate> {
        let seed = Seed::derive(state.request_id.as_str(), &state.video_url);
        let tags = derive_tags(seed, ContentKind::detect(&state.video_url));

        info!(
            request_id = %state.request_id,
            tags = %tags.join(", "),
            "Detected ambient tags"
        );

        Ok(StateUpdate {
            ambient_tags: Some(tags),
            ..Default::default()
        })
    }
}

/// Select 3-5 unique tags for the given seed and content bucket.
pub fn derive_tags(seed: Seed, kind: ContentKind) -> Vec<String> {
    let combined = seed.combined();

    let primary = match kind {
        ContentKind::Music => MUSIC_GROUP,
        ContentKind::Nature => NATURE_GROUP,
        ContentKind::Urban => URBAN_GROUP,
        ContentKind::Demo => ELECTRONIC_GROUP,
        ContentKind::General => (combined % TAG_GROUPS.len() as u64) as usize,
    };

    let mut tags: Vec<String> = TAG_GROUPS[primary].iter().map(|t| t.to_string()).collect();

    // One cross-group tag for uniqueness.
    let secondary = (combined.wrapping_mul(7) % TAG_GROUPS.len() as u64) as usize;
    if secondary != primary {
        tags.push(TAG_GROUPS[secondary][0].to_string());
    }

    let mut unique = Vec::new();
    for tag in tags {
        if !unique.contains(&tag) {
            unique.push(tag);
        }
    }

    unique.truncate(3 + (combined % 3) as usize);
    unique
}

/// Full tag vocabulary, for membership checks in tests.
pub fn vocabulary() -> Vec<&'static str> {
    TAG_GROUPS.iter().flat_map(|g| g.iter().copied()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn nature_seed() -> Seed {
        Seed::derive("abc123xyz9", "https://cdn.example/nature_walk.mp4")
    }

    #[test]
    fn test_tags_deterministic() {
        let a = derive_tags(nature_seed(), ContentKind::Nature);
        let b = derive_tags(nature_seed(), ContentKind::Nature);
        assert_eq!(a, b);
    }

    #[test]
    fn test_tag_set_bounds() {
        for (id, url) in [
            ("abc123xyz9", "https://cdn.example/nature_walk.mp4"),
            ("0000aaaa", "https://cdn.example/city_tour.mp4"),
            ("deadbeef01", "https://videos.example/road_trip.mov"),
            ("f", "x"),
        ] {
            let tags = derive_tags(Seed::derive(id, url), ContentKind::detect(url));
            assert!(
                (3..=5).contains(&tags.len()),
                "tag count out of bounds for {}: {:?}",
                id,
                tags
            );
            let vocab = vocabulary();
            for tag in &tags {
                assert!(vocab.contains(&tag.as_str()), "unknown tag {}", tag);
            }
            let mut deduped = tags.clone();
            deduped.dedup();
            assert_eq!(deduped, tags);
        }
    }

    #[test]
    fn test_nature_video_gets_nature_group() {
        // combined() = 52808 -> size 3 + 52808 % 3 = 5, all from the nature group.
        let tags = derive_tags(nature_seed(), ContentKind::Nature);
        assert_eq!(tags, vec!["Nature", "Birds", "Wind", "Water", "Outdoor"]);
    }

    #[test]
    fn test_general_content_uses_hash_group() {
        let seed = Seed::derive("abc123xyz9", "https://cdn.example/holiday.mp4");
        let tags = derive_tags(seed, ContentKind::General);
        let primary = (seed.combined() % 8) as usize;
        assert_eq!(tags[0], TAG_GROUPS[primary][0]);
    }
}
