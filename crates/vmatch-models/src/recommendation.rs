//! Music recommendation model.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// One candidate track produced by the music matching stage.
///
/// `energy_level`, `valence`, and `confidence_score` are always populated
/// in [0, 1], synthesized when no real audio-feature source is available.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct MusicRecommendation {
    pub title: String,

    /// Display artist; multiple artist names joined with ", ".
    pub artist: String,

    pub genre: String,

    pub mood: String,

    pub energy_level: f64,

    pub valence: f64,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub preview_url: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub spotify_id: Option<String>,

    pub confidence_score: f64,
}

impl MusicRecommendation {
    /// True when all synthesized scores lie in [0, 1].
    pub fn scores_in_bounds(&self) -> bool {
        (0.0..=1.0).contains(&self.energy_level)
            && (0.0..=1.0).contains(&self.valence)
            && (0.0..=1.0).contains(&self.confidence_score)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scores_in_bounds() {
        let rec = MusicRecommendation {
            title: "Upbeat Journey".to_string(),
            artist: "Dynamic Ensemble".to_string(),
            genre: "Electronic Pop".to_string(),
            mood: "Energetic".to_string(),
            energy_level: 0.85,
            valence: 0.9,
            preview_url: None,
            spotify_id: None,
            confidence_score: 0.88,
        };
        assert!(rec.scores_in_bounds());

        let bad = MusicRecommendation {
            confidence_score: 1.2,
            ..rec
        };
        assert!(!bad.scores_in_bounds());
    }

    #[test]
    fn test_optional_fields_omitted() {
        let rec = MusicRecommendation {
            title: "Serene Moments".to_string(),
            artist: "Ambient Collective".to_string(),
            genre: "Ambient".to_string(),
            mood: "Peaceful".to_string(),
            energy_level: 0.2,
            valence: 0.7,
            preview_url: None,
            spotify_id: None,
            confidence_score: 0.92,
        };
        let json = serde_json::to_string(&rec).unwrap();
        assert!(!json.contains("preview_url"));
        assert!(!json.contains("spotify_id"));
    }
}
