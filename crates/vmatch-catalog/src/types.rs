//! Wire types for the catalog API.

use serde::Deserialize;

/// Client-credentials token response.
#[derive(Debug, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    #[serde(default)]
    pub token_type: String,
    /// Token lifetime in seconds.
    #[serde(default = "default_expires_in")]
    pub expires_in: u64,
}

fn default_expires_in() -> u64 {
    3600
}

/// Track search response envelope.
#[derive(Debug, Deserialize)]
pub struct SearchResponse {
    pub tracks: Option<TracksPage>,
}

#[derive(Debug, Deserialize)]
pub struct TracksPage {
    #[serde(default)]
    pub items: Vec<Track>,
}

/// One track as returned by search.
#[derive(Debug, Clone, Deserialize)]
pub struct Track {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub artists: Vec<Artist>,
    #[serde(default)]
    pub popularity: u32,
    #[serde(default)]
    pub preview_url: Option<String>,
}

impl Track {
    /// Display artist string, multiple names joined with ", ".
    pub fn artist_names(&self) -> String {
        self.artists
            .iter()
            .map(|a| a.name.as_str())
            .collect::<Vec<_>>()
            .join(", ")
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Artist {
    pub name: String,
}

/// Audio features for one track.
#[derive(Debug, Clone, Deserialize)]
pub struct AudioFeatures {
    pub id: String,
    pub energy: f64,
    pub valence: f64,
}

/// Batched audio-features response; entries are null for unknown IDs.
#[derive(Debug, Deserialize)]
pub struct AudioFeaturesResponse {
    #[serde(default)]
    pub audio_features: Vec<Option<AudioFeatures>>,
}
