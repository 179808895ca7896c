//! Pipeline configuration.
//!
//! All external collaborators are feature-detected by credential presence
//! and carried explicitly; the pipeline holds no ambient global state.

use vmatch_catalog::CatalogConfig;

use crate::gemini::SceneModelConfig;

/// Pipeline configuration.
#[derive(Debug, Clone, Default)]
pub struct PipelineConfig {
    /// Speech-model credential (pluggable seam, `sk-` prefix expected)
    pub transcription_api_key: Option<String>,
    /// Scene-model configuration, when a usable key is present
    pub scene_model: Option<SceneModelConfig>,
    /// Music catalog configuration, when credentials are present
    pub catalog: Option<CatalogConfig>,
}

impl PipelineConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        Self {
            transcription_api_key: std::env::var("OPENAI_API_KEY")
                .ok()
                .filter(|s| !s.is_empty()),
            scene_model: SceneModelConfig::from_env(),
            catalog: CatalogConfig::from_env(),
        }
    }

    /// Config with no external collaborators; every stage synthesizes.
    pub fn offline() -> Self {
        Self::default()
    }
}
