//! Pipeline error types.

use thiserror::Error;

pub type PipelineResult<T> = Result<T, PipelineError>;

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("{message}")]
    StageFailed { stage: &'static str, message: String },

    #[error("Scene model call failed: {0}")]
    SceneModel(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Catalog error: {0}")]
    Catalog(#[from] vmatch_catalog::CatalogError),

    #[error("Store error: {0}")]
    Store(#[from] vmatch_store::StoreError),
}

impl PipelineError {
    pub fn stage_failed(stage: &'static str, message: impl Into<String>) -> Self {
        Self::StageFailed {
            stage,
            message: message.into(),
        }
    }

    pub fn scene_model(msg: impl Into<String>) -> Self {
        Self::SceneModel(msg.into())
    }

    pub fn config_error(msg: impl Into<String>) -> Self {
        Self::ConfigError(msg.into())
    }

    /// Name of the stage that halted the run, when applicable.
    pub fn stage(&self) -> Option<&'static str> {
        match self {
            Self::StageFailed { stage, .. } => Some(stage),
            _ => None,
        }
    }
}
