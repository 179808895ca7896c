//! Application state.

use std::sync::Arc;

use vmatch_pipeline::Pipeline;
use vmatch_store::{RequestRepository, RequestStore};

use crate::config::ApiConfig;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub config: ApiConfig,
    pub store: Arc<dyn RequestStore>,
    pub pipeline: Arc<Pipeline>,
}

impl AppState {
    /// Create new application state from the environment.
    pub async fn new(config: ApiConfig) -> Result<Self, Box<dyn std::error::Error>> {
        let store: Arc<dyn RequestStore> = Arc::new(RequestRepository::from_env()?);
        let pipeline = Arc::new(Pipeline::from_env(Arc::clone(&store))?);

        Ok(Self {
            config,
            store,
            pipeline,
        })
    }

    /// State over an explicit store and pipeline (used by tests).
    pub fn with_parts(config: ApiConfig, store: Arc<dyn RequestStore>, pipeline: Arc<Pipeline>) -> Self {
        Self {
            config,
            store,
            pipeline,
        }
    }
}
