//! Five-stage video analysis and music matching pipeline.
//!
//! This crate provides:
//! - The per-stage failure policy machine (halting / self-healing / degrading)
//! - Deterministic synthesis seeded only by request ID + video reference
//! - Scene-model integration with parse-or-degrade response handling
//! - Music matching against a live catalog with an offline fallback
//! - The run orchestrator persisting processing/completed/failed states

pub mod config;
pub mod error;
pub mod gemini;
pub mod hash;
pub mod logging;
pub mod runner;
pub mod stage;
pub mod stages;

pub use config::PipelineConfig;
pub use error::{PipelineError, PipelineResult};
pub use gemini::{SceneAnalysis, SceneModelClient, SceneModelConfig, SceneModelOutput};
pub use logging::RunLogger;
pub use runner::{Pipeline, RunRequest, RunSummary};
pub use stage::{drive_stages, PipelineStage, StagePolicy};
