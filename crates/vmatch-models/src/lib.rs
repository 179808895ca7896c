//! Shared data models for the Vibematch backend.
//!
//! This crate provides Serde-serializable types for:
//! - Processing requests and their lifecycle status
//! - The pipeline state accumulator and per-stage partial updates
//! - Music recommendations and the assembled processing result
//! - Music year-range filtering

pub mod recommendation;
pub mod request;
pub mod state;

// Re-export common types
pub use recommendation::MusicRecommendation;
pub use request::{ProcessingRequest, ProcessingResult, RequestId, RequestStatus};
pub use state::{ProcessingState, StateUpdate, YearRange, MIN_MUSIC_YEAR};
