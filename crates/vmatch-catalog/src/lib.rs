//! Spotify Web API client.
//!
//! This crate provides:
//! - Client-credentials token exchange with cached single-flight refresh
//! - Track search by free-text query
//! - Batched audio-features lookup

pub mod client;
pub mod error;
pub mod token;
pub mod types;

pub use client::{CatalogClient, CatalogConfig};
pub use error::{CatalogError, CatalogResult};
pub use types::{Artist, AudioFeatures, Track};
