//! Supabase/PostgREST record-store client.
//!
//! Production-grade client with:
//! - Service-key auth headers on every request
//! - HTTP client tuning (pooling, timeouts)
//! - Exponential backoff with jitter
//! - Observability (tracing spans, metrics)
//!
//! The [`RequestStore`] trait is the persistence seam consumed by the
//! pipeline; [`RequestRepository`] is the REST implementation and
//! [`MemoryRequestStore`] a map-backed one for tests and local runs.

pub mod client;
pub mod error;
pub mod memory;
pub mod metrics;
pub mod repo;
pub mod retry;

pub use client::{RestClient, StoreConfig};
pub use error::{StoreError, StoreResult};
pub use memory::MemoryRequestStore;
pub use repo::{RequestRepository, RequestStore};
pub use retry::RetryConfig;
