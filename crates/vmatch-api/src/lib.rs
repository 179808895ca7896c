//! Axum HTTP API for the Vibematch processing trigger.
//!
//! Exposes:
//! - `POST /api/process`: run the pipeline for one request
//! - `GET /api/requests/:request_id`: poll a request record
//! - `GET /health`, `GET /ready`: probes
//! - `GET /metrics`: Prometheus text (when enabled)

pub mod config;
pub mod error;
pub mod handlers;
pub mod metrics;
pub mod middleware;
pub mod routes;
pub mod state;

pub use config::ApiConfig;
pub use error::{ApiError, ApiResult};
pub use routes::create_router;
pub use state::AppState;
