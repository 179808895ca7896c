//! HTTP handlers.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::info;

use vmatch_models::{ProcessingRequest, RequestId};
use vmatch_pipeline::RunRequest;

use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

/// Processing trigger payload.
#[derive(Debug, Deserialize)]
pub struct ProcessPayload {
    #[serde(default)]
    pub request_id: Option<String>,
    #[serde(default)]
    pub video_url: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub music_year_start: Option<i32>,
    #[serde(default)]
    pub music_year_end: Option<i32>,
}

/// Processing trigger response.
#[derive(Debug, Serialize)]
pub struct ProcessResponse {
    pub success: bool,
    pub request_id: String,
    pub processing_duration: f64,
    pub recommendations_count: usize,
}

/// Run the processing pipeline for one request.
pub async fn process_video(
    State(state): State<AppState>,
    Json(payload): Json<ProcessPayload>,
) -> ApiResult<Json<ProcessResponse>> {
    let request_id = payload
        .request_id
        .filter(|s| !s.is_empty())
        .ok_or_else(|| ApiError::bad_request("Missing request_id or video_url"))?;
    let video_url = payload
        .video_url
        .filter(|s| !s.is_empty())
        .ok_or_else(|| ApiError::bad_request("Missing request_id or video_url"))?;

    info!(request_id = %request_id, "Processing trigger received");

    let mut run = RunRequest::new(RequestId::from_string(request_id), video_url);
    run.user_description = payload.description;
    run.music_year_start = payload.music_year_start;
    run.music_year_end = payload.music_year_end;

    let summary = state
        .pipeline
        .run(run)
        .await
        .map_err(|e| ApiError::internal(e.to_string()))?;

    Ok(Json(ProcessResponse {
        success: true,
        request_id: summary.request_id.to_string(),
        processing_duration: summary.processing_duration,
        recommendations_count: summary.recommendations_count,
    }))
}

/// Polling endpoint: return one request record by ID.
pub async fn get_request(
    State(state): State<AppState>,
    Path(request_id): Path<String>,
) -> ApiResult<Json<ProcessingRequest>> {
    let record = state
        .store
        .fetch(&RequestId::from_string(&request_id))
        .await?
        .ok_or_else(|| ApiError::not_found(format!("request {}", request_id)))?;

    Ok(Json(record))
}

/// Health response.
#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub timestamp: String,
}

/// Health check endpoint (liveness probe).
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        timestamp: Utc::now().to_rfc3339(),
    })
}

/// Readiness check response.
#[derive(Serialize)]
pub struct ReadinessResponse {
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Readiness probe: verifies the record store is reachable.
pub async fn ready(
    State(state): State<AppState>,
) -> Result<Json<ReadinessResponse>, (StatusCode, Json<ReadinessResponse>)> {
    // A miss is fine; only transport-level failures mean "not ready".
    match state.store.fetch(&RequestId::from_string("_readiness_probe")).await {
        Ok(_) => Ok(Json(ReadinessResponse {
            status: "ready".to_string(),
            error: None,
        })),
        Err(e) => Err((
            StatusCode::SERVICE_UNAVAILABLE,
            Json(ReadinessResponse {
                status: "degraded".to_string(),
                error: Some(e.to_string()),
            }),
        )),
    }
}
