use std::sync::Arc;

use axum::{extract::State, Json};
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::state::AppState;
use crate::timelapse::VideoInfo;

// ============================================================================
// Health
// ============================================================================

/// Health check response
#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
}

pub async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

// ============================================================================
// Status
// ============================================================================

/// Recorder status: live directory counts plus capture session state
#[derive(Serialize)]
pub struct StatusResponse {
    pub captures_count: usize,
    pub videos_count: usize,
    pub is_capturing: bool,
    pub current_interval: Option<u64>,
}

pub async fn status(State(state): State<Arc<AppState>>) -> Result<Json<StatusResponse>> {
    Ok(Json(StatusResponse {
        captures_count: state.store.frame_count().await?,
        videos_count: state.assembler.video_count().await?,
        is_capturing: state.capture.is_capturing().await,
        current_interval: state.capture.current_interval().await,
    }))
}

// ============================================================================
// Capture control
// ============================================================================

/// Generic message response
#[derive(Serialize)]
pub struct MessageResponse {
    pub message: String,
}

/// Single-shot capture response
#[derive(Serialize)]
pub struct CaptureResponse {
    pub message: String,
    pub filename: String,
}

pub async fn capture_photo(State(state): State<Arc<AppState>>) -> Result<Json<CaptureResponse>> {
    let filename = state.capture.capture_photo().await?;
    Ok(Json(CaptureResponse {
        message: "Photo captured".to_string(),
        filename,
    }))
}

/// Timelapse start request
#[derive(Deserialize)]
pub struct StartTimelapseRequest {
    /// Seconds between captures
    pub interval: u64,
}

pub async fn start_timelapse(
    State(state): State<Arc<AppState>>,
    Json(req): Json<StartTimelapseRequest>,
) -> Result<Json<MessageResponse>> {
    state.capture.start_timelapse(req.interval).await?;

    // Starting while running is a no-op; report the interval actually in
    // effect so callers can tell.
    let interval = state
        .capture
        .current_interval()
        .await
        .unwrap_or(req.interval);
    Ok(Json(MessageResponse {
        message: format!("Started timelapse capture with {}s interval", interval),
    }))
}

pub async fn stop_timelapse(State(state): State<Arc<AppState>>) -> Result<Json<MessageResponse>> {
    state.capture.stop_timelapse().await?;
    Ok(Json(MessageResponse {
        message: "Stopped timelapse capture".to_string(),
    }))
}

// ============================================================================
// Video assembly
// ============================================================================

/// Timelapse creation request; body is optional
#[derive(Deserialize, Default)]
pub struct CreateTimelapseRequest {
    /// Output frame rate; defaults to the configured rate
    pub fps: Option<u32>,
}

/// Timelapse creation response
#[derive(Serialize)]
pub struct CreateTimelapseResponse {
    pub message: String,
    pub video_name: String,
}

pub async fn create_timelapse(
    State(state): State<Arc<AppState>>,
    body: Option<Json<CreateTimelapseRequest>>,
) -> Result<Json<CreateTimelapseResponse>> {
    let fps = body
        .and_then(|Json(req)| req.fps)
        .unwrap_or(state.config.encoder.default_fps);

    let video_name = state.assembler.create_timelapse(fps).await?;
    Ok(Json(CreateTimelapseResponse {
        message: "Timelapse video created successfully".to_string(),
        video_name,
    }))
}

pub async fn list_videos(State(state): State<Arc<AppState>>) -> Result<Json<Vec<VideoInfo>>> {
    Ok(Json(state.assembler.list_videos().await?))
}
