use std::sync::Arc;

use axum::{
    routing::{get, post},
    Router,
};
use tower_http::{
    cors::{Any, CorsLayer},
    services::ServeDir,
    trace::TraceLayer,
};

use super::handlers;
use crate::state::AppState;

/// Create the main application router
pub fn create_router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let api_routes = Router::new()
        .route("/health", get(handlers::health_check))
        .route("/status", get(handlers::status))
        .route("/capture", post(handlers::capture_photo))
        .route("/timelapse/start", post(handlers::start_timelapse))
        .route("/timelapse/stop", post(handlers::stop_timelapse))
        .route("/timelapse/create", post(handlers::create_timelapse))
        .route("/videos", get(handlers::list_videos));

    // Captured frames and assembled videos are served straight from their
    // directories
    let captures_dir = state.store.dir().to_path_buf();
    let videos_dir = state.assembler.videos_dir().to_path_buf();

    Router::new()
        .nest("/api", api_routes)
        .nest_service("/captures", ServeDir::new(captures_dir))
        .nest_service("/videos", ServeDir::new(videos_dir))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}
