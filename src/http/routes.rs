use super::handlers;
use super::state::AppState;
use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

/// Create the HTTP router with all routes
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    // Leave headroom for multipart framing around the file itself.
    let body_limit = state.config.audio.max_upload_bytes() + 64 * 1024;

    Router::new()
        // Health check
        .route("/health", get(handlers::health_check))
        .route("/api/health-check", get(handlers::api_health_check))
        // Streaming relay
        .route(
            "/api/streaming/upload-audio",
            post(handlers::upload_audio),
        )
        .route(
            "/api/streaming/upload-audio/",
            post(handlers::upload_audio),
        )
        .route("/api/streaming/ws/:client_id", get(handlers::streaming_ws))
        .route(
            "/api/streaming/connections",
            get(handlers::list_connections),
        )
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(cors)
        // Add tracing middleware for request logging
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
