//! HTTP surface of the relay
//!
//! - GET /health - Health check
//! - GET /api/health-check - JSON health check
//! - POST /api/streaming/upload-audio/ - Store an audio file for streaming
//! - GET /api/streaming/ws/:client_id - Client-facing relay websocket
//! - GET /api/streaming/connections - Live connections

mod handlers;
mod routes;
mod state;

pub use routes::create_router;
pub use state::AppState;
