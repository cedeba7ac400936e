mod languages;
mod stats;

use crate::error::AppError;
use crate::state::AppState;
use crate::ws;
use axum::{http::Uri, routing::get, Router};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        // Health check
        .route("/health", get(|| async { "OK" }))
        // Language catalog
        .route("/languages", get(languages::list_languages))
        .route("/languages/{code}", get(languages::get_language))
        // Matchmaking counters
        .route("/api/stats", get(stats::get_stats))
        // WebRTC configuration
        .route("/api/rtc/ice-servers", get(crate::webrtc::get_ice_servers))
        // WebSocket endpoint
        .route("/ws", get(ws::handler::ws_handler))
        .fallback(not_found)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

async fn not_found(uri: Uri) -> AppError {
    AppError::NotFound(uri.path().to_string())
}
