//! Tandem Server Library
//!
//! Matchmaking and WebRTC signaling relay for one-to-one language exchange
//! calls. This module exposes the server components for testing and embedding.

pub mod api;
pub mod error;
pub mod models;
pub mod services;
pub mod session;
pub mod state;
pub mod webrtc;
pub mod ws;

use anyhow::{ensure, Result};
use std::time::Duration;

/// Create and configure the server application.
///
/// Also starts the queue maintenance task, so this must run inside a Tokio
/// runtime.
pub async fn create_app(config: state::Config) -> Result<axum::Router> {
    ensure!(
        config.sweep_interval_ms > 0,
        "sweep_interval_ms must be greater than zero"
    );

    tracing::info!(
        "Matchmaking policy {:?}, queue timeout {:?}s, requeue partner: {}",
        config.match_policy,
        config.queue_timeout_secs,
        config.requeue_partner
    );

    let app_state = state::AppState::new(config.clone());
    app_state
        .sessions
        .spawn_sweeper(Duration::from_millis(config.sweep_interval_ms));

    Ok(api::create_router(app_state))
}
