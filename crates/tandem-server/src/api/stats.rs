use crate::state::AppState;
use axum::{extract::State, Json};
use tandem_protocol::SessionStats;

pub async fn get_stats(State(state): State<AppState>) -> Json<SessionStats> {
    Json(state.sessions.stats().await)
}
