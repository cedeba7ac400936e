use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;
use uuid::Uuid;

/// Errors surfaced by the HTTP API
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Resource not found: {0}")]
    NotFound(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg.clone()),
        };

        let body = Json(json!({
            "error": message
        }));

        (status, body).into_response()
    }
}

pub type Result<T> = std::result::Result<T, AppError>;

/// Failures of the matchmaking and signaling core.
///
/// Every variant is scoped to a single connection or room; none of them
/// tears down anything beyond that.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SessionError {
    /// Message arrived in a state that forbids it. Dropped and logged.
    #[error("Protocol violation: {0}")]
    ProtocolViolation(String),

    /// Relay target no longer exists. Reported back as a soft notice.
    #[error("Partner is gone")]
    UnknownTarget,

    /// Stop or disconnect for a connection that was already torn down.
    #[error("Connection {0} was already torn down")]
    DuplicateTeardown(Uuid),

    /// Rejected language preferences. Queue state is left untouched.
    #[error("{0}")]
    PreferenceMismatch(String),
}
