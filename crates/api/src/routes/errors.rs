use axum::{Json, http::StatusCode, response::IntoResponse};
use serde_json::json;
use std::fmt::Display;

use crate::error::EngineError;
use crate::state::AppState;

pub fn internal_message(state: &AppState, err: impl Display) -> String {
    tracing::error!(error = %err, "internal error");
    if state.config().debug() {
        err.to_string()
    } else {
        "Internal server error".to_string()
    }
}

pub fn error_response(status: StatusCode, message: impl Into<String>) -> axum::response::Response {
    (status, Json(json!({ "error": message.into() }))).into_response()
}

pub fn bad_request(message: impl Into<String>) -> axum::response::Response {
    error_response(StatusCode::BAD_REQUEST, message)
}

/// Client errors carry their own message; server errors are logged and
/// masked unless `debug` is on.
pub fn engine_response(state: &AppState, err: EngineError) -> axum::response::Response {
    let status = err.status();
    let message = if err.is_server_error() {
        internal_message(state, &err)
    } else {
        tracing::debug!(error = %err, "request rejected");
        err.to_string()
    };
    error_response(status, message)
}
