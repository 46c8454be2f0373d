use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use serde::Serialize;

use super::errors;
use crate::error::EngineError;
use crate::state::{AppState, MessageResponse};

#[derive(Debug, Serialize)]
pub struct ModelListResponse {
    pub models: Vec<String>,
}

pub async fn list(State(state): State<AppState>) -> impl IntoResponse {
    let store = state.models();
    let models = if store.exists() {
        vec![store.file_name().to_string()]
    } else {
        Vec::new()
    };
    (StatusCode::OK, Json(ModelListResponse { models }))
}

pub async fn destroy(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> axum::response::Response {
    let store = state.models();
    if name != store.file_name() {
        return errors::engine_response(&state, EngineError::NotFound);
    }

    let _guard = store.lifecycle().await;
    match store.delete() {
        Ok(()) => (
            StatusCode::OK,
            Json(MessageResponse {
                message: "Model deleted",
            }),
        )
            .into_response(),
        Err(e) => errors::engine_response(&state, e),
    }
}
