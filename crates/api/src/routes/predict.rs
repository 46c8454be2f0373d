use axum::{
    Json,
    extract::{Multipart, State, multipart::MultipartRejection},
    http::StatusCode,
    response::IntoResponse,
};
use serde::Serialize;

use super::{errors, upload};
use crate::codec;
use crate::error::EngineError;
use crate::ml::{self, Classification};
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct PredictResponse {
    pub predictions: Vec<f32>,
    pub classification: Classification,
    pub confidence: f32,
}

pub async fn predict(
    State(state): State<AppState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> axum::response::Response {
    let Some(model) = state.models().load().await else {
        return errors::engine_response(&state, EngineError::NoModelAvailable);
    };

    let mut form = match upload::read_form(multipart).await {
        Ok(f) => f,
        Err(resp) => return resp,
    };
    let file = match form.require_file() {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    let prediction = match codec::decode_inference_buffer(&file)
        .and_then(|x| ml::predict(&x, Some(&*model)))
    {
        Ok(p) => p,
        Err(e) => return errors::engine_response(&state, e),
    };

    (
        StatusCode::OK,
        Json(PredictResponse {
            predictions: vec![prediction.probability],
            classification: prediction.classification,
            confidence: prediction.confidence,
        }),
    )
        .into_response()
}
