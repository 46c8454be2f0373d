use axum::{
    Json,
    extract::{Multipart, State, multipart::MultipartRejection},
    http::StatusCode,
    response::IntoResponse,
};

use super::{errors, upload};
use crate::codec;
use crate::error::EngineError;
use crate::ml::{self, TrainConfig};
use crate::state::{AppState, MessageResponse};

pub async fn train_model(
    State(state): State<AppState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> axum::response::Response {
    let mut form = match upload::read_form(multipart).await {
        Ok(f) => f,
        Err(resp) => return resp,
    };

    let config_text = match form.require_config() {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let cfg: TrainConfig = match serde_json::from_str(&config_text) {
        Ok(v) => v,
        Err(e) => {
            return errors::engine_response(
                &state,
                EngineError::InvalidTrainingInput(format!("config: {e}")),
            );
        }
    };
    if let Err(e) = cfg.validate() {
        return errors::engine_response(&state, e);
    }

    let file = match form.require_file() {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let max_member_bytes = state.config().max_upload_bytes();
    let (features, labels) = match codec::decode_training_archive(&file, max_member_bytes) {
        Ok(v) => v,
        Err(e) => return errors::engine_response(&state, e),
    };
    drop(file);

    let samples = features.len();
    match ml::train_and_store(state.models(), features, labels, cfg).await {
        Ok(final_loss) => {
            tracing::info!(samples, epochs = cfg.epochs, final_loss, "model trained");
            (
                StatusCode::OK,
                Json(MessageResponse {
                    message: "Model trained and saved!",
                }),
            )
                .into_response()
        }
        Err(e) => errors::engine_response(&state, e),
    }
}
