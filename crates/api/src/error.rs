use axum::http::StatusCode;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("malformed archive: {0}")]
    MalformedArchive(String),

    #[error("malformed buffer: {0} bytes is not a whole number of float32 values")]
    MalformedBuffer(usize),

    #[error("invalid training input: {0}")]
    InvalidTrainingInput(String),

    #[error("invalid features: {0}")]
    InvalidFeatures(String),

    #[error("shape mismatch: model expects {expected} features, got {actual}")]
    ShapeMismatch { expected: usize, actual: usize },

    #[error("Model not trained yet")]
    NoModelAvailable,

    #[error("Model not found")]
    NotFound,

    #[error("training diverged: non-finite values in epoch {epoch}")]
    TrainingDiverged { epoch: usize },

    #[error("malformed model record: {0}")]
    MalformedRecord(String),

    #[error("training worker failed: {0}")]
    Worker(String),

    #[error("model storage: {0}")]
    Io(#[from] std::io::Error),

    #[error("model encoding: {0}")]
    Json(#[from] serde_json::Error),
}

impl EngineError {
    pub fn status(&self) -> StatusCode {
        match self {
            EngineError::NotFound => StatusCode::NOT_FOUND,
            EngineError::Io(_) | EngineError::Json(_) | EngineError::Worker(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
            _ => StatusCode::BAD_REQUEST,
        }
    }

    pub fn is_server_error(&self) -> bool {
        self.status().is_server_error()
    }
}

pub type Result<T> = std::result::Result<T, EngineError>;
