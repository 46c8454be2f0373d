use axum::Router;

use crate::state::AppState;

pub mod errors;
pub mod health;
pub mod models;
pub mod predict;
pub mod train;
pub mod upload;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", axum::routing::get(health::root))
        .route("/health", axum::routing::get(health::health))
        .route("/train", axum::routing::post(train::train_model))
        .route("/predict", axum::routing::post(predict::predict))
        .route("/models", axum::routing::get(models::list))
        .route("/models/{name}", axum::routing::delete(models::destroy))
}
