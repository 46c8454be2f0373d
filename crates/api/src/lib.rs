pub mod codec;
pub mod config;
pub mod error;
pub mod ml;
pub mod routes;
pub mod state;

use axum::{Router, extract::DefaultBodyLimit};

pub fn app(state: state::AppState) -> Router {
    let upload_limit = state.config().max_upload_bytes();
    Router::new()
        .merge(routes::router())
        .layer(DefaultBodyLimit::max(upload_limit))
        .with_state(state)
}
