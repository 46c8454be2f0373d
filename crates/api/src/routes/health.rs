use axum::{Json, http::StatusCode, response::IntoResponse};

use crate::state::{HealthResponse, RootResponse};

pub async fn health() -> impl IntoResponse {
    (StatusCode::OK, Json(HealthResponse { status: "healthy" }))
}

pub async fn root() -> impl IntoResponse {
    (
        StatusCode::OK,
        Json(RootResponse {
            message: "AI Backend Server is running",
            status: "active",
        }),
    )
}
