use axum::Json;
use serde::{Deserialize, Serialize};

use crate::api::response::ApiError;

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

pub async fn not_found() -> ApiError {
    ApiError::not_found("route not found")
}
