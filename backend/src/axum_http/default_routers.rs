use axum::{Json, http::Uri, response::IntoResponse};
use chrono::Utc;
use serde_json::json;

use super::error_responses::AppError;

pub async fn health_check() -> impl IntoResponse {
    Json(json!({
        "status": "ok",
        "timestamp": Utc::now(),
    }))
}

pub async fn not_found(uri: Uri) -> AppError {
    AppError::NotFound(format!("Route {}", uri.path()))
}
