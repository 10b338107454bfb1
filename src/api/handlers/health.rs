use axum::{http::Uri, response::IntoResponse, Json};
use crate::error::AppError;

pub async fn health() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "running",
        "service": env!("CARGO_PKG_NAME"),
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

pub async fn not_found(uri: Uri) -> AppError {
    AppError::NotFound(format!("No route for {}", uri.path()))
}
