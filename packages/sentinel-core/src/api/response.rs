//! JSON response helpers shared by the HTTP handlers.

use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use serde::Serialize;
use serde_json::json;

/// Successful response wrapping arbitrary serializable data.
pub fn api_success<T: Serialize>(data: T) -> impl IntoResponse {
    (StatusCode::OK, Json(data))
}

/// Success response with `{ "success": true, "message": ... }`.
pub fn api_ok(message: impl std::fmt::Display) -> impl IntoResponse {
    api_success(json!({ "success": true, "message": message.to_string() }))
}
