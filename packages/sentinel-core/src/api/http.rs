//! HTTP route handlers.
//!
//! All handlers are thin - they delegate to services for business logic.

use axum::{
    extract::{rejection::JsonRejection, State},
    http::{header, HeaderValue, Method},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use chrono::Utc;
use serde::Deserialize;
use serde_json::json;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::api::response::{api_ok, api_success};
use crate::api::ws::ws_handler;
use crate::api::AppState;
use crate::error::{SentinelError, SentinelResult};
use crate::protocol_constants::SERVICE_ID;
use crate::services::StartOutcome;

// ─────────────────────────────────────────────────────────────────────────────
// Request Types
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AnalysisRequest {
    #[serde(default)]
    camera_id: Option<String>,
}

/// Extracts a non-blank camera id from a JSON body.
///
/// A missing body, malformed JSON and a blank id all map to `invalid_request`.
fn require_camera_id(body: Result<Json<AnalysisRequest>, JsonRejection>) -> SentinelResult<String> {
    let request = match body {
        Ok(Json(request)) => request,
        Err(rejection) => {
            log::debug!("[API] Rejected analysis body: {}", rejection);
            AnalysisRequest::default()
        }
    };
    match request.camera_id.map(|id| id.trim().to_string()) {
        Some(id) if !id.is_empty() => Ok(id),
        _ => Err(SentinelError::InvalidRequest(
            "cameraId is required".to_string(),
        )),
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Router
// ─────────────────────────────────────────────────────────────────────────────

fn cors_layer(trusted_origins: Vec<String>) -> CorsLayer {
    let layer = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE]);

    if trusted_origins.is_empty() {
        return layer.allow_origin(Any);
    }
    log::info!("[API] CORS trusted origins: {:?}", trusted_origins);
    layer.allow_origin(AllowOrigin::predicate(move |origin: &HeaderValue, _| {
        let origin = origin.to_str().unwrap_or("");
        trusted_origins.iter().any(|allowed| origin.starts_with(allowed))
    }))
}

/// Creates the Axum router with all routes.
pub fn create_router(state: AppState) -> Router {
    let trusted_origins = state.config.read().trusted_origins.clone();

    Router::new()
        .route("/health", get(health_check))
        .route("/api/ai/start", post(start_analysis))
        .route("/api/ai/stop", post(stop_analysis))
        .route("/api/ai/sessions", get(list_sessions))
        .route("/ws", get(ws_handler))
        .layer(cors_layer(trusted_origins))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

// ─────────────────────────────────────────────────────────────────────────────
// Handlers
// ─────────────────────────────────────────────────────────────────────────────

async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    api_success(json!({
        "status": "ok",
        "service": SERVICE_ID,
        "timestamp": Utc::now(),
        "connections": state.hub.connection_count(),
        "activeSessions": state.detection.active_sessions().len()
    }))
}

async fn start_analysis(
    State(state): State<AppState>,
    body: Result<Json<AnalysisRequest>, JsonRejection>,
) -> Response {
    let camera_id = match require_camera_id(body) {
        Ok(id) => id,
        Err(e) => return e.into_response(),
    };

    match state.detection.start(&camera_id) {
        Ok(StartOutcome::Started) => {
            api_ok(format!("AI analysis started for {camera_id}")).into_response()
        }
        Ok(StartOutcome::AlreadyRunning) => {
            api_ok(format!("AI analysis already running for {camera_id}")).into_response()
        }
        Err(e) => e.into_response(),
    }
}

async fn stop_analysis(
    State(state): State<AppState>,
    body: Result<Json<AnalysisRequest>, JsonRejection>,
) -> Response {
    let camera_id = match require_camera_id(body) {
        Ok(id) => id,
        Err(e) => return e.into_response(),
    };

    match state.detection.stop(&camera_id) {
        Ok(_) => api_ok(format!("AI analysis stopped for {camera_id}")).into_response(),
        Err(e) => e.into_response(),
    }
}

async fn list_sessions(State(state): State<AppState>) -> impl IntoResponse {
    let sessions = state.detection.active_sessions();
    api_success(json!({
        "total": sessions.len(),
        "data": sessions
    }))
}
