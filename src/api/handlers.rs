//! HTTP request handlers

use super::types::{ErrorResponse, HealthResponse, WebhookAck};
use super::AppState;
use crate::telegram::Update;
use axum::{
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use tower_http::services::ServeDir;

const SECRET_HEADER: &str = "x-telegram-bot-api-secret-token";

/// Create the API router
pub fn create_router(state: AppState) -> Router {
    let files = ServeDir::new(&state.files_dir);
    Router::new()
        .route("/", get(health))
        .route("/api/webhook", post(webhook))
        // Proof links handed to staff point here
        .nest_service("/files", files)
        .with_state(state)
}

async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

async fn webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<WebhookAck>, AppError> {
    if let Some(expected) = &state.webhook_secret {
        let given = headers.get(SECRET_HEADER).and_then(|v| v.to_str().ok());
        if given != Some(expected.as_str()) {
            return Err(AppError::Unauthorized("bad webhook secret".to_string()));
        }
    }

    let update: Update = match serde_json::from_slice(&body) {
        Ok(update) => update,
        Err(e) => {
            tracing::warn!(error = %e, "Malformed webhook payload");
            return Ok(Json(WebhookAck::error()));
        }
    };
    let update_id = update.update_id;
    let Some(event) = update.into_inbound() else {
        tracing::debug!(update_id, "Update without a sender ignored");
        return Ok(Json(WebhookAck::ok()));
    };

    match state.handler.handle(event).await {
        Ok(()) => Ok(Json(WebhookAck::ok())),
        Err(e) => {
            tracing::warn!(update_id, error = %e, "Webhook update failed");
            Ok(Json(WebhookAck::error()))
        }
    }
}

// ============================================================
// Error Handling
// ============================================================

#[derive(Debug)]
enum AppError {
    Unauthorized(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            AppError::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, msg),
        };

        let body = Json(ErrorResponse::new(message));
        (status, body).into_response()
    }
}
