//! HTTP handlers for synthesis and hardware queries.

use std::sync::Arc;

use axum::Json;
use axum::body::Bytes;
use axum::extract::State;
use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Response};
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use launcher_core::ErrorKind;
use serde::{Deserialize, Serialize};
use tracing::{error, instrument};

use crate::server::AppState;

/// Response body of `/generate` and of failed `/gpu-info` calls.
///
/// The message is base64 so multi-line tracebacks survive any client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageBody {
    pub message: String,
}

impl MessageBody {
    pub fn encode(message: &str) -> Self {
        Self {
            message: STANDARD.encode(message),
        }
    }

    /// Decoded message text.
    pub fn decode(&self) -> Result<String, base64::DecodeError> {
        let bytes = STANDARD.decode(&self.message)?;
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }
}

pub fn status_for(kind: ErrorKind) -> StatusCode {
    match kind {
        ErrorKind::BadInput => StatusCode::BAD_REQUEST,
        ErrorKind::Internal => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

/// Pretty-printed `{"message": ...}` response.
pub fn message_response(status: StatusCode, message: &str) -> Response {
    let body = match serde_json::to_string_pretty(&MessageBody::encode(message)) {
        Ok(body) => body,
        Err(e) => {
            error!("Failed to serialize response: {e}");
            return StatusCode::INTERNAL_SERVER_ERROR.into_response();
        }
    };
    (status, [(header::CONTENT_TYPE, "application/json")], body).into_response()
}

/// `POST /generate`.
///
/// The body is taken raw so malformed JSON gets the same envelope as any
/// other bad input.
#[instrument(skip_all, fields(body_len = body.len()))]
pub async fn generate_handler(State(state): State<Arc<AppState>>, body: Bytes) -> Response {
    match state.pipeline.handle_body(&body).await {
        Ok(()) => message_response(StatusCode::OK, ""),
        Err(failure) => message_response(status_for(failure.kind()), &failure.client_message()),
    }
}

/// `GET /gpu-info`.
pub async fn gpu_info_handler(State(state): State<Arc<AppState>>) -> Response {
    match state.pipeline.gpu_info().await {
        Ok(info) => Json(info).into_response(),
        Err(e) => {
            error!("GPU info query failed: {e}");
            message_response(status_for(e.kind()), &e.to_string())
        }
    }
}
