use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

/// Transport-level failures — distinct from `janusd_core::ProtocolError`,
/// which is always carried *inside* a 200 OK JSON body per the protocol's
/// own error envelope. These happen before or around the protocol layer.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("request body is not valid JSON: {0}")]
    MalformedJson(String),
    /// An asynchronous event (e.g. a plugin reply with no further request
    /// pending) was produced on an HTTP connection that already completed
    /// its response. Asynchronous events are WebSocket-only.
    #[error("asynchronous event over HTTP")]
    AsyncEventOverHttp,
}

#[derive(Serialize)]
struct ErrorResponse {
    error: serde_json::Value,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code, reason) = match &self {
            ApiError::MalformedJson(msg) => (StatusCode::BAD_REQUEST, 454u32, msg.clone()),
            ApiError::AsyncEventOverHttp => {
                (StatusCode::INTERNAL_SERVER_ERROR, 512u32, self.to_string())
            }
        };

        let body = ErrorResponse {
            error: serde_json::json!({ "code": code, "reason": reason }),
        };

        (status, Json(body)).into_response()
    }
}
