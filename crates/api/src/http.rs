use std::sync::atomic::{AtomicU64, Ordering};

use axum::{extract::State, Json};
use serde_json::Value;

use crate::error::ApiError;
use crate::state::AppState;

static NEXT_HTTP_TRANSPORT_ID: AtomicU64 = AtomicU64::new(1 << 32);

/// `POST /`. Runs one request through the same dispatcher the WebSocket
/// handler uses. An ack-then-reply request (`join`/`configure`/`start`)
/// produces an asynchronous event with no open connection left to carry
/// it once this handler returns its one response — HTTP gets a 512
/// transport error instead of silently dropping the ack.
pub async fn post_request(
    State(state): State<AppState>,
    body: Result<Json<Value>, axum::extract::rejection::JsonRejection>,
) -> Result<Json<Value>, ApiError> {
    let Json(request) = body.map_err(|e| ApiError::MalformedJson(e.to_string()))?;

    let transport = NEXT_HTTP_TRANSPORT_ID.fetch_add(1, Ordering::Relaxed);
    let dispatched = state.dispatcher.dispatch(&request, transport).await;

    if dispatched.ack.is_some() {
        return Err(ApiError::AsyncEventOverHttp);
    }

    Ok(Json(dispatched.reply))
}
