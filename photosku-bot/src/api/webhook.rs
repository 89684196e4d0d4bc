//! Telegram webhook receiver
//!
//! Active only in webhook mode. Telegram POSTs one update per request; the
//! update is queued on the dispatcher and acknowledged right away.

use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::routing::post;
use axum::{Json, Router};
use tracing::{debug, warn};

use crate::transport::telegram::{update_to_event, Update};
use crate::AppState;

/// Header carrying the secret registered with `setWebhook`
pub const SECRET_TOKEN_HEADER: &str = "x-telegram-bot-api-secret-token";

/// POST /telegram/webhook
pub async fn receive_update(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(update): Json<Update>,
) -> StatusCode {
    let Some(dispatcher) = &state.dispatcher else {
        return StatusCode::NOT_FOUND;
    };

    if let Some(expected) = state.webhook_secret.as_deref() {
        let provided = headers
            .get(SECRET_TOKEN_HEADER)
            .and_then(|value| value.to_str().ok());
        if provided != Some(expected) {
            warn!(update_id = update.update_id, "Rejected webhook call with missing or wrong secret token");
            return StatusCode::UNAUTHORIZED;
        }
    }

    let update_id = update.update_id;
    match update_to_event(update) {
        Some(event) => dispatcher.dispatch(event).await,
        None => debug!(update_id, "Ignoring update without a user message"),
    }

    StatusCode::OK
}

pub fn webhook_routes() -> Router<AppState> {
    Router::new().route("/telegram/webhook", post(receive_update))
}
