//! photosku-bot library
//!
//! Telegram bot for tagging item photos with article (SKU) numbers and
//! finding them again by article number.

use axum::Router;
use tower_http::trace::TraceLayer;

pub mod api;
pub mod engine;
pub mod error;
pub mod logging;
pub mod session;
pub mod store;
pub mod transport;

use session::Dispatcher;

/// Application state shared across HTTP handlers
#[derive(Clone, Default)]
pub struct AppState {
    /// Present in webhook mode; the webhook route answers 404 without it
    pub dispatcher: Option<Dispatcher>,
    /// Expected `X-Telegram-Bot-Api-Secret-Token` value
    pub webhook_secret: Option<String>,
}

impl AppState {
    /// State for polling mode: health endpoint only
    pub fn health_only() -> Self {
        Self::default()
    }

    /// State for webhook mode
    pub fn with_webhook(dispatcher: Dispatcher, webhook_secret: Option<String>) -> Self {
        Self {
            dispatcher: Some(dispatcher),
            webhook_secret,
        }
    }
}

/// Build application router
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .merge(api::health_routes())
        .merge(api::webhook_routes())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
