//! HTTP API handlers for photosku-bot

pub mod health;
pub mod webhook;

pub use health::health_routes;
pub use webhook::{webhook_routes, SECRET_TOKEN_HEADER};
