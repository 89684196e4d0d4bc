//! Telegram Bot API client errors

use thiserror::Error;

#[derive(Debug, Error)]
pub enum TelegramError {
    #[error("Network error: {0}")]
    Network(String),

    /// `ok: false` response, or a non-success HTTP status
    #[error("API error {code}: {description}")]
    Api { code: i64, description: String },

    #[error("Parse error: {0}")]
    Parse(String),

    /// `ok: true` but the expected field was absent
    #[error("Missing field in response: {0}")]
    MissingField(&'static str),
}

impl From<reqwest::Error> for TelegramError {
    fn from(e: reqwest::Error) -> Self {
        // Request URLs embed the bot token; never let them reach a log line
        let e = e.without_url();
        if e.is_decode() {
            TelegramError::Parse(e.to_string())
        } else {
            TelegramError::Network(e.to_string())
        }
    }
}

impl From<TelegramError> for photosku_common::Error {
    fn from(e: TelegramError) -> Self {
        photosku_common::Error::Transport(e.to_string())
    }
}
