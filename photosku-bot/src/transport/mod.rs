//! Chat transport boundary
//!
//! Inbound messages arrive as [`InboundEvent`]s; replies leave through the
//! [`Outbound`] trait; attachment bytes are pulled through [`MediaSource`].
//! The Telegram implementation lives in [`telegram`].

use async_trait::async_trait;
use photosku_common::db::{ExternalId, UserProfile};
use photosku_common::Result;
use serde::Serialize;

pub mod messages;
pub mod telegram;

/// Slash command that cancels the current flow, besides the cancel button
pub const CANCEL_COMMAND: &str = "/cancel";

/// Sender identity and the profile fields refreshed on every message
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExternalUser {
    pub external_id: ExternalId,
    pub profile: UserProfile,
}

/// Transport-side handle to a downloadable attachment
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaRef {
    pub file_id: String,
    pub file_size: Option<u64>,
}

/// One rung of a photo size ladder
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PhotoSize {
    pub media: MediaRef,
    pub width: u32,
    pub height: u32,
}

impl PhotoSize {
    pub fn area(&self) -> u64 {
        u64::from(self.width) * u64::from(self.height)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InboundKind {
    Text(String),
    Photo {
        sizes: Vec<PhotoSize>,
        caption: Option<String>,
    },
    Document {
        media: MediaRef,
        caption: Option<String>,
    },
    Cancel,
    /// Anything else (stickers, voice, locations, ...)
    Unsupported,
}

impl InboundKind {
    /// Classify a text message, turning the cancel button or `/cancel` into [`InboundKind::Cancel`]
    pub fn from_text(text: impl Into<String>) -> Self {
        let text = text.into();
        if is_cancel(&text) {
            InboundKind::Cancel
        } else {
            InboundKind::Text(text)
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundEvent {
    pub user: ExternalUser,
    pub kind: InboundKind,
}

/// True for the cancel button label or `/cancel`, ignoring case and surrounding whitespace
pub fn is_cancel(text: &str) -> bool {
    let text = text.trim();
    text.eq_ignore_ascii_case(messages::CANCEL_BUTTON)
        || strip_bot_mention(text).eq_ignore_ascii_case(CANCEL_COMMAND)
}

/// `/cmd@SomeBot` -> `/cmd`
pub fn strip_bot_mention(text: &str) -> &str {
    match text.split_once('@') {
        Some((command, _)) if command.starts_with('/') => command,
        _ => text,
    }
}

/// Reply keyboard shown under a message
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Keyboard {
    pub rows: Vec<Vec<String>>,
}

impl Keyboard {
    pub fn new<R, S>(rows: R) -> Self
    where
        R: IntoIterator,
        R::Item: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            rows: rows
                .into_iter()
                .map(|row| row.into_iter().map(Into::into).collect())
                .collect(),
        }
    }
}

/// A reply produced by the conversation engine, delivered by the transport
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    Text {
        text: String,
        keyboard: Option<Keyboard>,
    },
    Media {
        bytes: Vec<u8>,
        file_name: String,
        caption: String,
    },
}

impl Reply {
    pub fn text(text: impl Into<String>, keyboard: Keyboard) -> Self {
        Reply::Text {
            text: text.into(),
            keyboard: Some(keyboard),
        }
    }

    pub fn plain(text: impl Into<String>) -> Self {
        Reply::Text {
            text: text.into(),
            keyboard: None,
        }
    }
}

/// Outbound message delivery
#[async_trait]
pub trait Outbound: Send + Sync {
    async fn send_text(
        &self,
        external_id: ExternalId,
        text: &str,
        keyboard: Option<&Keyboard>,
    ) -> Result<()>;

    async fn send_media(
        &self,
        external_id: ExternalId,
        bytes: Vec<u8>,
        file_name: &str,
        caption: &str,
    ) -> Result<()>;

    async fn deliver(&self, external_id: ExternalId, reply: Reply) -> Result<()> {
        match reply {
            Reply::Text { text, keyboard } => {
                self.send_text(external_id, &text, keyboard.as_ref()).await
            }
            Reply::Media {
                bytes,
                file_name,
                caption,
            } => self.send_media(external_id, bytes, &file_name, &caption).await,
        }
    }
}

/// Attachment download
#[async_trait]
pub trait MediaSource: Send + Sync {
    async fn fetch(&self, media: &MediaRef) -> Result<Vec<u8>>;
}
