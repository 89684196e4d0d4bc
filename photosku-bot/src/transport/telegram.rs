//! Telegram Bot API transport
//!
//! A thin `reqwest` client for the handful of Bot API methods the bot needs,
//! conversion from Telegram updates to [`InboundEvent`]s, and the
//! long-polling loop.

use async_trait::async_trait;
use photosku_common::db::{ExternalId, UserProfile};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use super::{ExternalUser, InboundEvent, InboundKind, Keyboard, MediaRef, MediaSource, Outbound, PhotoSize};
use crate::error::TelegramError;
use crate::session::Dispatcher;

const USER_AGENT: &str = concat!("photosku-bot/", env!("CARGO_PKG_VERSION"));
const REQUEST_TIMEOUT_SECS: u64 = 30;
/// Extra slack on top of the long-poll timeout before the HTTP request gives up
const POLL_SLACK_SECS: u64 = 10;
const POLL_RETRY_DELAY: Duration = Duration::from_secs(5);
/// Bot API limit for photo captions, in characters
const MAX_CAPTION_CHARS: usize = 1024;

// ---------------------------------------------------------------------------
// Bot API types (only the fields the bot reads)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Update {
    pub update_id: i64,
    pub message: Option<Message>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Message {
    pub message_id: i64,
    pub from: Option<TgUser>,
    pub chat: Chat,
    pub text: Option<String>,
    pub caption: Option<String>,
    #[serde(default)]
    pub photo: Vec<TgPhotoSize>,
    pub document: Option<Document>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TgUser {
    pub id: i64,
    #[serde(default)]
    pub is_bot: bool,
    #[serde(default)]
    pub first_name: String,
    pub last_name: Option<String>,
    pub username: Option<String>,
    pub language_code: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Chat {
    pub id: i64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TgPhotoSize {
    pub file_id: String,
    pub width: u32,
    pub height: u32,
    pub file_size: Option<u64>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Document {
    pub file_id: String,
    pub file_name: Option<String>,
    pub mime_type: Option<String>,
    pub file_size: Option<u64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TgFile {
    pub file_id: String,
    pub file_path: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiResponse<T> {
    ok: bool,
    result: Option<T>,
    description: Option<String>,
    error_code: Option<i64>,
}

// ---------------------------------------------------------------------------
// Update -> InboundEvent
// ---------------------------------------------------------------------------

impl From<&TgUser> for ExternalUser {
    fn from(user: &TgUser) -> Self {
        ExternalUser {
            external_id: user.id,
            profile: UserProfile {
                username: user.username.clone().unwrap_or_default(),
                first_name: user.first_name.clone(),
                last_name: user.last_name.clone().unwrap_or_default(),
                language_code: user.language_code.clone().unwrap_or_default(),
                is_bot: user.is_bot,
            },
        }
    }
}

fn non_empty(text: Option<String>) -> Option<String> {
    text.filter(|t| !t.trim().is_empty())
}

/// Convert an update into an inbound event
///
/// Returns `None` for updates that carry no user message (edits, channel
/// posts, callback queries).
pub fn update_to_event(update: Update) -> Option<InboundEvent> {
    let message = update.message?;
    let user = ExternalUser::from(message.from.as_ref()?);

    let kind = if !message.photo.is_empty() {
        InboundKind::Photo {
            sizes: message
                .photo
                .into_iter()
                .map(|size| PhotoSize {
                    media: MediaRef {
                        file_id: size.file_id,
                        file_size: size.file_size,
                    },
                    width: size.width,
                    height: size.height,
                })
                .collect(),
            caption: non_empty(message.caption),
        }
    } else if let Some(document) = message.document {
        let is_image = document
            .mime_type
            .as_deref()
            .map_or(true, |mime| mime.starts_with("image/"));
        if is_image {
            InboundKind::Document {
                media: MediaRef {
                    file_id: document.file_id,
                    file_size: document.file_size,
                },
                caption: non_empty(message.caption),
            }
        } else {
            InboundKind::Unsupported
        }
    } else if let Some(text) = message.text {
        InboundKind::from_text(text)
    } else {
        InboundKind::Unsupported
    };

    Some(InboundEvent { user, kind })
}

fn keyboard_markup(keyboard: &Keyboard) -> serde_json::Value {
    let rows: Vec<Vec<serde_json::Value>> = keyboard
        .rows
        .iter()
        .map(|row| row.iter().map(|label| json!({ "text": label })).collect())
        .collect();
    json!({ "keyboard": rows, "resize_keyboard": true })
}

fn truncate_caption(caption: &str) -> String {
    caption.chars().take(MAX_CAPTION_CHARS).collect()
}

// ---------------------------------------------------------------------------
// Client
// ---------------------------------------------------------------------------

/// Telegram Bot API client
pub struct TelegramClient {
    http_client: reqwest::Client,
    /// `{api_base}/bot{token}`
    api_url: String,
    /// `{api_base}/file/bot{token}`
    file_url: String,
}

impl TelegramClient {
    pub fn new(api_base: &str, token: &str) -> Result<Self, TelegramError> {
        let http_client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .map_err(TelegramError::from)?;

        let api_base = api_base.trim_end_matches('/');
        Ok(Self {
            http_client,
            api_url: format!("{}/bot{}", api_base, token),
            file_url: format!("{}/file/bot{}", api_base, token),
        })
    }

    async fn call<T, B>(&self, method: &str, body: &B) -> Result<T, TelegramError>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        debug!(method = %method, "Calling Telegram API");
        let response = self
            .http_client
            .post(format!("{}/{}", self.api_url, method))
            .json(body)
            .send()
            .await?;

        read_response(response).await
    }

    pub async fn get_me(&self) -> Result<TgUser, TelegramError> {
        self.call("getMe", &json!({})).await
    }

    /// Long-poll for updates with `update_id >= offset`
    pub async fn get_updates(
        &self,
        offset: i64,
        timeout_secs: u64,
    ) -> Result<Vec<Update>, TelegramError> {
        let response = self
            .http_client
            .post(format!("{}/getUpdates", self.api_url))
            .timeout(Duration::from_secs(timeout_secs + POLL_SLACK_SECS))
            .json(&json!({
                "offset": offset,
                "timeout": timeout_secs,
                "allowed_updates": ["message"],
            }))
            .send()
            .await?;

        read_response(response).await
    }

    pub async fn get_file(&self, file_id: &str) -> Result<TgFile, TelegramError> {
        self.call("getFile", &json!({ "file_id": file_id })).await
    }

    pub async fn download_file(&self, file_path: &str) -> Result<Vec<u8>, TelegramError> {
        let response = self
            .http_client
            .get(format!("{}/{}", self.file_url, file_path))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(TelegramError::Api {
                code: i64::from(status.as_u16()),
                description: format!("file download failed ({})", status),
            });
        }

        Ok(response.bytes().await?.to_vec())
    }

    pub async fn send_message(
        &self,
        chat_id: i64,
        text: &str,
        keyboard: Option<&Keyboard>,
    ) -> Result<(), TelegramError> {
        let mut body = json!({ "chat_id": chat_id, "text": text });
        if let Some(keyboard) = keyboard {
            body["reply_markup"] = keyboard_markup(keyboard);
        }

        let _: serde_json::Value = self.call("sendMessage", &body).await?;
        Ok(())
    }

    pub async fn send_photo(
        &self,
        chat_id: i64,
        bytes: Vec<u8>,
        file_name: &str,
        caption: &str,
    ) -> Result<(), TelegramError> {
        let part = reqwest::multipart::Part::bytes(bytes)
            .file_name(file_name.to_string())
            .mime_str("image/jpeg")?;
        let form = reqwest::multipart::Form::new()
            .text("chat_id", chat_id.to_string())
            .text("caption", truncate_caption(caption))
            .part("photo", part);

        let response = self
            .http_client
            .post(format!("{}/sendPhoto", self.api_url))
            .multipart(form)
            .send()
            .await?;

        let _: serde_json::Value = read_response(response).await?;
        Ok(())
    }

    pub async fn set_webhook(&self, url: &str, secret: Option<&str>) -> Result<(), TelegramError> {
        let mut body = json!({ "url": url, "allowed_updates": ["message"] });
        if let Some(secret) = secret {
            body["secret_token"] = json!(secret);
        }

        let _: bool = self.call("setWebhook", &body).await?;
        Ok(())
    }

    pub async fn delete_webhook(&self) -> Result<(), TelegramError> {
        let _: bool = self.call("deleteWebhook", &json!({})).await?;
        Ok(())
    }
}

async fn read_response<T: DeserializeOwned>(response: reqwest::Response) -> Result<T, TelegramError> {
    let status = response.status();
    let body = response.bytes().await?;

    let parsed: ApiResponse<T> = match serde_json::from_slice(&body) {
        Ok(parsed) => parsed,
        Err(e) if status.is_success() => return Err(TelegramError::Parse(e.to_string())),
        Err(_) => {
            return Err(TelegramError::Api {
                code: i64::from(status.as_u16()),
                description: String::from_utf8_lossy(&body).into_owned(),
            })
        }
    };

    if !parsed.ok {
        return Err(TelegramError::Api {
            code: parsed.error_code.unwrap_or_else(|| i64::from(status.as_u16())),
            description: parsed.description.unwrap_or_default(),
        });
    }

    parsed.result.ok_or(TelegramError::MissingField("result"))
}

#[async_trait]
impl Outbound for TelegramClient {
    async fn send_text(
        &self,
        external_id: ExternalId,
        text: &str,
        keyboard: Option<&Keyboard>,
    ) -> photosku_common::Result<()> {
        Ok(self.send_message(external_id, text, keyboard).await?)
    }

    async fn send_media(
        &self,
        external_id: ExternalId,
        bytes: Vec<u8>,
        file_name: &str,
        caption: &str,
    ) -> photosku_common::Result<()> {
        Ok(self.send_photo(external_id, bytes, file_name, caption).await?)
    }
}

#[async_trait]
impl MediaSource for TelegramClient {
    async fn fetch(&self, media: &MediaRef) -> photosku_common::Result<Vec<u8>> {
        let file = self.get_file(&media.file_id).await?;
        let file_path = file.file_path.ok_or(TelegramError::MissingField("file_path"))?;
        Ok(self.download_file(&file_path).await?)
    }
}

// ---------------------------------------------------------------------------
// Long polling
// ---------------------------------------------------------------------------

/// Poll `getUpdates` and feed every user message to the dispatcher until
/// `shutdown` flips to `true`.
pub async fn run_polling(
    client: Arc<TelegramClient>,
    dispatcher: Dispatcher,
    poll_timeout_secs: u64,
    mut shutdown: watch::Receiver<bool>,
) {
    let mut offset: i64 = 0;
    info!("Polling Telegram for updates (timeout {}s)", poll_timeout_secs);

    loop {
        if *shutdown.borrow() {
            break;
        }

        let result = tokio::select! {
            _ = shutdown.changed() => break,
            result = client.get_updates(offset, poll_timeout_secs) => result,
        };

        match result {
            Ok(updates) => {
                for update in updates {
                    offset = offset.max(update.update_id + 1);
                    let update_id = update.update_id;
                    match update_to_event(update) {
                        Some(event) => dispatcher.dispatch(event).await,
                        None => debug!(update_id, "Ignoring update without a user message"),
                    }
                }
            }
            Err(e) => {
                warn!(error = %e, "getUpdates failed, retrying in {}s", POLL_RETRY_DELAY.as_secs());
                tokio::select! {
                    _ = shutdown.changed() => break,
                    _ = tokio::time::sleep(POLL_RETRY_DELAY) => {}
                }
            }
        }
    }

    info!("Stopped polling Telegram");
}
