//! Per-user conversation state machine
//!
//! | state     | input                    | next      | effect                         |
//! |-----------|--------------------------|-----------|--------------------------------|
//! | idle      | add command              | uploading | upload prompt                  |
//! | idle      | search command           | searching | search prompt                  |
//! | idle      | help / support / other   | idle      | help, support or greeting      |
//! | uploading | photo or image document  | uploading | intake (caption: then apply)   |
//! | uploading | text                     | idle      | apply                          |
//! | uploading | cancel                   | idle      | discard pending photos         |
//! | searching | text                     | idle      | search                         |
//! | searching | cancel                   | idle      | none                           |
//!
//! Input that fails validation gets a corrective prompt and leaves the state
//! unchanged. A failed state write is answered with the retry prompt and the
//! keyboard of the state the user is still in. A photo captioned with the
//! cancel token cancels the upload instead of being stored.
//!
//! The state is persisted on the user row; the [`Dispatcher`] guarantees one
//! event at a time per user.

use photosku_common::db::{ConversationState, User};
use photosku_common::Error;
use tracing::{debug, error, info};

use crate::engine::{parse_article_tokens, select_media, Catalog};
use crate::transport::messages::{self, cancel_menu, main_menu};
use crate::transport::{
    is_cancel, strip_bot_mention, InboundEvent, InboundKind, MediaRef, PhotoSize, Reply,
};

pub mod dispatcher;

pub use dispatcher::{Dispatcher, DispatcherSettings};

/// Commands recognised in the idle state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum IdleCommand {
    Add,
    Search,
    Help,
    Support,
    Greet,
}

impl IdleCommand {
    fn parse(text: &str) -> Self {
        let text = text.trim();
        match strip_bot_mention(text) {
            "/add" => return IdleCommand::Add,
            "/search" => return IdleCommand::Search,
            "/help" => return IdleCommand::Help,
            "/support" => return IdleCommand::Support,
            _ => {}
        }
        match text {
            messages::ADD_ITEM_BUTTON => IdleCommand::Add,
            messages::SEARCH_BUTTON => IdleCommand::Search,
            messages::HELP_BUTTON => IdleCommand::Help,
            messages::SUPPORT_BUTTON => IdleCommand::Support,
            _ => IdleCommand::Greet,
        }
    }
}

pub struct ConversationEngine {
    catalog: Catalog,
    support_text: String,
}

impl ConversationEngine {
    pub fn new(catalog: Catalog, support_text: Option<String>) -> Self {
        Self {
            catalog,
            support_text: support_text.unwrap_or_else(|| messages::DEFAULT_SUPPORT_TEXT.to_string()),
        }
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    /// Process one inbound event and return the replies to deliver, in order
    pub async fn handle(&self, event: &InboundEvent) -> Vec<Reply> {
        let user = match self.catalog.refresh_profile(&event.user).await {
            Ok(user) => user,
            Err(_) => return vec![Reply::text(messages::RETRY_PROMPT, main_menu())],
        };

        debug!(user_id = %user.id, state = %user.conversation_state, "Dispatching event");
        match user.conversation_state {
            ConversationState::Idle => self.on_idle(&user, &event.kind).await,
            ConversationState::Uploading => self.on_uploading(&user, &event.kind).await,
            ConversationState::Searching => self.on_searching(&user, &event.kind).await,
        }
    }

    async fn transition(&self, user: &User, to: ConversationState) -> Result<(), Error> {
        self.catalog
            .entities()
            .set_user_conversation_state(user.id, to)
            .await
            .map_err(|e| {
                error!(user_id = %user.id, from = %user.conversation_state, to = %to, error = %e, "Failed to change conversation state");
                e
            })?;
        info!(user_id = %user.id, from = %user.conversation_state, to = %to, "Conversation state changed");
        Ok(())
    }

    async fn on_idle(&self, user: &User, kind: &InboundKind) -> Vec<Reply> {
        let command = match kind {
            InboundKind::Text(text) => IdleCommand::parse(text),
            _ => IdleCommand::Greet,
        };

        match command {
            IdleCommand::Add => match self.transition(user, ConversationState::Uploading).await {
                Ok(()) => vec![Reply::text(messages::UPLOAD_PROMPT, cancel_menu())],
                Err(_) => vec![Reply::text(messages::RETRY_PROMPT, main_menu())],
            },
            IdleCommand::Search => match self.transition(user, ConversationState::Searching).await {
                Ok(()) => vec![Reply::text(messages::SEARCH_PROMPT, cancel_menu())],
                Err(_) => vec![Reply::text(messages::RETRY_PROMPT, main_menu())],
            },
            IdleCommand::Help => vec![Reply::text(
                messages::help(&user.profile.first_name),
                main_menu(),
            )],
            IdleCommand::Support => vec![Reply::text(self.support_text.clone(), main_menu())],
            IdleCommand::Greet => vec![Reply::text(
                messages::greeting(&user.profile.first_name),
                main_menu(),
            )],
        }
    }

    async fn on_uploading(&self, user: &User, kind: &InboundKind) -> Vec<Reply> {
        match kind {
            InboundKind::Photo { sizes, caption } => {
                self.upload(user, sizes, None, caption.as_deref()).await
            }
            InboundKind::Document { media, caption } => {
                self.upload(user, &[], Some(media), caption.as_deref()).await
            }
            InboundKind::Text(text) => {
                let tokens = parse_article_tokens(text);
                if tokens.is_empty() {
                    return vec![Reply::text(messages::EMPTY_ARTICLE_LIST, cancel_menu())];
                }
                self.apply(user, &tokens).await
            }
            InboundKind::Cancel => self.cancel_upload(user).await,
            InboundKind::Unsupported => vec![Reply::text(
                messages::UPLOAD_EXPECTS_PHOTOS_OR_ARTICLES,
                cancel_menu(),
            )],
        }
    }

    async fn upload(
        &self,
        user: &User,
        sizes: &[PhotoSize],
        document: Option<&MediaRef>,
        caption: Option<&str>,
    ) -> Vec<Reply> {
        if caption.is_some_and(is_cancel) {
            return self.cancel_upload(user).await;
        }

        let media = match select_media(sizes, document) {
            Ok(media) => media,
            Err(_) => {
                return vec![Reply::text(
                    messages::UPLOAD_EXPECTS_PHOTOS_OR_ARTICLES,
                    cancel_menu(),
                )]
            }
        };

        if let Err(e) = self.catalog.intake(user, media).await {
            let text = match e {
                Error::Transport(_) => messages::MEDIA_DOWNLOAD_FAILED,
                _ => messages::RETRY_PROMPT,
            };
            return vec![Reply::text(text, cancel_menu())];
        }

        let mut replies = vec![Reply::text(messages::PHOTO_SAVED, cancel_menu())];
        if let Some(caption) = caption {
            let tokens = parse_article_tokens(caption);
            if !tokens.is_empty() {
                replies.extend(self.apply(user, &tokens).await);
            }
        }
        replies
    }

    async fn apply(&self, user: &User, tokens: &[String]) -> Vec<Reply> {
        match self.catalog.apply(user, tokens).await {
            Ok(result) => {
                let summary = if result.total == 0 {
                    messages::NO_PENDING_PHOTOS.to_string()
                } else {
                    messages::apply_summary(result.succeeded, result.total)
                };
                if result.state_reset_failed {
                    // Still uploading; keep the cancel keyboard
                    vec![
                        Reply::plain(summary),
                        Reply::text(messages::RETRY_PROMPT, cancel_menu()),
                    ]
                } else {
                    vec![Reply::text(summary, main_menu())]
                }
            }
            Err(Error::ArticleResolution { token, .. }) => vec![Reply::text(
                messages::article_resolution_failed(&token),
                cancel_menu(),
            )],
            Err(e) => {
                error!(user_id = %user.id, error = %e, "Apply failed");
                vec![Reply::text(messages::RETRY_PROMPT, cancel_menu())]
            }
        }
    }

    async fn cancel_upload(&self, user: &User) -> Vec<Reply> {
        let discarded = match self.catalog.discard_pending(user).await {
            Ok(result) => result,
            Err(e) => {
                error!(user_id = %user.id, error = %e, "Failed to list pending photos for cancel");
                return vec![Reply::text(messages::RETRY_PROMPT, cancel_menu())];
            }
        };

        // Idle even when some photos couldn't be removed; those stay pending.
        if self.transition(user, ConversationState::Idle).await.is_err() {
            return vec![Reply::text(
                messages::upload_cancel_incomplete(discarded.deleted, discarded.failed),
                cancel_menu(),
            )];
        }
        vec![Reply::text(messages::upload_cancelled(discarded.failed), main_menu())]
    }

    async fn on_searching(&self, user: &User, kind: &InboundKind) -> Vec<Reply> {
        match kind {
            InboundKind::Cancel => {
                if self.transition(user, ConversationState::Idle).await.is_err() {
                    return vec![Reply::text(messages::RETRY_PROMPT, cancel_menu())];
                }
                vec![Reply::text(messages::SEARCH_CANCELLED, main_menu())]
            }
            InboundKind::Text(text) => {
                let tokens = parse_article_tokens(text);
                if tokens.is_empty() {
                    return vec![Reply::text(messages::SEARCH_EXPECTS_TEXT, cancel_menu())];
                }
                self.search(user, &tokens).await
            }
            _ => vec![Reply::text(messages::SEARCH_EXPECTS_TEXT, cancel_menu())],
        }
    }

    async fn search(&self, user: &User, tokens: &[String]) -> Vec<Reply> {
        let outcome = self.catalog.search(tokens).await;

        let mut replies: Vec<Reply> = outcome
            .hits
            .into_iter()
            .map(|hit| Reply::Media {
                bytes: hit.bytes,
                file_name: hit.file_name,
                caption: hit.caption,
            })
            .collect();
        replies.extend(
            outcome
                .not_found
                .iter()
                .map(|token| Reply::plain(messages::article_not_found(token))),
        );
        replies.extend(
            outcome
                .without_photos
                .iter()
                .map(|token| Reply::plain(messages::no_photos_for_article(token))),
        );
        replies.extend(
            outcome
                .lookup_failed
                .iter()
                .map(|token| Reply::plain(messages::article_lookup_failed(token))),
        );

        if self.transition(user, ConversationState::Idle).await.is_err() {
            replies.push(Reply::text(messages::RETRY_PROMPT, cancel_menu()));
        } else {
            replies.push(Reply::text(messages::SEARCH_FINISHED, main_menu()));
        }
        replies
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_idle_command_parsing() {
        assert_eq!(IdleCommand::parse("/add"), IdleCommand::Add);
        assert_eq!(IdleCommand::parse(messages::ADD_ITEM_BUTTON), IdleCommand::Add);
        assert_eq!(IdleCommand::parse("/search@photosku_bot"), IdleCommand::Search);
        assert_eq!(IdleCommand::parse(messages::SEARCH_BUTTON), IdleCommand::Search);
        assert_eq!(IdleCommand::parse(" /help "), IdleCommand::Help);
        assert_eq!(IdleCommand::parse(messages::SUPPORT_BUTTON), IdleCommand::Support);
        assert_eq!(IdleCommand::parse("/start"), IdleCommand::Greet);
        assert_eq!(IdleCommand::parse("hello"), IdleCommand::Greet);
    }
}
