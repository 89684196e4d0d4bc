//! Shared fixtures: a catalog wired to the test doubles, and inbound events

use std::sync::Arc;

use photosku_bot::engine::Catalog;
use photosku_bot::session::ConversationEngine;
use photosku_bot::transport::{ExternalUser, InboundEvent, InboundKind, MediaRef, PhotoSize};
use photosku_common::db::{ExternalId, UserProfile};

use super::doubles::{FaultyEntityStore, FaultyObjectStore, StaticMediaSource};

pub struct Harness {
    pub entities: Arc<FaultyEntityStore>,
    pub objects: Arc<FaultyObjectStore>,
    pub media: Arc<StaticMediaSource>,
    pub catalog: Catalog,
}

impl Harness {
    pub fn engine(&self) -> ConversationEngine {
        ConversationEngine::new(self.catalog.clone(), None)
    }
}

pub fn harness() -> Harness {
    let entities = Arc::new(FaultyEntityStore::new());
    let objects = Arc::new(FaultyObjectStore::new());
    let media = Arc::new(StaticMediaSource::new());
    let catalog = Catalog::new(entities.clone(), objects.clone(), media.clone());
    Harness {
        entities,
        objects,
        media,
        catalog,
    }
}

pub fn sender(external_id: ExternalId) -> ExternalUser {
    ExternalUser {
        external_id,
        profile: UserProfile {
            username: format!("user{}", external_id),
            first_name: "Tester".to_string(),
            last_name: String::new(),
            language_code: "en".to_string(),
            is_bot: false,
        },
    }
}

pub fn text_event(external_id: ExternalId, text: &str) -> InboundEvent {
    InboundEvent {
        user: sender(external_id),
        kind: InboundKind::from_text(text),
    }
}

/// Photo message with a two-rung size ladder; the large rung is `file_id`
pub fn photo_event(external_id: ExternalId, file_id: &str, caption: Option<&str>) -> InboundEvent {
    let rung = |id: String, width: u32, height: u32| PhotoSize {
        media: MediaRef {
            file_id: id,
            file_size: Some(u64::from(width) * u64::from(height) / 10),
        },
        width,
        height,
    };
    InboundEvent {
        user: sender(external_id),
        kind: InboundKind::Photo {
            sizes: vec![
                rung(format!("{}-thumb", file_id), 90, 68),
                rung(file_id.to_string(), 1280, 960),
            ],
            caption: caption.map(str::to_string),
        },
    }
}

pub fn document_event(external_id: ExternalId, file_id: &str, caption: Option<&str>) -> InboundEvent {
    InboundEvent {
        user: sender(external_id),
        kind: InboundKind::Document {
            media: MediaRef {
                file_id: file_id.to_string(),
                file_size: None,
            },
            caption: caption.map(str::to_string),
        },
    }
}
