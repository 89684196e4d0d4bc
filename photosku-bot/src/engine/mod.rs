//! Photo catalog engines
//!
//! [`Catalog`] bundles the stores and the media source and exposes the
//! operations the conversation drives:
//! - profile refresh ([`profile`])
//! - article resolution ([`articles`])
//! - photo intake and cancellation cleanup ([`intake`])
//! - tag application ([`apply`])
//! - search ([`search`])

use std::sync::Arc;

use crate::store::{EntityStore, ObjectStore};
use crate::transport::MediaSource;

pub mod apply;
pub mod articles;
pub mod intake;
pub mod profile;
pub mod search;

pub use apply::ApplyResult;
pub use articles::parse_article_tokens;
pub use intake::{select_media, DiscardResult};
pub use search::{SearchHit, SearchOutcome};

#[derive(Clone)]
pub struct Catalog {
    entities: Arc<dyn EntityStore>,
    objects: Arc<dyn ObjectStore>,
    media: Arc<dyn MediaSource>,
}

impl Catalog {
    pub fn new(
        entities: Arc<dyn EntityStore>,
        objects: Arc<dyn ObjectStore>,
        media: Arc<dyn MediaSource>,
    ) -> Self {
        Self {
            entities,
            objects,
            media,
        }
    }

    pub fn entities(&self) -> &Arc<dyn EntityStore> {
        &self.entities
    }

    pub fn objects(&self) -> &Arc<dyn ObjectStore> {
        &self.objects
    }
}
