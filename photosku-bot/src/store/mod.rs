//! Persistence contracts
//!
//! The engines only ever talk to these two traits:
//! - [`EntityStore`] holds users, photos, article numbers and their associations
//! - [`ObjectStore`] holds photo bytes under opaque string keys
//!
//! Each implementation provides its own single-write atomicity; nothing here
//! spans a transaction across calls.

use async_trait::async_trait;
use photosku_common::db::{
    ApplyState, ArticleNumber, ConversationState, ExternalId, Photo, PhotoUpdate, User,
    UserProfile, UserUpdate,
};
use photosku_common::Result;
use tracing::debug;
use uuid::Uuid;

pub mod memory;
pub mod object;
pub mod sqlite;

pub use memory::{MemoryEntityStore, MemoryObjectStore};
pub use object::FilesystemObjectStore;
pub use sqlite::SqliteEntityStore;

/// Relational storage for the conversational core
#[async_trait]
pub trait EntityStore: Send + Sync {
    async fn get_user_by_external_id(&self, external_id: ExternalId) -> Result<Option<User>>;

    /// Insert a new `Idle` user or refresh the profile of an existing one.
    ///
    /// Never touches `conversation_state` of an existing row.
    async fn upsert_user(&self, external_id: ExternalId, profile: &UserProfile) -> Result<User>;

    /// Apply a typed partial update. `NotFound` if the user doesn't exist.
    async fn update_user(&self, user_id: Uuid, update: UserUpdate) -> Result<()>;

    async fn set_user_conversation_state(
        &self,
        user_id: Uuid,
        state: ConversationState,
    ) -> Result<()> {
        self.update_user(user_id, UserUpdate::state(state)).await
    }

    async fn create_photo(&self, photo: &Photo) -> Result<()>;

    /// Apply a typed partial update. `NotFound` if the photo doesn't exist.
    async fn update_photo(&self, photo_id: Uuid, update: PhotoUpdate) -> Result<()>;

    async fn set_photo_apply_state(&self, photo_id: Uuid, state: ApplyState) -> Result<()> {
        self.update_photo(photo_id, PhotoUpdate::apply_state(state)).await
    }

    /// Pending photos owned by the user, oldest first
    async fn list_pending_photos_for_user(&self, owner_id: Uuid) -> Result<Vec<Photo>>;

    /// Delete a photo and its associations. Deleting a missing photo is a no-op.
    async fn delete_photo(&self, photo_id: Uuid) -> Result<()>;

    async fn get_photo(&self, photo_id: Uuid) -> Result<Option<Photo>>;

    async fn get_article_by_name(&self, number: &str) -> Result<Option<ArticleNumber>>;

    /// Create an article number. Fails if `number` already exists.
    async fn create_article(&self, number: &str) -> Result<ArticleNumber>;

    /// Look up `number`, creating it when absent.
    ///
    /// A failed create (typically a unique violation from a concurrent
    /// insert) is resolved by re-reading; only if that still finds nothing is
    /// the create error returned.
    async fn get_or_create_article(&self, number: &str) -> Result<ArticleNumber> {
        if let Some(article) = self.get_article_by_name(number).await? {
            return Ok(article);
        }

        match self.create_article(number).await {
            Ok(article) => Ok(article),
            Err(create_err) => match self.get_article_by_name(number).await? {
                Some(article) => {
                    debug!(number = %number, "Article created concurrently, using existing row");
                    Ok(article)
                }
                None => Err(create_err),
            },
        }
    }

    /// Link a photo to an article number. Linking twice is a no-op.
    async fn add_association(&self, photo_id: Uuid, article_id: Uuid) -> Result<()>;

    async fn remove_association(&self, photo_id: Uuid, article_id: Uuid) -> Result<()>;

    /// Photos associated with the article, in association order
    async fn list_photos_for_article(&self, article_id: Uuid) -> Result<Vec<Photo>>;

    /// Article numbers associated with the photo, in association order
    async fn list_articles_for_photo(&self, photo_id: Uuid) -> Result<Vec<ArticleNumber>>;
}

/// Binary storage for photo bytes
#[async_trait]
pub trait ObjectStore: Send + Sync {
    async fn put(&self, key: &str, bytes: &[u8]) -> Result<()>;

    /// `NotFound` when nothing is stored under `key`
    async fn get(&self, key: &str) -> Result<Vec<u8>>;

    /// Remove the object. Deleting a missing key succeeds.
    async fn delete(&self, key: &str) -> Result<()>;

    async fn exists(&self, key: &str) -> Result<bool>;
}
