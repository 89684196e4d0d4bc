//! Test doubles
//!
//! - `FaultyEntityStore` / `FaultyObjectStore`: in-memory stores with
//!   switchable failures
//! - `StaticMediaSource`: deterministic attachment bytes
//! - `RecordingOutbound`: captures every delivered reply

use async_trait::async_trait;
use photosku_bot::store::{EntityStore, MemoryEntityStore, MemoryObjectStore, ObjectStore};
use photosku_bot::transport::{Keyboard, MediaRef, MediaSource, Outbound};
use photosku_common::db::{
    ArticleNumber, ExternalId, Photo, PhotoUpdate, User, UserProfile, UserUpdate,
};
use photosku_common::{Error, Result};
use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;
use uuid::Uuid;

fn injected(what: &str) -> Error {
    Error::Database(sqlx::Error::Protocol(format!("injected {} failure", what)))
}

// =============================================================================
// Entity store
// =============================================================================

#[derive(Debug, Default)]
pub struct EntityFaults {
    /// 1-based `update_photo` call numbers that fail
    pub fail_photo_update_calls: Vec<usize>,
    pub fail_upsert_user: bool,
    pub fail_update_user: bool,
    pub fail_create_photo: bool,
    pub fail_delete_photo: bool,
    pub fail_list_pending: bool,
    /// Token whose `create_article` fails
    pub fail_create_article: Option<String>,
    /// Token whose `get_article_by_name` fails
    pub fail_article_lookup: Option<String>,
    pub fail_list_photos_for_article: bool,
    pub fail_add_association: bool,
    /// Right after the next pending listing, create a new pending photo for
    /// the listed owner (an upload racing an in-flight apply)
    pub upload_after_next_pending_list: bool,
}

#[derive(Debug, Default)]
pub struct FaultyEntityStore {
    inner: MemoryEntityStore,
    faults: Mutex<EntityFaults>,
    photo_updates: AtomicUsize,
    racing_uploads: Mutex<Vec<Photo>>,
}

impl FaultyEntityStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn faults(&self) -> MutexGuard<'_, EntityFaults> {
        self.faults.lock().unwrap()
    }

    /// Photos created by `upload_after_next_pending_list`
    pub fn racing_uploads(&self) -> Vec<Photo> {
        self.racing_uploads.lock().unwrap().clone()
    }

    pub fn all_photos(&self) -> Vec<Photo> {
        self.inner.all_photos().unwrap()
    }
}

#[async_trait]
impl EntityStore for FaultyEntityStore {
    async fn get_user_by_external_id(&self, external_id: ExternalId) -> Result<Option<User>> {
        self.inner.get_user_by_external_id(external_id).await
    }

    async fn upsert_user(&self, external_id: ExternalId, profile: &UserProfile) -> Result<User> {
        if self.faults().fail_upsert_user {
            return Err(injected("upsert_user"));
        }
        self.inner.upsert_user(external_id, profile).await
    }

    async fn update_user(&self, user_id: Uuid, update: UserUpdate) -> Result<()> {
        if self.faults().fail_update_user {
            return Err(injected("update_user"));
        }
        self.inner.update_user(user_id, update).await
    }

    async fn create_photo(&self, photo: &Photo) -> Result<()> {
        if self.faults().fail_create_photo {
            return Err(injected("create_photo"));
        }
        self.inner.create_photo(photo).await
    }

    async fn update_photo(&self, photo_id: Uuid, update: PhotoUpdate) -> Result<()> {
        let call = self.photo_updates.fetch_add(1, Ordering::SeqCst) + 1;
        if self.faults().fail_photo_update_calls.contains(&call) {
            return Err(injected("update_photo"));
        }
        self.inner.update_photo(photo_id, update).await
    }

    async fn list_pending_photos_for_user(&self, owner_id: Uuid) -> Result<Vec<Photo>> {
        if self.faults().fail_list_pending {
            return Err(injected("list_pending_photos_for_user"));
        }
        let snapshot = self.inner.list_pending_photos_for_user(owner_id).await?;

        let race = std::mem::take(&mut self.faults().upload_after_next_pending_list);
        if race {
            let photo = Photo::new_pending(owner_id);
            self.inner.create_photo(&photo).await?;
            self.racing_uploads.lock().unwrap().push(photo);
        }
        Ok(snapshot)
    }

    async fn delete_photo(&self, photo_id: Uuid) -> Result<()> {
        if self.faults().fail_delete_photo {
            return Err(injected("delete_photo"));
        }
        self.inner.delete_photo(photo_id).await
    }

    async fn get_photo(&self, photo_id: Uuid) -> Result<Option<Photo>> {
        self.inner.get_photo(photo_id).await
    }

    async fn get_article_by_name(&self, number: &str) -> Result<Option<ArticleNumber>> {
        if self.faults().fail_article_lookup.as_deref() == Some(number) {
            return Err(injected("get_article_by_name"));
        }
        self.inner.get_article_by_name(number).await
    }

    async fn create_article(&self, number: &str) -> Result<ArticleNumber> {
        if self.faults().fail_create_article.as_deref() == Some(number) {
            return Err(injected("create_article"));
        }
        self.inner.create_article(number).await
    }

    async fn add_association(&self, photo_id: Uuid, article_id: Uuid) -> Result<()> {
        if self.faults().fail_add_association {
            return Err(injected("add_association"));
        }
        self.inner.add_association(photo_id, article_id).await
    }

    async fn remove_association(&self, photo_id: Uuid, article_id: Uuid) -> Result<()> {
        self.inner.remove_association(photo_id, article_id).await
    }

    async fn list_photos_for_article(&self, article_id: Uuid) -> Result<Vec<Photo>> {
        if self.faults().fail_list_photos_for_article {
            return Err(injected("list_photos_for_article"));
        }
        self.inner.list_photos_for_article(article_id).await
    }

    async fn list_articles_for_photo(&self, photo_id: Uuid) -> Result<Vec<ArticleNumber>> {
        self.inner.list_articles_for_photo(photo_id).await
    }
}

// =============================================================================
// Object store
// =============================================================================

#[derive(Debug, Default)]
pub struct ObjectFaults {
    pub fail_put: bool,
    pub fail_delete: bool,
    pub fail_get_keys: HashSet<String>,
}

#[derive(Debug, Default)]
pub struct FaultyObjectStore {
    inner: MemoryObjectStore,
    faults: Mutex<ObjectFaults>,
}

impl FaultyObjectStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn faults(&self) -> MutexGuard<'_, ObjectFaults> {
        self.faults.lock().unwrap()
    }

    pub fn keys(&self) -> Vec<String> {
        self.inner.keys().unwrap()
    }
}

#[async_trait]
impl ObjectStore for FaultyObjectStore {
    async fn put(&self, key: &str, bytes: &[u8]) -> Result<()> {
        if self.faults().fail_put {
            return Err(Error::ObjectStore(format!("injected put failure for {}", key)));
        }
        self.inner.put(key, bytes).await
    }

    async fn get(&self, key: &str) -> Result<Vec<u8>> {
        if self.faults().fail_get_keys.contains(key) {
            return Err(Error::ObjectStore(format!("injected get failure for {}", key)));
        }
        self.inner.get(key).await
    }

    async fn delete(&self, key: &str) -> Result<()> {
        if self.faults().fail_delete {
            return Err(Error::ObjectStore(format!("injected delete failure for {}", key)));
        }
        self.inner.delete(key).await
    }

    async fn exists(&self, key: &str) -> Result<bool> {
        self.inner.exists(key).await
    }
}

// =============================================================================
// Media source
// =============================================================================

/// Returns `b"bytes-of-<file_id>"`; file ids in `unavailable` fail
#[derive(Debug, Default)]
pub struct StaticMediaSource {
    unavailable: Mutex<HashSet<String>>,
    fetched: Mutex<Vec<String>>,
}

impl StaticMediaSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn bytes_for(file_id: &str) -> Vec<u8> {
        format!("bytes-of-{}", file_id).into_bytes()
    }

    pub fn make_unavailable(&self, file_id: &str) {
        self.unavailable.lock().unwrap().insert(file_id.to_string());
    }

    pub fn fetched(&self) -> Vec<String> {
        self.fetched.lock().unwrap().clone()
    }
}

#[async_trait]
impl MediaSource for StaticMediaSource {
    async fn fetch(&self, media: &MediaRef) -> Result<Vec<u8>> {
        self.fetched.lock().unwrap().push(media.file_id.clone());
        if self.unavailable.lock().unwrap().contains(&media.file_id) {
            return Err(Error::Transport(format!("file {} unavailable", media.file_id)));
        }
        Ok(Self::bytes_for(&media.file_id))
    }
}

// =============================================================================
// Outbound
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Sent {
    Text {
        external_id: ExternalId,
        text: String,
        keyboard: Option<Keyboard>,
    },
    Media {
        external_id: ExternalId,
        file_name: String,
        caption: String,
        bytes: Vec<u8>,
    },
}

impl Sent {
    pub fn external_id(&self) -> ExternalId {
        match self {
            Sent::Text { external_id, .. } | Sent::Media { external_id, .. } => *external_id,
        }
    }

    pub fn text(&self) -> Option<&str> {
        match self {
            Sent::Text { text, .. } => Some(text),
            Sent::Media { .. } => None,
        }
    }
}

#[derive(Debug, Default)]
pub struct RecordingOutbound {
    sent: Mutex<Vec<Sent>>,
}

impl RecordingOutbound {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sent(&self) -> Vec<Sent> {
        self.sent.lock().unwrap().clone()
    }

    pub fn texts_for(&self, external_id: ExternalId) -> Vec<String> {
        self.sent()
            .iter()
            .filter(|s| s.external_id() == external_id)
            .filter_map(|s| s.text().map(str::to_string))
            .collect()
    }

    /// Poll until at least `count` replies were recorded, or panic after `timeout`
    pub async fn wait_for(&self, count: usize, timeout: Duration) -> Vec<Sent> {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            let sent = self.sent();
            if sent.len() >= count {
                return sent;
            }
            if tokio::time::Instant::now() >= deadline {
                panic!("expected {} replies, got {}: {:?}", count, sent.len(), sent);
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    }
}

#[async_trait]
impl Outbound for RecordingOutbound {
    async fn send_text(
        &self,
        external_id: ExternalId,
        text: &str,
        keyboard: Option<&Keyboard>,
    ) -> Result<()> {
        self.sent.lock().unwrap().push(Sent::Text {
            external_id,
            text: text.to_string(),
            keyboard: keyboard.cloned(),
        });
        Ok(())
    }

    async fn send_media(
        &self,
        external_id: ExternalId,
        bytes: Vec<u8>,
        file_name: &str,
        caption: &str,
    ) -> Result<()> {
        self.sent.lock().unwrap().push(Sent::Media {
            external_id,
            file_name: file_name.to_string(),
            caption: caption.to_string(),
            bytes,
        });
        Ok(())
    }
}
