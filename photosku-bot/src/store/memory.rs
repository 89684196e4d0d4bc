//! In-memory stores
//!
//! Used by `--memory` mode and as the base of test doubles. Every operation
//! takes a single `std::sync::Mutex` for its whole duration, which gives the
//! same single-write atomicity as the SQLite store. The lock is never held
//! across an `.await`.

use async_trait::async_trait;
use photosku_common::db::{
    ApplyState, ArticleNumber, ExternalId, Photo, PhotoUpdate, User, UserProfile, UserUpdate,
};
use photosku_common::{Error, Result};
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};
use uuid::Uuid;

use super::{EntityStore, ObjectStore};

#[derive(Debug, Clone, Copy)]
struct Association {
    seq: u64,
    photo_id: Uuid,
    article_id: Uuid,
}

#[derive(Debug, Default)]
struct Tables {
    users: Vec<User>,
    /// Insertion order doubles as creation order
    photos: Vec<Photo>,
    articles: Vec<ArticleNumber>,
    associations: Vec<Association>,
    next_seq: u64,
}

impl Tables {
    fn photo(&self, photo_id: Uuid) -> Option<&Photo> {
        self.photos.iter().find(|p| p.id == photo_id)
    }

    fn article(&self, article_id: Uuid) -> Option<&ArticleNumber> {
        self.articles.iter().find(|a| a.id == article_id)
    }
}

#[derive(Debug, Default)]
pub struct MemoryEntityStore {
    tables: Mutex<Tables>,
}

impl MemoryEntityStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, Tables>> {
        self.tables
            .lock()
            .map_err(|_| Error::Internal("entity store lock poisoned".to_string()))
    }

    /// Every photo regardless of owner or state
    pub fn all_photos(&self) -> Result<Vec<Photo>> {
        Ok(self.lock()?.photos.clone())
    }
}

#[async_trait]
impl EntityStore for MemoryEntityStore {
    async fn get_user_by_external_id(&self, external_id: ExternalId) -> Result<Option<User>> {
        let tables = self.lock()?;
        Ok(tables
            .users
            .iter()
            .find(|u| u.external_id == external_id)
            .cloned())
    }

    async fn upsert_user(&self, external_id: ExternalId, profile: &UserProfile) -> Result<User> {
        let mut tables = self.lock()?;
        if let Some(user) = tables.users.iter_mut().find(|u| u.external_id == external_id) {
            user.profile = profile.clone();
            return Ok(user.clone());
        }

        let user = User::new(external_id, profile.clone());
        tables.users.push(user.clone());
        Ok(user)
    }

    async fn update_user(&self, user_id: Uuid, update: UserUpdate) -> Result<()> {
        let mut tables = self.lock()?;
        let user = tables
            .users
            .iter_mut()
            .find(|u| u.id == user_id)
            .ok_or_else(|| Error::NotFound(format!("user {}", user_id)))?;

        if let Some(profile) = update.profile {
            user.profile = profile;
        }
        if let Some(state) = update.conversation_state {
            user.conversation_state = state;
        }
        Ok(())
    }

    async fn create_photo(&self, photo: &Photo) -> Result<()> {
        let mut tables = self.lock()?;
        if !tables.users.iter().any(|u| u.id == photo.owner_id) {
            return Err(Error::NotFound(format!("owner {} of photo {}", photo.owner_id, photo.id)));
        }
        if tables
            .photos
            .iter()
            .any(|p| p.id == photo.id || p.object_key == photo.object_key)
        {
            return Err(Error::InvalidInput(format!("photo {} already exists", photo.id)));
        }
        tables.photos.push(photo.clone());
        Ok(())
    }

    async fn update_photo(&self, photo_id: Uuid, update: PhotoUpdate) -> Result<()> {
        let mut tables = self.lock()?;
        let photo = tables
            .photos
            .iter_mut()
            .find(|p| p.id == photo_id)
            .ok_or_else(|| Error::NotFound(format!("photo {}", photo_id)))?;

        if let Some(state) = update.apply_state {
            photo.apply_state = state;
        }
        Ok(())
    }

    async fn list_pending_photos_for_user(&self, owner_id: Uuid) -> Result<Vec<Photo>> {
        let tables = self.lock()?;
        Ok(tables
            .photos
            .iter()
            .filter(|p| p.owner_id == owner_id && p.apply_state == ApplyState::Pending)
            .cloned()
            .collect())
    }

    async fn delete_photo(&self, photo_id: Uuid) -> Result<()> {
        let mut tables = self.lock()?;
        tables.photos.retain(|p| p.id != photo_id);
        tables.associations.retain(|a| a.photo_id != photo_id);
        Ok(())
    }

    async fn get_photo(&self, photo_id: Uuid) -> Result<Option<Photo>> {
        Ok(self.lock()?.photo(photo_id).cloned())
    }

    async fn get_article_by_name(&self, number: &str) -> Result<Option<ArticleNumber>> {
        let tables = self.lock()?;
        Ok(tables.articles.iter().find(|a| a.number == number).cloned())
    }

    async fn create_article(&self, number: &str) -> Result<ArticleNumber> {
        let mut tables = self.lock()?;
        if tables.articles.iter().any(|a| a.number == number) {
            return Err(Error::InvalidInput(format!(
                "article number '{}' already exists",
                number
            )));
        }
        let article = ArticleNumber::new(number);
        tables.articles.push(article.clone());
        Ok(article)
    }

    async fn add_association(&self, photo_id: Uuid, article_id: Uuid) -> Result<()> {
        let mut tables = self.lock()?;
        if tables.photo(photo_id).is_none() {
            return Err(Error::NotFound(format!("photo {}", photo_id)));
        }
        if tables.article(article_id).is_none() {
            return Err(Error::NotFound(format!("article {}", article_id)));
        }
        if tables
            .associations
            .iter()
            .any(|a| a.photo_id == photo_id && a.article_id == article_id)
        {
            return Ok(());
        }

        tables.next_seq += 1;
        let seq = tables.next_seq;
        tables.associations.push(Association {
            seq,
            photo_id,
            article_id,
        });
        Ok(())
    }

    async fn remove_association(&self, photo_id: Uuid, article_id: Uuid) -> Result<()> {
        let mut tables = self.lock()?;
        tables
            .associations
            .retain(|a| !(a.photo_id == photo_id && a.article_id == article_id));
        Ok(())
    }

    async fn list_photos_for_article(&self, article_id: Uuid) -> Result<Vec<Photo>> {
        let tables = self.lock()?;
        let mut links: Vec<&Association> = tables
            .associations
            .iter()
            .filter(|a| a.article_id == article_id)
            .collect();
        links.sort_by_key(|a| a.seq);

        Ok(links
            .into_iter()
            .filter_map(|a| tables.photo(a.photo_id).cloned())
            .collect())
    }

    async fn list_articles_for_photo(&self, photo_id: Uuid) -> Result<Vec<ArticleNumber>> {
        let tables = self.lock()?;
        let mut links: Vec<&Association> = tables
            .associations
            .iter()
            .filter(|a| a.photo_id == photo_id)
            .collect();
        links.sort_by_key(|a| a.seq);

        Ok(links
            .into_iter()
            .filter_map(|a| tables.article(a.article_id).cloned())
            .collect())
    }
}

/// Object store backed by a `HashMap`
#[derive(Debug, Default)]
pub struct MemoryObjectStore {
    objects: Mutex<HashMap<String, Vec<u8>>>,
}

impl MemoryObjectStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, HashMap<String, Vec<u8>>>> {
        self.objects
            .lock()
            .map_err(|_| Error::Internal("object store lock poisoned".to_string()))
    }

    /// Stored keys, sorted
    pub fn keys(&self) -> Result<Vec<String>> {
        let mut keys: Vec<String> = self.lock()?.keys().cloned().collect();
        keys.sort();
        Ok(keys)
    }
}

#[async_trait]
impl ObjectStore for MemoryObjectStore {
    async fn put(&self, key: &str, bytes: &[u8]) -> Result<()> {
        self.lock()?.insert(key.to_string(), bytes.to_vec());
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Vec<u8>> {
        self.lock()?
            .get(key)
            .cloned()
            .ok_or_else(|| Error::NotFound(format!("object {}", key)))
    }

    async fn delete(&self, key: &str) -> Result<()> {
        self.lock()?.remove(key);
        Ok(())
    }

    async fn exists(&self, key: &str) -> Result<bool> {
        Ok(self.lock()?.contains_key(key))
    }
}
