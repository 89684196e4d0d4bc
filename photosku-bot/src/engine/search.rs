//! Search by article number
//!
//! Lookup-only: unknown tokens are reported, never created. Only `Applied`
//! photos are returned, each physical photo (object key) at most once, in the
//! order first seen. Search spans every user's photos.

use std::collections::HashSet;
use tracing::{error, info, warn};
use uuid::Uuid;

use photosku_common::db::ApplyState;

use super::Catalog;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchHit {
    pub photo_id: Uuid,
    pub object_key: Uuid,
    pub file_name: String,
    pub bytes: Vec<u8>,
    /// All of the photo's article numbers in association order, `", "`-joined
    pub caption: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SearchOutcome {
    pub hits: Vec<SearchHit>,
    /// Tokens with no matching article number
    pub not_found: Vec<String>,
    /// Tokens whose article number has no applied photos
    pub without_photos: Vec<String>,
    /// Tokens whose lookup failed in the entity store
    pub lookup_failed: Vec<String>,
}

impl Catalog {
    pub async fn search(&self, tokens: &[String]) -> SearchOutcome {
        let mut outcome = SearchOutcome::default();
        let mut delivered: HashSet<Uuid> = HashSet::new();

        for token in tokens {
            let article = match self.lookup(token).await {
                Ok(Some(article)) => article,
                Ok(None) => {
                    outcome.not_found.push(token.clone());
                    continue;
                }
                Err(e) => {
                    error!(token = %token, error = %e, "Article lookup failed");
                    outcome.lookup_failed.push(token.clone());
                    continue;
                }
            };

            let photos = match self.entities.list_photos_for_article(article.id).await {
                Ok(photos) => photos,
                Err(e) => {
                    error!(article = %article.number, error = %e, "Failed to list photos for article");
                    Vec::new()
                }
            };

            let applied: Vec<_> = photos
                .into_iter()
                .filter(|photo| photo.apply_state == ApplyState::Applied)
                .collect();
            if applied.is_empty() {
                outcome.without_photos.push(token.clone());
                continue;
            }

            for photo in applied {
                if !delivered.insert(photo.object_key) {
                    continue;
                }

                let articles = match self.entities.list_articles_for_photo(photo.id).await {
                    Ok(articles) => articles,
                    Err(e) => {
                        error!(photo_id = %photo.id, error = %e, "Failed to list articles for photo");
                        continue;
                    }
                };
                if articles.is_empty() {
                    warn!(photo_id = %photo.id, "Applied photo has no article numbers, skipping");
                    continue;
                }
                let caption = articles
                    .iter()
                    .map(|article| article.number.as_str())
                    .collect::<Vec<_>>()
                    .join(", ");

                let key = photo.storage_key();
                let bytes = match self.objects.get(&key).await {
                    Ok(bytes) => bytes,
                    Err(e) => {
                        error!(photo_id = %photo.id, key = %key, error = %e, "Failed to fetch photo bytes");
                        continue;
                    }
                };

                outcome.hits.push(SearchHit {
                    photo_id: photo.id,
                    object_key: photo.object_key,
                    file_name: photo.file_name(),
                    bytes,
                    caption,
                });
            }
        }

        info!(
            tokens = tokens.len(),
            hits = outcome.hits.len(),
            not_found = outcome.not_found.len(),
            "Search completed"
        );
        outcome
    }
}
