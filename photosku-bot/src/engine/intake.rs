//! Photo intake and cancellation cleanup

use photosku_common::db::{Photo, User};
use photosku_common::{Error, Result};
use tracing::{error, info, warn};

use super::Catalog;
use crate::transport::{MediaRef, PhotoSize};

/// Pick the attachment to store.
///
/// The largest rung of a photo size ladder wins (pixel area, then file size,
/// then the later position); without photo sizes the document is used.
pub fn select_media<'a>(
    sizes: &'a [PhotoSize],
    document: Option<&'a MediaRef>,
) -> Result<&'a MediaRef> {
    let largest = sizes
        .iter()
        .max_by_key(|size| (size.area(), size.media.file_size.unwrap_or(0)));

    largest
        .map(|size| &size.media)
        .or(document)
        .ok_or_else(|| Error::InvalidInput("message carries no photo or document".to_string()))
}

/// Outcome of discarding a user's pending uploads
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DiscardResult {
    pub deleted: usize,
    pub failed: usize,
}

impl Catalog {
    /// Store one uploaded photo as `Pending`.
    ///
    /// Bytes are fetched first, then the entity is created, then the bytes
    /// are written under the photo's storage key. A failed write triggers one
    /// attempt to delete the just-created entity. No retries.
    pub async fn intake(&self, user: &User, media: &MediaRef) -> Result<Photo> {
        let bytes = self.media.fetch(media).await.map_err(|e| {
            error!(user_id = %user.id, file_id = %media.file_id, error = %e, "Failed to fetch media");
            e
        })?;

        let photo = Photo::new_pending(user.id);
        self.entities.create_photo(&photo).await.map_err(|e| {
            error!(user_id = %user.id, photo_id = %photo.id, error = %e, "Failed to create photo");
            e
        })?;

        let key = photo.storage_key();
        if let Err(e) = self.objects.put(&key, &bytes).await {
            error!(user_id = %user.id, photo_id = %photo.id, key = %key, error = %e, "Failed to store photo bytes");
            if let Err(cleanup) = self.entities.delete_photo(photo.id).await {
                error!(photo_id = %photo.id, error = %cleanup, "Failed to remove photo after storage failure");
            }
            return Err(e);
        }

        info!(user_id = %user.id, photo_id = %photo.id, size = bytes.len(), "Photo stored as pending");
        Ok(photo)
    }

    /// Delete every pending photo of the user, bytes first.
    ///
    /// A photo whose bytes can't be deleted keeps its entity so no orphaned
    /// object is left behind; it is counted in `failed`.
    pub async fn discard_pending(&self, user: &User) -> Result<DiscardResult> {
        let pending = self.entities.list_pending_photos_for_user(user.id).await?;
        let mut result = DiscardResult::default();

        for photo in &pending {
            let key = photo.storage_key();
            if let Err(e) = self.objects.delete(&key).await {
                warn!(user_id = %user.id, photo_id = %photo.id, key = %key, error = %e, "Failed to delete photo bytes");
                result.failed += 1;
                continue;
            }

            match self.entities.delete_photo(photo.id).await {
                Ok(()) => result.deleted += 1,
                Err(e) => {
                    warn!(user_id = %user.id, photo_id = %photo.id, error = %e, "Failed to delete photo");
                    result.failed += 1;
                }
            }
        }

        info!(
            user_id = %user.id,
            deleted = result.deleted,
            failed = result.failed,
            "Discarded pending photos"
        );
        Ok(result)
    }
}
