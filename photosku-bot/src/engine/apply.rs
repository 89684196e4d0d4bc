//! Tag application

use photosku_common::db::{ApplyState, ConversationState, User};
use photosku_common::Result;
use std::collections::HashSet;
use tracing::{error, info, warn};

use super::Catalog;

/// `succeeded <= total` always holds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ApplyResult {
    pub succeeded: usize,
    pub total: usize,
    /// The user could not be moved back to `Idle` and is still `Uploading`
    pub state_reset_failed: bool,
}

impl ApplyResult {
    pub fn is_complete(&self) -> bool {
        self.succeeded == self.total
    }
}

impl Catalog {
    /// Tag every pending photo of the user with every token.
    ///
    /// Resolver failures abort before anything is touched and leave the
    /// conversation state alone. Otherwise the pending list is snapshotted and
    /// each photo handled independently: it counts as succeeded once its
    /// state is `Applied`; association failures are logged and skipped. The
    /// user ends up `Idle`; if that write fails the result says so in
    /// `state_reset_failed`.
    ///
    /// An empty token list is a no-op reporting `0/0`.
    pub async fn apply(&self, user: &User, tokens: &[String]) -> Result<ApplyResult> {
        if tokens.is_empty() {
            return Ok(ApplyResult::default());
        }

        let mut articles = self.resolve(tokens).await?;
        let mut seen = HashSet::new();
        articles.retain(|article| seen.insert(article.id));

        let pending = self.entities.list_pending_photos_for_user(user.id).await?;
        let mut result = ApplyResult {
            total: pending.len(),
            ..Default::default()
        };

        for photo in &pending {
            if let Err(e) = self
                .entities
                .set_photo_apply_state(photo.id, ApplyState::Applied)
                .await
            {
                error!(user_id = %user.id, photo_id = %photo.id, error = %e, "Failed to mark photo applied");
                continue;
            }
            result.succeeded += 1;

            for article in &articles {
                if let Err(e) = self.entities.add_association(photo.id, article.id).await {
                    warn!(
                        photo_id = %photo.id,
                        article = %article.number,
                        error = %e,
                        "Failed to associate photo with article"
                    );
                }
            }
        }

        if let Err(e) = self
            .entities
            .set_user_conversation_state(user.id, ConversationState::Idle)
            .await
        {
            error!(user_id = %user.id, error = %e, "Failed to reset conversation state after apply");
            result.state_reset_failed = true;
        }

        info!(
            user_id = %user.id,
            succeeded = result.succeeded,
            total = result.total,
            articles = articles.len(),
            "Applied article numbers"
        );
        Ok(result)
    }
}
