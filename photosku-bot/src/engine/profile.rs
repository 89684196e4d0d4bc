//! Profile refresh

use photosku_common::db::User;
use photosku_common::Result;
use tracing::{debug, error};

use super::Catalog;
use crate::transport::ExternalUser;

impl Catalog {
    /// Upsert the sender's profile and return the stored user.
    ///
    /// New users start `Idle`; an existing user's conversation state is left
    /// as it is.
    pub async fn refresh_profile(&self, sender: &ExternalUser) -> Result<User> {
        let user = self
            .entities
            .upsert_user(sender.external_id, &sender.profile)
            .await
            .map_err(|e| {
                error!(external_id = sender.external_id, error = %e, "Failed to refresh user profile");
                e
            })?;

        debug!(
            external_id = user.external_id,
            user_id = %user.id,
            state = %user.conversation_state,
            "Refreshed user profile"
        );
        Ok(user)
    }
}
