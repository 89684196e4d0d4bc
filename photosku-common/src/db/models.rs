//! Database models

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Opaque numeric chat identity supplied by the transport
pub type ExternalId = i64;

/// Per-user conversational mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConversationState {
    #[default]
    Idle,
    Uploading,
    Searching,
}

impl ConversationState {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConversationState::Idle => "idle",
            ConversationState::Uploading => "uploading",
            ConversationState::Searching => "searching",
        }
    }
}

impl fmt::Display for ConversationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ConversationState {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "idle" => Ok(ConversationState::Idle),
            "uploading" => Ok(ConversationState::Uploading),
            "searching" => Ok(ConversationState::Searching),
            other => Err(Error::InvalidInput(format!(
                "unknown conversation state '{}'",
                other
            ))),
        }
    }
}

/// Photo lifecycle: uploaded but untagged, or tagged at least once
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ApplyState {
    Pending,
    Applied,
}

impl ApplyState {
    pub fn as_str(&self) -> &'static str {
        match self {
            ApplyState::Pending => "pending",
            ApplyState::Applied => "applied",
        }
    }
}

impl fmt::Display for ApplyState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ApplyState {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "pending" => Ok(ApplyState::Pending),
            "applied" => Ok(ApplyState::Applied),
            other => Err(Error::InvalidInput(format!("unknown apply state '{}'", other))),
        }
    }
}

/// Profile fields refreshed from every inbound message
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserProfile {
    pub username: String,
    pub first_name: String,
    pub last_name: String,
    pub language_code: String,
    pub is_bot: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    pub external_id: ExternalId,
    pub profile: UserProfile,
    pub conversation_state: ConversationState,
}

impl User {
    /// New user in the initial `Idle` state
    pub fn new(external_id: ExternalId, profile: UserProfile) -> Self {
        Self {
            id: Uuid::new_v4(),
            external_id,
            profile,
            conversation_state: ConversationState::Idle,
        }
    }
}

/// Typed partial update for a user row; `None` fields are left untouched
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UserUpdate {
    pub profile: Option<UserProfile>,
    pub conversation_state: Option<ConversationState>,
}

impl UserUpdate {
    pub fn state(state: ConversationState) -> Self {
        Self {
            conversation_state: Some(state),
            ..Default::default()
        }
    }

    pub fn profile(profile: UserProfile) -> Self {
        Self {
            profile: Some(profile),
            ..Default::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.profile.is_none() && self.conversation_state.is_none()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Photo {
    pub id: Uuid,
    pub owner_id: Uuid,
    pub object_key: Uuid,
    pub apply_state: ApplyState,
}

impl Photo {
    /// Fresh pending photo with a newly generated object key
    pub fn new_pending(owner_id: Uuid) -> Self {
        Self {
            id: Uuid::new_v4(),
            owner_id,
            object_key: Uuid::new_v4(),
            apply_state: ApplyState::Pending,
        }
    }

    /// Object Store key holding this photo's bytes
    pub fn storage_key(&self) -> String {
        object_key_path(self.owner_id, self.object_key)
    }

    /// File name used when the photo is delivered back to a chat
    pub fn file_name(&self) -> String {
        format!("{}.jpg", self.object_key)
    }
}

/// Typed partial update for a photo row
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PhotoUpdate {
    pub apply_state: Option<ApplyState>,
}

impl PhotoUpdate {
    pub fn apply_state(state: ApplyState) -> Self {
        Self {
            apply_state: Some(state),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ArticleNumber {
    pub id: Uuid,
    pub number: String,
}

impl ArticleNumber {
    pub fn new(number: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            number: number.into(),
        }
    }
}

/// Object Store key for a photo: `"{owner_id}/{object_key}.jpg"`
///
/// Intake, cancellation cleanup and search all derive keys through here.
pub fn object_key_path(owner_id: Uuid, object_key: Uuid) -> String {
    format!("{}/{}.jpg", owner_id, object_key)
}
