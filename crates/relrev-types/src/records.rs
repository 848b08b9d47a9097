use serde::{Deserialize, Serialize};

use crate::identity::Actor;
use crate::time::Timestamp;

/// Attribution recorded on marks whose author predates attribution.
pub const UNKNOWN_USER_ID: &str = "unknown";
/// Display name paired with [`UNKNOWN_USER_ID`].
pub const UNKNOWN_USER_NAME: &str = "Unknown User";

/// Presence marker meaning an item has been reviewed/approved.
///
/// A partition holds at most one mark per item id; absence means pending.
/// Marks are only ever replaced whole, never partially updated.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewMark {
    pub item_id: String,
    pub user_id: String,
    pub user_name: String,
    pub timestamp: Timestamp,
}

impl ReviewMark {
    pub fn new(item_id: impl Into<String>, actor: &Actor, timestamp: Timestamp) -> Self {
        Self {
            item_id: item_id.into(),
            user_id: actor.user_id.clone(),
            user_name: actor.user_name.clone(),
            timestamp,
        }
    }

    /// A mark recovered from storage that only recorded the item id.
    pub fn unattributed(item_id: impl Into<String>, timestamp: Timestamp) -> Self {
        Self {
            item_id: item_id.into(),
            user_id: UNKNOWN_USER_ID.to_string(),
            user_name: UNKNOWN_USER_NAME.to_string(),
            timestamp,
        }
    }

    pub fn actor(&self) -> Actor {
        Actor::new(&self.user_id, &self.user_name)
    }
}

/// One flagged issue on an item.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Issue {
    pub id: String,
    pub text: String,
    pub file_name: Option<String>,
    pub file_size: Option<u64>,
    pub timestamp: Timestamp,
    pub user_id: String,
    pub user_name: String,
}

impl Issue {
    pub fn new(
        text: impl Into<String>,
        file_name: Option<String>,
        file_size: Option<u64>,
        actor: &Actor,
        timestamp: Timestamp,
    ) -> Self {
        let text = text.into();
        Self {
            id: Self::derive_id(&timestamp, &actor.user_id, &text),
            text,
            file_name,
            file_size,
            timestamp,
            user_id: actor.user_id.clone(),
            user_name: actor.user_name.clone(),
        }
    }

    /// Deterministic issue id.
    ///
    /// The compact wire form does not carry ids, so the id is a function of
    /// the fields that form does carry. Decoding a compact tuple therefore
    /// reproduces the id the issue had when it was created.
    pub fn derive_id(timestamp: &Timestamp, user_id: &str, text: &str) -> String {
        let mut hasher = blake3::Hasher::new();
        hasher.update(b"relrev-issue-v1:");
        hasher.update(&timestamp.as_millis().to_le_bytes());
        hasher.update(b":");
        hasher.update(user_id.as_bytes());
        hasher.update(b":");
        hasher.update(text.as_bytes());
        hex::encode(&hasher.finalize().as_bytes()[..8])
    }

    pub fn has_attachment(&self) -> bool {
        self.file_name.is_some() || self.file_size.is_some()
    }

    pub fn actor(&self) -> Actor {
        Actor::new(&self.user_id, &self.user_name)
    }
}
