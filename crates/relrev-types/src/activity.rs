use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::TypeError;
use crate::identity::Actor;
use crate::item::ItemType;
use crate::time::Timestamp;

/// What happened to an item.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActivityType {
    Approved,
    Unapproved,
    Flagged,
    IssueResolved,
    IssueDeleted,
}

impl ActivityType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Approved => "approved",
            Self::Unapproved => "unapproved",
            Self::Flagged => "flagged",
            Self::IssueResolved => "issue_resolved",
            Self::IssueDeleted => "issue_deleted",
        }
    }
}

impl fmt::Display for ActivityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ActivityType {
    type Err = TypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "approved" => Ok(Self::Approved),
            "unapproved" => Ok(Self::Unapproved),
            "flagged" => Ok(Self::Flagged),
            "issue_resolved" => Ok(Self::IssueResolved),
            "issue_deleted" => Ok(Self::IssueDeleted),
            other => Err(TypeError::UnknownActivityType(other.to_string())),
        }
    }
}

/// An activity as submitted by a caller: no id, no timestamp yet.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewActivity {
    pub release_id: String,
    pub item_type: ItemType,
    pub item_id: String,
    pub item_name: String,
    pub activity_type: ActivityType,
    pub user_id: String,
    pub user_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl NewActivity {
    pub fn new(
        release_id: impl Into<String>,
        item_type: ItemType,
        item_id: impl Into<String>,
        item_name: impl Into<String>,
        activity_type: ActivityType,
        actor: &Actor,
    ) -> Self {
        Self {
            release_id: release_id.into(),
            item_type,
            item_id: item_id.into(),
            item_name: item_name.into(),
            activity_type,
            user_id: actor.user_id.clone(),
            user_name: actor.user_name.clone(),
            details: None,
        }
    }

    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }

    /// Attach the store-assigned id and timestamp.
    pub fn into_entry(self, id: u64, timestamp: Timestamp) -> ActivityEntry {
        ActivityEntry {
            id,
            timestamp,
            activity: self,
        }
    }
}

/// A stored, immutable audit event.
///
/// `id` is assigned by the store and increases monotonically; display
/// order is by `timestamp`, not by `id`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActivityEntry {
    pub id: u64,
    #[serde(flatten)]
    pub activity: NewActivity,
    pub timestamp: Timestamp,
}

impl ActivityEntry {
    pub fn release_id(&self) -> &str {
        &self.activity.release_id
    }

    pub fn user_id(&self) -> &str {
        &self.activity.user_id
    }

    pub fn activity_type(&self) -> ActivityType {
        self.activity.activity_type
    }
}

/// A user's share of the activity stream.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Contributor {
    pub user_id: String,
    pub user_name: String,
    pub activity_count: usize,
}
