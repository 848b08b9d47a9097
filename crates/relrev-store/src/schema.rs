use std::cmp::Ordering;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Version of the collection layout below. Bumped whenever a collection or
/// index is added.
pub const SCHEMA_VERSION: u32 = 1;

/// The named collections every store provides.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Collection {
    #[serde(rename = "releases")]
    Releases,
    #[serde(rename = "reviewed")]
    Reviewed,
    #[serde(rename = "issues")]
    Issues,
    #[serde(rename = "activityLog")]
    ActivityLog,
    #[serde(rename = "users")]
    Users,
}

impl Collection {
    pub const ALL: [Collection; 5] = [
        Collection::Releases,
        Collection::Reviewed,
        Collection::Issues,
        Collection::ActivityLog,
        Collection::Users,
    ];

    pub fn name(&self) -> &'static str {
        self.schema().name
    }

    pub fn schema(&self) -> &'static CollectionSchema {
        match self {
            Self::Releases => &RELEASES,
            Self::Reviewed => &REVIEWED,
            Self::Issues => &ISSUES,
            Self::ActivityLog => &ACTIVITY_LOG,
            Self::Users => &USERS,
        }
    }
}

impl fmt::Display for Collection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Static description of one collection.
#[derive(Debug)]
pub struct CollectionSchema {
    pub name: &'static str,
    /// Record field that mirrors the primary key, when records carry it.
    pub key_path: &'static str,
    pub auto_increment: bool,
    /// Record fields that support [`crate::ObjectStore::scan_by_index`].
    pub indexes: &'static [&'static str],
}

impl CollectionSchema {
    pub fn has_index(&self, index: &str) -> bool {
        self.indexes.contains(&index)
    }
}

static RELEASES: CollectionSchema = CollectionSchema {
    name: "releases",
    key_path: "id",
    auto_increment: false,
    indexes: &["compoundName", "createdAt"],
};

static REVIEWED: CollectionSchema = CollectionSchema {
    name: "reviewed",
    key_path: "key",
    auto_increment: false,
    indexes: &[],
};

static ISSUES: CollectionSchema = CollectionSchema {
    name: "issues",
    key_path: "key",
    auto_increment: false,
    indexes: &[],
};

static ACTIVITY_LOG: CollectionSchema = CollectionSchema {
    name: "activityLog",
    key_path: "id",
    auto_increment: true,
    indexes: &["releaseId", "timestamp"],
};

static USERS: CollectionSchema = CollectionSchema {
    name: "users",
    key_path: "key",
    auto_increment: false,
    indexes: &[],
};

/// Primary key of a record.
///
/// Keyed collections use text keys; the activity log uses generated
/// integers. Generated keys sort before text keys.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Key {
    Auto(u64),
    Text(String),
}

impl Key {
    pub fn as_auto(&self) -> Option<u64> {
        match self {
            Self::Auto(n) => Some(*n),
            Self::Text(_) => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            Self::Auto(_) => None,
        }
    }

    /// Approximate stored size, counted against the quota.
    pub(crate) fn byte_len(&self) -> u64 {
        match self {
            Self::Auto(_) => 8,
            Self::Text(s) => s.len() as u64,
        }
    }
}

impl PartialOrd for Key {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Key {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (Self::Auto(a), Self::Auto(b)) => a.cmp(b),
            (Self::Text(a), Self::Text(b)) => a.cmp(b),
            (Self::Auto(_), Self::Text(_)) => Ordering::Less,
            (Self::Text(_), Self::Auto(_)) => Ordering::Greater,
        }
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Auto(n) => write!(f, "#{n}"),
            Self::Text(s) => f.write_str(s),
        }
    }
}

impl From<&str> for Key {
    fn from(s: &str) -> Self {
        Self::Text(s.to_string())
    }
}

impl From<String> for Key {
    fn from(s: String) -> Self {
        Self::Text(s)
    }
}

impl From<u64> for Key {
    fn from(n: u64) -> Self {
        Self::Auto(n)
    }
}
