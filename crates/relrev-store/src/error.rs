use crate::schema::Collection;

/// Errors from object store operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The write would push the store past its byte quota.
    #[error("quota exceeded writing to {collection}: need {needed} bytes, {available} available")]
    QuotaExceeded {
        collection: Collection,
        needed: u64,
        available: u64,
    },

    /// Another holder prevents the operation from proceeding.
    #[error("store blocked: {0}")]
    Blocked(String),

    /// The on-disk schema was written by a newer version.
    #[error("schema version conflict: expected at most {expected}, found {found}")]
    VersionConflict { expected: u32, found: u32 },

    /// The handle has not been opened, or has been closed.
    #[error("store is not open")]
    NotOpen,

    /// Scan requested on an index the collection does not declare.
    #[error("collection {collection} has no index named {index}")]
    UnknownIndex { collection: Collection, index: String },

    /// `add` was called on a collection without an auto-incrementing key.
    #[error("collection {0} does not generate keys")]
    NotAutoIncrement(Collection),

    /// Serialization or deserialization failure.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// A collection file exists but cannot be decoded.
    #[error("corrupt collection {collection}: {reason}")]
    Corrupt { collection: Collection, reason: String },

    /// I/O error from the underlying storage backend.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl StoreError {
    /// Whether this is a quota-class failure (insufficient space), as
    /// opposed to connectivity, permission, or integrity failures.
    pub fn is_quota(&self) -> bool {
        match self {
            Self::QuotaExceeded { .. } => true,
            Self::Io(e) => e.kind() == std::io::ErrorKind::StorageFull,
            _ => false,
        }
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(e: serde_json::Error) -> Self {
        Self::Serialization(e.to_string())
    }
}

/// Result alias for store operations.
pub type StoreResult<T> = Result<T, StoreError>;
