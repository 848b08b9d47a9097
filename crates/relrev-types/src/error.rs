use thiserror::Error;

/// Errors produced by type operations.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TypeError {
    #[error("invalid timestamp: {0}")]
    InvalidTimestamp(String),

    #[error("unknown item type: {0}")]
    UnknownItemType(String),

    #[error("unknown activity type: {0}")]
    UnknownActivityType(String),

    #[error("invalid partition key: {0}")]
    InvalidPartitionKey(String),
}
