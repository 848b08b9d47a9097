use thiserror::Error;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("store error: {0}")]
    Store(#[from] relrev_store::StoreError),

    #[error("codec error: {0}")]
    Codec(#[from] relrev_codec::CodecError),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("invalid snapshot: {0}")]
    InvalidSnapshot(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("persistence task failed: {0}")]
    Task(String),
}

impl EngineError {
    /// Whether the root cause is the store running out of space.
    pub fn is_quota(&self) -> bool {
        matches!(self, Self::Store(e) if e.is_quota())
    }
}

pub type EngineResult<T> = Result<T, EngineError>;
