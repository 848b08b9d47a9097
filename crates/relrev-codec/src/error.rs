use thiserror::Error;

use crate::shape::WireShape;

#[derive(Debug, Error)]
pub enum CodecError {
    #[error("payload is not an array (found {0})")]
    NotAnArray(&'static str),

    #[error("{family} partitions cannot be stored as {shape}")]
    UnsupportedShape { family: &'static str, shape: WireShape },

    #[error("unrecognized first element: {0}")]
    UnrecognizedShape(String),

    #[error("malformed entry {index}: {reason}")]
    MalformedEntry { index: usize, reason: String },
}

impl CodecError {
    pub(crate) fn entry(index: usize, reason: impl Into<String>) -> Self {
        Self::MalformedEntry {
            index,
            reason: reason.into(),
        }
    }
}

pub type CodecResult<T> = Result<T, CodecError>;
