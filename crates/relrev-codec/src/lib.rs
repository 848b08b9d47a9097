//! Compact wire encoding for relrev partitions.
//!
//! A partition (every review mark, or every issue list, for one release and
//! item type) is stored as a single JSON value. This crate turns the
//! in-memory [`Partition`] into the smallest safe representation and back,
//! and reads the two older shapes earlier versions wrote:
//!
//! - [`WireShape::CompactTuples`] -- current form, written by [`PartitionCodec::encode`]
//! - [`WireShape::FullObjects`] -- `[itemId, {..record..}]` pairs
//! - [`WireShape::LegacyFlatIds`] -- bare reviewed item ids, no attribution
//!
//! Decoding is pure and never writes back; the next ordinary save upgrades
//! the stored form. [`PartitionCodec::decode`] is fail-open: anything it
//! cannot read becomes an empty partition. [`PartitionCodec::try_decode`]
//! reports the reason instead.

pub mod error;
pub mod fidelity;
pub mod issues;
pub mod marks;
pub mod partition;
pub mod shape;

pub use error::{CodecError, CodecResult};
pub use fidelity::{Fidelity, DEFAULT_TRUNCATED_TEXT_LEN};
pub use issues::IssueCodec;
pub use marks::MarkCodec;
pub use partition::{Partition, PartitionCodec};
pub use shape::{detect_issues, detect_marks, WireShape};
