//! Foundation types for relrev.
//!
//! This crate provides the data model shared by every other relrev crate:
//! the records that the persistence engine stores, the composite keys that
//! partition them, and the timestamp type used on the wire.
//!
//! # Key Types
//!
//! - [`Release`] -- a release under review, with its payment plans and unit designs
//! - [`ReviewMark`] -- presence marker meaning "reviewed/approved", with attribution
//! - [`Issue`] -- a flagged issue on an item, with optional attachment metadata
//! - [`ActivityEntry`] -- one append-only audit event
//! - [`PartitionKey`] -- composite `reviewed-<release>-<itemType>` / `issues-...` key
//! - [`Timestamp`] -- millisecond-precision UTC instant, ISO-8601 on the wire

pub mod activity;
pub mod error;
pub mod identity;
pub mod item;
pub mod records;
pub mod release;
pub mod time;

pub use activity::{ActivityEntry, ActivityType, Contributor, NewActivity};
pub use error::TypeError;
pub use identity::{Actor, User};
pub use item::{ItemType, PartitionFamily, PartitionKey};
pub use records::{Issue, ReviewMark, UNKNOWN_USER_ID, UNKNOWN_USER_NAME};
pub use release::{PaymentPlan, Release, Unit, UnitDesign, UnitDesignMedia};
pub use time::Timestamp;
