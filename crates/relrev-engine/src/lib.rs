//! Client-resident persistence engine for release review.
//!
//! Holds per-item review marks and bounded issue histories in memory,
//! partitioned by release and item type, and writes each partition back to
//! an [`relrev_store::ObjectStore`] as a whole. Mutations are visible
//! immediately; the write that makes them durable is returned as a
//! [`PendingWrite`] the caller may await or detach. When the store runs out
//! of space, partitions are written with progressively less detail rather
//! than not at all (see [`QuotaAwareWriter`]).
//!
//! [`Engine`] is the entry point; it owns the store handle and hands out the
//! per-partition managers, the activity log, the release repository and the
//! user directory, and performs whole-dataset export and import.

mod cache;
pub mod activity;
pub mod config;
pub mod engine;
pub mod error;
pub mod issues;
pub mod pending;
mod registry;
pub mod releases;
pub mod review;
pub mod snapshot;
pub mod users;
pub mod workflow;
pub mod writer;

#[cfg(test)]
mod testing;

pub use activity::{contributors, ActivityLog};
pub use config::{EngineConfig, DEFAULT_ISSUE_HISTORY_LIMIT};
pub use engine::Engine;
pub use error::{EngineError, EngineResult};
pub use issues::IssueTracker;
pub use pending::{Mutation, PendingWrite};
pub use releases::ReleaseRepository;
pub use review::ReviewStateManager;
pub use snapshot::{ImportPlan, ImportReport, Snapshot, SNAPSHOT_VERSION};
pub use users::{default_users, UserDirectory};
pub use workflow::{ReviewWorkflow, Step};
pub use writer::{PersistOutcome, QuotaAwareWriter};

// Re-export the types callers need to drive the engine.
pub use relrev_codec::Fidelity;
pub use relrev_store::{Database, StoreBackend};
pub use relrev_types::{
    ActivityEntry, ActivityType, Actor, Contributor, Issue, ItemType, NewActivity, PartitionKey, Release,
    ReviewMark, Timestamp, User,
};
