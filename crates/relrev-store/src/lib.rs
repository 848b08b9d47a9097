//! Per-device object storage for relrev.
//!
//! This crate is the persistence substrate underneath the review engine: a
//! small set of named collections, each a key/value table of JSON records,
//! with an auto-incrementing collection for the activity stream and
//! secondary-index scans over declared record fields.
//!
//! # Collections
//!
//! - [`Collection::Releases`] -- release records keyed by `id`
//! - [`Collection::Reviewed`] -- review-mark partitions keyed by composite key
//! - [`Collection::Issues`] -- issue partitions keyed by composite key
//! - [`Collection::ActivityLog`] -- auto-keyed audit entries, indexed by
//!   `releaseId` and `timestamp`
//! - [`Collection::Users`] -- the user list and the current-user pointer
//!
//! # Storage Backends
//!
//! All backends implement the [`ObjectStore`] trait:
//!
//! - [`InMemoryObjectStore`] -- map-backed store for tests and embedding
//! - [`DirectoryObjectStore`] -- one JSON file per collection, replaced atomically,
//!   plus an append journal for the activity stream
//!
//! Both accept an optional byte quota; a write that would exceed it fails
//! with [`StoreError::QuotaExceeded`] and leaves the store unchanged.
//! [`Database`] owns the lifecycle of one live handle.

pub mod backend;
pub mod database;
pub mod directory;
pub mod error;
mod journal;
pub mod memory;
pub mod schema;
mod tables;
pub mod traits;

// Re-export primary types at crate root for ergonomic imports.
pub use backend::StoreBackend;
pub use database::Database;
pub use directory::DirectoryObjectStore;
pub use error::{StoreError, StoreResult};
pub use memory::InMemoryObjectStore;
pub use schema::{Collection, CollectionSchema, Key, SCHEMA_VERSION};
pub use traits::ObjectStore;
