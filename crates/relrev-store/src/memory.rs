use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;
use serde_json::Value;

use crate::error::{StoreError, StoreResult};
use crate::schema::{Collection, Key};
use crate::tables::Tables;
use crate::traits::ObjectStore;

/// In-memory object store.
///
/// Intended for tests and embedding. All collections are held in memory
/// behind a `RwLock`; records are cloned on read and write. An optional byte
/// quota makes it usable for exercising out-of-space behaviour.
pub struct InMemoryObjectStore {
    tables: RwLock<Tables>,
}

impl InMemoryObjectStore {
    /// Create a new empty store with no quota.
    pub fn new() -> Self {
        Self::with_quota(None)
    }

    /// Create a new empty store that refuses writes past `quota` bytes.
    pub fn with_quota(quota: Option<u64>) -> Self {
        Self {
            tables: RwLock::new(Tables::new(quota)),
        }
    }

    /// Bytes currently counted against the quota.
    pub fn bytes_used(&self) -> u64 {
        self.read().map(|t| t.bytes_used()).unwrap_or(0)
    }

    /// Number of records in one collection.
    pub fn len(&self, collection: Collection) -> usize {
        self.read()
            .map(|t| t.table(collection).len())
            .unwrap_or(0)
    }

    /// Returns `true` if the collection holds no records.
    pub fn is_empty(&self, collection: Collection) -> bool {
        self.len(collection) == 0
    }

    fn read(&self) -> StoreResult<RwLockReadGuard<'_, Tables>> {
        self.tables
            .read()
            .map_err(|_| StoreError::Blocked("store lock poisoned".into()))
    }

    fn write(&self) -> StoreResult<RwLockWriteGuard<'_, Tables>> {
        self.tables
            .write()
            .map_err(|_| StoreError::Blocked("store lock poisoned".into()))
    }
}

impl Default for InMemoryObjectStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ObjectStore for InMemoryObjectStore {
    async fn get(&self, collection: Collection, key: &Key) -> StoreResult<Option<Value>> {
        Ok(self.read()?.get(collection, key))
    }

    async fn put(&self, collection: Collection, key: Key, value: Value) -> StoreResult<()> {
        self.write()?.put(collection, key, value)?;
        Ok(())
    }

    async fn add(&self, collection: Collection, value: Value) -> StoreResult<u64> {
        let (id, _) = self.write()?.add(collection, value)?;
        Ok(id)
    }

    async fn delete(&self, collection: Collection, key: &Key) -> StoreResult<bool> {
        Ok(self.write()?.delete(collection, key).is_some())
    }

    async fn entries(&self, collection: Collection) -> StoreResult<Vec<(Key, Value)>> {
        Ok(self.read()?.entries(collection))
    }

    async fn scan_by_index(
        &self,
        collection: Collection,
        index: &str,
        value: &Value,
    ) -> StoreResult<Vec<Value>> {
        self.read()?.scan(collection, index, value)
    }

    async fn clear(&self, collection: Collection) -> StoreResult<()> {
        self.write()?.clear(collection);
        Ok(())
    }
}

impl std::fmt::Debug for InMemoryObjectStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryObjectStore")
            .field("bytes_used", &self.bytes_used())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    // -----------------------------------------------------------------------
    // Core CRUD
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn put_and_get() {
        let store = InMemoryObjectStore::new();
        store
            .put(Collection::Reviewed, Key::from("reviewed-R1-unit-design"), json!([["U1", ["u1", "Alice", "t"]]]))
            .await
            .unwrap();
        let value = store
            .get(Collection::Reviewed, &Key::from("reviewed-R1-unit-design"))
            .await
            .unwrap()
            .expect("should exist");
        assert_eq!(value[0][0], "U1");
    }

    #[tokio::test]
    async fn get_missing_returns_none() {
        let store = InMemoryObjectStore::new();
        assert!(store
            .get(Collection::Issues, &Key::from("nope"))
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn collections_are_independent() {
        let store = InMemoryObjectStore::new();
        store.put(Collection::Reviewed, Key::from("k"), json!(1)).await.unwrap();
        store.put(Collection::Issues, Key::from("k"), json!(2)).await.unwrap();
        assert_eq!(store.get(Collection::Reviewed, &Key::from("k")).await.unwrap(), Some(json!(1)));
        assert_eq!(store.get(Collection::Issues, &Key::from("k")).await.unwrap(), Some(json!(2)));
        assert!(store.is_empty(Collection::Users));
    }

    #[tokio::test]
    async fn delete_reports_presence() {
        let store = InMemoryObjectStore::new();
        store.put(Collection::Users, Key::from("users"), json!([])).await.unwrap();
        assert!(store.delete(Collection::Users, &Key::from("users")).await.unwrap());
        assert!(!store.delete(Collection::Users, &Key::from("users")).await.unwrap());
    }

    // -----------------------------------------------------------------------
    // Auto-increment and indexes
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn add_generates_monotonic_ids() {
        let store = InMemoryObjectStore::new();
        let a = store.add(Collection::ActivityLog, json!({"releaseId": "R1"})).await.unwrap();
        let b = store.add(Collection::ActivityLog, json!({"releaseId": "R2"})).await.unwrap();
        store.delete(Collection::ActivityLog, &Key::Auto(b)).await.unwrap();
        let c = store.add(Collection::ActivityLog, json!({"releaseId": "R1"})).await.unwrap();
        assert!(a < b && b < c);
    }

    #[tokio::test]
    async fn scan_by_index_filters_on_field() {
        let store = InMemoryObjectStore::new();
        for release in ["R1", "R2", "R1"] {
            store
                .add(Collection::ActivityLog, json!({"releaseId": release}))
                .await
                .unwrap();
        }
        let hits = store
            .scan_by_index(Collection::ActivityLog, "releaseId", &json!("R1"))
            .await
            .unwrap();
        assert_eq!(hits.len(), 2);
        assert!(hits.iter().all(|h| h["releaseId"] == "R1"));
    }

    #[tokio::test]
    async fn scan_on_undeclared_index_fails() {
        let store = InMemoryObjectStore::new();
        let err = store
            .scan_by_index(Collection::ActivityLog, "userId", &json!("u1"))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::UnknownIndex { .. }));
    }

    // -----------------------------------------------------------------------
    // Quota
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn quota_rejects_oversized_write_and_keeps_state() {
        let store = InMemoryObjectStore::with_quota(Some(64));
        store.put(Collection::Issues, Key::from("a"), json!("small")).await.unwrap();
        let before = store.bytes_used();

        let err = store
            .put(Collection::Issues, Key::from("b"), json!("x".repeat(200)))
            .await
            .unwrap_err();
        assert!(err.is_quota());
        assert_eq!(store.bytes_used(), before);
        assert!(store.get(Collection::Issues, &Key::from("b")).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn clear_empties_collection() {
        let store = InMemoryObjectStore::new();
        store.put(Collection::Releases, Key::from("R1"), json!({"id": "R1"})).await.unwrap();
        store.clear(Collection::Releases).await.unwrap();
        assert!(store.get_all(Collection::Releases).await.unwrap().is_empty());
        assert_eq!(store.bytes_used(), 0);
    }

    #[test]
    fn debug_format() {
        let store = InMemoryObjectStore::new();
        let debug = format!("{store:?}");
        assert!(debug.contains("InMemoryObjectStore"));
        assert!(debug.contains("bytes_used"));
    }
}
