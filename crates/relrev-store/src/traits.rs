use async_trait::async_trait;
use serde_json::Value;

use crate::error::StoreResult;
use crate::schema::{Collection, Key};

/// Named-collection key/value store.
///
/// All implementations must satisfy these invariants:
/// - Every write is atomic per call: it either commits completely or leaves
///   the collection as it was.
/// - A quota-class failure is reported as an error for which
///   [`crate::StoreError::is_quota`] returns `true`; nothing is written.
/// - Keys generated by [`ObjectStore::add`] increase monotonically and are
///   never reused, even after the record is deleted or the collection cleared.
/// - The store never interprets record contents beyond the key path and the
///   declared index fields.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Read a record by key. Returns `Ok(None)` if absent.
    async fn get(&self, collection: Collection, key: &Key) -> StoreResult<Option<Value>>;

    /// Create or replace the record at `key`.
    async fn put(&self, collection: Collection, key: Key, value: Value) -> StoreResult<()>;

    /// Append a record to an auto-incrementing collection and return its
    /// generated key. The key is also written into the record at the
    /// collection's key path.
    async fn add(&self, collection: Collection, value: Value) -> StoreResult<u64>;

    /// Delete a record. Returns `true` if it existed.
    async fn delete(&self, collection: Collection, key: &Key) -> StoreResult<bool>;

    /// Every `(key, record)` pair in key order.
    async fn entries(&self, collection: Collection) -> StoreResult<Vec<(Key, Value)>>;

    /// Records whose `index` field equals `value`, in key order.
    ///
    /// Fails with [`crate::StoreError::UnknownIndex`] if the collection does
    /// not declare `index`.
    async fn scan_by_index(
        &self,
        collection: Collection,
        index: &str,
        value: &Value,
    ) -> StoreResult<Vec<Value>>;

    /// Remove every record from the collection.
    async fn clear(&self, collection: Collection) -> StoreResult<()>;

    /// Every record in key order.
    async fn get_all(&self, collection: Collection) -> StoreResult<Vec<Value>> {
        Ok(self
            .entries(collection)
            .await?
            .into_iter()
            .map(|(_, value)| value)
            .collect())
    }
}
