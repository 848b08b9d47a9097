//! Store doubles for engine tests.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use relrev_store::{Collection, InMemoryObjectStore, Key, ObjectStore, StoreError, StoreResult};
use serde_json::Value;

/// Wraps an [`InMemoryObjectStore`], rejecting the next N `put` calls.
///
/// Every `put` attempt is recorded, accepted or not.
pub struct FlakyStore {
    inner: InMemoryObjectStore,
    quota_failures: AtomicUsize,
    quota_target: Mutex<Option<Collection>>,
    hard_failures: AtomicUsize,
    attempts: Mutex<Vec<(Collection, Key, Value)>>,
    deletes: AtomicUsize,
}

impl FlakyStore {
    pub fn quota_failures(n: usize) -> Self {
        Self::build(n, 0)
    }

    pub fn hard_failures(n: usize) -> Self {
        Self::build(0, n)
    }

    fn build(quota: usize, hard: usize) -> Self {
        Self {
            inner: InMemoryObjectStore::new(),
            quota_failures: AtomicUsize::new(quota),
            quota_target: Mutex::new(None),
            hard_failures: AtomicUsize::new(hard),
            attempts: Mutex::new(Vec::new()),
            deletes: AtomicUsize::new(0),
        }
    }

    pub fn fail_next_puts(&self, n: usize) {
        *self.quota_target.lock().unwrap() = None;
        self.quota_failures.store(n, Ordering::SeqCst);
    }

    /// As [`FlakyStore::fail_next_puts`], counting only puts to `collection`.
    pub fn fail_next_puts_to(&self, collection: Collection, n: usize) {
        *self.quota_target.lock().unwrap() = Some(collection);
        self.quota_failures.store(n, Ordering::SeqCst);
    }

    pub fn attempts(&self) -> Vec<(Collection, Key, Value)> {
        self.attempts.lock().unwrap().clone()
    }

    pub fn deletes(&self) -> usize {
        self.deletes.load(Ordering::SeqCst)
    }

    pub fn inner(&self) -> &InMemoryObjectStore {
        &self.inner
    }

    fn take(counter: &AtomicUsize) -> bool {
        counter
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }
}

#[async_trait]
impl ObjectStore for FlakyStore {
    async fn get(&self, collection: Collection, key: &Key) -> StoreResult<Option<Value>> {
        self.inner.get(collection, key).await
    }

    async fn put(&self, collection: Collection, key: Key, value: Value) -> StoreResult<()> {
        self.attempts
            .lock()
            .unwrap()
            .push((collection, key.clone(), value.clone()));
        if Self::take(&self.hard_failures) {
            return Err(StoreError::Blocked("injected failure".into()));
        }
        let targeted = self
            .quota_target
            .lock()
            .unwrap()
            .map_or(true, |target| target == collection);
        if targeted && Self::take(&self.quota_failures) {
            return Err(StoreError::QuotaExceeded {
                collection,
                needed: 0,
                available: 0,
            });
        }
        self.inner.put(collection, key, value).await
    }

    async fn add(&self, collection: Collection, value: Value) -> StoreResult<u64> {
        self.inner.add(collection, value).await
    }

    async fn delete(&self, collection: Collection, key: &Key) -> StoreResult<bool> {
        self.deletes.fetch_add(1, Ordering::SeqCst);
        self.inner.delete(collection, key).await
    }

    async fn entries(&self, collection: Collection) -> StoreResult<Vec<(Key, Value)>> {
        self.inner.entries(collection).await
    }

    async fn scan_by_index(
        &self,
        collection: Collection,
        index: &str,
        value: &Value,
    ) -> StoreResult<Vec<Value>> {
        self.inner.scan_by_index(collection, index, value).await
    }

    async fn clear(&self, collection: Collection) -> StoreResult<()> {
        self.inner.clear(collection).await
    }
}
