use std::collections::HashMap;
use std::sync::{Arc, Weak};

use relrev_codec::{IssueCodec, MarkCodec, PartitionCodec};
use relrev_store::Key;
use relrev_types::PartitionKey;
use tokio::sync::Mutex;
use tracing::debug;

use crate::cache::PartitionCache;
use crate::error::EngineResult;
use crate::writer::{collection_for, QuotaAwareWriter};

type Live<C> = Mutex<HashMap<PartitionKey, Weak<PartitionCache<C>>>>;

/// The partition caches currently in use, one per key.
///
/// Every manager handed out for a key shares the same cache and write gate,
/// so a change made through one is seen by all of them and their writes are
/// serialized. Entries are weak: once the last manager for a key is dropped,
/// the next request loads the partition from the store again.
pub(crate) struct PartitionRegistry {
    writer: Arc<QuotaAwareWriter>,
    marks: Live<MarkCodec>,
    issues: Live<IssueCodec>,
}

impl PartitionRegistry {
    pub(crate) fn new(writer: Arc<QuotaAwareWriter>) -> Self {
        Self {
            writer,
            marks: Mutex::new(HashMap::new()),
            issues: Mutex::new(HashMap::new()),
        }
    }

    pub(crate) async fn marks(&self, key: PartitionKey) -> EngineResult<Arc<PartitionCache<MarkCodec>>> {
        acquire(&self.marks, &self.writer, key).await
    }

    pub(crate) async fn issues(&self, key: PartitionKey) -> EngineResult<Arc<PartitionCache<IssueCodec>>> {
        acquire(&self.issues, &self.writer, key).await
    }

    /// Reload every live cache from the store.
    pub(crate) async fn reload_all(&self) -> EngineResult<()> {
        for cache in live(&self.marks).await {
            cache.reload().await?;
        }
        for cache in live(&self.issues).await {
            cache.reload().await?;
        }
        Ok(())
    }

    /// Delete a stored partition, emptying its cache if one is live.
    pub(crate) async fn purge(&self, key: &PartitionKey) -> EngineResult<()> {
        if let Some(cache) = lookup(&self.marks, key).await {
            return cache.purge().await;
        }
        if let Some(cache) = lookup(&self.issues, key).await {
            return cache.purge().await;
        }
        self.writer
            .store()
            .delete(collection_for(key), &Key::from(key.to_string()))
            .await?;
        Ok(())
    }
}

async fn acquire<C: PartitionCodec + 'static>(
    map: &Live<C>,
    writer: &Arc<QuotaAwareWriter>,
    key: PartitionKey,
) -> EngineResult<Arc<PartitionCache<C>>> {
    let mut live = map.lock().await;
    if let Some(cache) = live.get(&key).and_then(Weak::upgrade) {
        return Ok(cache);
    }
    let cache = Arc::new(PartitionCache::load(writer.clone(), key.clone()).await?);
    live.retain(|_, entry| entry.strong_count() > 0);
    live.insert(key, Arc::downgrade(&cache));
    debug!(live = live.len(), "partition cache registered");
    Ok(cache)
}

async fn lookup<C: PartitionCodec + 'static>(map: &Live<C>, key: &PartitionKey) -> Option<Arc<PartitionCache<C>>> {
    map.lock().await.get(key).and_then(Weak::upgrade)
}

async fn live<C: PartitionCodec + 'static>(map: &Live<C>) -> Vec<Arc<PartitionCache<C>>> {
    map.lock().await.values().filter_map(Weak::upgrade).collect()
}
