use std::sync::Arc;

use relrev_codec::MarkCodec;
use relrev_types::{Actor, ItemType, PartitionKey, ReviewMark, Timestamp};
use tracing::debug;

use crate::cache::PartitionCache;
use crate::error::EngineResult;
use crate::pending::Mutation;
use crate::writer::QuotaAwareWriter;

/// Reviewed/not-reviewed state for one release and item type.
///
/// An item is reviewed exactly when it has a mark. Toggling flips the state
/// in memory immediately and persists the whole partition in the background.
pub struct ReviewStateManager {
    cache: Arc<PartitionCache<MarkCodec>>,
}

impl ReviewStateManager {
    pub(crate) fn from_cache(cache: Arc<PartitionCache<MarkCodec>>) -> Self {
        Self { cache }
    }

    pub async fn load(
        writer: Arc<QuotaAwareWriter>,
        release_id: &str,
        item_type: ItemType,
    ) -> EngineResult<Self> {
        let cache = PartitionCache::load(writer, PartitionKey::reviewed(release_id, item_type)).await?;
        Ok(Self::from_cache(Arc::new(cache)))
    }

    pub fn key(&self) -> &PartitionKey {
        self.cache.key()
    }

    pub fn is_reviewed(&self, item_id: &str) -> bool {
        self.cache.read(|marks| marks.contains_key(item_id))
    }

    /// Flip the item's state. The returned value is the new state: `true`
    /// if the item is now reviewed, attributed to `actor`.
    pub fn toggle_reviewed(&self, item_id: &str, actor: &Actor) -> Mutation<bool> {
        let (reviewed, write) = self.cache.mutate(|marks| {
            if marks.remove(item_id).is_some() {
                false
            } else {
                marks.insert(item_id.to_string(), ReviewMark::new(item_id, actor, Timestamp::now()));
                true
            }
        });
        debug!(key = %self.key(), item = item_id, reviewed, user = %actor.user_id, "review toggled");
        Mutation { value: reviewed, write }
    }

    pub fn get_review_record(&self, item_id: &str) -> Option<ReviewMark> {
        self.cache.read(|marks| marks.get(item_id).cloned())
    }

    pub fn reviewed_ids(&self) -> Vec<String> {
        self.cache.read(|marks| marks.keys().cloned().collect())
    }

    pub fn reviewed_count(&self) -> usize {
        self.cache.read(|marks| marks.len())
    }
}
