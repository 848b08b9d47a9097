use std::sync::Arc;

use relrev_codec::IssueCodec;
use relrev_types::{Actor, Issue, ItemType, PartitionKey, Timestamp};
use tracing::debug;

use crate::cache::PartitionCache;
use crate::error::EngineResult;
use crate::pending::Mutation;
use crate::writer::QuotaAwareWriter;

/// Bounded per-item issue history for one release and item type.
///
/// Each item keeps at most `history_limit` issues, oldest first. Adding an
/// issue to a full list evicts the oldest.
pub struct IssueTracker {
    cache: Arc<PartitionCache<IssueCodec>>,
    history_limit: usize,
}

impl IssueTracker {
    pub(crate) fn from_cache(cache: Arc<PartitionCache<IssueCodec>>, history_limit: usize) -> Self {
        Self {
            cache,
            history_limit: history_limit.max(1),
        }
    }

    pub async fn load(
        writer: Arc<QuotaAwareWriter>,
        release_id: &str,
        item_type: ItemType,
        history_limit: usize,
    ) -> EngineResult<Self> {
        let cache = PartitionCache::load(writer, PartitionKey::issues(release_id, item_type)).await?;
        Ok(Self::from_cache(Arc::new(cache), history_limit))
    }

    pub fn key(&self) -> &PartitionKey {
        self.cache.key()
    }

    /// Append an issue stamped with the current time and return it.
    pub fn add_issue(
        &self,
        item_id: &str,
        text: impl Into<String>,
        file_name: Option<String>,
        file_size: Option<u64>,
        actor: &Actor,
    ) -> Mutation<Issue> {
        let issue = Issue::new(text, file_name, file_size, actor, Timestamp::now());
        let limit = self.history_limit;
        let (len, write) = self.cache.mutate(|partition| {
            let list = partition.entry(item_id.to_string()).or_default();
            let keep = limit - 1;
            if list.len() > keep {
                list.drain(..list.len() - keep);
            }
            list.push(issue.clone());
            list.len()
        });
        debug!(key = %self.key(), item = item_id, history = len, "issue added");
        Mutation { value: issue, write }
    }

    /// Issues for the item, oldest first.
    pub fn get_issues(&self, item_id: &str) -> Vec<Issue> {
        self.cache
            .read(|partition| partition.get(item_id).cloned())
            .unwrap_or_default()
    }

    pub fn get_latest_issue(&self, item_id: &str) -> Option<Issue> {
        self.cache
            .read(|partition| partition.get(item_id).and_then(|list| list.last().cloned()))
    }

    pub fn has_issues(&self, item_id: &str) -> bool {
        self.cache
            .read(|partition| partition.get(item_id).is_some_and(|list| !list.is_empty()))
    }

    /// Drop the item's whole history and return what was removed.
    pub fn remove_issues(&self, item_id: &str) -> Mutation<Vec<Issue>> {
        let (removed, write) = self
            .cache
            .mutate(|partition| partition.remove(item_id).unwrap_or_default());
        debug!(key = %self.key(), item = item_id, removed = removed.len(), "issues removed");
        Mutation { value: removed, write }
    }

    /// Ids of every item with at least one issue.
    pub fn flagged_ids(&self) -> Vec<String> {
        self.cache.read(|partition| {
            partition
                .iter()
                .filter(|(_, list)| !list.is_empty())
                .map(|(id, _)| id.clone())
                .collect()
        })
    }
}
