use std::fmt;
use std::sync::Arc;

use relrev_codec::{Fidelity, Partition, PartitionCodec};
use relrev_store::{Collection, Key, ObjectStore};
use relrev_types::{PartitionFamily, PartitionKey};
use tracing::{debug, error, warn};

use crate::error::EngineResult;

/// What a partition write ended up storing.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PersistOutcome {
    /// Written at the given fidelity.
    Stored(Fidelity),
    /// Every fidelity was refused for lack of space; the stored partition
    /// was deleted. The in-memory state is untouched.
    Dropped,
}

impl PersistOutcome {
    pub fn is_degraded(&self) -> bool {
        !matches!(self, Self::Stored(Fidelity::Full))
    }
}

impl fmt::Display for PersistOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Stored(fidelity) => write!(f, "stored ({fidelity})"),
            Self::Dropped => f.write_str("dropped"),
        }
    }
}

pub(crate) fn collection_for(key: &PartitionKey) -> Collection {
    match key.family {
        PartitionFamily::Reviewed => Collection::Reviewed,
        PartitionFamily::Issues => Collection::Issues,
    }
}

/// Writes whole partitions, trading fidelity for space when the store is full.
///
/// Each write tries [`Fidelity::ladder`] from the top. A quota failure moves
/// to the next step; any other failure is returned as is. When the last step
/// is refused too, the stored partition is deleted so that a stale value
/// cannot outlive the state that replaced it.
pub struct QuotaAwareWriter {
    store: Arc<dyn ObjectStore>,
    text_limit: usize,
}

impl QuotaAwareWriter {
    pub fn new(store: Arc<dyn ObjectStore>, text_limit: usize) -> Self {
        Self { store, text_limit }
    }

    pub fn store(&self) -> &Arc<dyn ObjectStore> {
        &self.store
    }

    pub async fn persist<C: PartitionCodec>(
        &self,
        key: &PartitionKey,
        partition: &Partition<C::Record>,
    ) -> EngineResult<PersistOutcome> {
        let collection = collection_for(key);
        let name = key.to_string();

        for fidelity in Fidelity::ladder(self.text_limit) {
            let encoded = C::encode(partition, fidelity);
            match self.store.put(collection, Key::from(name.as_str()), encoded).await {
                Ok(()) => {
                    if fidelity == Fidelity::Full {
                        debug!(key = %name, items = partition.len(), "partition saved");
                    } else {
                        warn!(key = %name, %fidelity, "partition saved with reduced fidelity");
                    }
                    return Ok(PersistOutcome::Stored(fidelity));
                }
                Err(e) if e.is_quota() => {
                    warn!(key = %name, %fidelity, error = %e, "store full, reducing fidelity");
                }
                Err(e) => return Err(e.into()),
            }
        }

        match self.store.delete(collection, &Key::from(name.as_str())).await {
            Ok(_) => error!(key = %name, family = C::FAMILY, "store full at every fidelity, partition dropped"),
            Err(e) => error!(key = %name, error = %e, "store full and stale partition could not be removed"),
        }
        Ok(PersistOutcome::Dropped)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::FlakyStore;
    use relrev_codec::{IssueCodec, MarkCodec};
    use relrev_store::StoreError;
    use relrev_types::{Actor, Issue, ItemType, ReviewMark, Timestamp};

    fn issues() -> Partition<Vec<Issue>> {
        let actor = Actor::new("u2", "Bob");
        let mut p = Partition::new();
        p.insert(
            "U1".into(),
            vec![
                Issue::new("first", Some("a.png".into()), Some(10), &actor, Timestamp::now()),
                Issue::new("x".repeat(900), None, None, &actor, Timestamp::now()),
            ],
        );
        p
    }

    fn key() -> PartitionKey {
        PartitionKey::issues("R1", ItemType::UnitDesign)
    }

    #[tokio::test]
    async fn writes_full_when_space_allows() {
        let store = Arc::new(FlakyStore::quota_failures(0));
        let writer = QuotaAwareWriter::new(store.clone(), 500);
        let outcome = writer.persist::<IssueCodec>(&key(), &issues()).await.unwrap();
        assert_eq!(outcome, PersistOutcome::Stored(Fidelity::Full));
        assert!(!outcome.is_degraded());
        assert_eq!(store.attempts().len(), 1);
    }

    #[tokio::test]
    async fn descends_the_ladder_in_order() {
        let store = Arc::new(FlakyStore::quota_failures(2));
        let writer = QuotaAwareWriter::new(store.clone(), 500);
        let outcome = writer.persist::<IssueCodec>(&key(), &issues()).await.unwrap();
        assert_eq!(outcome, PersistOutcome::Stored(Fidelity::LatestOnly { text_limit: 500 }));

        let attempts = store.attempts();
        assert_eq!(attempts.len(), 3);
        let decoded: Vec<_> = attempts
            .iter()
            .map(|(_, _, value)| IssueCodec::try_decode(value).unwrap())
            .collect();
        // full: both issues, attachment intact
        assert_eq!(decoded[0]["U1"].len(), 2);
        assert!(decoded[0]["U1"][0].has_attachment());
        // truncated: both issues, no attachment, text capped
        assert_eq!(decoded[1]["U1"].len(), 2);
        assert!(!decoded[1]["U1"][0].has_attachment());
        assert_eq!(decoded[1]["U1"][1].text.chars().count(), 500);
        // latest-only: one issue
        assert_eq!(decoded[2]["U1"].len(), 1);

        let stored = store.inner().get(Collection::Issues, &Key::from("issues-R1-unit-design")).await.unwrap();
        assert_eq!(stored.as_ref(), Some(&attempts[2].2));
    }

    #[tokio::test]
    async fn exhausted_ladder_deletes_key() {
        let store = Arc::new(FlakyStore::quota_failures(0));
        let writer = QuotaAwareWriter::new(store.clone(), 500);
        writer.persist::<IssueCodec>(&key(), &issues()).await.unwrap();

        store.fail_next_puts(3);
        let outcome = writer.persist::<IssueCodec>(&key(), &issues()).await.unwrap();
        assert_eq!(outcome, PersistOutcome::Dropped);
        assert!(outcome.is_degraded());
        assert_eq!(
            store.inner().get(Collection::Issues, &Key::from("issues-R1-unit-design")).await.unwrap(),
            None
        );
    }

    #[tokio::test]
    async fn marks_skip_straight_to_delete_when_full() {
        let store = Arc::new(FlakyStore::quota_failures(3));
        let writer = QuotaAwareWriter::new(store.clone(), 500);
        let mut p = Partition::new();
        p.insert("U1".into(), ReviewMark::new("U1", &Actor::new("u1", "Alice"), Timestamp::now()));
        let outcome = writer
            .persist::<MarkCodec>(&PartitionKey::reviewed("R1", ItemType::UnitDesign), &p)
            .await
            .unwrap();
        assert_eq!(outcome, PersistOutcome::Dropped);
        assert_eq!(store.deletes(), 1);
    }

    #[tokio::test]
    async fn non_quota_failure_is_returned_immediately() {
        let store = Arc::new(FlakyStore::hard_failures(1));
        let writer = QuotaAwareWriter::new(store.clone(), 500);
        let err = writer.persist::<IssueCodec>(&key(), &issues()).await.unwrap_err();
        assert!(matches!(err, crate::EngineError::Store(StoreError::Blocked(_))));
        assert_eq!(store.attempts().len(), 1);
        assert_eq!(store.deletes(), 0);
    }
}
