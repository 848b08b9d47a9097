use std::sync::Arc;

use relrev_store::{Collection, Key, ObjectStore};
use relrev_types::{Release, Timestamp};
use tracing::{debug, warn};

use crate::error::EngineResult;

/// Release records, keyed by release id.
#[derive(Clone)]
pub struct ReleaseRepository {
    store: Arc<dyn ObjectStore>,
}

impl ReleaseRepository {
    pub fn new(store: Arc<dyn ObjectStore>) -> Self {
        Self { store }
    }

    /// Every release, most recently created first.
    pub async fn get_all(&self) -> EngineResult<Vec<Release>> {
        let rows = self.store.get_all(Collection::Releases).await?;
        let mut releases: Vec<Release> = rows
            .into_iter()
            .filter_map(|row| match serde_json::from_value(row) {
                Ok(release) => Some(release),
                Err(error) => {
                    warn!(%error, "skipping unreadable release");
                    None
                }
            })
            .collect();
        releases.sort_by_key(|r| std::cmp::Reverse(r.created_sort_key()));
        Ok(releases)
    }

    pub async fn get_by_id(&self, id: &str) -> EngineResult<Option<Release>> {
        match self.store.get(Collection::Releases, &Key::from(id)).await? {
            Some(row) => Ok(Some(serde_json::from_value(row)?)),
            None => Ok(None),
        }
    }

    /// Create or replace a release and return it as stored.
    ///
    /// `createdAt` is fixed by the first save: a stored value always wins,
    /// then the caller's, then the current time.
    pub async fn save(&self, mut release: Release) -> EngineResult<Release> {
        let existing = self
            .store
            .get(Collection::Releases, &Key::from(release.id.as_str()))
            .await?
            .and_then(|row| row.get("createdAt").cloned())
            .and_then(|v| serde_json::from_value::<Timestamp>(v).ok());
        release.created_at = existing.or(release.created_at).or_else(|| Some(Timestamp::now()));

        let value = serde_json::to_value(&release)?;
        self.store
            .put(Collection::Releases, Key::from(release.id.as_str()), value)
            .await?;
        debug!(release = %release.id, "release saved");
        Ok(release)
    }

    /// Delete the release record only. Returns `true` if it existed.
    pub async fn delete(&self, id: &str) -> EngineResult<bool> {
        Ok(self.store.delete(Collection::Releases, &Key::from(id)).await?)
    }
}
