use std::collections::HashMap;
use std::sync::Arc;

use relrev_store::{Collection, Key, ObjectStore};
use relrev_types::{ActivityEntry, Contributor, NewActivity, Timestamp};
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, warn};

use crate::error::EngineResult;

#[derive(Serialize)]
struct Unnumbered<'a> {
    #[serde(flatten)]
    activity: &'a NewActivity,
    timestamp: Timestamp,
}

/// Append-only audit trail of review actions.
///
/// Entries are never updated. Listings come back newest first by timestamp;
/// the store-assigned id only orders insertion.
#[derive(Clone)]
pub struct ActivityLog {
    store: Arc<dyn ObjectStore>,
}

impl ActivityLog {
    pub fn new(store: Arc<dyn ObjectStore>) -> Self {
        Self { store }
    }

    /// Record an activity stamped with the current time.
    pub async fn add_activity(&self, activity: NewActivity) -> EngineResult<ActivityEntry> {
        self.add_activity_at(activity, Timestamp::now()).await
    }

    /// Record an activity with a caller-supplied timestamp.
    pub async fn add_activity_at(
        &self,
        activity: NewActivity,
        timestamp: Timestamp,
    ) -> EngineResult<ActivityEntry> {
        let value = serde_json::to_value(Unnumbered {
            activity: &activity,
            timestamp,
        })?;
        let id = self.store.add(Collection::ActivityLog, value).await?;
        debug!(id, release = %activity.release_id, kind = %activity.activity_type, "activity recorded");
        Ok(activity.into_entry(id, timestamp))
    }

    /// Record an activity, logging instead of returning a failure.
    ///
    /// Review actions call this so that a full or broken log never undoes
    /// the action itself.
    pub async fn record(&self, activity: NewActivity) -> Option<ActivityEntry> {
        let kind = activity.activity_type;
        match self.add_activity(activity).await {
            Ok(entry) => Some(entry),
            Err(error) => {
                warn!(%error, %kind, "failed to record activity");
                None
            }
        }
    }

    pub async fn get_activities_by_release(&self, release_id: &str) -> EngineResult<Vec<ActivityEntry>> {
        let rows = self
            .store
            .scan_by_index(Collection::ActivityLog, "releaseId", &Value::from(release_id))
            .await?;
        Ok(newest_first(parse_rows(rows)))
    }

    pub async fn get_all_activities(&self) -> EngineResult<Vec<ActivityEntry>> {
        let rows = self.store.get_all(Collection::ActivityLog).await?;
        Ok(newest_first(parse_rows(rows)))
    }

    pub async fn get_activities_by_user(&self, user_id: &str) -> EngineResult<Vec<ActivityEntry>> {
        let mut entries = self.get_all_activities().await?;
        entries.retain(|entry| entry.user_id() == user_id);
        Ok(entries)
    }

    /// Contributors to one release, or to everything when `release_id` is `None`.
    pub async fn get_contributors(&self, release_id: Option<&str>) -> EngineResult<Vec<Contributor>> {
        let entries = match release_id {
            Some(id) => self.get_activities_by_release(id).await?,
            None => self.get_all_activities().await?,
        };
        Ok(contributors(&entries))
    }

    /// Remove every entry for a release. Returns how many were removed.
    pub async fn delete_by_release(&self, release_id: &str) -> EngineResult<usize> {
        let entries = self.get_activities_by_release(release_id).await?;
        let mut removed = 0;
        for entry in &entries {
            if self.store.delete(Collection::ActivityLog, &Key::Auto(entry.id)).await? {
                removed += 1;
            }
        }
        debug!(release = release_id, removed, "activity removed");
        Ok(removed)
    }
}

/// Aggregate entries per user, most active first.
///
/// A user's display name is taken from their first entry in `entries`.
/// Ties keep first-appearance order.
pub fn contributors(entries: &[ActivityEntry]) -> Vec<Contributor> {
    let mut order: Vec<Contributor> = Vec::new();
    let mut index: HashMap<&str, usize> = HashMap::new();
    for entry in entries {
        match index.get(entry.user_id()) {
            Some(&i) => order[i].activity_count += 1,
            None => {
                index.insert(entry.user_id(), order.len());
                order.push(Contributor {
                    user_id: entry.activity.user_id.clone(),
                    user_name: entry.activity.user_name.clone(),
                    activity_count: 1,
                });
            }
        }
    }
    order.sort_by(|a, b| b.activity_count.cmp(&a.activity_count));
    order
}

fn parse_rows(rows: Vec<Value>) -> Vec<ActivityEntry> {
    rows.into_iter()
        .filter_map(|row| match serde_json::from_value::<ActivityEntry>(row) {
            Ok(entry) => Some(entry),
            Err(error) => {
                warn!(%error, "skipping unreadable activity entry");
                None
            }
        })
        .collect()
}

fn newest_first(mut entries: Vec<ActivityEntry>) -> Vec<ActivityEntry> {
    entries.sort_by(|a, b| b.timestamp.cmp(&a.timestamp).then(b.id.cmp(&a.id)));
    entries
}
