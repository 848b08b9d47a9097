//! Whole-dataset export and import.
//!
//! The document shape is the interchange format shared with every earlier
//! version:
//!
//! ```json
//! { "version": "1.0", "exportedAt": "...", "releases": [..],
//!   "reviewed": {"reviewed-R1-unit-design": [..]}, "issues": {..},
//!   "activityLog": [..], "users": {"users": [..], "current-user": {..}} }
//! ```
//!
//! Partition values are exported exactly as stored. Import parses and checks
//! the entire document before touching the store; only then is every
//! collection cleared and the content replayed through the same writers that
//! live edits use.

use std::collections::BTreeMap;
use std::str::FromStr;

use relrev_codec::{IssueCodec, MarkCodec, Partition, PartitionCodec};
use relrev_store::{Collection, ObjectStore};
use relrev_types::{
    ActivityEntry, Issue, NewActivity, PartitionFamily, PartitionKey, Release, ReviewMark, Timestamp, User,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{info, warn};

use crate::activity::ActivityLog;
use crate::error::{EngineError, EngineResult};
use crate::releases::ReleaseRepository;
use crate::users::{CURRENT_USER_KEY, USERS_KEY};
use crate::writer::{PersistOutcome, QuotaAwareWriter};

pub const SNAPSHOT_VERSION: &str = "1.0";

/// An exported dataset.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot {
    pub version: String,
    pub exported_at: Timestamp,
    pub releases: Vec<Release>,
    pub reviewed: BTreeMap<String, Value>,
    pub issues: BTreeMap<String, Value>,
    pub activity_log: Vec<ActivityEntry>,
    pub users: BTreeMap<String, Value>,
}

impl Snapshot {
    pub fn to_json(&self) -> EngineResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

/// Activity as read from a document. Ids are reassigned on import; a
/// numeric id only breaks timestamp ties. Older exports used string ids.
#[derive(Deserialize)]
struct IncomingActivity {
    #[serde(default)]
    id: Value,
    #[serde(flatten)]
    activity: NewActivity,
    timestamp: Timestamp,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct IncomingSnapshot {
    version: Option<String>,
    #[serde(default)]
    releases: Vec<Release>,
    #[serde(default)]
    reviewed: BTreeMap<String, Value>,
    #[serde(default)]
    issues: BTreeMap<String, Value>,
    #[serde(default)]
    activity_log: Vec<IncomingActivity>,
    #[serde(default)]
    users: BTreeMap<String, Value>,
}

/// A document that passed validation and is ready to replay.
pub struct ImportPlan {
    releases: Vec<Release>,
    reviewed: Vec<(PartitionKey, Partition<ReviewMark>)>,
    issues: Vec<(PartitionKey, Partition<Vec<Issue>>)>,
    activity: Vec<(NewActivity, Timestamp)>,
    users: Vec<(String, Value)>,
}

impl ImportPlan {
    /// Parse and check a document without touching any store.
    pub fn parse(document: &str) -> EngineResult<Self> {
        let incoming: IncomingSnapshot = serde_json::from_str(document)
            .map_err(|e| EngineError::InvalidSnapshot(e.to_string()))?;

        match incoming.version.as_deref() {
            Some(v) if v == "1" || v.starts_with("1.") => {}
            Some(v) => return Err(EngineError::InvalidSnapshot(format!("unsupported version {v}"))),
            None => return Err(EngineError::InvalidSnapshot("missing version".into())),
        }

        let reviewed = partitions::<MarkCodec>(PartitionFamily::Reviewed, incoming.reviewed)?;
        let issues = partitions::<IssueCodec>(PartitionFamily::Issues, incoming.issues)?;

        for (key, value) in &incoming.users {
            let checked = match key.as_str() {
                USERS_KEY => serde_json::from_value::<Vec<User>>(value.clone()).map(drop),
                CURRENT_USER_KEY => serde_json::from_value::<User>(value.clone()).map(drop),
                _ => Ok(()),
            };
            checked.map_err(|e| EngineError::InvalidSnapshot(format!("users.{key}: {e}")))?;
        }

        let mut incoming_activity = incoming.activity_log;
        // oldest first, so reassigned ids follow time order
        incoming_activity.sort_by_key(|a| (a.timestamp, a.id.as_u64()));
        let activity = incoming_activity
            .into_iter()
            .map(|a| (a.activity, a.timestamp))
            .collect();

        Ok(Self {
            releases: incoming.releases,
            reviewed,
            issues,
            activity,
            users: incoming.users.into_iter().collect(),
        })
    }
}

fn partitions<C: PartitionCodec>(
    family: PartitionFamily,
    raw: BTreeMap<String, Value>,
) -> EngineResult<Vec<(PartitionKey, Partition<C::Record>)>> {
    raw.into_iter()
        .map(|(name, value)| {
            let key = PartitionKey::from_str(&name)
                .map_err(|e| EngineError::InvalidSnapshot(format!("{}: {e}", family.prefix())))?;
            if key.family != family {
                return Err(EngineError::InvalidSnapshot(format!(
                    "key {name} does not belong in {}",
                    family.prefix()
                )));
            }
            let partition = C::try_decode(&value)
                .map_err(|e| EngineError::InvalidSnapshot(format!("{name}: {e}")))?;
            Ok((key, partition))
        })
        .collect()
}

/// What an import wrote.
#[derive(Debug, Default)]
pub struct ImportReport {
    pub releases: usize,
    pub reviewed_partitions: usize,
    pub issue_partitions: usize,
    pub activities: usize,
    pub users: usize,
    /// Partitions that could not be stored at full fidelity.
    pub degraded: Vec<(PartitionKey, PersistOutcome)>,
}

pub(crate) async fn export(
    store: &dyn ObjectStore,
    releases: &ReleaseRepository,
    activity: &ActivityLog,
) -> EngineResult<Snapshot> {
    let snapshot = Snapshot {
        version: SNAPSHOT_VERSION.to_string(),
        exported_at: Timestamp::now(),
        releases: releases.get_all().await?,
        reviewed: raw_entries(store, Collection::Reviewed).await?,
        issues: raw_entries(store, Collection::Issues).await?,
        activity_log: activity.get_all_activities().await?,
        users: raw_entries(store, Collection::Users).await?,
    };
    info!(
        releases = snapshot.releases.len(),
        activities = snapshot.activity_log.len(),
        "snapshot exported"
    );
    Ok(snapshot)
}

async fn raw_entries(store: &dyn ObjectStore, collection: Collection) -> EngineResult<BTreeMap<String, Value>> {
    let mut out = BTreeMap::new();
    for (key, value) in store.entries(collection).await? {
        match key.as_text() {
            Some(name) => {
                out.insert(name.to_string(), value);
            }
            None => warn!(%collection, %key, "skipping record with generated key"),
        }
    }
    Ok(out)
}

/// Clear every collection and write the plan's content.
///
/// Not atomic across collections: a store failure part way leaves the
/// collections written so far in place and the rest empty.
pub(crate) async fn replay(
    plan: ImportPlan,
    writer: &QuotaAwareWriter,
    releases: &ReleaseRepository,
    activity: &ActivityLog,
) -> EngineResult<ImportReport> {
    let store = writer.store();
    for collection in Collection::ALL {
        store.clear(collection).await?;
    }

    let mut report = ImportReport::default();

    for release in plan.releases {
        releases.save(release).await?;
        report.releases += 1;
    }
    for (key, partition) in plan.reviewed {
        let outcome = writer.persist::<MarkCodec>(&key, &partition).await?;
        note(&mut report, key, outcome);
        report.reviewed_partitions += 1;
    }
    for (key, partition) in plan.issues {
        let outcome = writer.persist::<IssueCodec>(&key, &partition).await?;
        note(&mut report, key, outcome);
        report.issue_partitions += 1;
    }
    for (entry, timestamp) in plan.activity {
        activity.add_activity_at(entry, timestamp).await?;
        report.activities += 1;
    }
    for (key, value) in plan.users {
        store.put(Collection::Users, key.into(), value).await?;
        report.users += 1;
    }

    info!(
        releases = report.releases,
        reviewed = report.reviewed_partitions,
        issues = report.issue_partitions,
        activities = report.activities,
        degraded = report.degraded.len(),
        "snapshot imported"
    );
    Ok(report)
}

fn note(report: &mut ImportReport, key: PartitionKey, outcome: PersistOutcome) {
    if outcome.is_degraded() {
        report.degraded.push((key, outcome));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn doc(extra: Value) -> String {
        let mut base = json!({
            "version": "1.0",
            "exportedAt": "2024-05-01T10:00:00.000Z",
            "releases": [],
            "reviewed": {},
            "issues": {},
            "activityLog": [],
            "users": {}
        });
        if let (Some(base), Some(extra)) = (base.as_object_mut(), extra.as_object()) {
            for (k, v) in extra {
                base.insert(k.clone(), v.clone());
            }
        }
        base.to_string()
    }

    #[test]
    fn accepts_minimal_document() {
        let plan = ImportPlan::parse(&doc(json!({}))).unwrap();
        assert!(plan.releases.is_empty());
        assert!(plan.activity.is_empty());
    }

    #[test]
    fn rejects_unknown_major_version() {
        let err = ImportPlan::parse(&doc(json!({"version": "2.0"}))).err().unwrap();
        assert!(matches!(err, EngineError::InvalidSnapshot(_)));
        assert!(ImportPlan::parse(r#"{"releases": []}"#).is_err());
    }

    #[test]
    fn rejects_keys_in_the_wrong_section() {
        let err = ImportPlan::parse(&doc(json!({"reviewed": {"issues-R1-unit-design": []}})))
            .err()
            .unwrap();
        assert!(err.to_string().contains("does not belong"));
        assert!(ImportPlan::parse(&doc(json!({"issues": {"bogus": []}}))).is_err());
    }

    #[test]
    fn rejects_undecodable_partitions() {
        let bad = json!({"reviewed": {"reviewed-R1-unit-design": [["U1", ["u1", "Alice", "yesterday"]]]}});
        assert!(ImportPlan::parse(&doc(bad)).is_err());
    }

    #[test]
    fn rejects_malformed_user_records() {
        assert!(ImportPlan::parse(&doc(json!({"users": {"users": {"id": 3}}}))).is_err());
        assert!(ImportPlan::parse(&doc(json!({"users": {"theme": "dark"}}))).is_ok());
    }

    #[test]
    fn legacy_activity_ids_are_ignored_and_sorted() {
        let plan = ImportPlan::parse(&doc(json!({"activityLog": [
            {"id": "1700000000000-0.5", "releaseId": "R1", "itemType": "unit-design", "itemId": "U1",
             "itemName": "Villa A", "activityType": "approved", "userId": "u1", "userName": "Alice",
             "timestamp": "2024-05-01T10:00:02.000Z"},
            {"id": 7, "releaseId": "R1", "itemType": "unit-design", "itemId": "U2",
             "itemName": "Villa B", "activityType": "flagged", "userId": "u2", "userName": "Bob",
             "details": "crack", "timestamp": "2024-05-01T10:00:01.000Z"}
        ]})))
        .unwrap();
        assert_eq!(plan.activity.len(), 2);
        assert_eq!(plan.activity[0].0.item_id, "U2");
        assert_eq!(plan.activity[1].0.item_id, "U1");
    }

    #[test]
    fn equal_timestamps_keep_id_order() {
        let entry = |id: u64, item: &str| {
            json!({"id": id, "releaseId": "R1", "itemType": "payment-plan", "itemId": item,
                   "itemName": item, "activityType": "approved", "userId": "u1", "userName": "Alice",
                   "timestamp": "2024-05-01T10:00:00.000Z"})
        };
        let plan = ImportPlan::parse(&doc(json!({"activityLog": [entry(9, "P2"), entry(4, "P1")]}))).unwrap();
        let items: Vec<_> = plan.activity.iter().map(|(a, _)| a.item_id.as_str()).collect();
        assert_eq!(items, vec!["P1", "P2"]);
    }
}
