use relrev_types::{ActivityEntry, ActivityType, Actor, Issue, ItemType, NewActivity};

use crate::activity::ActivityLog;
use crate::error::EngineResult;
use crate::issues::IssueTracker;
use crate::pending::PendingWrite;
use crate::review::ReviewStateManager;

/// Outcome of a workflow action: its value, the partition writes it queued,
/// and the activity entry it recorded, if recording succeeded.
#[must_use = "await the writes or detach them"]
pub struct Step<T> {
    pub value: T,
    pub writes: Vec<PendingWrite>,
    pub activity: Option<ActivityEntry>,
}

impl<T> Step<T> {
    /// Wait for every queued write, failing on the first error.
    pub async fn durable(self) -> EngineResult<T> {
        for write in self.writes {
            write.await?;
        }
        Ok(self.value)
    }

    pub fn detach(self) -> T {
        for write in self.writes {
            write.detach();
        }
        self.value
    }
}

/// Review actions for one release and item type.
///
/// Keeps an item from being both reviewed and flagged: flagging clears the
/// review mark first, and resolving clears the issues before marking the
/// item reviewed. Every action is recorded in the activity log; a logging
/// failure never fails the action.
pub struct ReviewWorkflow {
    release_id: String,
    item_type: ItemType,
    reviews: ReviewStateManager,
    issues: IssueTracker,
    activity: ActivityLog,
}

impl ReviewWorkflow {
    pub fn new(
        release_id: impl Into<String>,
        item_type: ItemType,
        reviews: ReviewStateManager,
        issues: IssueTracker,
        activity: ActivityLog,
    ) -> Self {
        Self {
            release_id: release_id.into(),
            item_type,
            reviews,
            issues,
            activity,
        }
    }

    pub fn reviews(&self) -> &ReviewStateManager {
        &self.reviews
    }

    pub fn issues(&self) -> &IssueTracker {
        &self.issues
    }

    /// Flip the review mark. Returns the new state.
    pub async fn toggle_approval(&self, item_id: &str, item_name: &str, actor: &Actor) -> Step<bool> {
        let toggled = self.reviews.toggle_reviewed(item_id, actor);
        let kind = if toggled.value {
            ActivityType::Approved
        } else {
            ActivityType::Unapproved
        };
        let activity = self.log(item_id, item_name, kind, actor, None).await;
        Step {
            value: toggled.value,
            writes: vec![toggled.write],
            activity,
        }
    }

    /// Raise an issue against the item, clearing its review mark first.
    pub async fn flag(
        &self,
        item_id: &str,
        item_name: &str,
        text: &str,
        attachment: Option<(String, u64)>,
        actor: &Actor,
    ) -> Step<Issue> {
        let mut writes = Vec::with_capacity(2);
        if self.reviews.is_reviewed(item_id) {
            writes.push(self.reviews.toggle_reviewed(item_id, actor).write);
        }
        let (file_name, file_size) = attachment.map_or((None, None), |(n, s)| (Some(n), Some(s)));
        let added = self.issues.add_issue(item_id, text, file_name, file_size, actor);
        writes.push(added.write);
        let activity = self
            .log(item_id, item_name, ActivityType::Flagged, actor, Some(text))
            .await;
        Step {
            value: added.value,
            writes,
            activity,
        }
    }

    /// Clear the item's issues and mark it reviewed. Returns the cleared issues.
    pub async fn resolve(&self, item_id: &str, item_name: &str, actor: &Actor) -> Step<Vec<Issue>> {
        let removed = self.issues.remove_issues(item_id);
        let mut writes = vec![removed.write];
        if !self.reviews.is_reviewed(item_id) {
            writes.push(self.reviews.toggle_reviewed(item_id, actor).write);
        }
        let activity = self
            .log(item_id, item_name, ActivityType::IssueResolved, actor, None)
            .await;
        Step {
            value: removed.value,
            writes,
            activity,
        }
    }

    /// Clear the item's issues without reviewing it.
    pub async fn delete_issue(&self, item_id: &str, item_name: &str, actor: &Actor) -> Step<Vec<Issue>> {
        let removed = self.issues.remove_issues(item_id);
        let activity = self
            .log(item_id, item_name, ActivityType::IssueDeleted, actor, None)
            .await;
        Step {
            value: removed.value,
            writes: vec![removed.write],
            activity,
        }
    }

    async fn log(
        &self,
        item_id: &str,
        item_name: &str,
        kind: ActivityType,
        actor: &Actor,
        details: Option<&str>,
    ) -> Option<ActivityEntry> {
        let mut activity = NewActivity::new(&self.release_id, self.item_type, item_id, item_name, kind, actor);
        if let Some(details) = details {
            activity = activity.with_details(details);
        }
        self.activity.record(activity).await
    }
}
