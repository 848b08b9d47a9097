use std::sync::Arc;

use relrev_store::{Collection, Database, ObjectStore};
use relrev_types::{ItemType, PartitionKey, Release};
use tracing::info;

use crate::activity::ActivityLog;
use crate::config::EngineConfig;
use crate::error::EngineResult;
use crate::issues::IssueTracker;
use crate::registry::PartitionRegistry;
use crate::releases::ReleaseRepository;
use crate::review::ReviewStateManager;
use crate::snapshot::{self, ImportPlan, ImportReport, Snapshot};
use crate::users::UserDirectory;
use crate::workflow::ReviewWorkflow;
use crate::writer::QuotaAwareWriter;

/// Entry point: one open store and the components that share it.
pub struct Engine {
    config: EngineConfig,
    db: Database,
    store: Arc<dyn ObjectStore>,
    writer: Arc<QuotaAwareWriter>,
    partitions: PartitionRegistry,
}

impl Engine {
    /// Open the backend named in `config`.
    pub async fn open(config: EngineConfig) -> EngineResult<Self> {
        let db = Database::new(config.backend.clone());
        Self::with_database(config, db).await
    }

    /// Open on a caller-constructed database, e.g. one wrapping a test double.
    pub async fn with_database(config: EngineConfig, db: Database) -> EngineResult<Self> {
        config.validate()?;
        let store = db.open().await?;
        let writer = Arc::new(QuotaAwareWriter::new(store.clone(), config.truncated_text_len));
        let engine = Self {
            config,
            db,
            store,
            partitions: PartitionRegistry::new(writer.clone()),
            writer,
        };
        if engine.config.seed_default_users {
            engine.users().seed_defaults().await?;
        }
        info!(backend = ?engine.config.backend, "engine opened");
        Ok(engine)
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn store(&self) -> &Arc<dyn ObjectStore> {
        &self.store
    }

    // ---- Components ----
    //
    // Managers for the same partition share one in-memory copy; see
    // `PartitionRegistry`.

    pub async fn reviews(&self, release_id: &str, item_type: ItemType) -> EngineResult<ReviewStateManager> {
        let cache = self
            .partitions
            .marks(PartitionKey::reviewed(release_id, item_type))
            .await?;
        Ok(ReviewStateManager::from_cache(cache))
    }

    pub async fn issues(&self, release_id: &str, item_type: ItemType) -> EngineResult<IssueTracker> {
        let cache = self
            .partitions
            .issues(PartitionKey::issues(release_id, item_type))
            .await?;
        Ok(IssueTracker::from_cache(cache, self.config.issue_history_limit))
    }

    pub fn activity(&self) -> ActivityLog {
        ActivityLog::new(self.store.clone())
    }

    pub fn releases(&self) -> ReleaseRepository {
        ReleaseRepository::new(self.store.clone())
    }

    pub fn users(&self) -> UserDirectory {
        UserDirectory::new(self.store.clone())
    }

    pub async fn workflow(&self, release_id: &str, item_type: ItemType) -> EngineResult<ReviewWorkflow> {
        Ok(ReviewWorkflow::new(
            release_id,
            item_type,
            self.reviews(release_id, item_type).await?,
            self.issues(release_id, item_type).await?,
            self.activity(),
        ))
    }

    // ---- Releases ----

    pub async fn get_all_releases(&self) -> EngineResult<Vec<Release>> {
        self.releases().get_all().await
    }

    pub async fn get_release_by_id(&self, id: &str) -> EngineResult<Option<Release>> {
        self.releases().get_by_id(id).await
    }

    pub async fn save_release(&self, release: Release) -> EngineResult<Release> {
        self.releases().save(release).await
    }

    /// Delete a release with its activity history and every review and
    /// issue partition it owns. Returns `true` if the release record existed.
    pub async fn delete_release(&self, id: &str) -> EngineResult<bool> {
        let existed = self.releases().delete(id).await?;
        let activities = self.activity().delete_by_release(id).await?;
        for key in PartitionKey::all_for_release(id) {
            self.partitions.purge(&key).await?;
        }
        info!(release = id, existed, activities, "release deleted");
        Ok(existed)
    }

    // ---- Snapshots ----

    pub async fn export(&self) -> EngineResult<Snapshot> {
        snapshot::export(self.store.as_ref(), &self.releases(), &self.activity()).await
    }

    pub async fn export_json(&self) -> EngineResult<String> {
        self.export().await?.to_json()
    }

    /// Replace the entire dataset with a document's content.
    ///
    /// The document is validated first; a malformed one leaves the store
    /// untouched. Managers still held by callers are refreshed with the
    /// imported state.
    pub async fn import_json(&self, document: &str) -> EngineResult<ImportReport> {
        let plan = ImportPlan::parse(document)?;
        let report = snapshot::replay(plan, &self.writer, &self.releases(), &self.activity()).await?;
        self.partitions.reload_all().await?;
        Ok(report)
    }

    /// Number of records in each collection.
    pub async fn collection_sizes(&self) -> EngineResult<Vec<(Collection, usize)>> {
        let mut sizes = Vec::with_capacity(Collection::ALL.len());
        for collection in Collection::ALL {
            sizes.push((collection, self.store.entries(collection).await?.len()));
        }
        Ok(sizes)
    }

    pub async fn close(self) {
        self.db.close().await;
        info!("engine closed");
    }
}
