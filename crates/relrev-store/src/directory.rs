use std::collections::BTreeMap;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::error::{StoreError, StoreResult};
use crate::schema::{Collection, Key, SCHEMA_VERSION};
use crate::journal::Journal;
use crate::tables::{record_size, Table, Tables, Undo};
use crate::traits::ObjectStore;

/// On-disk layout of one collection file.
///
/// ```text
/// <root>/<collection>.json
/// { "version": 1, "collection": "issues", "nextId": 1, "rows": [[key, record], ...] }
/// ```
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct CollectionFileRef<'a> {
    version: u32,
    collection: Collection,
    next_id: u64,
    rows: Vec<(&'a Key, &'a Value)>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct CollectionFile {
    version: u32,
    collection: Collection,
    next_id: u64,
    rows: Vec<(Key, Value)>,
}

/// Per-device store that keeps one JSON file per collection.
///
/// The whole dataset is loaded on open and served from memory. A keyed
/// collection is written by replacing its file atomically (temp file in the
/// same directory, fsync, rename). Auto-keyed collections also keep an
/// append journal (`<collection>.log`): an add appends one synced line, and
/// the collection file is only rewritten on put, delete or clear, and when a
/// non-empty journal is found on open. A change that cannot be made durable
/// is rolled back in memory before the lock is released.
///
/// Journal entries whose id is below the collection file's `nextId` are
/// already reflected in the file (kept or deleted) and are skipped on
/// recovery, so a crash between rewriting the file and emptying the journal
/// never brings deleted records back.
pub struct DirectoryObjectStore {
    root: PathBuf,
    state: Mutex<DirState>,
}

struct DirState {
    tables: Tables,
    journals: BTreeMap<Collection, Journal>,
}

impl DirectoryObjectStore {
    /// Open (or create) a store rooted at `root`.
    ///
    /// Fails with [`StoreError::VersionConflict`] if any collection file was
    /// written by a newer schema, and with [`StoreError::Corrupt`] if a file
    /// cannot be decoded.
    pub fn open(root: &Path, quota: Option<u64>) -> StoreResult<Self> {
        fs::create_dir_all(root)?;
        let mut tables = Tables::new(quota);
        let mut journals = BTreeMap::new();

        for collection in Collection::ALL {
            let mut table = read_collection(root, collection)?;
            if collection.schema().auto_increment {
                let (mut journal, entries) = Journal::open(&journal_path(root, collection))?;
                let checkpoint = table.next_id();
                let mut replayed = 0usize;
                for entry in entries.into_iter().filter(|e| e.id >= checkpoint) {
                    let key = Key::Auto(entry.id);
                    let size = record_size(&key, &entry.record)?;
                    table.insert(key, entry.record, size);
                    replayed += 1;
                }
                if !journal.is_empty() {
                    write_atomic(root, &collection_path(root, collection), &encode_table(collection, &table)?)?;
                    journal.truncate()?;
                    debug!(%collection, replayed, "journal folded into collection file");
                }
                journals.insert(collection, journal);
            }
            tables.load(collection, table);
        }

        info!(
            root = %root.display(),
            bytes = tables.bytes_used(),
            quota = ?tables.quota(),
            "opened directory store"
        );
        Ok(Self {
            root: root.to_path_buf(),
            state: Mutex::new(DirState { tables, journals }),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Bytes currently counted against the quota.
    pub async fn bytes_used(&self) -> u64 {
        self.state.lock().await.tables.bytes_used()
    }

    /// Rewrite the collection file from memory and empty its journal.
    async fn checkpoint(&self, state: &mut DirState, collection: Collection) -> StoreResult<()> {
        let bytes = encode_table(collection, state.tables.table(collection))?;
        let root = self.root.clone();
        let path = collection_path(&self.root, collection);
        let len = bytes.len();

        tokio::task::spawn_blocking(move || write_atomic(&root, &path, &bytes))
            .await
            .map_err(|e| StoreError::Io(io::Error::other(e)))??;
        debug!(%collection, len, "collection file replaced");

        if let Some(journal) = state.journals.get_mut(&collection) {
            // Entries left behind sit below the new nextId and are skipped.
            if let Err(error) = journal.truncate() {
                warn!(%collection, %error, "journal not emptied after checkpoint");
            }
        }
        Ok(())
    }
}

/// Keep an applied change if it was made durable, otherwise undo it.
fn keep_or_rollback(
    state: &mut DirState,
    collection: Collection,
    undo: Undo,
    durable: StoreResult<()>,
) -> StoreResult<()> {
    if let Err(e) = durable {
        state.tables.rollback(collection, undo);
        return Err(e);
    }
    Ok(())
}

fn read_collection(root: &Path, collection: Collection) -> StoreResult<Table> {
    let bytes = match fs::read(collection_path(root, collection)) {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Table::default()),
        Err(e) => return Err(e.into()),
    };
    let file: CollectionFile = serde_json::from_slice(&bytes).map_err(|e| StoreError::Corrupt {
        collection,
        reason: e.to_string(),
    })?;
    if file.version > SCHEMA_VERSION {
        return Err(StoreError::VersionConflict {
            expected: SCHEMA_VERSION,
            found: file.version,
        });
    }
    if file.collection != collection {
        return Err(StoreError::Corrupt {
            collection,
            reason: format!("file holds collection {}", file.collection),
        });
    }
    Table::from_rows(file.rows, file.next_id)
}

fn encode_table(collection: Collection, table: &Table) -> StoreResult<Vec<u8>> {
    let file = CollectionFileRef {
        version: SCHEMA_VERSION,
        collection,
        next_id: table.next_id(),
        rows: table.rows().collect(),
    };
    Ok(serde_json::to_vec(&file)?)
}

fn collection_path(root: &Path, collection: Collection) -> PathBuf {
    root.join(format!("{}.json", collection.name()))
}

fn journal_path(root: &Path, collection: Collection) -> PathBuf {
    root.join(format!("{}.log", collection.name()))
}

fn write_atomic(dir: &Path, path: &Path, bytes: &[u8]) -> io::Result<()> {
    let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
    tmp.write_all(bytes)?;
    tmp.as_file().sync_all()?;
    tmp.persist(path).map_err(|e| e.error)?;
    Ok(())
}

#[async_trait]
impl ObjectStore for DirectoryObjectStore {
    async fn get(&self, collection: Collection, key: &Key) -> StoreResult<Option<Value>> {
        Ok(self.state.lock().await.tables.get(collection, key))
    }

    async fn put(&self, collection: Collection, key: Key, value: Value) -> StoreResult<()> {
        let mut state = self.state.lock().await;
        let undo = state.tables.put(collection, key, value)?;
        let durable = self.checkpoint(&mut state, collection).await;
        keep_or_rollback(&mut state, collection, undo, durable)
    }

    async fn add(&self, collection: Collection, value: Value) -> StoreResult<u64> {
        let mut guard = self.state.lock().await;
        let state = &mut *guard;
        let (id, undo) = state.tables.add(collection, value)?;
        let durable = match state.journals.get_mut(&collection) {
            Some(journal) => match state.tables.table(collection).get(&Key::Auto(id)) {
                Some(record) => journal.append(id, record).await,
                None => Ok(()),
            },
            None => self.checkpoint(state, collection).await,
        };
        keep_or_rollback(state, collection, undo, durable)?;
        Ok(id)
    }

    async fn delete(&self, collection: Collection, key: &Key) -> StoreResult<bool> {
        let mut state = self.state.lock().await;
        let Some(undo) = state.tables.delete(collection, key) else {
            return Ok(false);
        };
        let durable = self.checkpoint(&mut state, collection).await;
        keep_or_rollback(&mut state, collection, undo, durable)?;
        Ok(true)
    }

    async fn entries(&self, collection: Collection) -> StoreResult<Vec<(Key, Value)>> {
        Ok(self.state.lock().await.tables.entries(collection))
    }

    async fn scan_by_index(
        &self,
        collection: Collection,
        index: &str,
        value: &Value,
    ) -> StoreResult<Vec<Value>> {
        self.state.lock().await.tables.scan(collection, index, value)
    }

    async fn clear(&self, collection: Collection) -> StoreResult<()> {
        let mut state = self.state.lock().await;
        let undo = state.tables.clear(collection);
        let durable = self.checkpoint(&mut state, collection).await;
        keep_or_rollback(&mut state, collection, undo, durable)
    }
}

impl std::fmt::Debug for DirectoryObjectStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DirectoryObjectStore")
            .field("root", &self.root)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn records_survive_reopen() {
        let dir = tempfile::tempdir().unwrap();
        {
            let store = DirectoryObjectStore::open(dir.path(), None).unwrap();
            store
                .put(Collection::Releases, Key::from("R1"), json!({"id": "R1"}))
                .await
                .unwrap();
            store
                .add(Collection::ActivityLog, json!({"releaseId": "R1"}))
                .await
                .unwrap();
        }
        let store = DirectoryObjectStore::open(dir.path(), None).unwrap();
        assert_eq!(
            store.get(Collection::Releases, &Key::from("R1")).await.unwrap(),
            Some(json!({"id": "R1"}))
        );
        let next = store
            .add(Collection::ActivityLog, json!({"releaseId": "R1"}))
            .await
            .unwrap();
        assert_eq!(next, 2);
    }

    #[tokio::test]
    async fn quota_failure_leaves_file_untouched() {
        let dir = tempfile::tempdir().unwrap();
        let store = DirectoryObjectStore::open(dir.path(), Some(32)).unwrap();
        store.put(Collection::Issues, Key::from("k"), json!("ok")).await.unwrap();
        let before = fs::read(dir.path().join("issues.json")).unwrap();

        let err = store
            .put(Collection::Issues, Key::from("k"), json!("z".repeat(100)))
            .await
            .unwrap_err();
        assert!(err.is_quota());
        assert_eq!(fs::read(dir.path().join("issues.json")).unwrap(), before);
        assert_eq!(store.get(Collection::Issues, &Key::from("k")).await.unwrap(), Some(json!("ok")));
    }

    #[tokio::test]
    async fn newer_schema_is_a_version_conflict() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join("users.json"),
            serde_json::to_vec(&json!({
                "version": SCHEMA_VERSION + 1,
                "collection": "users",
                "nextId": 1,
                "rows": []
            }))
            .unwrap(),
        )
        .unwrap();
        let err = DirectoryObjectStore::open(dir.path(), None).unwrap_err();
        assert!(matches!(err, StoreError::VersionConflict { found, .. } if found == SCHEMA_VERSION + 1));
    }

    #[tokio::test]
    async fn garbage_file_is_corrupt() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("reviewed.json"), b"{not json").unwrap();
        let err = DirectoryObjectStore::open(dir.path(), None).unwrap_err();
        assert!(matches!(err, StoreError::Corrupt { collection: Collection::Reviewed, .. }));
    }

    #[tokio::test]
    async fn clear_persists_empty_collection() {
        let dir = tempfile::tempdir().unwrap();
        let store = DirectoryObjectStore::open(dir.path(), None).unwrap();
        store.put(Collection::Users, Key::from("users"), json!([])).await.unwrap();
        store.clear(Collection::Users).await.unwrap();
        drop(store);
        let store = DirectoryObjectStore::open(dir.path(), None).unwrap();
        assert!(store.entries(Collection::Users).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn adds_go_to_the_journal_only() {
        let dir = tempfile::tempdir().unwrap();
        let store = DirectoryObjectStore::open(dir.path(), None).unwrap();
        for release in ["R1", "R2", "R3"] {
            store.add(Collection::ActivityLog, json!({"releaseId": release})).await.unwrap();
        }
        assert!(!dir.path().join("activityLog.json").exists());
        let journal = fs::read_to_string(dir.path().join("activityLog.log")).unwrap();
        assert_eq!(journal.lines().count(), 3);

        assert!(store.delete(Collection::ActivityLog, &Key::Auto(2)).await.unwrap());
        assert!(dir.path().join("activityLog.json").exists());
        assert_eq!(fs::metadata(dir.path().join("activityLog.log")).unwrap().len(), 0);
    }

    #[tokio::test]
    async fn journal_is_folded_in_on_open() {
        let dir = tempfile::tempdir().unwrap();
        {
            let store = DirectoryObjectStore::open(dir.path(), None).unwrap();
            store.add(Collection::ActivityLog, json!({"releaseId": "R1"})).await.unwrap();
            store.add(Collection::ActivityLog, json!({"releaseId": "R2"})).await.unwrap();
        }
        let store = DirectoryObjectStore::open(dir.path(), None).unwrap();
        assert_eq!(store.entries(Collection::ActivityLog).await.unwrap().len(), 2);
        assert_eq!(fs::metadata(dir.path().join("activityLog.log")).unwrap().len(), 0);
        drop(store);

        let store = DirectoryObjectStore::open(dir.path(), None).unwrap();
        let records = store
            .scan_by_index(Collection::ActivityLog, "releaseId", &json!("R2"))
            .await
            .unwrap();
        assert_eq!(records, vec![json!({"id": 2, "releaseId": "R2"})]);
    }

    #[tokio::test]
    async fn stale_journal_entries_do_not_resurrect_deletes() {
        let dir = tempfile::tempdir().unwrap();
        {
            let store = DirectoryObjectStore::open(dir.path(), None).unwrap();
            store.add(Collection::ActivityLog, json!({"releaseId": "R1"})).await.unwrap();
            store.add(Collection::ActivityLog, json!({"releaseId": "R2"})).await.unwrap();
            store.delete(Collection::ActivityLog, &Key::Auto(1)).await.unwrap();
        }
        // as if the journal had not been emptied after the rewrite
        fs::write(
            dir.path().join("activityLog.log"),
            b"{\"id\":1,\"record\":{\"id\":1,\"releaseId\":\"R1\"}}\n",
        )
        .unwrap();

        let store = DirectoryObjectStore::open(dir.path(), None).unwrap();
        assert_eq!(store.get(Collection::ActivityLog, &Key::Auto(1)).await.unwrap(), None);
        assert!(store.get(Collection::ActivityLog, &Key::Auto(2)).await.unwrap().is_some());
        assert_eq!(store.add(Collection::ActivityLog, json!({})).await.unwrap(), 3);
    }

    #[tokio::test]
    async fn failed_rewrite_rolls_back_memory() {
        let dir = tempfile::tempdir().unwrap();
        let store = DirectoryObjectStore::open(dir.path(), None).unwrap();
        store.put(Collection::Releases, Key::from("R1"), json!({"id": "R1"})).await.unwrap();
        // a directory where the collection file should go makes the rename fail
        fs::remove_file(dir.path().join("releases.json")).unwrap();
        fs::create_dir(dir.path().join("releases.json")).unwrap();

        assert!(store.put(Collection::Releases, Key::from("R2"), json!({"id": "R2"})).await.is_err());
        assert_eq!(store.get(Collection::Releases, &Key::from("R2")).await.unwrap(), None);
        assert!(store.get(Collection::Releases, &Key::from("R1")).await.unwrap().is_some());
    }
}
