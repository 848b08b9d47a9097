use std::fs::{File, OpenOptions};
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

use crate::error::{StoreError, StoreResult};

/// One appended record.
///
/// On-disk format is one JSON object per line:
/// ```text
/// {"id":7,"record":{...}}\n
/// ```
#[derive(Debug, PartialEq, Deserialize)]
pub(crate) struct JournalEntry {
    pub id: u64,
    pub record: Value,
}

#[derive(Serialize)]
struct JournalEntryRef<'a> {
    id: u64,
    record: &'a Value,
}

/// Append-only journal for an auto-keyed collection.
///
/// Adds are appended and synced one line at a time, so recording an entry
/// costs the size of that entry regardless of how long the log is. The
/// collection file stays the checkpoint: rewriting it empties the journal.
/// A line that fails to parse marks a torn write; recovery keeps everything
/// before it.
pub(crate) struct Journal {
    path: PathBuf,
    file: Arc<File>,
    len: u64,
}

impl Journal {
    /// Open (or create) the journal and recover its valid entries.
    pub(crate) fn open(path: &Path) -> io::Result<(Self, Vec<JournalEntry>)> {
        let mut file = OpenOptions::new()
            .create(true)
            .read(true)
            .append(true)
            .open(path)?;
        let mut bytes = Vec::new();
        file.read_to_end(&mut bytes)?;

        let mut entries = Vec::new();
        let mut valid = 0usize;
        for line in bytes.split_inclusive(|b| *b == b'\n') {
            if line.last() != Some(&b'\n') {
                warn!(path = %path.display(), offset = valid, "unterminated journal line; stopping recovery");
                break;
            }
            match serde_json::from_slice::<JournalEntry>(line) {
                Ok(entry) => entries.push(entry),
                Err(e) => {
                    warn!(path = %path.display(), offset = valid, error = %e, "unreadable journal line; stopping recovery");
                    break;
                }
            }
            valid += line.len();
        }
        debug!(path = %path.display(), entries = entries.len(), "journal recovered");

        Ok((
            Self {
                path: path.to_path_buf(),
                file: Arc::new(file),
                len: bytes.len() as u64,
            },
            entries,
        ))
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Append one entry and sync it.
    ///
    /// On failure the file is cut back to its previous length so a partial
    /// line never precedes later appends.
    pub(crate) async fn append(&mut self, id: u64, record: &Value) -> StoreResult<()> {
        let mut line = serde_json::to_vec(&JournalEntryRef { id, record })?;
        line.push(b'\n');
        let file = Arc::clone(&self.file);
        let start = self.len;
        let written = line.len() as u64;

        tokio::task::spawn_blocking(move || {
            let result = (&*file).write_all(&line).and_then(|()| file.sync_data());
            if result.is_err() {
                let _ = file.set_len(start);
            }
            result
        })
        .await
        .map_err(|e| StoreError::Io(io::Error::other(e)))??;

        self.len += written;
        debug!(path = %self.path.display(), id, len = written, "journal append");
        Ok(())
    }

    /// Drop every entry; called once the collection file holds them.
    pub(crate) fn truncate(&mut self) -> io::Result<()> {
        self.file.set_len(0)?;
        self.file.sync_data()?;
        self.len = 0;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::fs;

    #[tokio::test]
    async fn appends_survive_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("activityLog.log");
        {
            let (mut journal, recovered) = Journal::open(&path).unwrap();
            assert!(recovered.is_empty());
            journal.append(1, &json!({"id": 1, "releaseId": "R1"})).await.unwrap();
            journal.append(2, &json!({"id": 2, "releaseId": "R2"})).await.unwrap();
        }
        let (journal, recovered) = Journal::open(&path).unwrap();
        assert!(!journal.is_empty());
        assert_eq!(recovered.len(), 2);
        assert_eq!(recovered[1].id, 2);
        assert_eq!(recovered[1].record["releaseId"], "R2");
    }

    #[tokio::test]
    async fn torn_tail_is_ignored() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("activityLog.log");
        fs::write(&path, b"{\"id\":1,\"record\":{\"id\":1}}\n{\"id\":2,\"rec").unwrap();
        let (_, recovered) = Journal::open(&path).unwrap();
        assert_eq!(recovered, vec![JournalEntry { id: 1, record: json!({"id": 1}) }]);
    }

    #[tokio::test]
    async fn truncate_empties_the_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("activityLog.log");
        let (mut journal, _) = Journal::open(&path).unwrap();
        journal.append(1, &json!({})).await.unwrap();
        journal.truncate().unwrap();
        assert!(journal.is_empty());
        assert_eq!(fs::metadata(&path).unwrap().len(), 0);
        journal.append(2, &json!({})).await.unwrap();
        let (_, recovered) = Journal::open(&path).unwrap();
        assert_eq!(recovered.len(), 1);
        assert_eq!(recovered[0].id, 2);
    }
}
