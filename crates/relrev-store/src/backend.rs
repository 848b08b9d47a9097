use std::path::PathBuf;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::directory::DirectoryObjectStore;
use crate::error::StoreResult;
use crate::memory::InMemoryObjectStore;
use crate::traits::ObjectStore;

/// Which storage backend a [`crate::Database`] opens.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StoreBackend {
    /// Volatile, process-local storage.
    Memory {
        #[serde(default)]
        quota_bytes: Option<u64>,
    },
    /// One JSON file per collection under `path`.
    Directory {
        path: PathBuf,
        #[serde(default)]
        quota_bytes: Option<u64>,
    },
}

impl Default for StoreBackend {
    fn default() -> Self {
        Self::Memory { quota_bytes: None }
    }
}

impl StoreBackend {
    pub fn quota_bytes(&self) -> Option<u64> {
        match self {
            Self::Memory { quota_bytes } | Self::Directory { quota_bytes, .. } => *quota_bytes,
        }
    }

    pub(crate) async fn connect(&self) -> StoreResult<Arc<dyn ObjectStore>> {
        match self {
            Self::Memory { quota_bytes } => Ok(Arc::new(InMemoryObjectStore::with_quota(*quota_bytes))),
            Self::Directory { path, quota_bytes } => {
                let path = path.clone();
                let quota = *quota_bytes;
                let store = tokio::task::spawn_blocking(move || DirectoryObjectStore::open(&path, quota))
                    .await
                    .map_err(|e| crate::StoreError::Io(std::io::Error::other(e)))??;
                Ok(Arc::new(store))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_is_unbounded_memory() {
        assert_eq!(StoreBackend::default(), StoreBackend::Memory { quota_bytes: None });
        assert_eq!(StoreBackend::default().quota_bytes(), None);
    }

    #[test]
    fn serde_tagged_by_kind() {
        let backend: StoreBackend =
            serde_json::from_str(r#"{"kind":"directory","path":"/tmp/relrev","quota_bytes":1024}"#).unwrap();
        assert_eq!(
            backend,
            StoreBackend::Directory {
                path: PathBuf::from("/tmp/relrev"),
                quota_bytes: Some(1024)
            }
        );
    }
}
