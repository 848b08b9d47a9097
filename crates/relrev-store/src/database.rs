use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::info;

use crate::backend::StoreBackend;
use crate::error::{StoreError, StoreResult};
use crate::traits::ObjectStore;

enum Source {
    Backend(StoreBackend),
    Injected(Arc<dyn ObjectStore>),
}

/// Owner of one live store handle.
///
/// `open` is idempotent and safe to call concurrently: the first caller
/// connects, every other caller (concurrent or later) receives the same
/// handle until `close` is called. Constructed explicitly and passed to each
/// component that needs storage.
pub struct Database {
    source: Source,
    handle: Mutex<Option<Arc<dyn ObjectStore>>>,
}

impl Database {
    pub fn new(backend: StoreBackend) -> Self {
        Self {
            source: Source::Backend(backend),
            handle: Mutex::new(None),
        }
    }

    /// Wrap an already-constructed store (host-provided or test double).
    pub fn with_store(store: Arc<dyn ObjectStore>) -> Self {
        Self {
            source: Source::Injected(store),
            handle: Mutex::new(None),
        }
    }

    /// Return the live handle, connecting on first use.
    pub async fn open(&self) -> StoreResult<Arc<dyn ObjectStore>> {
        let mut handle = self.handle.lock().await;
        if let Some(store) = handle.as_ref() {
            return Ok(Arc::clone(store));
        }
        let store = match &self.source {
            Source::Backend(backend) => {
                let store = backend.connect().await?;
                info!(?backend, "database opened");
                store
            }
            Source::Injected(store) => Arc::clone(store),
        };
        *handle = Some(Arc::clone(&store));
        Ok(store)
    }

    /// The live handle, without connecting.
    pub async fn handle(&self) -> StoreResult<Arc<dyn ObjectStore>> {
        self.handle
            .lock()
            .await
            .as_ref()
            .map(Arc::clone)
            .ok_or(StoreError::NotOpen)
    }

    /// Release the live handle. Outstanding clones stay usable; the next
    /// `open` connects again.
    pub async fn close(&self) {
        if self.handle.lock().await.take().is_some() {
            info!("database closed");
        }
    }

    pub async fn is_open(&self) -> bool {
        self.handle.lock().await.is_some()
    }
}

impl std::fmt::Debug for Database {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let source = match &self.source {
            Source::Backend(backend) => format!("{backend:?}"),
            Source::Injected(_) => "injected".to_string(),
        };
        f.debug_struct("Database").field("source", &source).finish()
    }
}
