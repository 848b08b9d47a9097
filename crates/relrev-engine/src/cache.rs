use std::marker::PhantomData;
use std::sync::{Arc, PoisonError, RwLock};

use relrev_codec::{Partition, PartitionCodec};
use relrev_store::Key;
use relrev_types::PartitionKey;
use tokio::runtime::Handle;
use tokio::sync::Mutex;
use tracing::debug;

use crate::error::{EngineError, EngineResult};
use crate::pending::PendingWrite;
use crate::writer::{collection_for, QuotaAwareWriter};

/// One partition held in memory and written back as a whole.
///
/// Reads are served from memory. A mutation is applied under the write lock
/// and a persist task is queued behind `gate`; tasks take the gate in the
/// order they were queued and each one encodes the state current when it
/// runs, so the last write to land always reflects the latest mutation.
///
/// Persist tasks run on the runtime that loaded the cache, so mutations may
/// be issued from threads outside it.
pub(crate) struct PartitionCache<C: PartitionCodec> {
    key: PartitionKey,
    state: Arc<RwLock<Partition<C::Record>>>,
    writer: Arc<QuotaAwareWriter>,
    gate: Arc<Mutex<()>>,
    runtime: Handle,
    _codec: PhantomData<fn() -> C>,
}

impl<C: PartitionCodec + 'static> PartitionCache<C> {
    pub(crate) async fn load(writer: Arc<QuotaAwareWriter>, key: PartitionKey) -> EngineResult<Self> {
        let runtime = Handle::try_current().map_err(|e| EngineError::Task(e.to_string()))?;
        let partition = Self::fetch(&writer, &key).await?;
        debug!(key = %key, items = partition.len(), "partition loaded");
        Ok(Self {
            key,
            state: Arc::new(RwLock::new(partition)),
            writer,
            gate: Arc::new(Mutex::new(())),
            runtime,
            _codec: PhantomData,
        })
    }

    async fn fetch(writer: &QuotaAwareWriter, key: &PartitionKey) -> EngineResult<Partition<C::Record>> {
        let raw = writer
            .store()
            .get(collection_for(key), &Key::from(key.to_string()))
            .await?;
        Ok(raw.map(|value| C::decode(&value)).unwrap_or_default())
    }

    pub(crate) fn key(&self) -> &PartitionKey {
        &self.key
    }

    pub(crate) fn read<R>(&self, f: impl FnOnce(&Partition<C::Record>) -> R) -> R {
        let guard = self.state.read().unwrap_or_else(PoisonError::into_inner);
        f(&guard)
    }

    /// Apply `f` to the in-memory partition and queue a write-back.
    pub(crate) fn mutate<R>(
        &self,
        f: impl FnOnce(&mut Partition<C::Record>) -> R,
    ) -> (R, PendingWrite) {
        let result = {
            let mut guard = self.state.write().unwrap_or_else(PoisonError::into_inner);
            f(&mut guard)
        };
        (result, self.schedule())
    }

    /// Replace the in-memory state with what the store currently holds.
    /// Waits for writes already queued.
    pub(crate) async fn reload(&self) -> EngineResult<()> {
        let _turn = self.gate.lock().await;
        let partition = Self::fetch(&self.writer, &self.key).await?;
        debug!(key = %self.key, items = partition.len(), "partition reloaded");
        *self.state.write().unwrap_or_else(PoisonError::into_inner) = partition;
        Ok(())
    }

    /// Delete the stored partition and empty the in-memory one.
    /// Waits for writes already queued.
    pub(crate) async fn purge(&self) -> EngineResult<()> {
        let _turn = self.gate.lock().await;
        self.writer
            .store()
            .delete(collection_for(&self.key), &Key::from(self.key.to_string()))
            .await?;
        self.state.write().unwrap_or_else(PoisonError::into_inner).clear();
        Ok(())
    }

    fn schedule(&self) -> PendingWrite {
        let key = self.key.clone();
        let state = Arc::clone(&self.state);
        let writer = Arc::clone(&self.writer);
        let gate = Arc::clone(&self.gate);
        PendingWrite::spawn(&self.runtime, async move {
            let _turn = gate.lock().await;
            let snapshot = state.read().unwrap_or_else(PoisonError::into_inner).clone();
            writer.persist::<C>(&key, &snapshot).await
        })
    }
}
