use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tracing::warn;

use crate::error::{EngineError, EngineResult};
use crate::writer::PersistOutcome;

/// A background partition write.
///
/// The in-memory change it belongs to is already visible. Await it to learn
/// whether the change reached the store, or [`PendingWrite::detach`] it to
/// have failures logged instead. Dropping it does not cancel the write.
#[must_use = "await the write or detach it"]
pub struct PendingWrite {
    handle: JoinHandle<EngineResult<PersistOutcome>>,
    runtime: Handle,
}

impl PendingWrite {
    pub(crate) fn spawn<F>(runtime: &Handle, task: F) -> Self
    where
        F: Future<Output = EngineResult<PersistOutcome>> + Send + 'static,
    {
        Self {
            handle: runtime.spawn(task),
            runtime: runtime.clone(),
        }
    }

    /// Stop tracking the write; a failure is logged and otherwise ignored.
    pub fn detach(self) {
        let runtime = self.runtime.clone();
        runtime.spawn(async move {
            match self.await {
                Ok(outcome) if outcome.is_degraded() => {
                    warn!(%outcome, "background write lost detail");
                }
                Ok(_) => {}
                Err(error) => warn!(%error, "background write failed"),
            }
        });
    }
}

impl Future for PendingWrite {
    type Output = EngineResult<PersistOutcome>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.handle).poll(cx).map(|joined| match joined {
            Ok(result) => result,
            Err(e) => Err(EngineError::Task(e.to_string())),
        })
    }
}

/// The synchronous result of a mutation plus the write that makes it durable.
#[must_use = "await the write or detach it"]
pub struct Mutation<T> {
    pub value: T,
    pub write: PendingWrite,
}

impl<T> Mutation<T> {
    /// Wait for the write and return the value if it was persisted.
    pub async fn durable(self) -> EngineResult<(T, PersistOutcome)> {
        let outcome = self.write.await?;
        Ok((self.value, outcome))
    }

    /// Take the value and let the write finish in the background.
    pub fn detach(self) -> T {
        self.write.detach();
        self.value
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use relrev_codec::Fidelity;
    use relrev_store::StoreError;

    fn finished(result: EngineResult<PersistOutcome>) -> PendingWrite {
        PendingWrite::spawn(&Handle::current(), async move { result })
    }

    #[tokio::test]
    async fn resolves_to_task_result() {
        let ok = finished(Ok(PersistOutcome::Stored(Fidelity::Full)));
        assert_eq!(ok.await.unwrap(), PersistOutcome::Stored(Fidelity::Full));

        let failed = finished(Err(StoreError::NotOpen.into()));
        assert!(matches!(failed.await, Err(EngineError::Store(StoreError::NotOpen))));
    }

    #[tokio::test]
    async fn panicked_task_is_a_task_error() {
        let write = PendingWrite::spawn(&Handle::current(), async {
            let fail = true;
            assert!(!fail, "boom");
            Ok::<_, EngineError>(PersistOutcome::Dropped)
        });
        assert!(matches!(write.await, Err(EngineError::Task(_))));
    }

    #[tokio::test]
    async fn mutation_durable_returns_value() {
        let m = Mutation {
            value: 7,
            write: finished(Ok(PersistOutcome::Dropped)),
        };
        assert_eq!(m.durable().await.unwrap(), (7, PersistOutcome::Dropped));
    }

    #[tokio::test]
    async fn write_spawned_from_foreign_thread_runs_on_runtime() {
        let runtime = Handle::current();
        let write = std::thread::spawn(move || {
            PendingWrite::spawn(&runtime, async { Ok::<_, EngineError>(PersistOutcome::Stored(Fidelity::Full)) })
        })
        .join()
        .unwrap();
        assert_eq!(write.await.unwrap(), PersistOutcome::Stored(Fidelity::Full));
    }
}
