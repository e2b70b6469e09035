use std::future::Future;

use lodestone_metrics::WorldMetrics;
use tokio::task::JoinSet;

use crate::error::{BatchError, WorldError};

/// A batch of spawned world tasks that is always joined in full.
///
/// Tasks start running on `spawn`. `join_all` waits for every one of them
/// before reporting, so a failure never cuts the other tasks short.
pub(crate) struct TaskGroup {
    tasks: JoinSet<Result<(), WorldError>>,
}

impl TaskGroup {
    pub(crate) fn new() -> Self {
        Self {
            tasks: JoinSet::new(),
        }
    }

    pub(crate) fn spawn<F>(&mut self, task: F)
    where
        F: Future<Output = Result<(), WorldError>> + Send + 'static,
    {
        self.tasks.spawn(task);
    }

    pub(crate) fn len(&self) -> usize {
        self.tasks.len()
    }

    /// Wait for every task. Returns how many succeeded, or a [`BatchError`]
    /// listing each failure.
    pub(crate) async fn join_all(mut self, metrics: Option<&WorldMetrics>) -> Result<usize, WorldError> {
        let mut succeeded = 0;
        let mut failures = Vec::new();

        while let Some(joined) = self.tasks.join_next().await {
            let failure = match joined {
                Ok(Ok(())) => {
                    succeeded += 1;
                    continue;
                }
                Ok(Err(e)) => e,
                Err(e) => WorldError::Task(e.to_string()),
            };
            log::warn!("World task failed: {}", failure);
            if let Some(m) = metrics {
                m.record_task_failure();
            }
            failures.push(failure);
        }

        if failures.is_empty() {
            Ok(succeeded)
        } else {
            Err(BatchError { failures, succeeded }.into())
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use lodestone_chunk::ChunkPos;

    use super::*;

    #[tokio::test]
    async fn test_failure_does_not_cancel_siblings() {
        let finished = Arc::new(AtomicUsize::new(0));
        let metrics = WorldMetrics::new();
        let mut group = TaskGroup::new();

        group.spawn(async { Err(WorldError::ChunkNotLoaded(ChunkPos::new(0, 0))) });
        for _ in 0..4 {
            let finished = Arc::clone(&finished);
            group.spawn(async move {
                tokio::time::sleep(Duration::from_millis(20)).await;
                finished.fetch_add(1, Ordering::SeqCst);
                Ok::<_, WorldError>(())
            });
        }
        assert_eq!(group.len(), 5);

        let err = group.join_all(Some(&metrics)).await.unwrap_err();
        assert_eq!(finished.load(Ordering::SeqCst), 4);
        let WorldError::Batch(batch) = err else {
            panic!("Should be a batch");
        };
        assert_eq!(batch.succeeded, 4);
        assert_eq!(batch.failures.len(), 1);
        assert_eq!(metrics.task_failures(), 1);
    }

    #[tokio::test]
    async fn test_panic_becomes_task_error() {
        let mut group = TaskGroup::new();
        let explode = true;
        group.spawn(async move {
            if explode {
                panic!("boom");
            }
            Ok::<_, WorldError>(())
        });
        group.spawn(async { Ok::<_, WorldError>(()) });

        let failures = group.join_all(None).await.unwrap_err().into_failures();
        assert_eq!(failures.len(), 1);
        assert!(matches!(failures[0], WorldError::Task(_)));
    }

    #[tokio::test]
    async fn test_empty_group() {
        assert_eq!(TaskGroup::new().join_all(None).await.unwrap(), 0);
    }
}
