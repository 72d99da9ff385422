//! Bounded concurrent processing.
//!
//! At most `max_concurrency` tasks run at once. The dispatch loop waits for a
//! free slot before spawning the next task, and [`ConcurrentProcessor::run`]
//! returns only after every spawned task has finished.

use futures::future::join_all;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tracing::{error, warn};

/// Upper bound accepted for the pool size.
pub const MAX_CONCURRENCY: usize = 100;

/// Semaphore-guarded task pool with a join barrier.
#[derive(Debug, Clone)]
pub struct ConcurrentProcessor {
    max_concurrency: usize,
}

impl ConcurrentProcessor {
    /// Create a pool running at most `max_concurrency` tasks (clamped to 1..=100).
    pub fn new(max_concurrency: usize) -> Self {
        Self {
            max_concurrency: max_concurrency.clamp(1, MAX_CONCURRENCY),
        }
    }

    pub fn max_concurrency(&self) -> usize {
        self.max_concurrency
    }

    /// Run `task` once per item and collect the results.
    ///
    /// Results are returned in item order. A task that
    /// panics is logged and contributes no result; its siblings keep running.
    pub async fn run<I, T, F, Fut>(&self, items: Vec<I>, task: F) -> Vec<T>
    where
        F: Fn(I) -> Fut,
        Fut: Future<Output = T> + Send + 'static,
        T: Send + 'static,
    {
        let semaphore = Arc::new(Semaphore::new(self.max_concurrency));
        let mut handles = Vec::with_capacity(items.len());

        for item in items {
            let permit = match semaphore.clone().acquire_owned().await {
                Ok(permit) => permit,
                Err(e) => {
                    warn!(error = %e, "Worker pool closed, not dispatching remaining tasks");
                    break;
                }
            };

            let future = task(item);
            handles.push(tokio::spawn(async move {
                let _permit = permit;
                future.await
            }));
        }

        join_all(handles)
            .await
            .into_iter()
            .filter_map(|joined| match joined {
                Ok(value) => Some(value),
                Err(e) => {
                    error!(error = %e, "Task panicked");
                    None
                }
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[test]
    fn test_concurrency_is_clamped() {
        assert_eq!(ConcurrentProcessor::new(0).max_concurrency(), 1);
        assert_eq!(ConcurrentProcessor::new(5).max_concurrency(), 5);
        assert_eq!(ConcurrentProcessor::new(1000).max_concurrency(), 100);
    }

    #[tokio::test]
    async fn test_never_exceeds_limit_and_waits_for_all() {
        let running = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));
        let done = Arc::new(AtomicUsize::new(0));

        let results = ConcurrentProcessor::new(2)
            .run((0..10).collect(), |i: usize| {
                let running = running.clone();
                let peak = peak.clone();
                let done = done.clone();
                async move {
                    let now = running.fetch_add(1, Ordering::SeqCst) + 1;
                    peak.fetch_max(now, Ordering::SeqCst);
                    tokio::time::sleep(Duration::from_millis(10)).await;
                    running.fetch_sub(1, Ordering::SeqCst);
                    done.fetch_add(1, Ordering::SeqCst);
                    i * 2
                }
            })
            .await;

        assert_eq!(done.load(Ordering::SeqCst), 10);
        assert!(peak.load(Ordering::SeqCst) <= 2);
        assert_eq!(results, (0..10).map(|i| i * 2).collect::<Vec<_>>());
    }

    #[tokio::test]
    async fn test_panicking_task_is_contained() {
        let results = ConcurrentProcessor::new(3)
            .run(vec![1, 2, 3, 4], |i: u32| async move {
                if i == 3 {
                    panic!("boom");
                }
                i
            })
            .await;

        assert_eq!(results, vec![1, 2, 4]);
    }

    #[tokio::test]
    async fn test_empty_input() {
        let results: Vec<()> = ConcurrentProcessor::new(2)
            .run(Vec::<()>::new(), |_| async {})
            .await;
        assert!(results.is_empty());
    }
}
