//! Bounded worker pool
//!
//! Every item gets its own task, but a task is only started once one of the
//! pool's permits is free, so at most `workers` jobs are in flight at any
//! time. Finished jobs push their outcome into a channel drained by the
//! caller; a job that panics is reported as a [`TaskFailure`] without
//! affecting its siblings.

use std::future::Future;
use std::sync::Arc;

use tokio::sync::{mpsc, Semaphore};
use tracing::{debug, info};

use crate::error::TaskFailure;

const PROGRESS_INTERVAL: usize = 100;

#[derive(Debug)]
pub struct TaskOutcome<T, R> {
    pub item: T,
    pub result: Result<R, TaskFailure>,
}

#[derive(Debug, Clone, Copy)]
pub struct WorkerPool {
    workers: usize,
}

impl WorkerPool {
    pub fn new(workers: usize) -> Self {
        Self {
            workers: workers.max(1),
        }
    }

    pub fn workers(&self) -> usize {
        self.workers
    }

    /// Run `job` over every item and return the outcomes in completion order.
    pub async fn run<T, R, F, Fut>(&self, items: Vec<T>, job: F) -> Vec<TaskOutcome<T, R>>
    where
        T: Clone + Send + 'static,
        R: Send + 'static,
        F: Fn(T) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = R> + Send + 'static,
    {
        let total = items.len();
        let semaphore = Arc::new(Semaphore::new(self.workers));
        let job = Arc::new(job);
        let (tx, mut rx) = mpsc::unbounded_channel();

        debug!("Scheduling {} tasks on {} workers", total, self.workers);

        let scheduler = {
            let semaphore = Arc::clone(&semaphore);
            async move {
                for item in items {
                    let Ok(permit) = Arc::clone(&semaphore).acquire_owned().await else {
                        break;
                    };
                    let job = Arc::clone(&job);
                    let tx = tx.clone();
                    tokio::spawn(async move {
                        // Inner task so a panic surfaces as a JoinError
                        let result = tokio::spawn((*job)(item.clone()))
                            .await
                            .map_err(TaskFailure::from);
                        drop(permit);
                        let _ = tx.send(TaskOutcome { item, result });
                    });
                }
            }
        };

        let collector = async {
            let mut outcomes = Vec::with_capacity(total);
            while let Some(outcome) = rx.recv().await {
                outcomes.push(outcome);
                let done = outcomes.len();
                if done % PROGRESS_INTERVAL == 0 && done < total {
                    info!("{}/{} ({}%)", done, total, 100 * done / total);
                }
            }
            outcomes
        };

        let ((), outcomes) = tokio::join!(scheduler, collector);
        info!("{}/{} tasks finished", outcomes.len(), total);
        outcomes
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrency_bound() {
        let in_flight = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));

        let pool = WorkerPool::new(3);
        let outcomes = {
            let in_flight = Arc::clone(&in_flight);
            let peak = Arc::clone(&peak);
            pool.run((0..40).collect(), move |n: u32| {
                let in_flight = Arc::clone(&in_flight);
                let peak = Arc::clone(&peak);
                async move {
                    let now = in_flight.fetch_add(1, Ordering::SeqCst) + 1;
                    peak.fetch_max(now, Ordering::SeqCst);
                    tokio::time::sleep(Duration::from_millis(2 + (n % 5) as u64)).await;
                    in_flight.fetch_sub(1, Ordering::SeqCst);
                    n * 2
                }
            })
            .await
        };

        assert_eq!(outcomes.len(), 40);
        assert!(peak.load(Ordering::SeqCst) <= 3);
        assert!(peak.load(Ordering::SeqCst) >= 1);

        let mut doubled: Vec<u32> = outcomes.into_iter().map(|o| o.result.unwrap()).collect();
        doubled.sort();
        assert_eq!(doubled, (0..40).map(|n| n * 2).collect::<Vec<_>>());
    }

    #[tokio::test]
    async fn test_panicking_job_is_isolated() {
        let pool = WorkerPool::new(2);
        let outcomes = pool
            .run(vec!["a", "boom", "c"], |item: &'static str| async move {
                if item == "boom" {
                    panic!("bad spec {}", item);
                }
                item.len()
            })
            .await;

        assert_eq!(outcomes.len(), 3);
        for outcome in outcomes {
            match outcome.item {
                "boom" => {
                    let err = outcome.result.unwrap_err();
                    assert!(err.0.contains("bad spec boom"));
                }
                _ => assert_eq!(outcome.result.unwrap(), 1),
            }
        }
    }

    #[tokio::test]
    async fn test_empty_input() {
        let outcomes = WorkerPool::new(4)
            .run(Vec::<u8>::new(), |n| async move { n })
            .await;
        assert!(outcomes.is_empty());
    }

    #[test]
    fn test_zero_workers_becomes_one() {
        assert_eq!(WorkerPool::new(0).workers(), 1);
    }
}
