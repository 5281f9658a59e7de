//! Bounded worker pool for delegated crew tasks.
//!
//! Jobs are queued on a bounded channel (submission waits when the queue is
//! full) and drained by a fixed number of tokio workers. `run` returns once
//! every worker has finished, with results in submission order.

use std::future::Future;
use std::sync::Arc;

use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinSet;

use crate::error::RealtyError;

pub struct WorkerPool {
    workers: usize,
    queue_capacity: usize,
}

impl WorkerPool {
    pub fn new(workers: usize) -> Self {
        let workers = workers.max(1);
        Self {
            workers,
            queue_capacity: workers * 2,
        }
    }

    pub fn workers(&self) -> usize {
        self.workers
    }

    /// Run every job and wait for all of them. The first job error (in
    /// submission order) is returned after the pool has drained.
    pub async fn run<J, Fut, R>(&self, jobs: Vec<J>) -> Result<Vec<R>, RealtyError>
    where
        J: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<R, RealtyError>> + Send + 'static,
        R: Send + 'static,
    {
        let total = jobs.len();
        if total == 0 {
            return Ok(Vec::new());
        }

        let (tx, rx) = mpsc::channel::<(usize, J)>(self.queue_capacity);
        let rx = Arc::new(Mutex::new(rx));
        let mut set = JoinSet::new();

        for worker_id in 0..self.workers.min(total) {
            let rx = rx.clone();
            set.spawn(async move {
                let mut done = Vec::new();
                loop {
                    let next = rx.lock().await.recv().await;
                    let Some((index, job)) = next else { break };
                    tracing::debug!("[WorkerPool] worker {} picked job {}", worker_id, index);
                    done.push((index, job().await));
                }
                done
            });
        }

        for (index, job) in jobs.into_iter().enumerate() {
            if tx.send((index, job)).await.is_err() {
                break;
            }
        }
        drop(tx);

        let mut slots: Vec<Option<Result<R, RealtyError>>> = (0..total).map(|_| None).collect();
        while let Some(joined) = set.join_next().await {
            let done = joined
                .map_err(|e| RealtyError::Crew(format!("Worker task failed: {}", e)))?;
            for (index, result) in done {
                slots[index] = Some(result);
            }
        }

        slots
            .into_iter()
            .enumerate()
            .map(|(index, slot)| {
                slot.unwrap_or_else(|| {
                    Err(RealtyError::Crew(format!("Job {} produced no result", index)))
                })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use super::*;

    #[tokio::test]
    async fn test_bounded_concurrency_and_order() {
        let running = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));

        let jobs: Vec<_> = (0..10u64)
            .map(|i| {
                let running = running.clone();
                let peak = peak.clone();
                move || async move {
                    let now = running.fetch_add(1, Ordering::SeqCst) + 1;
                    peak.fetch_max(now, Ordering::SeqCst);
                    // Later jobs finish first
                    tokio::time::sleep(Duration::from_millis(20 - i)).await;
                    running.fetch_sub(1, Ordering::SeqCst);
                    Ok::<_, RealtyError>(format!("property-{}", i))
                }
            })
            .collect();

        let results = WorkerPool::new(3).run(jobs).await.unwrap();

        assert!(peak.load(Ordering::SeqCst) <= 3);
        assert_eq!(results.len(), 10);
        assert_eq!(results[0], "property-0");
        assert_eq!(results[9], "property-9");
    }

    #[tokio::test]
    async fn test_job_error_is_returned_after_drain() {
        let finished = Arc::new(AtomicUsize::new(0));
        let jobs: Vec<_> = (0..4)
            .map(|i| {
                let finished = finished.clone();
                move || async move {
                    finished.fetch_add(1, Ordering::SeqCst);
                    if i == 1 {
                        Err(RealtyError::Crew("analysis failed".to_string()))
                    } else {
                        Ok(i)
                    }
                }
            })
            .collect();

        let err = WorkerPool::new(2).run(jobs).await.unwrap_err();
        assert!(err.to_string().contains("analysis failed"));
        assert_eq!(finished.load(Ordering::SeqCst), 4);
    }

    #[tokio::test]
    async fn test_empty_and_zero_workers() {
        let pool = WorkerPool::new(0);
        assert_eq!(pool.workers(), 1);
        let jobs: Vec<fn() -> std::future::Ready<Result<u8, RealtyError>>> = Vec::new();
        assert!(pool.run(jobs).await.unwrap().is_empty());
    }
}
