//! Worker pools backing the two partition strategies
//!
//! A pool is created by one `process()` call and torn down at its end. Both
//! flavours report job completion through a shared channel so shutdown can
//! wait for in-flight work with a deadline instead of blocking forever.

use crate::error::BatchError;
use crate::parallel::cancel::CancellationToken;
use crate::parallel::strategy::PartitionStrategy;
use crossbeam::channel::{Receiver, RecvTimeoutError, Sender, unbounded};
use std::panic::{self, AssertUnwindSafe};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

/// A unit of work submitted to the pool
pub(crate) type Job = Box<dyn FnOnce() + Send + 'static>;

/// How a pool shutdown ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ShutdownOutcome {
    /// Every submitted job finished within the grace period
    Drained,
    /// The grace period ran out; `pending` jobs were abandoned
    TimedOut { pending: usize },
}

/// Signals job completion on drop, so a panicking job still counts as done
struct DoneGuard(Sender<()>);

impl Drop for DoneGuard {
    fn drop(&mut self) {
        let _ = self.0.send(());
    }
}

enum Workers {
    /// One queue per worker; chunk placement never depends on load
    Static {
        queues: Vec<Sender<Job>>,
        handles: Vec<JoinHandle<()>>,
        next: usize,
    },
    /// rayon's work-stealing scheduler balances jobs across threads
    Dynamic(rayon::ThreadPool),
}

pub(crate) struct WorkerPool {
    workers: Workers,
    done_tx: Sender<()>,
    done_rx: Receiver<()>,
    submitted: usize,
}

impl WorkerPool {
    pub(crate) fn new(strategy: PartitionStrategy, parallelism: usize) -> Result<Self, BatchError> {
        let workers = match strategy {
            PartitionStrategy::Static => Self::spawn_static(parallelism)?,
            PartitionStrategy::Dynamic => Self::build_dynamic(parallelism)?,
        };

        note_pool_created();
        tracing::debug!("Created {} worker pool with {} threads", strategy, parallelism);

        let (done_tx, done_rx) = unbounded();
        Ok(Self {
            workers,
            done_tx,
            done_rx,
            submitted: 0,
        })
    }

    fn spawn_static(parallelism: usize) -> Result<Workers, BatchError> {
        let mut queues = Vec::with_capacity(parallelism);
        let mut handles = Vec::with_capacity(parallelism);

        for worker_id in 0..parallelism {
            let (job_tx, job_rx) = unbounded::<Job>();
            let handle = std::thread::Builder::new()
                .name(format!("parbatch-static-{worker_id}"))
                .spawn(move || {
                    while let Ok(job) = job_rx.recv() {
                        if panic::catch_unwind(AssertUnwindSafe(job)).is_err() {
                            tracing::warn!("Job panicked on static worker {}", worker_id);
                        }
                    }
                })
                .map_err(|e| BatchError::Pool(format!("failed to spawn worker {worker_id}: {e}")))?;

            queues.push(job_tx);
            handles.push(handle);
        }

        Ok(Workers::Static {
            queues,
            handles,
            next: 0,
        })
    }

    fn build_dynamic(parallelism: usize) -> Result<Workers, BatchError> {
        rayon::ThreadPoolBuilder::new()
            .num_threads(parallelism)
            .thread_name(|i| format!("parbatch-dynamic-{i}"))
            // Without a handler rayon aborts the process when a spawned job panics
            .panic_handler(|_| tracing::warn!("Job panicked on dynamic worker"))
            .build()
            .map(Workers::Dynamic)
            .map_err(|e| BatchError::Pool(e.to_string()))
    }

    /// Hand a job to the pool. Static pools assign round-robin by submission order.
    pub(crate) fn submit(&mut self, job: Job) -> Result<(), BatchError> {
        let guard = DoneGuard(self.done_tx.clone());
        let tracked: Job = Box::new(move || {
            let _guard = guard;
            job();
        });

        match &mut self.workers {
            Workers::Static { queues, next, .. } => {
                let worker_id = *next % queues.len();
                *next += 1;
                queues[worker_id]
                    .send(tracked)
                    .map_err(|_| BatchError::Pool(format!("worker {worker_id} stopped accepting jobs")))?;
            }
            Workers::Dynamic(pool) => pool.spawn(tracked),
        }

        self.submitted += 1;
        Ok(())
    }

    /// Stop accepting work and wait up to `grace` for in-flight jobs.
    ///
    /// On timeout `cancel` is raised so running jobs stop at their next item
    /// boundary, and the worker threads are detached rather than joined.
    pub(crate) fn shutdown(self, grace: Duration, cancel: &CancellationToken) -> ShutdownOutcome {
        let WorkerPool {
            workers,
            done_tx,
            done_rx,
            submitted,
        } = self;
        drop(done_tx);

        // No new submissions past this point
        let handles = match workers {
            Workers::Static { queues, handles, .. } => {
                drop(queues);
                Some(handles)
            }
            Workers::Dynamic(pool) => {
                // rayon threads finish queued jobs and exit once the pool is dropped
                drop(pool);
                None
            }
        };

        let deadline = Instant::now() + grace;
        let mut finished = 0;
        while finished < submitted {
            match done_rx.recv_deadline(deadline) {
                Ok(()) => finished += 1,
                Err(RecvTimeoutError::Timeout) => break,
                Err(RecvTimeoutError::Disconnected) => {
                    // Every guard is gone, so every job has run or been dropped
                    finished = submitted;
                }
            }
        }

        if finished < submitted {
            let pending = submitted - finished;
            tracing::warn!(
                "Worker pool did not drain within {:?} ({} jobs pending), forcing shutdown",
                grace,
                pending
            );
            cancel.cancel();
            // Detach: dropping a JoinHandle lets the thread run to completion on its own
            drop(handles);
            return ShutdownOutcome::TimedOut { pending };
        }

        if let Some(handles) = handles {
            for handle in handles {
                if handle.join().is_err() {
                    tracing::warn!("Static worker thread panicked during shutdown");
                }
            }
        }

        tracing::debug!("Worker pool drained {} jobs", submitted);
        ShutdownOutcome::Drained
    }
}

#[cfg(test)]
fn note_pool_created() {
    tests::POOLS_CREATED.with(|count| count.set(count.get() + 1));
}

#[cfg(not(test))]
fn note_pool_created() {}
