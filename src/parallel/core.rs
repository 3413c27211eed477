use crate::config::BatchConfig;
use crate::error::{BatchError, Result};
use crate::parallel::cancel::CancellationToken;
use crate::parallel::partition::{Chunk, partition};
use crate::parallel::pool::{ShutdownOutcome, WorkerPool};
use crate::parallel::progress::{ChunkObserver, ChunkProgress};
use crossbeam::channel::{Receiver, RecvTimeoutError, bounded};
use std::any::Any;
use std::convert::Infallible;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// How often a waiting collector re-checks the caller's cancellation token
const CANCEL_POLL_INTERVAL: Duration = Duration::from_millis(20);

/// Optional hooks for a single `process_with` call
#[derive(Default)]
pub struct ProcessOptions<'a> {
    observer: Option<&'a dyn ChunkObserver>,
    cancel: Option<CancellationToken>,
}

impl<'a> ProcessOptions<'a> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn observer(mut self, observer: &'a dyn ChunkObserver) -> Self {
        self.observer = Some(observer);
        self
    }

    pub fn cancel_token(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }
}

/// Result of running one chunk on a worker
enum ChunkOutcome<R> {
    Completed(Vec<R>),
    Failed(anyhow::Error),
    Cancelled,
}

/// In-flight chunk; resolves exactly once
struct ChunkHandle<R> {
    index: usize,
    len: usize,
    rx: Receiver<ChunkOutcome<R>>,
}

impl<R> ChunkHandle<R> {
    /// Block until the chunk resolves, giving up early if the caller cancels
    fn wait(&self, caller: Option<&CancellationToken>) -> ChunkOutcome<R> {
        loop {
            if caller.is_some_and(CancellationToken::is_cancelled) {
                return ChunkOutcome::Cancelled;
            }
            match self.rx.recv_timeout(CANCEL_POLL_INTERVAL) {
                Ok(outcome) => return outcome,
                Err(RecvTimeoutError::Timeout) => continue,
                Err(RecvTimeoutError::Disconnected) => {
                    return ChunkOutcome::Failed(anyhow::anyhow!(
                        "worker exited without reporting a result"
                    ));
                }
            }
        }
    }
}

/// Stop flags a worker checks between items
struct StopSignal {
    run: CancellationToken,
    caller: Option<CancellationToken>,
}

impl StopSignal {
    fn is_raised(&self) -> bool {
        self.run.is_cancelled() || self.caller.as_ref().is_some_and(CancellationToken::is_cancelled)
    }
}

/// Chunked parallel map over an in-memory batch.
///
/// Each call partitions the input, builds a fresh worker pool shaped by the
/// configured [`PartitionStrategy`](crate::parallel::PartitionStrategy), and
/// tears it down before returning.
///
/// Output order always matches input order: chunks keep their internal order
/// and are concatenated in partition order, so `result[i] == f(&items[i])`.
#[derive(Debug, Clone)]
pub struct ParallelBatchProcessor {
    config: BatchConfig,
}

impl ParallelBatchProcessor {
    pub fn new(config: BatchConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &BatchConfig {
        &self.config
    }

    /// Apply a fallible `transform` to every item.
    ///
    /// The first failure collected aborts the batch with
    /// [`BatchError::Processing`]; no partial results are returned. `transform`
    /// runs concurrently on several threads and must not rely on unsynchronized
    /// shared state.
    pub fn process<T, R, E, F>(&self, items: Vec<T>, transform: F) -> Result<Vec<R>>
    where
        T: Send + Sync + 'static,
        R: Send + 'static,
        E: Into<anyhow::Error>,
        F: Fn(&T) -> std::result::Result<R, E> + Send + Sync + 'static,
    {
        self.process_with(items, transform, ProcessOptions::default())
    }

    /// Apply an infallible `transform` to every item
    pub fn process_map<T, R, F>(&self, items: Vec<T>, transform: F) -> Result<Vec<R>>
    where
        T: Send + Sync + 'static,
        R: Send + 'static,
        F: Fn(&T) -> R + Send + Sync + 'static,
    {
        self.process(items, move |item| Ok::<R, Infallible>(transform(item)))
    }

    /// Like [`process`](Self::process), with an observer and/or cancellation token
    pub fn process_with<T, R, E, F>(
        &self,
        items: Vec<T>,
        transform: F,
        options: ProcessOptions<'_>,
    ) -> Result<Vec<R>>
    where
        T: Send + Sync + 'static,
        R: Send + 'static,
        E: Into<anyhow::Error>,
        F: Fn(&T) -> std::result::Result<R, E> + Send + Sync + 'static,
    {
        let total_items = items.len();
        if total_items == 0 {
            tracing::warn!("Empty items list provided");
            return Ok(Vec::new());
        }

        tracing::info!(
            "Starting parallel batch processing: {} items, parallelism={}, chunk_size={}, strategy={}",
            total_items,
            self.config.parallelism(),
            self.config.chunk_size(),
            self.config.strategy()
        );
        let started = Instant::now();

        let chunks = partition(total_items, self.config.chunk_size());
        tracing::debug!("Partitioned into {} chunks", chunks.len());

        let mut pool = WorkerPool::new(self.config.strategy(), self.config.parallelism())?;
        let run_cancel = CancellationToken::new();

        let items: Arc<[T]> = items.into();
        let transform = Arc::new(transform);

        let mut handles = Vec::with_capacity(chunks.len());
        let mut submit_error = None;
        for chunk in chunks {
            let (handle, job) = Self::chunk_job(
                chunk,
                Arc::clone(&items),
                Arc::clone(&transform),
                StopSignal {
                    run: run_cancel.clone(),
                    caller: options.cancel.clone(),
                },
            );
            if let Err(e) = pool.submit(job) {
                submit_error = Some(e);
                break;
            }
            handles.push(handle);
        }

        let collected = match submit_error {
            Some(e) => Err(e),
            None => self.collect(handles, total_items, &options),
        };

        if collected.is_err() {
            // Chunks not yet started skip their items
            run_cancel.cancel();
        }
        if let ShutdownOutcome::TimedOut { pending } =
            pool.shutdown(self.config.shutdown_grace(), &run_cancel)
        {
            tracing::debug!("Abandoned {} chunk jobs after grace period", pending);
        }

        if let Some(observer) = options.observer {
            observer.on_finish(collected.is_ok());
        }

        let results = collected?;
        let elapsed = started.elapsed();
        tracing::info!(
            "Batch processing completed: {} items in {}ms ({:.2} items/s)",
            total_items,
            elapsed.as_millis(),
            throughput(total_items, elapsed)
        );
        Ok(results)
    }

    /// Build the handle and pool job for one chunk
    fn chunk_job<T, R, E, F>(
        chunk: Chunk,
        items: Arc<[T]>,
        transform: Arc<F>,
        stop: StopSignal,
    ) -> (ChunkHandle<R>, Box<dyn FnOnce() + Send + 'static>)
    where
        T: Send + Sync + 'static,
        R: Send + 'static,
        E: Into<anyhow::Error>,
        F: Fn(&T) -> std::result::Result<R, E> + Send + Sync + 'static,
    {
        let (tx, rx) = bounded(1);
        let handle = ChunkHandle {
            index: chunk.index,
            len: chunk.len(),
            rx,
        };

        let job = Box::new(move || {
            tracing::debug!("Processing chunk {} of {} items", chunk.index, chunk.len());
            let outcome = run_chunk(&items[chunk.range], transform.as_ref(), &stop);
            // The collector may already have given up on this run
            let _ = tx.send(outcome);
        });

        (handle, job)
    }

    /// Gather chunk results in partition order, stopping at the first failure
    fn collect<R>(
        &self,
        handles: Vec<ChunkHandle<R>>,
        total_items: usize,
        options: &ProcessOptions<'_>,
    ) -> Result<Vec<R>> {
        let total_chunks = handles.len();
        let mut results = Vec::with_capacity(total_items);

        for (completed, handle) in handles.into_iter().enumerate() {
            match handle.wait(options.cancel.as_ref()) {
                ChunkOutcome::Completed(chunk_results) => results.extend(chunk_results),
                ChunkOutcome::Failed(source) => {
                    tracing::error!("Chunk {} failed: {:#}", handle.index, source);
                    return Err(BatchError::Processing {
                        chunk_index: handle.index,
                        source,
                    });
                }
                ChunkOutcome::Cancelled => {
                    tracing::warn!("Batch interrupted while waiting for chunk {}", handle.index);
                    return Err(BatchError::Interrupted);
                }
            }

            if let Some(observer) = options.observer {
                observer.on_chunk_complete(&ChunkProgress {
                    chunk_index: handle.index,
                    chunk_len: handle.len,
                    completed_chunks: completed + 1,
                    total_chunks,
                    completed_items: results.len(),
                    total_items,
                });
            }
        }

        Ok(results)
    }
}

/// Apply `transform` to each item of a chunk in order
fn run_chunk<T, R, E, F>(chunk: &[T], transform: &F, stop: &StopSignal) -> ChunkOutcome<R>
where
    E: Into<anyhow::Error>,
    F: Fn(&T) -> std::result::Result<R, E>,
{
    let mut results = Vec::with_capacity(chunk.len());
    for item in chunk {
        if stop.is_raised() {
            return ChunkOutcome::Cancelled;
        }
        match panic::catch_unwind(AssertUnwindSafe(|| transform(item))) {
            Ok(Ok(result)) => results.push(result),
            Ok(Err(e)) => return ChunkOutcome::Failed(e.into()),
            Err(payload) => {
                return ChunkOutcome::Failed(anyhow::anyhow!(
                    "transform panicked: {}",
                    panic_message(payload.as_ref())
                ));
            }
        }
    }
    ChunkOutcome::Completed(results)
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message
    } else {
        "unknown panic payload"
    }
}

fn throughput(items: usize, elapsed: Duration) -> f64 {
    let seconds = elapsed.as_secs_f64();
    if seconds == 0.0 {
        return 0.0;
    }
    items as f64 / seconds
}

/// Convenience function for a one-off batch with the default config
pub fn process_parallel<T, R, F>(items: Vec<T>, transform: F) -> Result<Vec<R>>
where
    T: Send + Sync + 'static,
    R: Send + 'static,
    F: Fn(&T) -> R + Send + Sync + 'static,
{
    ParallelBatchProcessor::new(BatchConfig::default()).process_map(items, transform)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parallel::PartitionStrategy;
    use crate::parallel::pool::tests::pools_created;
    use std::cell::RefCell;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn processor(parallelism: usize, chunk_size: usize, strategy: PartitionStrategy) -> ParallelBatchProcessor {
        let config = BatchConfig::builder()
            .parallelism(parallelism)
            .chunk_size(chunk_size)
            .strategy(strategy)
            .build()
            .unwrap();
        ParallelBatchProcessor::new(config)
    }

    const STRATEGIES: [PartitionStrategy; 2] = [PartitionStrategy::Static, PartitionStrategy::Dynamic];

    #[test]
    fn test_empty_input_short_circuits_without_pool() {
        let before = pools_created();
        let results = processor(4, 10, PartitionStrategy::Static)
            .process_map(Vec::<i32>::new(), |x| x * 2)
            .unwrap();
        assert!(results.is_empty());
        assert_eq!(pools_created(), before);
    }

    #[test]
    fn test_non_empty_input_creates_one_pool_per_call() {
        let processor = processor(2, 10, PartitionStrategy::Dynamic);
        let before = pools_created();
        processor.process_map(vec![1, 2, 3], |x| x + 1).unwrap();
        processor.process_map(vec![1, 2, 3], |x| x + 1).unwrap();
        assert_eq!(pools_created(), before + 2);
    }

    #[test]
    fn test_static_scenario_preserves_order() {
        let input: Vec<i32> = (0..1000).collect();
        let results = processor(4, 100, PartitionStrategy::Static)
            .process_map(input, |x| x * 2)
            .unwrap();

        assert_eq!(results.len(), 1000);
        assert_eq!(results, (0..1000).map(|x| x * 2).collect::<Vec<_>>());
        assert_eq!(results[999], 1998);
    }

    #[test]
    fn test_order_preserved_for_uneven_work() {
        for strategy in STRATEGIES {
            let input: Vec<u64> = (0..257).collect();
            let results = processor(3, 7, strategy)
                .process_map(input.clone(), |&x| {
                    // Early chunks take longest so they finish last
                    if x < 14 {
                        std::thread::sleep(Duration::from_millis(5));
                    }
                    x * x
                })
                .unwrap();
            let expected: Vec<u64> = input.iter().map(|x| x * x).collect();
            assert_eq!(results, expected, "strategy {strategy}");
        }
    }

    #[test]
    fn test_single_item_default_config() {
        let results = ParallelBatchProcessor::new(BatchConfig::default())
            .process_map(vec![42], |x| x * 2)
            .unwrap();
        assert_eq!(results, vec![84]);
    }

    #[test]
    fn test_failure_aborts_whole_batch() {
        for strategy in STRATEGIES {
            let err = processor(4, 10, strategy)
                .process((0..100).collect::<Vec<i32>>(), |&x| {
                    if x == 57 {
                        Err(anyhow::anyhow!("bad item {x}"))
                    } else {
                        Ok(x)
                    }
                })
                .unwrap_err();

            assert_eq!(err.chunk_index(), Some(5));
            assert!(err.to_string().contains("bad item 57"));
        }
    }

    #[test]
    fn test_typed_errors_are_carried_as_source() {
        let err = processor(2, 3, PartitionStrategy::Dynamic)
            .process(vec!["1", "2", "x"], |s| s.parse::<i32>())
            .unwrap_err();

        match err {
            BatchError::Processing { source, .. } => {
                assert!(source.downcast_ref::<std::num::ParseIntError>().is_some());
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_panic_in_transform_becomes_processing_error() {
        for strategy in STRATEGIES {
            let err = processor(2, 5, strategy)
                .process_map((0..20).collect::<Vec<i32>>(), |&x| {
                    if x == 12 {
                        panic!("exploded on {x}");
                    }
                    x
                })
                .unwrap_err();

            assert_eq!(err.chunk_index(), Some(2));
            assert!(err.to_string().contains("exploded on 12"));
        }
    }

    #[test]
    fn test_failure_stops_pending_chunks() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);

        let result = processor(1, 1, PartitionStrategy::Static).process(
            (0..200).collect::<Vec<i32>>(),
            move |&x| {
                counter.fetch_add(1, Ordering::SeqCst);
                std::thread::sleep(Duration::from_millis(1));
                if x == 0 { Err(anyhow::anyhow!("first item fails")) } else { Ok(x) }
            },
        );

        assert!(result.is_err());
        // The single worker may run a few more chunks before the flag is raised
        assert!(calls.load(Ordering::SeqCst) < 200);
    }

    #[test]
    fn test_caller_cancellation_interrupts() {
        for strategy in STRATEGIES {
            let token = CancellationToken::new();
            let trigger = token.clone();

            let err = processor(2, 1, strategy)
                .process_with(
                    (0..500).collect::<Vec<i32>>(),
                    move |&x| {
                        if x == 3 {
                            trigger.cancel();
                        }
                        std::thread::sleep(Duration::from_millis(2));
                        Ok::<_, Infallible>(x)
                    },
                    ProcessOptions::new().cancel_token(token),
                )
                .unwrap_err();

            assert!(matches!(err, BatchError::Interrupted), "got {err:?}");
        }
    }

    #[test]
    fn test_already_cancelled_token() {
        let token = CancellationToken::new();
        token.cancel();
        let err = processor(2, 10, PartitionStrategy::Dynamic)
            .process_with(vec![1, 2, 3], |&x| Ok::<_, Infallible>(x), ProcessOptions::new().cancel_token(token))
            .unwrap_err();
        assert!(matches!(err, BatchError::Interrupted));
    }

    #[derive(Default)]
    struct Recorder {
        seen: RefCell<Vec<ChunkProgress>>,
        finished: RefCell<Option<bool>>,
    }

    impl ChunkObserver for Recorder {
        fn on_chunk_complete(&self, progress: &ChunkProgress) {
            self.seen.borrow_mut().push(*progress);
        }

        fn on_finish(&self, succeeded: bool) {
            *self.finished.borrow_mut() = Some(succeeded);
        }
    }

    #[test]
    fn test_observer_sees_every_chunk_in_order() {
        let recorder = Recorder::default();
        let results = processor(3, 4, PartitionStrategy::Dynamic)
            .process_with(
                (0..10).collect::<Vec<i32>>(),
                |&x| Ok::<_, Infallible>(x),
                ProcessOptions::new().observer(&recorder),
            )
            .unwrap();
        assert_eq!(results.len(), 10);

        let seen = recorder.seen.borrow();
        assert_eq!(seen.iter().map(|p| p.chunk_index).collect::<Vec<_>>(), vec![0, 1, 2]);
        assert_eq!(seen.iter().map(|p| p.chunk_len).collect::<Vec<_>>(), vec![4, 4, 2]);
        assert_eq!(seen.iter().map(|p| p.completed_items).collect::<Vec<_>>(), vec![4, 8, 10]);
        assert!(seen.iter().all(|p| p.total_chunks == 3 && p.total_items == 10));
        assert_eq!(*recorder.finished.borrow(), Some(true));
    }

    #[test]
    fn test_observer_notified_of_failure() {
        let recorder = Recorder::default();
        let result = processor(2, 2, PartitionStrategy::Static).process_with(
            vec![1, 2, 3, 4],
            |&x| if x == 3 { Err(anyhow::anyhow!("no")) } else { Ok(x) },
            ProcessOptions::new().observer(&recorder),
        );
        assert!(result.is_err());
        assert_eq!(recorder.seen.borrow().len(), 1);
        assert_eq!(*recorder.finished.borrow(), Some(false));
    }

    #[test]
    fn test_more_workers_than_chunks() {
        let results = processor(16, 1000, PartitionStrategy::Static)
            .process_map(vec![1, 2, 3], |x| x * 10)
            .unwrap();
        assert_eq!(results, vec![10, 20, 30]);
    }

    #[test]
    fn test_process_parallel_helper() {
        let results = process_parallel(vec!["a", "bb", "ccc"], |s| s.len()).unwrap();
        assert_eq!(results, vec![1, 2, 3]);
    }

    #[test]
    fn test_throughput_guards_zero_elapsed() {
        assert_eq!(throughput(10, Duration::ZERO), 0.0);
        assert!((throughput(10, Duration::from_secs(2)) - 5.0).abs() < f64::EPSILON);
    }
}
