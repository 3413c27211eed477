use crate::error::{BatchError, Result};
use crate::parallel::core::ParallelBatchProcessor;
use std::sync::Arc;

/// Memory-bounded driver for inputs too large to hold at once.
///
/// Pulls a window of items from an iterator, runs it through the engine, hands
/// the results to a sink, and only then pulls the next window. At most one
/// window of inputs and one of outputs is resident at a time.
#[derive(Debug, Clone)]
pub struct StreamingProcessor {
    processor: ParallelBatchProcessor,
    window: usize,
}

impl StreamingProcessor {
    /// Window defaults to one chunk per worker
    pub fn new(processor: ParallelBatchProcessor) -> Self {
        let config = processor.config();
        let window = config.parallelism().saturating_mul(config.chunk_size()).max(1);
        Self { processor, window }
    }

    pub fn with_window(mut self, window: usize) -> Self {
        self.window = window.max(1);
        self
    }

    pub fn window(&self) -> usize {
        self.window
    }

    /// Process every item from `items`, delivering results to `sink` window by
    /// window in input order. Returns the number of items processed.
    pub fn run<I, T, R, E, F, S>(&self, items: I, transform: F, mut sink: S) -> Result<usize>
    where
        I: IntoIterator<Item = T>,
        T: Send + Sync + 'static,
        R: Send + 'static,
        E: Into<anyhow::Error>,
        F: Fn(&T) -> std::result::Result<R, E> + Send + Sync + 'static,
        S: FnMut(Vec<R>) -> anyhow::Result<()>,
    {
        let transform = Arc::new(transform);
        let mut iter = items.into_iter();
        let mut total = 0;
        let mut window_index = 0;

        loop {
            let window: Vec<T> = iter.by_ref().take(self.window).collect();
            if window.is_empty() {
                break;
            }
            let window_len = window.len();

            let shared = Arc::clone(&transform);
            let results = self
                .processor
                .process(window, move |item: &T| shared(item))
                .map_err(|e| match e {
                    // Re-base chunk indices onto the whole stream
                    BatchError::Processing { chunk_index, source } => BatchError::Processing {
                        chunk_index: chunk_index + window_index * self.chunks_per_window(),
                        source,
                    },
                    other => other,
                })?;

            sink(results).map_err(|source| BatchError::Sink {
                window: window_index,
                source,
            })?;

            total += window_len;
            window_index += 1;
            tracing::debug!("Streamed window {} ({} items, {} total)", window_index, window_len, total);
        }

        tracing::info!("Streaming run completed: {} items in {} windows", total, window_index);
        Ok(total)
    }

    fn chunks_per_window(&self) -> usize {
        self.window.div_ceil(self.processor.config().chunk_size())
    }
}
