use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;

/// Snapshot handed to observers after each chunk result is collected
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkProgress {
    pub chunk_index: usize,
    pub chunk_len: usize,
    pub completed_chunks: usize,
    pub total_chunks: usize,
    pub completed_items: usize,
    pub total_items: usize,
}

impl ChunkProgress {
    pub fn percent(&self) -> f64 {
        if self.total_items == 0 {
            return 100.0;
        }
        self.completed_items as f64 / self.total_items as f64 * 100.0
    }

    pub fn is_last(&self) -> bool {
        self.completed_chunks == self.total_chunks
    }
}

/// Per-chunk callback point for progress reporting and similar add-ons.
///
/// Called on the thread that invoked `process()`, in partition order, so
/// implementations need no synchronization of their own.
pub trait ChunkObserver {
    fn on_chunk_complete(&self, progress: &ChunkProgress);

    /// Called once when the run ends, successfully or not
    fn on_finish(&self, _succeeded: bool) {}
}

impl ChunkObserver for () {
    fn on_chunk_complete(&self, _progress: &ChunkProgress) {}
}

/// Logs progress through `tracing` every `every_chunks` chunks
#[derive(Debug, Clone)]
pub struct LoggingObserver {
    label: String,
    every_chunks: usize,
}

impl LoggingObserver {
    pub fn new(label: impl Into<String>, every_chunks: usize) -> Self {
        Self {
            label: label.into(),
            every_chunks: every_chunks.max(1),
        }
    }
}

impl Default for LoggingObserver {
    fn default() -> Self {
        Self::new("batch", 10)
    }
}

impl ChunkObserver for LoggingObserver {
    fn on_chunk_complete(&self, progress: &ChunkProgress) {
        if progress.completed_chunks % self.every_chunks == 0 || progress.is_last() {
            tracing::info!(
                "{}: {}/{} items ({:.1}%), chunk {}/{}",
                self.label,
                progress.completed_items,
                progress.total_items,
                progress.percent(),
                progress.completed_chunks,
                progress.total_chunks
            );
        }
    }

    fn on_finish(&self, succeeded: bool) {
        if !succeeded {
            tracing::warn!("{}: batch aborted", self.label);
        }
    }
}

/// Terminal progress bar measured in items
pub struct ProgressBarObserver {
    bar: ProgressBar,
}

impl ProgressBarObserver {
    pub fn new(total_items: usize) -> Self {
        let bar = ProgressBar::new(total_items as u64);
        if let Ok(style) = ProgressStyle::with_template(
            "⚡ [{elapsed_precise}] {bar:40.cyan/blue} {pos:>7}/{len:7} items ({percent}%) {msg}",
        ) {
            bar.set_style(style.progress_chars("█▉▊▋▌▍▎▏  "));
        }
        bar.enable_steady_tick(Duration::from_millis(100));
        Self { bar }
    }

    /// Wrap an existing bar, e.g. a hidden one in tests
    pub fn with_bar(bar: ProgressBar) -> Self {
        Self { bar }
    }

    pub fn position(&self) -> u64 {
        self.bar.position()
    }
}

impl ChunkObserver for ProgressBarObserver {
    fn on_chunk_complete(&self, progress: &ChunkProgress) {
        self.bar.set_position(progress.completed_items as u64);
        self.bar
            .set_message(format!("chunk {}/{}", progress.completed_chunks, progress.total_chunks));
    }

    fn on_finish(&self, succeeded: bool) {
        if succeeded {
            self.bar.finish_with_message("done");
        } else {
            self.bar.abandon_with_message("aborted");
        }
    }
}
