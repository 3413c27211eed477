//! Run profiling
//!
//! [`BatchProfiler`] brackets a batch run with `start()` / `stop()` and reports
//! elapsed time, process memory delta and throughput.
//!
//! Memory is sampled process-wide (resident set size), so the delta includes
//! anything else the process did during the run. Treat it as an approximation
//! of the batch's footprint, not an exact accounting.
//!
//! ```rust,no_run
//! use parbatch::profiling::BatchProfiler;
//!
//! let mut profiler = BatchProfiler::new();
//! profiler.start();
//! // run the batch here
//! profiler.add_processed(10_000);
//! let metrics = profiler.stop();
//! println!("{metrics}");
//! ```

pub mod metrics;

pub use metrics::PerformanceMetrics;

use std::time::Instant;
use sysinfo::{Pid, ProcessRefreshKind, ProcessesToUpdate, System};

/// Source of the process memory counter
pub trait MemoryProbe: Send {
    /// Current memory in use, in bytes
    fn used_bytes(&mut self) -> u64;
}

/// Resident set size of the current process, via `sysinfo`
pub struct ProcessMemoryProbe {
    system: System,
    pid: Option<Pid>,
}

impl ProcessMemoryProbe {
    pub fn new() -> Self {
        let pid = match sysinfo::get_current_pid() {
            Ok(pid) => Some(pid),
            Err(e) => {
                tracing::warn!("Cannot resolve current pid, memory will read as 0: {}", e);
                None
            }
        };
        Self {
            system: System::new(),
            pid,
        }
    }
}

impl Default for ProcessMemoryProbe {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryProbe for ProcessMemoryProbe {
    fn used_bytes(&mut self) -> u64 {
        let Some(pid) = self.pid else {
            return 0;
        };
        self.system.refresh_processes_specifics(
            ProcessesToUpdate::Some(&[pid]),
            true,
            ProcessRefreshKind::new().with_memory(),
        );
        self.system.process(pid).map(|p| p.memory()).unwrap_or(0)
    }
}

/// Start/stop scoped recorder for one batch run at a time.
///
/// Items are counted by the caller through [`add_processed`](Self::add_processed);
/// without it throughput reports 0.
pub struct BatchProfiler {
    probe: Box<dyn MemoryProbe>,
    baseline: Option<(Instant, u64)>,
    items_processed: u64,
}

impl BatchProfiler {
    pub fn new() -> Self {
        Self::with_probe(ProcessMemoryProbe::new())
    }

    pub fn with_probe(probe: impl MemoryProbe + 'static) -> Self {
        Self {
            probe: Box::new(probe),
            baseline: None,
            items_processed: 0,
        }
    }

    /// Capture baseline time and memory and reset the item counter
    pub fn start(&mut self) {
        let memory = self.probe.used_bytes();
        self.items_processed = 0;
        self.baseline = Some((Instant::now(), memory));
        tracing::debug!("Batch profiling started");
    }

    pub fn add_processed(&mut self, count: u64) {
        self.items_processed = self.items_processed.saturating_add(count);
    }

    pub fn items_processed(&self) -> u64 {
        self.items_processed
    }

    pub fn is_running(&self) -> bool {
        self.baseline.is_some()
    }

    /// End the current cycle and summarize it.
    ///
    /// Calling this without a matching `start()` yields an all-zero snapshot.
    pub fn stop(&mut self) -> PerformanceMetrics {
        let Some((started, start_memory)) = self.baseline.take() else {
            tracing::warn!("BatchProfiler::stop called before start; returning empty metrics");
            return PerformanceMetrics::default();
        };

        let elapsed = started.elapsed();
        let end_memory = self.probe.used_bytes();
        let memory_delta = end_memory as i64 - start_memory as i64;

        let metrics = PerformanceMetrics::from_measurements(elapsed, memory_delta, self.items_processed);
        tracing::info!(
            "Batch profiling stopped: {}ms, {} MB, {:.2} items/s",
            metrics.total_time_ms(),
            memory_delta / (1024 * 1024),
            metrics.throughput()
        );
        metrics
    }
}

impl Default for BatchProfiler {
    fn default() -> Self {
        Self::new()
    }
}
