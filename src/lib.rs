//! # parbatch - Chunked Parallel Batch Processing
//!
//! Splits a large in-memory batch into fixed-size chunks, runs the chunks on a
//! per-call worker pool and hands back the results in input order.
//!
//! ## Features
//!
//! - **Two scheduling strategies**: fixed round-robin assignment or work stealing
//! - **Order preserving**: `result[i]` is always `f(items[i])`
//! - **Fail fast**: the first failing item aborts the batch and stops pending chunks
//! - **Bounded teardown**: workers that overrun the shutdown grace are abandoned
//! - **Profiling**: elapsed time, memory delta and throughput per run
//!
//! ## Quick Start
//!
//! ```rust
//! use parbatch::parallel::process_parallel;
//!
//! let squares = process_parallel((1..=10u64).collect(), |x| x * x)?;
//! assert_eq!(squares.last(), Some(&100));
//! # Ok::<(), parbatch::BatchError>(())
//! ```

pub mod cli;
pub mod config;
pub mod error;
pub mod parallel;
pub mod profiling;

pub use config::{BatchConfig, BatchConfigBuilder};
pub use error::{BatchError, ConfigError, Result};
pub use parallel::{ParallelBatchProcessor, PartitionStrategy};
pub use profiling::{BatchProfiler, PerformanceMetrics};

/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const PKG_NAME: &str = env!("CARGO_PKG_NAME");
