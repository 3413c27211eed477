//! Chunked parallel execution engine
//!
//! This module turns a large in-memory batch into results by splitting it into
//! chunks and running the chunks on a short-lived worker pool.
//!
//! # Architecture Responsibilities
//!
//! ## What This Module Does:
//! - **Partitioning**: Splits the input into contiguous, disjoint chunks of `chunk_size` items
//! - **Scheduling**: Runs chunks on a fixed round-robin pool (`Static`) or a work-stealing pool (`Dynamic`)
//! - **Aggregation**: Concatenates chunk results in partition order, so output order matches input order
//! - **Teardown**: Drains the pool within a grace period, abandoning workers that overrun it
//!
//! ## What This Module Does NOT Do:
//! - **Retries inside the engine**: One failing item aborts the batch. Wrap the transform with
//!   [`RetryPolicy`] if transient failures are expected.
//! - **Persistence**: No checkpointing; a crashed process loses the batch
//!
//! # Flow
//!
//! ```text
//! ┌──────────┐   ┌───────────┐   ┌──────────────────┐   ┌─────────────┐
//! │  items   │──▶│ partition │──▶│ pool (per call)  │──▶│ concatenate │──▶ Vec<R>
//! │  Vec<T>  │   │  chunks   │   │ Static / Dynamic │   │ in order    │
//! └──────────┘   └───────────┘   └──────────────────┘   └─────────────┘
//! ```
//!
//! # Example Usage
//!
//! ```rust
//! use parbatch::config::BatchConfig;
//! use parbatch::parallel::{ParallelBatchProcessor, PartitionStrategy};
//!
//! let config = BatchConfig::builder()
//!     .parallelism(4)
//!     .chunk_size(100)
//!     .strategy(PartitionStrategy::Static)
//!     .build()?;
//!
//! let processor = ParallelBatchProcessor::new(config);
//! let doubled = processor.process_map((0..1000).collect(), |x: &i32| x * 2)?;
//! assert_eq!(doubled[999], 1998);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod cancel;
pub mod core;
pub mod partition;
mod pool;
pub mod progress;
pub mod retry;
pub mod stream;
pub mod strategy;

// Re-export main types for easier access
pub use self::cancel::CancellationToken;
pub use self::core::{ParallelBatchProcessor, ProcessOptions, process_parallel};
pub use self::partition::{Chunk, chunk_count, partition};
pub use self::progress::{ChunkObserver, ChunkProgress, LoggingObserver, ProgressBarObserver};
pub use self::retry::{Backoff, RetryPolicy};
pub use self::stream::StreamingProcessor;
pub use self::strategy::PartitionStrategy;
