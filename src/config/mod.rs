//! Configuration for the batch engine
//!
//! `BatchConfig` is validated once by its builder and never mutated afterwards.
//! File and environment layering lives in [`core`].

pub mod core;

use crate::error::ConfigError;
use crate::parallel::PartitionStrategy;
use std::time::Duration;

pub use self::core::{ConfigFile, ConfigLoader};

/// Default number of items per chunk
pub const DEFAULT_CHUNK_SIZE: usize = 1000;

/// Default bound on pool teardown before workers are abandoned
pub const DEFAULT_SHUTDOWN_GRACE: Duration = Duration::from_secs(5 * 60);

/// Immutable engine configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchConfig {
    parallelism: usize,
    chunk_size: usize,
    strategy: PartitionStrategy,
    shutdown_grace: Duration,
}

impl BatchConfig {
    pub fn builder() -> BatchConfigBuilder {
        BatchConfigBuilder::new()
    }

    pub fn parallelism(&self) -> usize {
        self.parallelism
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    pub fn strategy(&self) -> PartitionStrategy {
        self.strategy
    }

    pub fn shutdown_grace(&self) -> Duration {
        self.shutdown_grace
    }
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            parallelism: num_cpus::get().max(1),
            chunk_size: DEFAULT_CHUNK_SIZE,
            strategy: PartitionStrategy::default(),
            shutdown_grace: DEFAULT_SHUTDOWN_GRACE,
        }
    }
}

/// Builder for [`BatchConfig`]; validation happens in [`build`](Self::build)
#[derive(Debug, Clone)]
pub struct BatchConfigBuilder {
    parallelism: Option<usize>,
    chunk_size: usize,
    strategy: PartitionStrategy,
    shutdown_grace: Duration,
    host_parallelism: fn() -> usize,
}

impl Default for BatchConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl BatchConfigBuilder {
    pub fn new() -> Self {
        Self::with_host_parallelism(num_cpus::get)
    }

    /// Use `host` instead of the logical CPU count when no parallelism is set
    pub fn with_host_parallelism(host: fn() -> usize) -> Self {
        Self {
            parallelism: None,
            chunk_size: DEFAULT_CHUNK_SIZE,
            strategy: PartitionStrategy::default(),
            shutdown_grace: DEFAULT_SHUTDOWN_GRACE,
            host_parallelism: host,
        }
    }

    pub fn parallelism(mut self, parallelism: usize) -> Self {
        self.parallelism = Some(parallelism);
        self
    }

    pub fn chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size;
        self
    }

    pub fn strategy(mut self, strategy: PartitionStrategy) -> Self {
        self.strategy = strategy;
        self
    }

    pub fn shutdown_grace(mut self, grace: Duration) -> Self {
        self.shutdown_grace = grace;
        self
    }

    pub fn build(self) -> Result<BatchConfig, ConfigError> {
        let parallelism = match self.parallelism {
            Some(explicit) => explicit,
            // A host reporting zero CPUs still gets one worker
            None => (self.host_parallelism)().max(1),
        };

        if parallelism == 0 {
            return Err(ConfigError::InvalidParallelism(parallelism));
        }
        if self.chunk_size == 0 {
            return Err(ConfigError::InvalidChunkSize(self.chunk_size));
        }

        Ok(BatchConfig {
            parallelism,
            chunk_size: self.chunk_size,
            strategy: self.strategy,
            shutdown_grace: self.shutdown_grace,
        })
    }
}
