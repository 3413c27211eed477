use crate::cli::Output;
use crate::config::{BatchConfig, ConfigLoader};
use crate::parallel::{ParallelBatchProcessor, PartitionStrategy, ProcessOptions, ProgressBarObserver, chunk_count};
use crate::profiling::{BatchProfiler, PerformanceMetrics};
use anyhow::{Context, Result};
use clap::Args;
use std::convert::Infallible;
use std::hint::black_box;
use std::path::Path;
use std::time::{Duration, Instant};

#[derive(Args)]
pub struct BenchArgs {
    /// Number of items in the batch
    #[arg(short = 'n', long, default_value_t = 100_000)]
    pub items: usize,

    /// Worker count (overrides configuration)
    #[arg(short, long)]
    pub parallelism: Option<usize>,

    /// Items per chunk (overrides configuration)
    #[arg(short, long)]
    pub chunk_size: Option<usize>,

    /// Scheduling strategy: static, dynamic (overrides configuration)
    #[arg(short, long)]
    pub strategy: Option<PartitionStrategy>,

    /// Mixing rounds per item; higher means more CPU per item
    #[arg(short, long, default_value_t = 500)]
    pub work: u32,

    /// Show a progress bar during the parallel run
    #[arg(long)]
    pub progress: bool,
}

/// Outcome of one sequential vs parallel comparison
#[derive(Debug, Clone)]
pub struct BenchReport {
    pub items: usize,
    pub sequential: Duration,
    pub parallel: Duration,
    pub metrics: PerformanceMetrics,
}

impl BenchReport {
    pub fn speedup(&self) -> f64 {
        let parallel = self.parallel.as_secs_f64();
        if parallel == 0.0 {
            return 0.0;
        }
        self.sequential.as_secs_f64() / parallel
    }
}

pub async fn execute(args: BenchArgs, custom_config: Option<&str>, output: &Output) -> Result<()> {
    let config = resolve_config(&args, custom_config)?;

    output.header("Batch benchmark");
    output.key_value("Items", &args.items.to_string(), false);
    output.key_value("Parallelism", &config.parallelism().to_string(), false);
    output.key_value("Chunk size", &config.chunk_size().to_string(), false);
    output.key_value("Strategy", config.strategy().as_str(), false);
    output.key_value("Work rounds", &args.work.to_string(), false);
    output.separator();

    let chunks = chunk_count(args.items, config.chunk_size());
    if chunks < config.parallelism() {
        output.warning(&format!(
            "Only {} chunks for {} workers; some workers will idle",
            chunks,
            config.parallelism()
        ));
    }

    let (items, work) = (args.items, args.work);
    let show_progress = args.progress && !output.is_quiet();
    output.step("Running sequential and parallel passes...");

    let report = tokio::task::spawn_blocking(move || run_benchmark(config, items, work, show_progress))
        .await
        .context("Benchmark task failed to complete")??;

    output.key_value("Sequential", &format!("{:.3}s", report.sequential.as_secs_f64()), false);
    output.key_value("Parallel", &format!("{:.3}s", report.parallel.as_secs_f64()), false);
    output.key_value("Speedup", &format!("{:.2}x", report.speedup()), true);
    output.key_value("Throughput", &format!("{:.0} items/s", report.metrics.throughput()), false);
    output.key_value("Memory delta", &format!("{:+.2} MB", report.metrics.memory_used_mb()), false);
    output.success(&format!("Processed {} items with matching results", report.items));

    Ok(())
}

/// Layer command-line overrides on top of the loaded configuration
fn resolve_config(args: &BenchArgs, custom_config: Option<&str>) -> Result<BatchConfig> {
    let loader = ConfigLoader::load_with_custom_config(custom_config.map(Path::new));
    let mut values = loader.extract().context("Failed to load configuration")?;

    // 0 in a file means "auto"; on the command line it is a mistake
    if let Some(parallelism) = args.parallelism {
        anyhow::ensure!(parallelism > 0, "--parallelism must be at least 1");
        values.parallelism = parallelism;
    }
    if let Some(chunk_size) = args.chunk_size {
        values.chunk_size = chunk_size;
    }
    if let Some(strategy) = args.strategy {
        values.strategy = strategy;
    }

    values.into_batch_config().context("Invalid benchmark configuration")
}

/// Run the workload once sequentially and once through the engine, checking
/// both produce the same output.
pub fn run_benchmark(config: BatchConfig, items: usize, work: u32, show_progress: bool) -> Result<BenchReport> {
    let inputs: Vec<u64> = (0..items as u64).collect();

    let started = Instant::now();
    let expected: Vec<u64> = inputs.iter().map(|&x| synthetic_work(x, work)).collect();
    let sequential = started.elapsed();

    let processor = ParallelBatchProcessor::new(config);
    let observer = show_progress.then(|| ProgressBarObserver::new(items));
    let mut options = ProcessOptions::new();
    if let Some(observer) = &observer {
        options = options.observer(observer);
    }

    let mut profiler = BatchProfiler::new();
    profiler.start();
    let started = Instant::now();
    let results = processor.process_with(
        inputs,
        move |&x: &u64| Ok::<_, Infallible>(synthetic_work(x, work)),
        options,
    )?;
    let parallel = started.elapsed();
    profiler.add_processed(results.len() as u64);
    let metrics = profiler.stop();

    anyhow::ensure!(results == expected, "Parallel results differ from the sequential run");

    Ok(BenchReport {
        items,
        sequential,
        parallel,
        metrics,
    })
}

/// Deterministic xorshift mixing, `rounds` iterations per item
pub fn synthetic_work(seed: u64, rounds: u32) -> u64 {
    let mut x = seed ^ 0x9E37_79B9_7F4A_7C15;
    for _ in 0..black_box(rounds) {
        x ^= x << 13;
        x ^= x >> 7;
        x ^= x << 17;
    }
    x
}

#[cfg(test)]
mod tests {
    use super::*;

    fn small_config(strategy: PartitionStrategy) -> BatchConfig {
        BatchConfig::builder()
            .parallelism(2)
            .chunk_size(64)
            .strategy(strategy)
            .build()
            .unwrap()
    }

    #[test]
    fn test_synthetic_work_is_deterministic() {
        assert_eq!(synthetic_work(7, 100), synthetic_work(7, 100));
        assert_ne!(synthetic_work(7, 100), synthetic_work(8, 100));
        assert_eq!(synthetic_work(3, 0), 3 ^ 0x9E37_79B9_7F4A_7C15);
    }

    #[test]
    fn test_benchmark_both_strategies() {
        for strategy in [PartitionStrategy::Static, PartitionStrategy::Dynamic] {
            let report = run_benchmark(small_config(strategy), 1_000, 10, false).unwrap();
            assert_eq!(report.items, 1_000);
            assert_eq!(report.metrics.items_processed(), 1_000);
        }
    }

    #[test]
    fn test_benchmark_empty_batch() {
        let report = run_benchmark(small_config(PartitionStrategy::Static), 0, 10, false).unwrap();
        assert_eq!(report.metrics.items_processed(), 0);
        assert_eq!(report.metrics.throughput(), 0.0);
    }

    #[test]
    fn test_speedup_guards_zero_duration() {
        let report = BenchReport {
            items: 1,
            sequential: Duration::from_millis(10),
            parallel: Duration::ZERO,
            metrics: PerformanceMetrics::default(),
        };
        assert_eq!(report.speedup(), 0.0);

        let report = BenchReport {
            parallel: Duration::from_millis(5),
            ..report
        };
        assert!((report.speedup() - 2.0).abs() < 1e-9);
    }
}
