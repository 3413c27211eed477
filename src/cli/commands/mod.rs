use crate::cli::Output;
use anyhow::Result;
use clap::{CommandFactory, Parser, Subcommand};

pub mod bench;
pub mod config;

#[derive(Parser)]
#[command(
    name = "parbatch",
    version = env!("CARGO_PKG_VERSION"),
    about = "Chunked parallel batch processing with run profiling",
    long_about = "parbatch splits large batches into chunks, runs them on a static or \
                  work-stealing worker pool and reports throughput and memory usage."
)]
pub struct Cli {
    /// Increase verbosity (can be repeated)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Use custom configuration file
    #[arg(long, global = true)]
    pub config: Option<String>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Compare sequential and parallel runs of a synthetic CPU-bound workload
    Bench(bench::BenchArgs),
    /// Show the effective engine configuration
    Config(config::ConfigArgs),
}

impl Cli {
    pub async fn run(self) -> Result<()> {
        setup_logging(self.verbose, self.quiet);
        let output = Output::new(self.quiet);

        match self.command {
            Some(Commands::Bench(args)) => bench::execute(args, self.config.as_deref(), &output).await,
            Some(Commands::Config(args)) => config::execute(args, self.config.as_deref()).await,
            None => {
                Cli::command().print_help()?;
                Ok(())
            }
        }
    }
}

fn setup_logging(verbose: u8, quiet: bool) {
    if quiet {
        return;
    }

    let filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| match verbose {
        0 => tracing_subscriber::EnvFilter::new("warn"),
        1 => tracing_subscriber::EnvFilter::new("info"),
        2 => tracing_subscriber::EnvFilter::new("debug"),
        _ => tracing_subscriber::EnvFilter::new("trace"),
    });

    // Logs go to stderr so command output stays pipeable
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}
