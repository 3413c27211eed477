//! Command-line interface for parbatch

pub mod commands;
pub mod output;

pub use commands::Cli;
pub use output::Output;
