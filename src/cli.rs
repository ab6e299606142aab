// src/cli.rs

//! CLI argument parsing using `clap`.

use std::path::PathBuf;

use clap::{Parser, ValueEnum};

/// Command-line arguments for `dagflow`.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "dagflow",
    version,
    about = "Run a built-in task flow on the dagflow engine.",
    long_about = None
)]
pub struct CliArgs {
    /// Flow to run.
    #[arg(value_enum)]
    pub flow: DemoFlow,

    /// Positional arguments passed to the flow.
    #[arg(value_name = "ARGS")]
    pub args: Vec<String>,

    /// Path to the config file (TOML).
    ///
    /// Default: `$DAGFLOW_CONFIG`, else `Dagflow.toml` in the current working
    /// directory if it exists.
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Maximum number of tasks running at once (overrides the config file).
    #[arg(long, value_name = "N", value_parser = clap::value_parser!(u64).range(1..))]
    pub concurrency: Option<u64>,

    /// Logging level (error, warn, info, debug, trace).
    ///
    /// If omitted, `DAGFLOW_LOG` or a default level will be used.
    #[arg(long, value_enum, value_name = "LEVEL")]
    pub log_level: Option<LogLevel>,

    /// Trace the flow and print its graph layers without running any task.
    #[arg(long)]
    pub dry_run: bool,
}

/// Built-in flows.
#[derive(Debug, Copy, Clone, PartialEq, Eq, ValueEnum)]
pub enum DemoFlow {
    /// `hello(get_param())`, prints "Hello, world!".
    Hello,
    /// `hello(NAME)` for the NAME given as argument.
    HelloParam,
}

/// Log level as exposed on the CLI.
#[derive(Debug, Copy, Clone, ValueEnum)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

/// Convenience wrapper around `CliArgs::parse()`.
pub fn parse() -> CliArgs {
    CliArgs::parse()
}
