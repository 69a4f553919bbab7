// src/cli.rs

//! CLI argument parsing using `clap`.

use clap::{Parser, ValueEnum};

/// Command-line arguments for `gitwatch`.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "gitwatch",
    version,
    about = "Poll git repositories for new commits or tags and run triggered build commands.",
    long_about = None
)]
pub struct CliArgs {
    /// Path to the config file (TOML).
    ///
    /// Default: `Gitwatch.toml` in the current working directory.
    #[arg(long, value_name = "PATH", default_value = "Gitwatch.toml")]
    pub config: String,

    /// Run one check pass over all repositories, then exit (no timers).
    #[arg(long)]
    pub once: bool,

    /// Restrict monitoring to a single configured repository by name.
    #[arg(long, value_name = "NAME")]
    pub repo: Option<String>,

    /// Logging level (error, warn, info, debug, trace).
    ///
    /// If omitted, `GITWATCH_LOG` or a default level will be used.
    #[arg(long, value_enum, value_name = "LEVEL")]
    pub log_level: Option<LogLevel>,

    /// Parse + validate, print repositories and triggers, but don't execute.
    #[arg(long)]
    pub dry_run: bool,
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
