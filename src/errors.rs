// src/errors.rs

//! Crate-wide error aliases and helpers.

use std::time::Duration;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum GitwatchError {
    /// A git subprocess exited non-zero. Carries the combined stdout+stderr.
    #[error("git {op} failed: {output}")]
    GitCommand { op: String, output: String },

    #[error("path is not a valid git repository: {0}")]
    NotARepository(String),

    #[error("invalid branch: {0}")]
    InvalidBranch(String),

    #[error("invalid commit: {0}")]
    InvalidCommit(String),

    #[error("failed to launch command: {0}")]
    ProcessLaunch(String),

    #[error("command timed out after {0:?}")]
    ProcessTimeout(Duration),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("unknown repository: {0}")]
    UnknownRepository(String),

    #[error("unknown trigger: {0}")]
    UnknownTrigger(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parsing error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl GitwatchError {
    /// Shorthand for the common "git subcommand exited non-zero" case.
    pub fn git(op: impl Into<String>, output: impl Into<String>) -> Self {
        GitwatchError::GitCommand {
            op: op.into(),
            output: output.into(),
        }
    }
}

pub use anyhow::Error;
pub type Result<T> = std::result::Result<T, GitwatchError>;
