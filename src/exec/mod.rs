// src/exec/mod.rs

//! Subprocess execution with streamed output, timeout and cancellation.

pub mod runner;

pub use runner::{CommandResult, ProcessRunner, RunOutcome, RunRequest, DEFAULT_FLUSH_INTERVAL};
