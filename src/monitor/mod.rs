// src/monitor/mod.rs

//! Monitoring orchestration.
//!
//! - [`scheduler`] owns one recurring timer per enabled repository and emits
//!   tick events over a channel; it never runs checks itself.
//! - [`coordinator`] owns all shared monitoring state (watermarks, transient
//!   statuses, the anti-spam latch) and exposes the public operations used
//!   by UI/CLI callers.
//! - [`pipeline`] implements the per-tick check pipeline: fetch/compare,
//!   pull, trigger matching and build dispatch.

pub mod coordinator;
pub mod pipeline;
pub mod scheduler;

pub use coordinator::{MonitorCoordinator, MonitorOptions, RepoState};
pub use scheduler::Scheduler;
