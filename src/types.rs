// src/types.rs

use std::future::Future;
use std::pin::Pin;

use serde::{Deserialize, Serialize};

/// Boxed future used by the dyn-safe trait seams (detector, notifier, store).
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Transient per-repository state as shown to observers.
///
/// `Success`, `Failed` and `Error` are held for a short settle delay and then
/// relax back to `Idle` before the next tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RepoStatus {
    Idle,
    Checking,
    Building,
    Success,
    Failed,
    Error,
}

impl RepoStatus {
    /// Whether this is one of the transient terminal states that relaxes back
    /// to `Idle` after the settle delay.
    pub fn is_settling(self) -> bool {
        matches!(
            self,
            RepoStatus::Success | RepoStatus::Failed | RepoStatus::Error
        )
    }
}

/// Lifecycle of a single build run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BuildStatus {
    Pending,
    Running,
    Success,
    Failed,
    Cancelled,
}

/// Outcome of one polling cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckResult {
    NoChanges,
    NewCommit,
    Triggered,
    Error,
}
