// src/notify/mod.rs

//! Abstract notification dispatch.
//!
//! The core only calls this seam; concrete delivery (native banner, chat
//! bot, webhook card) lives entirely outside. [`LogNotifier`] is the default
//! in-tree implementation and simply emits structured log events; tests use
//! a recording fake instead.

use tracing::{error, info, warn};

use crate::model::{BuildRun, RepoWatch};
use crate::types::{BoxFuture, BuildStatus};

pub trait Notifier: Send + Sync {
    /// A new commit or tag was detected but no trigger matched.
    fn notify_new_commit<'a>(
        &'a self,
        repo: &'a RepoWatch,
        commit_hash: &'a str,
        commit_message: &'a str,
    ) -> BoxFuture<'a, ()>;

    /// A trigger matched and its build is about to start.
    fn notify_trigger_start<'a>(
        &'a self,
        repo: &'a RepoWatch,
        trigger_name: &'a str,
        commit_hash: &'a str,
        commit_message: &'a str,
    ) -> BoxFuture<'a, ()>;

    /// A build reached a terminal status.
    fn notify_build_result<'a>(&'a self, build: &'a BuildRun) -> BoxFuture<'a, ()>;

    /// A scheduled check failed. Sent once per error streak (anti-spam).
    fn notify_check_error<'a>(
        &'a self,
        repo: &'a RepoWatch,
        error: &'a str,
    ) -> BoxFuture<'a, ()>;

    /// The first successful check after an error streak.
    fn notify_recovered<'a>(&'a self, repo: &'a RepoWatch) -> BoxFuture<'a, ()>;
}

/// Default dispatcher: structured log events only.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogNotifier;

impl LogNotifier {
    pub fn new() -> Self {
        Self
    }
}

impl Notifier for LogNotifier {
    fn notify_new_commit<'a>(
        &'a self,
        repo: &'a RepoWatch,
        commit_hash: &'a str,
        commit_message: &'a str,
    ) -> BoxFuture<'a, ()> {
        Box::pin(async move {
            let short: String = commit_hash.chars().take(7).collect();
            info!(
                repo = %repo.name,
                commit = %short,
                message = %commit_message,
                "new commit, no matching trigger"
            );
        })
    }

    fn notify_trigger_start<'a>(
        &'a self,
        repo: &'a RepoWatch,
        trigger_name: &'a str,
        commit_hash: &'a str,
        _commit_message: &'a str,
    ) -> BoxFuture<'a, ()> {
        Box::pin(async move {
            let short: String = commit_hash.chars().take(7).collect();
            info!(
                repo = %repo.name,
                trigger = %trigger_name,
                commit = %short,
                "trigger starting"
            );
        })
    }

    fn notify_build_result<'a>(&'a self, build: &'a BuildRun) -> BoxFuture<'a, ()> {
        Box::pin(async move {
            let seconds = build.duration().map(|d| d.num_seconds());
            match build.status {
                BuildStatus::Success => info!(
                    repo = %build.repo_name,
                    trigger = %build.trigger_name,
                    commit = %build.short_commit_hash(),
                    duration_secs = ?seconds,
                    "build succeeded"
                ),
                BuildStatus::Cancelled => warn!(
                    repo = %build.repo_name,
                    trigger = %build.trigger_name,
                    commit = %build.short_commit_hash(),
                    "build cancelled"
                ),
                _ => error!(
                    repo = %build.repo_name,
                    trigger = %build.trigger_name,
                    commit = %build.short_commit_hash(),
                    exit_code = ?build.exit_code,
                    duration_secs = ?seconds,
                    "build failed"
                ),
            }
        })
    }

    fn notify_check_error<'a>(
        &'a self,
        repo: &'a RepoWatch,
        error: &'a str,
    ) -> BoxFuture<'a, ()> {
        Box::pin(async move {
            error!(repo = %repo.name, error = %error, "repository check failing");
        })
    }

    fn notify_recovered<'a>(&'a self, repo: &'a RepoWatch) -> BoxFuture<'a, ()> {
        Box::pin(async move {
            info!(repo = %repo.name, "repository checks recovered");
        })
    }
}
