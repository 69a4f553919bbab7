// src/monitor/pipeline.rs

//! The per-tick check pipeline.
//!
//! Errors raised by the detector are caught at this boundary, recorded as
//! `CheckRecord(result = Error)` and never propagated further; the
//! scheduler is unaffected and retries on the next tick.

use std::fmt::Write as _;

use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::errors::{GitwatchError, Result};
use crate::exec::{RunOutcome, RunRequest};
use crate::model::{BuildRun, CheckRecord, RepoWatch};
use crate::trigger::select_trigger;
use crate::types::{CheckResult, RepoStatus};

use super::coordinator::MonitorCoordinator;

impl MonitorCoordinator {
    /// Run the check pipeline for one repository.
    ///
    /// Returns `None` when the check was skipped: unknown or disabled
    /// repository, a build holding the global slot, or a previous check for
    /// the same repository still in flight.
    pub async fn check_repository(&self, repo_id: Uuid) -> Option<CheckRecord> {
        // Guards and the transition to Checking happen in one locked step.
        let watch = {
            let mut repos = self.lock_repos();
            let state = repos.get_mut(&repo_id)?;

            if !state.watch.enabled {
                debug!(repo = %state.watch.name, "repository disabled; skipping check");
                return None;
            }
            if self.slot.is_held() {
                debug!(
                    repo = %state.watch.name,
                    "build in progress; skipping check"
                );
                return None;
            }
            if state.is_checking {
                debug!(
                    repo = %state.watch.name,
                    "previous check still running; skipping tick"
                );
                return None;
            }

            state.is_checking = true;
            state.status = RepoStatus::Checking;
            state.last_checked_at = Some(chrono::Utc::now());
            state.watch.clone()
        };

        let watching = if watch.watch_tags {
            "tags".to_string()
        } else {
            format!("{}/{}", watch.remote, watch.branch)
        };
        info!(repo = %watch.name, watching = %watching, "checking repository");

        let record = if watch.watch_tags {
            self.check_tags(&watch).await
        } else {
            self.check_commits(&watch).await
        };

        self.persist_check(&record).await;

        // The guard is dropped on every path.
        {
            let mut repos = self.lock_repos();
            if let Some(state) = repos.get_mut(&repo_id) {
                state.is_checking = false;
            }
        }

        Some(record)
    }

    /// Commit-watch path: fetch, compare, pull, match triggers.
    async fn check_commits(&self, watch: &RepoWatch) -> CheckRecord {
        let path = watch.local_path.as_path();
        let mut trail = String::new();
        let _ = writeln!(trail, "git fetch {}", watch.remote);

        let since = watch.last_commit_hash.as_deref();
        let probe = match self
            .detector
            .has_new_commits(path, &watch.branch, &watch.remote, since)
            .await
        {
            Ok(probe) => probe,
            Err(err) => return self.record_check_error(watch, &watch.branch, trail, err).await,
        };

        let _ = writeln!(trail, "checking {}/{}", watch.remote, watch.branch);
        let _ = writeln!(
            trail,
            "last known hash: {}",
            since.unwrap_or("none")
        );
        let _ = writeln!(trail, "remote hash: {}", probe.latest_hash);

        if !probe.has_new {
            debug!(repo = %watch.name, "no new commits");
            trail.push_str("result: no changes\n");
            return self
                .record_check_success(
                    watch,
                    CheckRecord::new(watch, watch.branch.as_str(), CheckResult::NoChanges)
                        .with_commit(probe.latest_hash.as_str(), "")
                        .with_git_output(trail),
                )
                .await;
        }

        info!(
            repo = %watch.name,
            commit = %probe.latest_hash.chars().take(7).collect::<String>(),
            message = %probe.message,
            "new commit detected"
        );
        let _ = writeln!(trail, "result: new commit detected");
        let _ = writeln!(trail, "message: {}", probe.message);

        // Pull the detected commit, unless the local head already matches
        // (a push made from this working copy).
        let pull_ok = match self.detector.local_head(path).await {
            Ok(head) if head == probe.latest_hash => {
                trail.push_str("local already up to date (own commit)\n");
                true
            }
            _ => self.pull_with_retries(watch, &mut trail).await,
        };

        if !pull_ok {
            // The watermark is deliberately NOT advanced, so the same change
            // is re-attempted on the next tick; triggers are suppressed.
            warn!(
                repo = %watch.name,
                "pull failed for detected commit; will retry next tick"
            );
            let err = GitwatchError::git("pull", "pull failed for detected commit");
            return self
                .record_check_error_with_commit(watch, &watch.branch, trail, err, &probe)
                .await;
        }

        if let Some(updated) = self.advance_commit_watermark(watch.id, &probe.latest_hash) {
            self.persist_repo(&updated).await;
        }

        let record = CheckRecord::new(watch, watch.branch.as_str(), CheckResult::NewCommit)
            .with_commit(probe.latest_hash.as_str(), probe.message.as_str())
            .with_git_output(trail);
        let record = self
            .record_check_success(watch, record)
            .await;

        self.process_triggers(watch, record, &probe.latest_hash, &probe.message)
            .await
    }

    /// Tag-watch path: fetch tags, compare; the tag name doubles as both
    /// commit identity and message for trigger matching. No pull step.
    async fn check_tags(&self, watch: &RepoWatch) -> CheckRecord {
        let path = watch.local_path.as_path();
        let mut trail = String::new();
        let _ = writeln!(trail, "git fetch --tags {}", watch.remote);

        let since = watch.last_known_tag.as_deref();
        let probe = match self.detector.has_new_tags(path, &watch.remote, since).await {
            Ok(probe) => probe,
            Err(err) => return self.record_check_error(watch, "tags", trail, err).await,
        };

        let _ = writeln!(trail, "last known tag: {}", since.unwrap_or("none"));
        let _ = writeln!(
            trail,
            "latest tag: {}",
            probe.latest_tag.as_deref().unwrap_or("none")
        );

        if !probe.has_new {
            debug!(repo = %watch.name, "no new tags");
            trail.push_str("result: no new tags\n");
            let mut record = CheckRecord::new(watch, "tags", CheckResult::NoChanges)
                .with_git_output(trail);
            record.commit_hash = probe.latest_tag.clone();
            return self.record_check_success(watch, record).await;
        }

        let tag = probe.tag_name.clone();
        info!(repo = %watch.name, tag = %tag, "new tag detected");
        let _ = writeln!(trail, "result: new tag detected: {tag}");

        if let Some(updated) = self.advance_tag_watermark(watch.id, &tag) {
            self.persist_repo(&updated).await;
        }

        let record = CheckRecord::new(watch, "tags", CheckResult::NewCommit)
            .with_commit(tag.as_str(), format!("Tag: {tag}"))
            .with_git_output(trail);
        let record = self.record_check_success(watch, record).await;

        self.process_triggers(watch, record, &tag, &tag).await
    }

    /// Select and run a trigger for a freshly detected change.
    ///
    /// Upgrades the check record to `Triggered` when a rule matches; a
    /// detected change with no matching rule is announced as a plain new
    /// commit instead.
    async fn process_triggers(
        &self,
        watch: &RepoWatch,
        mut record: CheckRecord,
        commit_hash: &str,
        commit_message: &str,
    ) -> CheckRecord {
        let Some(trigger) = select_trigger(&watch.triggers, commit_message) else {
            debug!(repo = %watch.name, "no matching trigger for new change");
            self.notifier
                .notify_new_commit(watch, commit_hash, commit_message)
                .await;
            self.set_status(watch.id, RepoStatus::Idle);
            return record;
        };

        record.result = CheckResult::Triggered;
        self.persist_check(&record).await;

        let trigger = trigger.clone();
        self.run_build(watch, &trigger, commit_hash, commit_message)
            .await;

        record
    }

    /// Attempt the pull, re-trying immediately up to the configured count.
    async fn pull_with_retries(&self, watch: &RepoWatch, trail: &mut String) -> bool {
        let path = watch.local_path.as_path();
        let attempts = self.options.pull_retries + 1;

        for attempt in 1..=attempts {
            match self.detector.pull(path, &watch.remote, &watch.branch).await {
                Ok(()) => {
                    trail.push_str("git pull - OK\n");
                    return true;
                }
                Err(err) => {
                    warn!(
                        repo = %watch.name,
                        attempt,
                        attempts,
                        error = %err,
                        "git pull failed"
                    );
                    let _ = writeln!(trail, "git pull - ERROR: {err}");
                }
            }
        }
        false
    }

    /// Finalize a successful check: clear the error latch (sending a single
    /// recovery notification when it was set) and persist the repo state.
    async fn record_check_success(&self, watch: &RepoWatch, record: CheckRecord) -> CheckRecord {
        if self.latch_success(watch.id) {
            info!(repo = %watch.name, "repository recovered from error state");
            self.notifier.notify_recovered(watch).await;
        }
        if record.result == CheckResult::NoChanges {
            self.set_status(watch.id, RepoStatus::Idle);
        }
        if let Some(updated) = self.repo_watch(watch.id) {
            self.persist_repo(&updated).await;
        }
        record
    }

    /// Finalize a failed check: latch the error (sending at most one error
    /// notification per streak) and build the error record.
    async fn record_check_error(
        &self,
        watch: &RepoWatch,
        branch: &str,
        trail: String,
        err: GitwatchError,
    ) -> CheckRecord {
        let message = err.to_string();
        warn!(repo = %watch.name, error = %message, "check failed");

        let mut trail = trail;
        let _ = writeln!(trail, "ERROR: {message}");

        if self.latch_error(watch.id, &message) {
            self.notifier.notify_check_error(watch, &message).await;
        }
        self.schedule_settle(watch.id, RepoStatus::Error);
        if let Some(updated) = self.repo_watch(watch.id) {
            self.persist_repo(&updated).await;
        }

        CheckRecord::new(watch, branch, CheckResult::Error)
            .with_error(message)
            .with_git_output(trail)
    }

    /// Error record that also keeps the detected commit identity (used when
    /// the pull of a detected commit fails).
    async fn record_check_error_with_commit(
        &self,
        watch: &RepoWatch,
        branch: &str,
        trail: String,
        err: GitwatchError,
        probe: &crate::git::CommitProbe,
    ) -> CheckRecord {
        let record = self.record_check_error(watch, branch, trail, err).await;
        record.with_commit(probe.latest_hash.as_str(), probe.message.as_str())
    }

    /// Manual pull with streamed output captured into the check record.
    pub async fn pull_repository(&self, repo_id: Uuid) -> Result<CheckRecord> {
        let watch = self
            .repo_watch(repo_id)
            .ok_or_else(|| GitwatchError::UnknownRepository(repo_id.to_string()))?;

        info!(repo = %watch.name, "manual pull requested");
        self.set_status(repo_id, RepoStatus::Checking);

        let command = format!("git pull {} {}", watch.remote, watch.branch);
        let mut trail = format!("$ {command}\n");

        let (out_tx, mut out_rx) = mpsc::channel::<String>(64);
        let collector = tokio::spawn(async move {
            let mut streamed = String::new();
            while let Some(chunk) = out_rx.recv().await {
                streamed.push_str(&chunk);
            }
            streamed
        });

        let run_result = self
            .runner
            .run(RunRequest {
                command,
                working_dir: watch.local_path.clone(),
                timeout: self.options.command_timeout,
                output_tx: Some(out_tx),
            })
            .await;

        trail.push_str(&collector.await.unwrap_or_default());

        let record = match run_result {
            Ok(RunOutcome::Completed(res)) if res.is_success() => {
                self.set_status(repo_id, RepoStatus::Idle);
                CheckRecord::new(&watch, &watch.branch, CheckResult::NewCommit)
                    .with_git_output(trail)
            }
            Ok(RunOutcome::Completed(res)) => {
                let message = format!("pull failed: {}", res.output);
                self.latch_pull_failure(repo_id, &message);
                CheckRecord::new(&watch, &watch.branch, CheckResult::Error)
                    .with_error(message)
                    .with_git_output(trail)
            }
            Ok(RunOutcome::Cancelled { output }) => {
                self.set_status(repo_id, RepoStatus::Idle);
                CheckRecord::new(&watch, &watch.branch, CheckResult::Error)
                    .with_error("pull cancelled")
                    .with_git_output(format!("{trail}{output}"))
            }
            Err(err) => {
                let message = err.to_string();
                self.latch_pull_failure(repo_id, &message);
                CheckRecord::new(&watch, &watch.branch, CheckResult::Error)
                    .with_error(message)
                    .with_git_output(trail)
            }
        };

        self.persist_check(&record).await;
        Ok(record)
    }

    fn latch_pull_failure(&self, repo_id: Uuid, message: &str) {
        let mut repos = self.lock_repos();
        if let Some(state) = repos.get_mut(&repo_id) {
            state.status = RepoStatus::Error;
            state.watch.last_error = Some(message.to_string());
        }
    }

    /// Build HEAD as it stands, ignoring the commit check.
    ///
    /// Matches a trigger against the head commit message, falling back to
    /// the highest-priority enabled trigger when none matches. Returns
    /// `None` when the repository has no enabled trigger at all or a build
    /// is already in progress.
    pub async fn force_build(&self, repo_id: Uuid) -> Result<Option<BuildRun>> {
        let watch = self
            .repo_watch(repo_id)
            .ok_or_else(|| GitwatchError::UnknownRepository(repo_id.to_string()))?;

        if self.slot.is_held() {
            warn!(repo = %watch.name, "build already in progress; ignoring force build");
            return Ok(None);
        }

        info!(repo = %watch.name, "forcing build from current head");
        self.set_status(repo_id, RepoStatus::Checking);

        let (hash, message) = match self
            .detector
            .head_commit_summary(watch.local_path.as_path())
            .await
        {
            Ok(parts) => parts,
            Err(err) => {
                self.set_status(repo_id, RepoStatus::Idle);
                return Err(err);
            }
        };

        let trigger = match select_trigger(&watch.triggers, &message) {
            Some(t) => t.clone(),
            None => {
                // Fall back to the best enabled trigger; a forced build is
                // an explicit request to run something.
                let mut enabled: Vec<_> =
                    watch.triggers.iter().filter(|t| t.enabled).collect();
                enabled.sort_by(|a, b| b.priority.cmp(&a.priority));
                match enabled.first() {
                    Some(t) => (*t).clone(),
                    None => {
                        warn!(
                            repo = %watch.name,
                            "force build requires at least one enabled trigger"
                        );
                        self.set_status(repo_id, RepoStatus::Idle);
                        return Ok(None);
                    }
                }
            }
        };

        let outcome = self.run_build(&watch, &trigger, &hash, &message).await;
        match outcome {
            crate::build::ExecuteOutcome::Finished(build) => Ok(Some(build)),
            crate::build::ExecuteOutcome::Skipped => Ok(None),
        }
    }
}
