// src/monitor/coordinator.rs

//! Top-level orchestration.
//!
//! The coordinator owns every piece of shared monitoring state: repository
//! watermarks, transient statuses, the per-repository check guard and the
//! error-notification latch. All of it sits behind one mutex and is only
//! reached through the methods here; nothing else reads or writes the
//! shared flags directly.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::build::{BuildExecutor, BuildSlot, ExecuteOutcome, LiveBuild};
use crate::errors::{GitwatchError, Result};
use crate::exec::ProcessRunner;
use crate::git::ChangeDetector;
use crate::model::{BuildRun, RepoWatch};
use crate::monitor::scheduler::Scheduler;
use crate::notify::Notifier;
use crate::store::Store;
use crate::types::RepoStatus;

/// Tunables shared by the coordinator and pipeline.
#[derive(Debug, Clone, Copy)]
pub struct MonitorOptions {
    /// How long a terminal status is held before relaxing back to idle.
    pub settle_delay: Duration,
    /// Immediate pull re-attempts within one check (0 = next tick only).
    pub pull_retries: u32,
    /// Hard timeout for manual pull commands.
    pub command_timeout: Duration,
}

impl Default for MonitorOptions {
    fn default() -> Self {
        Self {
            settle_delay: Duration::from_millis(1000),
            pull_retries: 0,
            command_timeout: Duration::from_secs(3600),
        }
    }
}

/// Per-repository monitoring state.
///
/// Only the check/build task currently active for the repository writes the
/// transient fields; the `is_checking` guard enforces that discipline.
#[derive(Debug, Clone)]
pub struct RepoState {
    pub watch: RepoWatch,
    pub status: RepoStatus,
    pub is_checking: bool,
    pub last_checked_at: Option<DateTime<Utc>>,
    /// True iff the most recent check ended in error and no recovery
    /// notification has been sent yet.
    pub error_notified: bool,
}

impl RepoState {
    fn new(watch: RepoWatch) -> Self {
        Self {
            watch,
            status: RepoStatus::Idle,
            is_checking: false,
            last_checked_at: None,
            error_notified: false,
        }
    }
}

pub struct MonitorCoordinator {
    pub(crate) detector: Arc<dyn ChangeDetector>,
    pub(crate) executor: Arc<BuildExecutor>,
    pub(crate) notifier: Arc<dyn Notifier>,
    pub(crate) store: Arc<dyn Store>,
    pub(crate) slot: Arc<BuildSlot>,
    pub(crate) runner: ProcessRunner,
    pub(crate) repos: Arc<Mutex<HashMap<Uuid, RepoState>>>,
    scheduler: Mutex<Scheduler>,
    pub(crate) options: MonitorOptions,
}

impl MonitorCoordinator {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        watches: Vec<RepoWatch>,
        detector: Arc<dyn ChangeDetector>,
        executor: Arc<BuildExecutor>,
        notifier: Arc<dyn Notifier>,
        store: Arc<dyn Store>,
        slot: Arc<BuildSlot>,
        runner: ProcessRunner,
        tick_tx: mpsc::Sender<Uuid>,
        options: MonitorOptions,
    ) -> Arc<Self> {
        let repos = watches
            .into_iter()
            .map(|w| (w.id, RepoState::new(w)))
            .collect();

        Arc::new(Self {
            detector,
            executor,
            notifier,
            store,
            slot,
            runner,
            repos: Arc::new(Mutex::new(repos)),
            scheduler: Mutex::new(Scheduler::new(tick_tx)),
            options,
        })
    }

    /// Spawn the dispatch loop consuming scheduler ticks.
    ///
    /// Each tick spawns its check as a detached task, so checks for
    /// different repositories run fully concurrently and the loop itself
    /// never blocks on a check.
    pub fn spawn_tick_loop(
        coordinator: Arc<Self>,
        mut tick_rx: mpsc::Receiver<Uuid>,
    ) -> JoinHandle<()> {
        tokio::spawn(async move {
            info!("monitor dispatch loop started");
            while let Some(repo_id) = tick_rx.recv().await {
                let c = Arc::clone(&coordinator);
                tokio::spawn(async move {
                    c.check_repository(repo_id).await;
                });
            }
            info!("tick channel closed; dispatch loop exiting");
        })
    }

    /// Start timers for every enabled repository.
    pub fn start_monitoring(&self) -> Result<()> {
        let watches: Vec<RepoWatch> = self
            .lock_repos()
            .values()
            .filter(|s| s.watch.enabled)
            .map(|s| s.watch.clone())
            .collect();
        self.lock_scheduler().start(&watches)
    }

    /// Cancel all timers.
    pub fn stop_monitoring(&self) {
        self.lock_scheduler().stop();
    }

    /// Enable or disable one repository, adjusting its timer accordingly.
    pub fn set_repo_enabled(&self, repo_id: Uuid, enabled: bool) -> Result<()> {
        let watch = {
            let mut repos = self.lock_repos();
            let state = repos
                .get_mut(&repo_id)
                .ok_or_else(|| GitwatchError::UnknownRepository(repo_id.to_string()))?;
            state.watch.enabled = enabled;
            state.watch.clone()
        };

        if enabled {
            self.lock_scheduler().start_one(&watch)
        } else {
            self.lock_scheduler().stop_one(repo_id);
            Ok(())
        }
    }

    /// Run one check for every repository, sequentially, awaiting each.
    pub async fn check_all_now(&self) {
        let ids: Vec<Uuid> = self.lock_repos().keys().copied().collect();
        info!(count = ids.len(), "manual check of all repositories");
        for id in ids {
            self.check_repository(id).await;
        }
    }

    /// Execute a named trigger for a repository with an explicit commit
    /// identity, updating the repository status around the build.
    pub async fn execute_trigger(
        &self,
        repo_id: Uuid,
        trigger_name: &str,
        commit_hash: &str,
        commit_message: &str,
    ) -> Result<ExecuteOutcome> {
        let (watch, trigger) = {
            let repos = self.lock_repos();
            let state = repos
                .get(&repo_id)
                .ok_or_else(|| GitwatchError::UnknownRepository(repo_id.to_string()))?;
            let trigger = state
                .watch
                .triggers
                .iter()
                .find(|t| t.name == trigger_name)
                .ok_or_else(|| GitwatchError::UnknownTrigger(trigger_name.to_string()))?
                .clone();
            (state.watch.clone(), trigger)
        };

        Ok(self
            .run_build(&watch, &trigger, commit_hash, commit_message)
            .await)
    }

    /// Re-run a finished build with the same commit identity.
    pub async fn retry_build(&self, previous: &BuildRun) -> Result<ExecuteOutcome> {
        self.execute_trigger(
            previous.repo_id,
            &previous.trigger_name,
            &previous.commit_hash,
            &previous.commit_message,
        )
        .await
    }

    /// Cancel the running build, if any, and relax its repository to idle.
    pub async fn cancel_current_build(&self) -> Option<BuildRun> {
        let cancelled = self.executor.cancel_current().await?;
        {
            let mut repos = self.lock_repos();
            if let Some(state) = repos.get_mut(&cancelled.repo_id) {
                state.status = RepoStatus::Idle;
            }
        }
        Some(cancelled)
    }

    /// Snapshot of the live build, if any.
    pub fn current_build(&self) -> Option<LiveBuild> {
        self.executor.current_build()
    }

    pub fn repo_ids(&self) -> Vec<Uuid> {
        self.lock_repos().keys().copied().collect()
    }

    pub fn repo_id_by_name(&self, name: &str) -> Option<Uuid> {
        self.lock_repos()
            .values()
            .find(|s| s.watch.name == name)
            .map(|s| s.watch.id)
    }

    pub fn repo_status(&self, repo_id: Uuid) -> Option<RepoStatus> {
        self.lock_repos().get(&repo_id).map(|s| s.status)
    }

    pub fn repo_state(&self, repo_id: Uuid) -> Option<RepoState> {
        self.lock_repos().get(&repo_id).cloned()
    }

    pub fn repo_watch(&self, repo_id: Uuid) -> Option<RepoWatch> {
        self.lock_repos().get(&repo_id).map(|s| s.watch.clone())
    }

    pub fn scheduled_count(&self) -> usize {
        self.lock_scheduler().active_count()
    }

    // ---- shared-state helpers used by the pipeline ----

    pub(crate) fn lock_repos(&self) -> MutexGuard<'_, HashMap<Uuid, RepoState>> {
        self.repos.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn lock_scheduler(&self) -> MutexGuard<'_, Scheduler> {
        self.scheduler
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Record a failed check. Returns true when an error notification should
    /// be sent (the latch just flipped to errored).
    pub(crate) fn latch_error(&self, repo_id: Uuid, error: &str) -> bool {
        let mut repos = self.lock_repos();
        let Some(state) = repos.get_mut(&repo_id) else {
            return false;
        };
        state.status = RepoStatus::Error;
        state.watch.last_error = Some(error.to_string());
        let first_error = !state.error_notified;
        state.error_notified = true;
        first_error
    }

    /// Record a successful check. Returns true when a recovery notification
    /// should be sent (the latch was errored and just cleared).
    pub(crate) fn latch_success(&self, repo_id: Uuid) -> bool {
        let mut repos = self.lock_repos();
        let Some(state) = repos.get_mut(&repo_id) else {
            return false;
        };
        state.watch.last_error = None;
        let recovered = state.error_notified;
        state.error_notified = false;
        recovered
    }

    pub(crate) fn set_status(&self, repo_id: Uuid, status: RepoStatus) {
        let mut repos = self.lock_repos();
        if let Some(state) = repos.get_mut(&repo_id) {
            state.status = status;
        }
    }

    /// Hold a terminal status for the settle delay, then relax back to idle
    /// unless newer activity already changed it.
    pub(crate) fn schedule_settle(&self, repo_id: Uuid, terminal: RepoStatus) {
        if !terminal.is_settling() {
            return;
        }
        let repos = Arc::clone(&self.repos);
        let delay = self.options.settle_delay;
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let mut repos = repos.lock().unwrap_or_else(PoisonError::into_inner);
            if let Some(state) = repos.get_mut(&repo_id) {
                if state.status == terminal && !state.is_checking {
                    state.status = RepoStatus::Idle;
                }
            }
        });
    }

    /// Advance the commit watermark after a successful pull of `hash`.
    pub(crate) fn advance_commit_watermark(&self, repo_id: Uuid, hash: &str) -> Option<RepoWatch> {
        let mut repos = self.lock_repos();
        let state = repos.get_mut(&repo_id)?;
        state.watch.last_commit_hash = Some(hash.to_string());
        Some(state.watch.clone())
    }

    /// Advance the tag watermark after a new tag was detected.
    pub(crate) fn advance_tag_watermark(&self, repo_id: Uuid, tag: &str) -> Option<RepoWatch> {
        let mut repos = self.lock_repos();
        let state = repos.get_mut(&repo_id)?;
        state.watch.last_known_tag = Some(tag.to_string());
        Some(state.watch.clone())
    }

    pub(crate) async fn persist_repo(&self, watch: &RepoWatch) {
        if let Err(err) = self.store.update_repo(watch).await {
            warn!(repo = %watch.name, error = %err, "failed to persist repository state");
        }
    }

    pub(crate) async fn persist_check(&self, check: &crate::model::CheckRecord) {
        if let Err(err) = self.store.save_check(check).await {
            warn!(repo = %check.repo_name, error = %err, "failed to persist check record");
        }
    }

    /// Run one build through the executor, maintaining the repository status
    /// around it.
    pub(crate) async fn run_build(
        &self,
        watch: &RepoWatch,
        trigger: &crate::model::TriggerRule,
        commit_hash: &str,
        commit_message: &str,
    ) -> ExecuteOutcome {
        self.set_status(watch.id, RepoStatus::Building);
        self.notifier
            .notify_trigger_start(watch, &trigger.name, commit_hash, commit_message)
            .await;

        let outcome = self
            .executor
            .execute(trigger, watch, commit_hash, commit_message)
            .await;

        match &outcome {
            ExecuteOutcome::Skipped => {
                debug!(repo = %watch.name, "build skipped; slot already held");
                self.set_status(watch.id, RepoStatus::Idle);
            }
            ExecuteOutcome::Finished(build) => {
                let terminal = match build.status {
                    crate::types::BuildStatus::Success => RepoStatus::Success,
                    crate::types::BuildStatus::Cancelled => RepoStatus::Idle,
                    _ => RepoStatus::Failed,
                };
                self.set_status(watch.id, terminal);
                self.schedule_settle(watch.id, terminal);
            }
        }

        outcome
    }
}
