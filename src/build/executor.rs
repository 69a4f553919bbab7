// src/build/executor.rs

//! Build executor: serializes triggered commands through the global build
//! slot, streams their output into a live buffer, and finalizes build
//! records exactly once.

use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::exec::{ProcessRunner, RunOutcome, RunRequest};
use crate::model::{BuildRun, RepoWatch, TriggerRule};
use crate::notify::Notifier;
use crate::store::Store;
use crate::trigger::TemplateEngine;
use crate::types::BuildStatus;

use super::slot::BuildSlot;

/// Result of an [`BuildExecutor::execute`] call.
#[derive(Debug, Clone)]
pub enum ExecuteOutcome {
    /// Another build held the slot; nothing was run.
    Skipped,
    /// The build ran to a terminal status (success, failed or cancelled).
    Finished(BuildRun),
}

/// Snapshot of the currently running build for live observers.
#[derive(Debug, Clone)]
pub struct LiveBuild {
    pub build: BuildRun,
    pub output: String,
}

pub struct BuildExecutor {
    slot: Arc<BuildSlot>,
    runner: ProcessRunner,
    templates: TemplateEngine,
    notifier: Arc<dyn Notifier>,
    store: Arc<dyn Store>,
    live: Arc<Mutex<Option<LiveBuild>>>,
    build_timeout: Duration,
    settle_delay: Duration,
}

impl BuildExecutor {
    pub fn new(
        slot: Arc<BuildSlot>,
        runner: ProcessRunner,
        templates: TemplateEngine,
        notifier: Arc<dyn Notifier>,
        store: Arc<dyn Store>,
        build_timeout: Duration,
        settle_delay: Duration,
    ) -> Self {
        Self {
            slot,
            runner,
            templates,
            notifier,
            store,
            live: Arc::new(Mutex::new(None)),
            build_timeout,
            settle_delay,
        }
    }

    /// Snapshot of the live build, if any.
    pub fn current_build(&self) -> Option<LiveBuild> {
        lock(&self.live).clone()
    }

    /// Run `trigger`'s command for the given commit identity.
    ///
    /// Returns [`ExecuteOutcome::Skipped`] immediately when another build
    /// holds the slot; no work is performed in that case. The slot is
    /// released on every exit path.
    pub async fn execute(
        &self,
        trigger: &TriggerRule,
        repo: &RepoWatch,
        commit_hash: &str,
        commit_message: &str,
    ) -> ExecuteOutcome {
        let build_id = Uuid::new_v4();

        if !self.slot.try_acquire(build_id) {
            info!(
                repo = %repo.name,
                trigger = %trigger.name,
                "build already in progress; skipping"
            );
            return ExecuteOutcome::Skipped;
        }

        let outcome = self
            .execute_acquired(build_id, trigger, repo, commit_hash, commit_message)
            .await;

        // No-op if cancel_current already freed the slot for this build.
        self.slot.release(build_id);
        outcome
    }

    async fn execute_acquired(
        &self,
        build_id: Uuid,
        trigger: &TriggerRule,
        repo: &RepoWatch,
        commit_hash: &str,
        commit_message: &str,
    ) -> ExecuteOutcome {
        info!(
            repo = %repo.name,
            trigger = %trigger.name,
            build_id = %build_id,
            "executing trigger"
        );

        let command = self
            .templates
            .expand(&trigger.command, repo, commit_hash, commit_message)
            .await;

        let mut build = BuildRun::new(
            build_id,
            repo,
            trigger,
            commit_hash,
            commit_message,
            command.clone(),
        );
        self.persist(&build).await;
        *lock(&self.live) = Some(LiveBuild {
            build: build.clone(),
            output: String::new(),
        });

        // Streamed batches land in the live-output buffer as they arrive.
        let (out_tx, mut out_rx) = mpsc::channel::<String>(64);
        let live = Arc::clone(&self.live);
        let appender = tokio::spawn(async move {
            while let Some(chunk) = out_rx.recv().await {
                let mut live = lock(&live);
                if let Some(lb) = live.as_mut() {
                    if lb.build.id == build_id {
                        lb.output.push_str(&chunk);
                    }
                }
            }
        });

        let working_dir = trigger
            .working_directory
            .clone()
            .map(PathBuf::from)
            .unwrap_or_else(|| repo.local_path.clone());

        let run_result = self
            .runner
            .run(RunRequest {
                command,
                working_dir,
                timeout: self.build_timeout,
                output_tx: Some(out_tx),
            })
            .await;

        // The sender went away with the request; drain the appender.
        let _ = appender.await;

        let cancelled_externally = lock(&self.live)
            .as_ref()
            .map(|lb| lb.build.id == build_id && lb.build.status == BuildStatus::Cancelled)
            .unwrap_or(false);

        match run_result {
            Ok(RunOutcome::Completed(res)) if cancelled_externally => {
                build.cancel(res.output);
            }
            Ok(RunOutcome::Completed(res)) => {
                build.complete(res.exit_code, res.output);
            }
            Ok(RunOutcome::Cancelled { mut output }) => {
                output.push_str("\n\n[build cancelled by user]");
                build.cancel(output);
            }
            Err(err) => {
                build.complete(-1, err.to_string());
            }
        }

        {
            let mut live = lock(&self.live);
            if let Some(lb) = live.as_mut() {
                if lb.build.id == build_id {
                    lb.build = build.clone();
                }
            }
        }

        self.persist(&build).await;
        self.notifier.notify_build_result(&build).await;

        // Keep the live build visible briefly so observers can see the
        // terminal state before it is cleared.
        let live = Arc::clone(&self.live);
        let settle = self.settle_delay;
        tokio::spawn(async move {
            tokio::time::sleep(settle).await;
            let mut live = lock(&live);
            let same = live.as_ref().map(|lb| lb.build.id == build_id).unwrap_or(false);
            if same {
                *live = None;
            }
        });

        ExecuteOutcome::Finished(build)
    }

    /// Cancel the running build, if any.
    ///
    /// Marks the live record cancelled, kills every tracked process and
    /// frees the slot immediately so a subsequent execute does not have to
    /// wait for the killed process to unwind. Returns the cancelled record.
    pub async fn cancel_current(&self) -> Option<BuildRun> {
        let Some(holder) = self.slot.holder() else {
            debug!("no build in progress; cancel ignored");
            return None;
        };

        info!(build_id = %holder, "cancelling current build");

        let snapshot = {
            let mut live = lock(&self.live);
            match live.as_mut() {
                Some(lb) if lb.build.id == holder => {
                    let mut output = lb.output.clone();
                    output.push_str("\n\n[build cancelled by user]");
                    lb.build.cancel(output);
                    Some(lb.build.clone())
                }
                _ => None,
            }
        };

        self.runner.cancel_all();
        self.slot.release(holder);

        if let Some(build) = &snapshot {
            self.persist(build).await;
        }
        snapshot
    }

    async fn persist(&self, build: &BuildRun) {
        if let Err(err) = self.store.save_build(build).await {
            warn!(build_id = %build.id, error = %err, "failed to persist build run");
        }
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
