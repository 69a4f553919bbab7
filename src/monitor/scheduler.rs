// src/monitor/scheduler.rs

//! Per-repository polling timers.
//!
//! Each enabled repository gets one recurring timer task. The first tick
//! fires immediately on registration, so a freshly started repository is
//! checked before its first interval elapses. A tick only sends the repo id
//! over the tick channel; the dispatch loop spawns the actual check, so a
//! slow check never blocks the timer.

use std::collections::HashMap;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info};
use uuid::Uuid;

use crate::errors::{GitwatchError, Result};
use crate::model::RepoWatch;

#[derive(Debug)]
pub struct Scheduler {
    tick_tx: mpsc::Sender<Uuid>,
    timers: HashMap<Uuid, JoinHandle<()>>,
}

impl Scheduler {
    pub fn new(tick_tx: mpsc::Sender<Uuid>) -> Self {
        Self {
            tick_tx,
            timers: HashMap::new(),
        }
    }

    /// Register timers for every enabled repository.
    pub fn start(&mut self, repos: &[RepoWatch]) -> Result<()> {
        info!(count = repos.len(), "starting monitoring timers");
        for repo in repos.iter().filter(|r| r.enabled) {
            self.start_one(repo)?;
        }
        Ok(())
    }

    /// Register (or re-register) the timer for one repository.
    ///
    /// Any existing timer for the repository is cancelled first, so interval
    /// changes take effect by calling this again.
    pub fn start_one(&mut self, repo: &RepoWatch) -> Result<()> {
        if repo.interval.is_zero() {
            return Err(GitwatchError::Config(format!(
                "repository '{}': check interval must be greater than zero",
                repo.name
            )));
        }

        if let Some(existing) = self.timers.remove(&repo.id) {
            existing.abort();
        }

        info!(
            repo = %repo.name,
            interval = ?repo.interval,
            "registering check timer"
        );

        let tick_tx = self.tick_tx.clone();
        let repo_id = repo.id;
        let repo_name = repo.name.clone();
        let interval = repo.interval;

        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            // A slow consumer must not cause a burst of catch-up ticks.
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                ticker.tick().await;
                debug!(repo = %repo_name, "check timer fired");
                if tick_tx.send(repo_id).await.is_err() {
                    debug!(repo = %repo_name, "tick channel closed; timer exiting");
                    break;
                }
            }
        });

        self.timers.insert(repo.id, handle);
        Ok(())
    }

    /// Cancel one repository's timer without affecting others.
    pub fn stop_one(&mut self, repo_id: Uuid) {
        if let Some(handle) = self.timers.remove(&repo_id) {
            handle.abort();
            debug!(repo_id = %repo_id, "check timer stopped");
        }
    }

    /// Cancel all timers and clear the registry.
    pub fn stop(&mut self) {
        info!(count = self.timers.len(), "stopping all monitoring timers");
        for (_, handle) in self.timers.drain() {
            handle.abort();
        }
    }

    pub fn is_running(&self, repo_id: Uuid) -> bool {
        self.timers.contains_key(&repo_id)
    }

    pub fn active_count(&self) -> usize {
        self.timers.len()
    }
}

impl Drop for Scheduler {
    fn drop(&mut self) {
        self.stop();
    }
}
