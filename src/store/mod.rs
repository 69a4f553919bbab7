// src/store/mod.rs

//! Persistence seam.
//!
//! The core records builds, checks and repository watermarks through this
//! trait. Save failures are logged by callers and never abort the scheduling
//! loop. [`MemoryStore`] is the in-tree implementation; durable stores live
//! outside the core.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use uuid::Uuid;

use crate::errors::Result;
use crate::model::{BuildRun, CheckRecord, RepoWatch};
use crate::types::BoxFuture;

pub trait Store: Send + Sync {
    /// Insert or update a build run by id.
    fn save_build<'a>(&'a self, build: &'a BuildRun) -> BoxFuture<'a, Result<()>>;

    /// Insert or update a check record by id (the `NewCommit` → `Triggered`
    /// upgrade re-saves the same record).
    fn save_check<'a>(&'a self, check: &'a CheckRecord) -> BoxFuture<'a, Result<()>>;

    /// Persist the repository watch, including its watermarks.
    fn update_repo<'a>(&'a self, repo: &'a RepoWatch) -> BoxFuture<'a, Result<()>>;

    fn build_by_id<'a>(&'a self, id: Uuid) -> BoxFuture<'a, Result<Option<BuildRun>>>;

    fn checks_for_repo<'a>(&'a self, repo_id: Uuid) -> BoxFuture<'a, Result<Vec<CheckRecord>>>;

    fn builds_for_repo<'a>(&'a self, repo_id: Uuid) -> BoxFuture<'a, Result<Vec<BuildRun>>>;
}

/// In-memory store, also used as the test double.
#[derive(Debug, Default)]
pub struct MemoryStore {
    builds: Mutex<Vec<BuildRun>>,
    checks: Mutex<Vec<CheckRecord>>,
    repos: Mutex<HashMap<Uuid, RepoWatch>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn repo(&self, id: Uuid) -> Option<RepoWatch> {
        lock(&self.repos).get(&id).cloned()
    }

    pub fn check_count(&self) -> usize {
        lock(&self.checks).len()
    }

    pub fn build_count(&self) -> usize {
        lock(&self.builds).len()
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl Store for MemoryStore {
    fn save_build<'a>(&'a self, build: &'a BuildRun) -> BoxFuture<'a, Result<()>> {
        Box::pin(async move {
            let mut builds = lock(&self.builds);
            match builds.iter_mut().find(|b| b.id == build.id) {
                Some(existing) => *existing = build.clone(),
                None => builds.push(build.clone()),
            }
            Ok(())
        })
    }

    fn save_check<'a>(&'a self, check: &'a CheckRecord) -> BoxFuture<'a, Result<()>> {
        Box::pin(async move {
            let mut checks = lock(&self.checks);
            match checks.iter_mut().find(|c| c.id == check.id) {
                Some(existing) => *existing = check.clone(),
                None => checks.push(check.clone()),
            }
            Ok(())
        })
    }

    fn update_repo<'a>(&'a self, repo: &'a RepoWatch) -> BoxFuture<'a, Result<()>> {
        Box::pin(async move {
            lock(&self.repos).insert(repo.id, repo.clone());
            Ok(())
        })
    }

    fn build_by_id<'a>(&'a self, id: Uuid) -> BoxFuture<'a, Result<Option<BuildRun>>> {
        Box::pin(async move { Ok(lock(&self.builds).iter().find(|b| b.id == id).cloned()) })
    }

    fn checks_for_repo<'a>(&'a self, repo_id: Uuid) -> BoxFuture<'a, Result<Vec<CheckRecord>>> {
        Box::pin(async move {
            Ok(lock(&self.checks)
                .iter()
                .filter(|c| c.repo_id == repo_id)
                .cloned()
                .collect())
        })
    }

    fn builds_for_repo<'a>(&'a self, repo_id: Uuid) -> BoxFuture<'a, Result<Vec<BuildRun>>> {
        Box::pin(async move {
            Ok(lock(&self.builds)
                .iter()
                .filter(|b| b.repo_id == repo_id)
                .cloned()
                .collect())
        })
    }
}
