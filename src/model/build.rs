// src/model/build.rs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::model::repo::RepoWatch;
use crate::model::trigger::TriggerRule;
use crate::types::BuildStatus;

/// Exit code recorded when a build is cancelled rather than finishing.
pub const CANCELLED_EXIT_CODE: i32 = -999;

/// One execution record of a triggered command.
///
/// Created when a trigger fires, mutated only by the build executor, and
/// immutable once it reaches a terminal status.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuildRun {
    pub id: Uuid,
    pub repo_id: Uuid,
    pub repo_name: String,
    pub trigger_name: String,
    pub commit_hash: String,
    pub commit_message: String,
    /// Fully resolved command, after template expansion.
    pub command: String,
    pub output: String,
    pub exit_code: Option<i32>,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub status: BuildStatus,
}

impl BuildRun {
    pub fn new(
        id: Uuid,
        repo: &RepoWatch,
        trigger: &TriggerRule,
        commit_hash: impl Into<String>,
        commit_message: impl Into<String>,
        command: impl Into<String>,
    ) -> Self {
        Self {
            id,
            repo_id: repo.id,
            repo_name: repo.name.clone(),
            trigger_name: trigger.name.clone(),
            commit_hash: commit_hash.into(),
            commit_message: commit_message.into(),
            command: command.into(),
            output: String::new(),
            exit_code: None,
            started_at: Utc::now(),
            finished_at: None,
            status: BuildStatus::Running,
        }
    }

    /// Finalize with the process result.
    pub fn complete(&mut self, exit_code: i32, output: impl Into<String>) {
        self.finished_at = Some(Utc::now());
        self.exit_code = Some(exit_code);
        self.output = output.into();
        self.status = if exit_code == 0 {
            BuildStatus::Success
        } else {
            BuildStatus::Failed
        };
    }

    /// Finalize as cancelled with the sentinel exit code.
    pub fn cancel(&mut self, output: impl Into<String>) {
        self.finished_at = Some(Utc::now());
        self.exit_code = Some(CANCELLED_EXIT_CODE);
        self.output = output.into();
        self.status = BuildStatus::Cancelled;
    }

    pub fn short_commit_hash(&self) -> String {
        self.commit_hash.chars().take(7).collect()
    }

    pub fn duration(&self) -> Option<chrono::Duration> {
        self.finished_at.map(|end| end - self.started_at)
    }
}
