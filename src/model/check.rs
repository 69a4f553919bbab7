// src/model/check.rs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::model::repo::RepoWatch;
use crate::types::CheckResult;

/// One execution record of a polling cycle's outcome.
///
/// Created once per pipeline invocation; the only permitted mutation is the
/// `NewCommit` → `Triggered` upgrade within the same pipeline run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckRecord {
    pub id: Uuid,
    pub repo_id: Uuid,
    pub repo_name: String,
    pub branch: String,
    pub remote: String,
    pub checked_at: DateTime<Utc>,
    pub result: CheckResult,
    pub commit_hash: Option<String>,
    pub commit_message: Option<String>,
    pub error_message: Option<String>,
    /// Raw diagnostic trail of the git commands issued during the check.
    pub git_output: Option<String>,
}

impl CheckRecord {
    pub fn new(repo: &RepoWatch, branch: impl Into<String>, result: CheckResult) -> Self {
        Self {
            id: Uuid::new_v4(),
            repo_id: repo.id,
            repo_name: repo.name.clone(),
            branch: branch.into(),
            remote: repo.remote.clone(),
            checked_at: Utc::now(),
            result,
            commit_hash: None,
            commit_message: None,
            error_message: None,
            git_output: None,
        }
    }

    pub fn with_commit(
        mut self,
        hash: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        self.commit_hash = Some(hash.into());
        self.commit_message = Some(message.into());
        self
    }

    pub fn with_error(mut self, error: impl Into<String>) -> Self {
        self.error_message = Some(error.into());
        self
    }

    pub fn with_git_output(mut self, output: impl Into<String>) -> Self {
        self.git_output = Some(output.into());
        self
    }
}
