// src/trigger/template.rs

//! Command template expansion.
//!
//! Supported tokens:
//! - `{{commits}}` - recent commits (multi-line)
//! - `{{commits_oneline}}` - recent commits (single line, pipe-separated)
//! - `{{commit_hash}}` - current commit hash (7-char prefix)
//! - `{{commit_hash_full}}` - current commit hash (full)
//! - `{{commit_message}}` - current commit message
//! - `{{branch}}` - configured branch name
//! - `{{repo_name}}` - repository name
//! - `{{repo_path}}` - repository path
//! - `{{date}}` - current date (YYYY-MM-DD)
//! - `{{datetime}}` - current date and time
//!
//! Unrecognized tokens are left verbatim.

use std::sync::Arc;

use chrono::Local;
use tracing::warn;

use crate::git::ChangeDetector;
use crate::model::RepoWatch;

/// How many recent commits the commit-list tokens include.
pub const RECENT_COMMIT_COUNT: usize = 5;

pub struct TemplateEngine {
    detector: Arc<dyn ChangeDetector>,
}

impl TemplateEngine {
    pub fn new(detector: Arc<dyn ChangeDetector>) -> Self {
        Self { detector }
    }

    /// Expand all recognized tokens in `command`.
    ///
    /// Templates without `{{` are returned unchanged without any lookups.
    /// The commit-list tokens need a git round trip; if that fails they are
    /// substituted with empty strings rather than aborting the expansion.
    pub async fn expand(
        &self,
        command: &str,
        repo: &RepoWatch,
        commit_hash: &str,
        commit_message: &str,
    ) -> String {
        if !command.contains("{{") {
            return command.to_string();
        }

        let needs_commits =
            command.contains("{{commits}}") || command.contains("{{commits_oneline}}");

        let (commits_multiline, commits_oneline) = if needs_commits {
            self.recent_commit_summaries(repo).await
        } else {
            (String::new(), String::new())
        };

        let short_hash: String = commit_hash.chars().take(7).collect();
        let now = Local::now();

        command
            .replace("{{commits}}", &commits_multiline)
            .replace("{{commits_oneline}}", &commits_oneline)
            .replace("{{commit_hash_full}}", commit_hash)
            .replace("{{commit_hash}}", &short_hash)
            .replace("{{commit_message}}", commit_message)
            .replace("{{branch}}", &repo.branch)
            .replace("{{repo_name}}", &repo.name)
            .replace("{{repo_path}}", &repo.local_path.display().to_string())
            .replace("{{date}}", &now.format("%Y-%m-%d").to_string())
            .replace("{{datetime}}", &now.format("%Y-%m-%d %H:%M:%S").to_string())
    }

    async fn recent_commit_summaries(&self, repo: &RepoWatch) -> (String, String) {
        let path = repo.local_path.as_path();

        let multiline = match self.detector.recent_commits(path, RECENT_COMMIT_COUNT).await {
            Ok(v) => v,
            Err(err) => {
                warn!(
                    repo = %repo.name,
                    error = %err,
                    "failed to fetch recent commits for template"
                );
                String::new()
            }
        };

        let oneline = match self
            .detector
            .recent_commits_oneline(path, RECENT_COMMIT_COUNT)
            .await
        {
            Ok(v) => v,
            Err(err) => {
                warn!(
                    repo = %repo.name,
                    error = %err,
                    "failed to fetch recent commit summary for template"
                );
                String::new()
            }
        };

        (multiline, oneline)
    }
}
