// src/model/trigger.rs

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A named, priority-ordered, pattern-matched command bound to a repository.
///
/// Immutable during a single check pipeline run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TriggerRule {
    pub id: Uuid,
    pub name: String,
    /// Comma-separated substrings; `None` or empty matches every commit.
    pub commit_flag: Option<String>,
    /// Command template, expanded by the template engine before execution.
    pub command: String,
    /// Override working directory; the repository path is used when `None`.
    pub working_directory: Option<String>,
    pub enabled: bool,
    /// Higher priority rules are checked first.
    pub priority: i32,
    pub repo_id: Uuid,
}

impl TriggerRule {
    pub fn new(name: impl Into<String>, command: impl Into<String>, repo_id: Uuid) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            commit_flag: None,
            command: command.into(),
            working_directory: None,
            enabled: true,
            priority: 0,
            repo_id,
        }
    }

    /// Check whether this rule matches the given commit message (or tag name).
    ///
    /// - Disabled rules never match.
    /// - An absent or empty flag matches unconditionally.
    /// - Otherwise the flag is split on commas, each part trimmed, and the
    ///   rule matches if the message contains ANY part, case-insensitively.
    pub fn matches(&self, commit_message: &str) -> bool {
        if !self.enabled {
            return false;
        }

        let flag = match &self.commit_flag {
            Some(f) if !f.trim().is_empty() => f,
            _ => return true,
        };

        let message = commit_message.to_lowercase();
        flag.split(',')
            .map(str::trim)
            .filter(|part| !part.is_empty())
            .any(|part| message.contains(&part.to_lowercase()))
    }

    pub fn display_flag(&self) -> &str {
        match &self.commit_flag {
            Some(f) if !f.is_empty() => f,
            _ => "(any commit)",
        }
    }
}
