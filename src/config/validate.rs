// src/config/validate.rs

//! Semantic validation of the raw config.

use std::collections::HashSet;

use crate::config::model::RawConfigFile;
use crate::errors::{GitwatchError, Result};

/// Validate a raw config file.
///
/// Checks:
/// - at least one repository is configured
/// - repository path, remote and branch are non-empty
/// - the polling interval is greater than zero
/// - trigger names and commands are non-empty
/// - trigger names are unique within a repository
pub fn validate(raw: &RawConfigFile) -> Result<()> {
    if raw.repo.is_empty() {
        return Err(GitwatchError::Config(
            "no repositories configured (expected at least one [repo.<name>] section)"
                .to_string(),
        ));
    }

    for (name, repo) in raw.repo.iter() {
        if name.trim().is_empty() {
            return Err(GitwatchError::Config(
                "repository name must not be empty".to_string(),
            ));
        }
        if repo.path.trim().is_empty() {
            return Err(GitwatchError::Config(format!(
                "repository '{name}': path must not be empty"
            )));
        }
        if repo.remote.trim().is_empty() {
            return Err(GitwatchError::Config(format!(
                "repository '{name}': remote must not be empty"
            )));
        }
        if repo.branch.trim().is_empty() {
            return Err(GitwatchError::Config(format!(
                "repository '{name}': branch must not be empty"
            )));
        }
        if repo.interval_secs == 0 {
            return Err(GitwatchError::Config(format!(
                "repository '{name}': interval_secs must be greater than zero"
            )));
        }

        let mut seen = HashSet::new();
        for trigger in &repo.trigger {
            if trigger.name.trim().is_empty() {
                return Err(GitwatchError::Config(format!(
                    "repository '{name}': trigger name must not be empty"
                )));
            }
            if trigger.command.trim().is_empty() {
                return Err(GitwatchError::Config(format!(
                    "repository '{name}': trigger '{}' has an empty command",
                    trigger.name
                )));
            }
            if !seen.insert(trigger.name.as_str()) {
                return Err(GitwatchError::Config(format!(
                    "repository '{name}': duplicate trigger name '{}'",
                    trigger.name
                )));
            }
        }
    }

    Ok(())
}
