// src/model/repo.rs

use std::path::PathBuf;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::model::trigger::TriggerRule;

/// A monitored git working copy plus its polling configuration.
///
/// The watermarks (`last_commit_hash`, `last_known_tag`) and `last_error` are
/// mutated by the check pipeline; everything else is fixed at load time.
/// Transient runtime fields (current status, in-flight check guard, error
/// latch) deliberately do NOT live here; they are owned by the coordinator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RepoWatch {
    pub id: Uuid,
    pub name: String,
    pub local_path: PathBuf,
    pub remote: String,
    pub branch: String,
    pub interval: Duration,
    pub enabled: bool,
    /// Watch for new tags instead of new commits on `branch`.
    pub watch_tags: bool,
    /// Last commit hash a successful check (including pull) observed.
    pub last_commit_hash: Option<String>,
    /// Last tag a successful tag check observed.
    pub last_known_tag: Option<String>,
    pub last_error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub triggers: Vec<TriggerRule>,
}

impl RepoWatch {
    pub fn new(name: impl Into<String>, local_path: impl Into<PathBuf>) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            local_path: local_path.into(),
            remote: "origin".to_string(),
            branch: "main".to_string(),
            interval: Duration::from_secs(300),
            enabled: true,
            watch_tags: false,
            last_commit_hash: None,
            last_known_tag: None,
            last_error: None,
            created_at: Utc::now(),
            triggers: Vec::new(),
        }
    }

}
