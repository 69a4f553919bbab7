// src/config/model.rs

use std::collections::BTreeMap;
use std::time::Duration;

use serde::Deserialize;

use crate::errors::GitwatchError;
use crate::model::{RepoWatch, TriggerRule};

/// Top-level configuration as read from a TOML file.
///
/// ```toml
/// [config]
/// build_timeout_secs = 3600
///
/// [repo.backend]
/// path = "/srv/checkouts/backend"
/// branch = "main"
/// interval_secs = 300
///
/// [[repo.backend.trigger]]
/// name = "deploy"
/// flag = "--deploy,--prod"
/// command = "make deploy REV={{commit_hash}}"
/// ```
///
/// All sections except `[repo.<name>]` are optional and have defaults.
#[derive(Debug, Clone, Deserialize)]
pub struct RawConfigFile {
    /// Global behaviour config from `[config]`.
    #[serde(default)]
    pub config: ConfigSection,

    /// All watched repositories from `[repo.<name>]`.
    ///
    /// Keys are the repository names.
    #[serde(default)]
    pub repo: BTreeMap<String, RepoConfig>,
}

/// `[config]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct ConfigSection {
    /// Hard timeout for triggered build commands, in seconds.
    #[serde(default = "default_build_timeout_secs")]
    pub build_timeout_secs: u64,

    /// Cadence for flushing streamed build output, in milliseconds.
    #[serde(default = "default_flush_interval_ms")]
    pub flush_interval_ms: u64,

    /// How long a terminal repository status is held before relaxing back to
    /// idle, in milliseconds.
    #[serde(default = "default_settle_delay_ms")]
    pub settle_delay_ms: u64,

    /// Immediate pull re-attempts within one check. With 0 (the default) a
    /// failed pull is only retried on the next scheduled tick.
    #[serde(default)]
    pub pull_retries: u32,
}

fn default_build_timeout_secs() -> u64 {
    3600
}

fn default_flush_interval_ms() -> u64 {
    100
}

fn default_settle_delay_ms() -> u64 {
    1000
}

impl Default for ConfigSection {
    fn default() -> Self {
        Self {
            build_timeout_secs: default_build_timeout_secs(),
            flush_interval_ms: default_flush_interval_ms(),
            settle_delay_ms: default_settle_delay_ms(),
            pull_retries: 0,
        }
    }
}

impl ConfigSection {
    pub fn build_timeout(&self) -> Duration {
        Duration::from_secs(self.build_timeout_secs)
    }

    pub fn flush_interval(&self) -> Duration {
        Duration::from_millis(self.flush_interval_ms)
    }

    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_delay_ms)
    }
}

/// `[repo.<name>]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct RepoConfig {
    /// Local working-copy path.
    pub path: String,

    #[serde(default = "default_remote")]
    pub remote: String,

    #[serde(default = "default_branch")]
    pub branch: String,

    /// Polling interval in seconds; must be greater than zero.
    #[serde(default = "default_interval_secs")]
    pub interval_secs: u64,

    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Watch for new tags instead of new commits on `branch`.
    #[serde(default)]
    pub watch_tags: bool,

    /// Trigger rules from `[[repo.<name>.trigger]]`.
    #[serde(default)]
    pub trigger: Vec<TriggerConfig>,
}

fn default_remote() -> String {
    "origin".to_string()
}

fn default_branch() -> String {
    "main".to_string()
}

fn default_interval_secs() -> u64 {
    300
}

fn default_true() -> bool {
    true
}

/// `[[repo.<name>.trigger]]` entry.
#[derive(Debug, Clone, Deserialize)]
pub struct TriggerConfig {
    pub name: String,

    /// Comma-separated substrings; omit to match every commit.
    #[serde(default)]
    pub flag: Option<String>,

    /// Command template.
    pub command: String,

    /// Override working directory; the repo path is used when omitted.
    #[serde(default)]
    pub working_directory: Option<String>,

    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Higher priority rules are checked first.
    #[serde(default)]
    pub priority: i32,
}

/// Validated configuration.
///
/// Construct via `ConfigFile::try_from(raw)`, which runs the semantic checks
/// in [`crate::config::validate`].
#[derive(Debug, Clone)]
pub struct ConfigFile {
    pub config: ConfigSection,
    pub repo: BTreeMap<String, RepoConfig>,
}

impl TryFrom<RawConfigFile> for ConfigFile {
    type Error = GitwatchError;

    fn try_from(raw: RawConfigFile) -> Result<Self, Self::Error> {
        crate::config::validate::validate(&raw)?;
        Ok(Self {
            config: raw.config,
            repo: raw.repo,
        })
    }
}

impl ConfigFile {
    /// Materialize the configured repositories as domain records with fresh
    /// ids. Trigger rules keep their file order.
    pub fn to_watches(&self) -> Vec<RepoWatch> {
        self.repo
            .iter()
            .map(|(name, rc)| {
                let mut watch = RepoWatch::new(name.clone(), rc.path.clone());
                watch.remote = rc.remote.clone();
                watch.branch = rc.branch.clone();
                watch.interval = Duration::from_secs(rc.interval_secs);
                watch.enabled = rc.enabled;
                watch.watch_tags = rc.watch_tags;
                watch.triggers = rc
                    .trigger
                    .iter()
                    .map(|tc| {
                        let mut rule =
                            TriggerRule::new(tc.name.clone(), tc.command.clone(), watch.id);
                        rule.commit_flag = tc.flag.clone();
                        rule.working_directory = tc.working_directory.clone();
                        rule.enabled = tc.enabled;
                        rule.priority = tc.priority;
                        rule
                    })
                    .collect();
                watch
            })
            .collect()
    }
}
