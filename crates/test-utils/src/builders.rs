#![allow(dead_code)]

use std::time::Duration;

use gitwatch::model::{RepoWatch, TriggerRule};

/// Builder for `RepoWatch` to simplify test setup.
pub struct RepoWatchBuilder {
    watch: RepoWatch,
}

impl RepoWatchBuilder {
    pub fn new(name: &str, path: &str) -> Self {
        Self {
            watch: RepoWatch::new(name, path),
        }
    }

    pub fn branch(mut self, branch: &str) -> Self {
        self.watch.branch = branch.to_string();
        self
    }

    pub fn remote(mut self, remote: &str) -> Self {
        self.watch.remote = remote.to_string();
        self
    }

    pub fn interval(mut self, interval: Duration) -> Self {
        self.watch.interval = interval;
        self
    }

    pub fn disabled(mut self) -> Self {
        self.watch.enabled = false;
        self
    }

    pub fn watch_tags(mut self) -> Self {
        self.watch.watch_tags = true;
        self
    }

    pub fn last_commit_hash(mut self, hash: &str) -> Self {
        self.watch.last_commit_hash = Some(hash.to_string());
        self
    }

    pub fn last_known_tag(mut self, tag: &str) -> Self {
        self.watch.last_known_tag = Some(tag.to_string());
        self
    }

    /// Add a trigger built from a closure over a pre-wired rule.
    pub fn trigger(mut self, build: impl FnOnce(TriggerRuleBuilder) -> TriggerRuleBuilder) -> Self {
        let builder = TriggerRuleBuilder::new("trigger", "echo triggered", self.watch.id);
        self.watch.triggers.push(build(builder).build());
        self
    }

    pub fn build(self) -> RepoWatch {
        self.watch
    }
}

/// Builder for `TriggerRule`.
pub struct TriggerRuleBuilder {
    rule: TriggerRule,
}

impl TriggerRuleBuilder {
    pub fn new(name: &str, command: &str, repo_id: uuid::Uuid) -> Self {
        Self {
            rule: TriggerRule::new(name, command, repo_id),
        }
    }

    pub fn name(mut self, name: &str) -> Self {
        self.rule.name = name.to_string();
        self
    }

    pub fn command(mut self, command: &str) -> Self {
        self.rule.command = command.to_string();
        self
    }

    pub fn flag(mut self, flag: &str) -> Self {
        self.rule.commit_flag = Some(flag.to_string());
        self
    }

    pub fn priority(mut self, priority: i32) -> Self {
        self.rule.priority = priority;
        self
    }

    pub fn disabled(mut self) -> Self {
        self.rule.enabled = false;
        self
    }

    pub fn working_directory(mut self, dir: &str) -> Self {
        self.rule.working_directory = Some(dir.to_string());
        self
    }

    pub fn build(self) -> TriggerRule {
        self.rule
    }
}
