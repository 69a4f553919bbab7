//! In-memory fakes for the detector and notifier seams.

use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;

use gitwatch::errors::{GitwatchError, Result};
use gitwatch::git::ChangeDetector;
use gitwatch::model::{BuildRun, RepoWatch};
use gitwatch::notify::Notifier;
use gitwatch::types::{BoxFuture, BuildStatus};

/// A scripted change detector.
///
/// Tests mutate the public fields to shape what the "remote" looks like;
/// `pull` copies the remote hash onto the local head, like a real pull
/// would.
#[derive(Debug)]
pub struct FakeDetector {
    pub remote_hash: Mutex<String>,
    pub head_hash: Mutex<String>,
    pub message: Mutex<String>,
    pub latest_tag: Mutex<Option<String>>,
    pub recent: Mutex<String>,
    pub fail_fetch: AtomicBool,
    pub fail_pull: AtomicBool,
    pub fail_recent: AtomicBool,
    pub fetch_calls: AtomicUsize,
    pub pull_calls: AtomicUsize,
    pub recent_calls: AtomicUsize,
}

impl Default for FakeDetector {
    fn default() -> Self {
        Self {
            remote_hash: Mutex::new("abc123".to_string()),
            head_hash: Mutex::new("abc123".to_string()),
            message: Mutex::new("initial commit".to_string()),
            latest_tag: Mutex::new(None),
            recent: Mutex::new("abc123 initial commit".to_string()),
            fail_fetch: AtomicBool::new(false),
            fail_pull: AtomicBool::new(false),
            fail_recent: AtomicBool::new(false),
            fetch_calls: AtomicUsize::new(0),
            pull_calls: AtomicUsize::new(0),
            recent_calls: AtomicUsize::new(0),
        }
    }
}

impl FakeDetector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Move the remote head to a new commit.
    pub fn push_commit(&self, hash: &str, message: &str) {
        *self.remote_hash.lock().unwrap() = hash.to_string();
        *self.message.lock().unwrap() = message.to_string();
    }

    /// Publish a new tag on the remote.
    pub fn push_tag(&self, tag: &str) {
        *self.latest_tag.lock().unwrap() = Some(tag.to_string());
    }

    pub fn pull_count(&self) -> usize {
        self.pull_calls.load(Ordering::SeqCst)
    }

    pub fn recent_count(&self) -> usize {
        self.recent_calls.load(Ordering::SeqCst)
    }
}

impl ChangeDetector for FakeDetector {
    fn fetch<'a>(&'a self, _path: &'a Path, _remote: &'a str) -> BoxFuture<'a, Result<()>> {
        Box::pin(async move {
            self.fetch_calls.fetch_add(1, Ordering::SeqCst);
            if self.fail_fetch.load(Ordering::SeqCst) {
                return Err(GitwatchError::git("fetch", "simulated fetch failure"));
            }
            Ok(())
        })
    }

    fn pull<'a>(
        &'a self,
        _path: &'a Path,
        _remote: &'a str,
        _branch: &'a str,
    ) -> BoxFuture<'a, Result<()>> {
        Box::pin(async move {
            self.pull_calls.fetch_add(1, Ordering::SeqCst);
            if self.fail_pull.load(Ordering::SeqCst) {
                return Err(GitwatchError::git("pull", "simulated pull failure"));
            }
            let remote = self.remote_hash.lock().unwrap().clone();
            *self.head_hash.lock().unwrap() = remote;
            Ok(())
        })
    }

    fn latest_remote_hash<'a>(
        &'a self,
        _path: &'a Path,
        _branch: &'a str,
        _remote: &'a str,
    ) -> BoxFuture<'a, Result<String>> {
        Box::pin(async move { Ok(self.remote_hash.lock().unwrap().clone()) })
    }

    fn local_head<'a>(&'a self, _path: &'a Path) -> BoxFuture<'a, Result<String>> {
        Box::pin(async move { Ok(self.head_hash.lock().unwrap().clone()) })
    }

    fn commit_message<'a>(
        &'a self,
        _path: &'a Path,
        _hash: &'a str,
    ) -> BoxFuture<'a, Result<String>> {
        Box::pin(async move { Ok(self.message.lock().unwrap().clone()) })
    }

    fn commit_author<'a>(
        &'a self,
        _path: &'a Path,
        _hash: &'a str,
    ) -> BoxFuture<'a, Result<String>> {
        Box::pin(async move { Ok("Fake Author".to_string()) })
    }

    fn current_branch<'a>(&'a self, _path: &'a Path) -> BoxFuture<'a, Result<String>> {
        Box::pin(async move { Ok("main".to_string()) })
    }

    fn remote_branches<'a>(
        &'a self,
        _path: &'a Path,
        _remote: &'a str,
    ) -> BoxFuture<'a, Result<Vec<String>>> {
        Box::pin(async move { Ok(vec!["main".to_string()]) })
    }

    fn is_valid_repository<'a>(&'a self, _path: &'a Path) -> BoxFuture<'a, bool> {
        Box::pin(async move { true })
    }

    fn fetch_tags<'a>(&'a self, _path: &'a Path, _remote: &'a str) -> BoxFuture<'a, Result<()>> {
        Box::pin(async move {
            self.fetch_calls.fetch_add(1, Ordering::SeqCst);
            if self.fail_fetch.load(Ordering::SeqCst) {
                return Err(GitwatchError::git("fetch --tags", "simulated fetch failure"));
            }
            Ok(())
        })
    }

    fn latest_tag<'a>(&'a self, _path: &'a Path) -> BoxFuture<'a, Result<Option<String>>> {
        Box::pin(async move { Ok(self.latest_tag.lock().unwrap().clone()) })
    }

    fn recent_commits<'a>(
        &'a self,
        _path: &'a Path,
        _count: usize,
    ) -> BoxFuture<'a, Result<String>> {
        Box::pin(async move {
            self.recent_calls.fetch_add(1, Ordering::SeqCst);
            if self.fail_recent.load(Ordering::SeqCst) {
                return Err(GitwatchError::git("log", "simulated log failure"));
            }
            Ok(self.recent.lock().unwrap().clone())
        })
    }

    fn head_commit_summary<'a>(
        &'a self,
        _path: &'a Path,
    ) -> BoxFuture<'a, Result<(String, String)>> {
        Box::pin(async move {
            Ok((
                self.head_hash.lock().unwrap().clone(),
                self.message.lock().unwrap().clone(),
            ))
        })
    }
}

/// One observed notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NotifyEvent {
    NewCommit { repo: String, hash: String },
    TriggerStart { repo: String, trigger: String },
    BuildResult { repo: String, status: BuildStatus },
    CheckError { repo: String },
    Recovered { repo: String },
}

/// Notifier that records every dispatch for assertions.
#[derive(Debug, Default)]
pub struct RecordingNotifier {
    events: Mutex<Vec<NotifyEvent>>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<NotifyEvent> {
        self.events.lock().unwrap().clone()
    }

    pub fn count(&self, pred: impl Fn(&NotifyEvent) -> bool) -> usize {
        self.events.lock().unwrap().iter().filter(|e| pred(e)).count()
    }

    fn push(&self, event: NotifyEvent) {
        self.events.lock().unwrap().push(event);
    }
}

impl Notifier for RecordingNotifier {
    fn notify_new_commit<'a>(
        &'a self,
        repo: &'a RepoWatch,
        commit_hash: &'a str,
        _commit_message: &'a str,
    ) -> BoxFuture<'a, ()> {
        Box::pin(async move {
            self.push(NotifyEvent::NewCommit {
                repo: repo.name.clone(),
                hash: commit_hash.to_string(),
            });
        })
    }

    fn notify_trigger_start<'a>(
        &'a self,
        repo: &'a RepoWatch,
        trigger_name: &'a str,
        _commit_hash: &'a str,
        _commit_message: &'a str,
    ) -> BoxFuture<'a, ()> {
        Box::pin(async move {
            self.push(NotifyEvent::TriggerStart {
                repo: repo.name.clone(),
                trigger: trigger_name.to_string(),
            });
        })
    }

    fn notify_build_result<'a>(&'a self, build: &'a BuildRun) -> BoxFuture<'a, ()> {
        Box::pin(async move {
            self.push(NotifyEvent::BuildResult {
                repo: build.repo_name.clone(),
                status: build.status,
            });
        })
    }

    fn notify_check_error<'a>(
        &'a self,
        repo: &'a RepoWatch,
        _error: &'a str,
    ) -> BoxFuture<'a, ()> {
        Box::pin(async move {
            self.push(NotifyEvent::CheckError {
                repo: repo.name.clone(),
            });
        })
    }

    fn notify_recovered<'a>(&'a self, repo: &'a RepoWatch) -> BoxFuture<'a, ()> {
        Box::pin(async move {
            self.push(NotifyEvent::Recovered {
                repo: repo.name.clone(),
            });
        })
    }
}
