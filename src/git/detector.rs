// src/git/detector.rs

//! The [`ChangeDetector`] seam and its git-subprocess implementation.
//!
//! The trait is dyn-safe (boxed-future methods) so the coordinator and the
//! template engine can be driven by a fake in tests while production code
//! uses [`GitClient`].
//!
//! `has_new_commits` / `has_new_tags` are provided as default methods built
//! on the primitives, which keeps the freshness invariant (always fetch
//! before comparing) in exactly one place.

use std::path::Path;

use crate::errors::{GitwatchError, Result};
use crate::git::shell::run_git;
use crate::types::BoxFuture;

/// Result of comparing the remote branch head against a known hash.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitProbe {
    pub has_new: bool,
    pub latest_hash: String,
    /// Resolved commit message; empty when nothing new was found.
    pub message: String,
}

/// Result of comparing the latest tag against a known tag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TagProbe {
    pub has_new: bool,
    pub latest_tag: Option<String>,
    /// The tag treated as "new"; empty when nothing new was found.
    pub tag_name: String,
}

/// Remote version-control operations, stateless per call.
pub trait ChangeDetector: Send + Sync {
    fn fetch<'a>(&'a self, path: &'a Path, remote: &'a str) -> BoxFuture<'a, Result<()>>;

    fn pull<'a>(
        &'a self,
        path: &'a Path,
        remote: &'a str,
        branch: &'a str,
    ) -> BoxFuture<'a, Result<()>>;

    fn latest_remote_hash<'a>(
        &'a self,
        path: &'a Path,
        branch: &'a str,
        remote: &'a str,
    ) -> BoxFuture<'a, Result<String>>;

    fn local_head<'a>(&'a self, path: &'a Path) -> BoxFuture<'a, Result<String>>;

    fn commit_message<'a>(
        &'a self,
        path: &'a Path,
        hash: &'a str,
    ) -> BoxFuture<'a, Result<String>>;

    fn commit_author<'a>(
        &'a self,
        path: &'a Path,
        hash: &'a str,
    ) -> BoxFuture<'a, Result<String>>;

    fn current_branch<'a>(&'a self, path: &'a Path) -> BoxFuture<'a, Result<String>>;

    /// Remote branch names with the `<remote>/` prefix stripped, excluding
    /// symbolic HEAD entries.
    fn remote_branches<'a>(
        &'a self,
        path: &'a Path,
        remote: &'a str,
    ) -> BoxFuture<'a, Result<Vec<String>>>;

    fn is_valid_repository<'a>(&'a self, path: &'a Path) -> BoxFuture<'a, bool>;

    fn fetch_tags<'a>(&'a self, path: &'a Path, remote: &'a str) -> BoxFuture<'a, Result<()>>;

    /// Latest tag by semantic-version sort, falling back to creation-date
    /// sort when that yields nothing usable. `None` when no tag exists.
    fn latest_tag<'a>(&'a self, path: &'a Path) -> BoxFuture<'a, Result<Option<String>>>;

    /// Multi-line `<short-hash> <subject>` summaries of the most recent
    /// `count` commits.
    fn recent_commits<'a>(
        &'a self,
        path: &'a Path,
        count: usize,
    ) -> BoxFuture<'a, Result<String>>;

    /// HEAD as `(full hash, subject)`.
    fn head_commit_summary<'a>(
        &'a self,
        path: &'a Path,
    ) -> BoxFuture<'a, Result<(String, String)>>;

    /// The recent-commit summaries pipe-joined onto a single line.
    fn recent_commits_oneline<'a>(
        &'a self,
        path: &'a Path,
        count: usize,
    ) -> BoxFuture<'a, Result<String>> {
        Box::pin(async move {
            let multiline = self.recent_commits(path, count).await?;
            Ok(multiline
                .lines()
                .map(str::trim)
                .filter(|line| !line.is_empty())
                .collect::<Vec<_>>()
                .join(" | "))
        })
    }

    /// Fetch, then compare `since` against the fresh remote head.
    ///
    /// No `since` means the first check for this repository: the head is
    /// reported as new and its message resolved. Otherwise the message is
    /// only resolved when the head moved.
    fn has_new_commits<'a>(
        &'a self,
        path: &'a Path,
        branch: &'a str,
        remote: &'a str,
        since: Option<&'a str>,
    ) -> BoxFuture<'a, Result<CommitProbe>> {
        Box::pin(async move {
            self.fetch(path, remote).await?;
            let latest_hash = self.latest_remote_hash(path, branch, remote).await?;

            let has_new = match since {
                None => true,
                Some(previous) => latest_hash != previous,
            };

            let message = if has_new {
                self.commit_message(path, &latest_hash).await?
            } else {
                String::new()
            };

            Ok(CommitProbe {
                has_new,
                latest_hash,
                message,
            })
        })
    }

    /// Fetch tags, then compare `since` against the fresh latest tag.
    ///
    /// A repository with no tag at all reports nothing new; an absent
    /// `since` follows the same first-check policy as commits.
    fn has_new_tags<'a>(
        &'a self,
        path: &'a Path,
        remote: &'a str,
        since: Option<&'a str>,
    ) -> BoxFuture<'a, Result<TagProbe>> {
        Box::pin(async move {
            self.fetch_tags(path, remote).await?;

            let Some(latest_tag) = self.latest_tag(path).await? else {
                return Ok(TagProbe {
                    has_new: false,
                    latest_tag: None,
                    tag_name: String::new(),
                });
            };

            let has_new = match since {
                None => true,
                Some(previous) => latest_tag != previous,
            };

            Ok(TagProbe {
                has_new,
                tag_name: if has_new {
                    latest_tag.clone()
                } else {
                    String::new()
                },
                latest_tag: Some(latest_tag),
            })
        })
    }
}

/// Production detector running `git` as a subprocess.
#[derive(Debug, Clone, Copy, Default)]
pub struct GitClient;

impl GitClient {
    pub fn new() -> Self {
        Self
    }
}

impl ChangeDetector for GitClient {
    fn fetch<'a>(&'a self, path: &'a Path, remote: &'a str) -> BoxFuture<'a, Result<()>> {
        Box::pin(async move {
            let out = run_git(path, &["fetch", remote]).await?;
            if !out.success() {
                return Err(GitwatchError::git("fetch", out.combined()));
            }
            Ok(())
        })
    }

    fn pull<'a>(
        &'a self,
        path: &'a Path,
        remote: &'a str,
        branch: &'a str,
    ) -> BoxFuture<'a, Result<()>> {
        Box::pin(async move {
            let out = run_git(path, &["pull", remote, branch]).await?;
            if !out.success() {
                return Err(GitwatchError::git("pull", out.combined()));
            }
            Ok(())
        })
    }

    fn latest_remote_hash<'a>(
        &'a self,
        path: &'a Path,
        branch: &'a str,
        remote: &'a str,
    ) -> BoxFuture<'a, Result<String>> {
        Box::pin(async move {
            let refname = format!("{remote}/{branch}");
            let out = run_git(path, &["rev-parse", refname.as_str()]).await?;
            if !out.success() {
                return Err(GitwatchError::InvalidBranch(branch.to_string()));
            }
            Ok(out.trimmed())
        })
    }

    fn local_head<'a>(&'a self, path: &'a Path) -> BoxFuture<'a, Result<String>> {
        Box::pin(async move {
            let out = run_git(path, &["rev-parse", "HEAD"]).await?;
            if !out.success() {
                return Err(GitwatchError::git("rev-parse HEAD", out.combined()));
            }
            Ok(out.trimmed())
        })
    }

    fn commit_message<'a>(
        &'a self,
        path: &'a Path,
        hash: &'a str,
    ) -> BoxFuture<'a, Result<String>> {
        Box::pin(async move {
            let out = run_git(path, &["log", "-1", "--format=%B", hash]).await?;
            if !out.success() {
                return Err(GitwatchError::InvalidCommit(hash.to_string()));
            }
            Ok(out.trimmed())
        })
    }

    fn commit_author<'a>(
        &'a self,
        path: &'a Path,
        hash: &'a str,
    ) -> BoxFuture<'a, Result<String>> {
        Box::pin(async move {
            let out = run_git(path, &["log", "-1", "--format=%an", hash]).await?;
            if !out.success() {
                return Err(GitwatchError::InvalidCommit(hash.to_string()));
            }
            Ok(out.trimmed())
        })
    }

    fn current_branch<'a>(&'a self, path: &'a Path) -> BoxFuture<'a, Result<String>> {
        Box::pin(async move {
            let out = run_git(path, &["branch", "--show-current"]).await?;
            if !out.success() {
                return Err(GitwatchError::NotARepository(path.display().to_string()));
            }
            Ok(out.trimmed())
        })
    }

    fn remote_branches<'a>(
        &'a self,
        path: &'a Path,
        remote: &'a str,
    ) -> BoxFuture<'a, Result<Vec<String>>> {
        Box::pin(async move {
            let pattern = format!("{remote}/*");
            let out = run_git(path, &["branch", "-r", "--list", pattern.as_str()]).await?;
            if !out.success() {
                return Err(GitwatchError::git("branch -r", out.combined()));
            }

            let prefix = format!("{remote}/");
            Ok(out
                .stdout
                .lines()
                .map(str::trim)
                .filter(|line| !line.is_empty() && !line.contains("HEAD"))
                .map(|line| {
                    line.strip_prefix(&prefix)
                        .unwrap_or(line)
                        .to_string()
                })
                .collect())
        })
    }

    fn is_valid_repository<'a>(&'a self, path: &'a Path) -> BoxFuture<'a, bool> {
        Box::pin(async move {
            match run_git(path, &["rev-parse", "--git-dir"]).await {
                Ok(out) => out.success(),
                Err(_) => false,
            }
        })
    }

    fn fetch_tags<'a>(&'a self, path: &'a Path, remote: &'a str) -> BoxFuture<'a, Result<()>> {
        Box::pin(async move {
            let out = run_git(path, &["fetch", "--tags", remote]).await?;
            if !out.success() {
                return Err(GitwatchError::git("fetch --tags", out.combined()));
            }
            Ok(())
        })
    }

    fn latest_tag<'a>(&'a self, path: &'a Path) -> BoxFuture<'a, Result<Option<String>>> {
        Box::pin(async move {
            // Semantic-version sort first, creation-date sort as fallback.
            for sort in ["--sort=-v:refname", "--sort=-creatordate"] {
                let out = run_git(path, &["tag", sort]).await?;
                if !out.success() {
                    continue;
                }
                if let Some(tag) = out.stdout.lines().map(str::trim).find(|l| !l.is_empty()) {
                    return Ok(Some(tag.to_string()));
                }
            }
            Ok(None)
        })
    }

    fn recent_commits<'a>(
        &'a self,
        path: &'a Path,
        count: usize,
    ) -> BoxFuture<'a, Result<String>> {
        Box::pin(async move {
            let limit = format!("-{count}");
            let out = run_git(path, &["log", limit.as_str(), "--format=%h %s"]).await?;
            if !out.success() {
                return Err(GitwatchError::git("log", out.combined()));
            }
            Ok(out.trimmed())
        })
    }

    fn head_commit_summary<'a>(
        &'a self,
        path: &'a Path,
    ) -> BoxFuture<'a, Result<(String, String)>> {
        Box::pin(async move {
            let out = run_git(path, &["log", "-1", "--format=%H|%s"]).await?;
            if !out.success() {
                return Err(GitwatchError::git("log", out.combined()));
            }
            let line = out.trimmed();
            match line.split_once('|') {
                Some((hash, subject)) => Ok((hash.to_string(), subject.to_string())),
                None => Err(GitwatchError::git(
                    "log",
                    format!("unexpected head summary output: {line}"),
                )),
            }
        })
    }
}
