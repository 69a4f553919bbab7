// tests/git_detector.rs

//! End-to-end detector tests against real local git repositories.
//!
//! Skipped (with a note on stderr) when no `git` binary is available.

use std::path::Path;
use std::process::Command;

use gitwatch::errors::GitwatchError;
use gitwatch::git::{ChangeDetector, GitClient};
use gitwatch_test_utils::{init_tracing, with_timeout};
use tempfile::TempDir;

fn git_available() -> bool {
    Command::new("git")
        .arg("--version")
        .output()
        .map(|o| o.status.success())
        .unwrap_or(false)
}

fn git(dir: &Path, args: &[&str]) {
    let output = Command::new("git")
        .args(args)
        .current_dir(dir)
        .output()
        .expect("git invocation");
    assert!(
        output.status.success(),
        "git {args:?} failed: {}",
        String::from_utf8_lossy(&output.stderr)
    );
}

/// Create an upstream repo with one commit and a clone of it.
///
/// Returns (root holding both, upstream path, clone path).
fn fixture() -> (TempDir, std::path::PathBuf, std::path::PathBuf) {
    let root = TempDir::new().expect("temp dir");
    let upstream = root.path().join("upstream");
    let clone = root.path().join("clone");
    std::fs::create_dir(&upstream).expect("mkdir upstream");

    git(&upstream, &["init"]);
    git(&upstream, &["config", "user.email", "tester@example.com"]);
    git(&upstream, &["config", "user.name", "Tester"]);
    git(&upstream, &["config", "commit.gpgsign", "false"]);
    std::fs::write(upstream.join("README"), "one\n").expect("write file");
    git(&upstream, &["add", "README"]);
    git(&upstream, &["commit", "-m", "first commit"]);
    git(&upstream, &["branch", "-M", "main"]);

    git(
        root.path(),
        &["clone", upstream.to_str().unwrap(), clone.to_str().unwrap()],
    );
    git(&clone, &["config", "user.email", "tester@example.com"]);
    git(&clone, &["config", "user.name", "Tester"]);

    (root, upstream, clone)
}

fn commit_upstream(upstream: &Path, file: &str, message: &str) {
    std::fs::write(upstream.join(file), message).expect("write file");
    git(upstream, &["add", file]);
    git(upstream, &["commit", "-m", message]);
}

#[tokio::test]
async fn first_check_then_idempotent_then_new_commit() {
    init_tracing();
    if !git_available() {
        eprintln!("git not available; skipping");
        return;
    }

    let (_root, upstream, clone) = fixture();
    let detector = GitClient::new();

    // First check: no known hash, remote head is new.
    let probe = with_timeout(detector.has_new_commits(&clone, "main", "origin", None))
        .await
        .expect("probe");
    assert!(probe.has_new);
    assert!(probe.message.contains("first commit"));
    let first_hash = probe.latest_hash.clone();

    // Unchanged remote with the known hash: nothing new.
    let probe = with_timeout(detector.has_new_commits(
        &clone,
        "main",
        "origin",
        Some(first_hash.as_str()),
    ))
    .await
    .expect("probe");
    assert!(!probe.has_new);
    assert_eq!(probe.latest_hash, first_hash);
    assert!(probe.message.is_empty());

    // A new upstream commit is detected and pull catches the clone up.
    commit_upstream(&upstream, "CHANGES", "second commit --deploy");
    let probe = with_timeout(detector.has_new_commits(
        &clone,
        "main",
        "origin",
        Some(first_hash.as_str()),
    ))
    .await
    .expect("probe");
    assert!(probe.has_new);
    assert_ne!(probe.latest_hash, first_hash);
    assert!(probe.message.contains("second commit"));

    let head_before = with_timeout(detector.local_head(&clone)).await.expect("head");
    assert_eq!(head_before, first_hash);

    with_timeout(detector.pull(&clone, "origin", "main"))
        .await
        .expect("pull");
    let head_after = with_timeout(detector.local_head(&clone)).await.expect("head");
    assert_eq!(head_after, probe.latest_hash);
}

#[tokio::test]
async fn repository_introspection_queries() {
    init_tracing();
    if !git_available() {
        eprintln!("git not available; skipping");
        return;
    }

    let (_root, _upstream, clone) = fixture();
    let detector = GitClient::new();

    assert!(with_timeout(detector.is_valid_repository(&clone)).await);

    let branch = with_timeout(detector.current_branch(&clone)).await.expect("branch");
    assert_eq!(branch, "main");

    let branches = with_timeout(detector.remote_branches(&clone, "origin"))
        .await
        .expect("branches");
    assert!(branches.contains(&"main".to_string()));
    assert!(branches.iter().all(|b| !b.contains("HEAD")));

    let head = with_timeout(detector.local_head(&clone)).await.expect("head");
    let author = with_timeout(detector.commit_author(&clone, &head))
        .await
        .expect("author");
    assert_eq!(author, "Tester");

    let (hash, subject) = with_timeout(detector.head_commit_summary(&clone))
        .await
        .expect("summary");
    assert_eq!(hash, head);
    assert!(subject.contains("first commit"));

    let recent = with_timeout(detector.recent_commits(&clone, 5))
        .await
        .expect("recent");
    assert!(recent.contains("first commit"));
    let oneline = with_timeout(detector.recent_commits_oneline(&clone, 5))
        .await
        .expect("recent oneline");
    assert!(!oneline.contains('\n'));

    // Not a repository.
    let empty = TempDir::new().expect("temp dir");
    assert!(!with_timeout(detector.is_valid_repository(empty.path())).await);
}

#[tokio::test]
async fn tag_detection_with_first_check_policy() {
    init_tracing();
    if !git_available() {
        eprintln!("git not available; skipping");
        return;
    }

    let (_root, upstream, clone) = fixture();
    let detector = GitClient::new();

    // No tags anywhere: nothing new, even on the first check.
    let probe = with_timeout(detector.has_new_tags(&clone, "origin", None))
        .await
        .expect("probe");
    assert!(!probe.has_new);
    assert!(probe.latest_tag.is_none());

    // A tag appears upstream.
    git(&upstream, &["tag", "v1.0.0"]);
    let probe = with_timeout(detector.has_new_tags(&clone, "origin", None))
        .await
        .expect("probe");
    assert!(probe.has_new);
    assert_eq!(probe.latest_tag.as_deref(), Some("v1.0.0"));
    assert_eq!(probe.tag_name, "v1.0.0");

    // Known tag: nothing new.
    let probe = with_timeout(detector.has_new_tags(&clone, "origin", Some("v1.0.0")))
        .await
        .expect("probe");
    assert!(!probe.has_new);

    // A higher version wins the semantic sort.
    git(&upstream, &["tag", "v1.10.0"]);
    let probe = with_timeout(detector.has_new_tags(&clone, "origin", Some("v1.0.0")))
        .await
        .expect("probe");
    assert!(probe.has_new);
    assert_eq!(probe.tag_name, "v1.10.0");
}

#[tokio::test]
async fn failures_carry_useful_errors() {
    init_tracing();
    if !git_available() {
        eprintln!("git not available; skipping");
        return;
    }

    let (_root, _upstream, clone) = fixture();
    let detector = GitClient::new();

    match with_timeout(detector.latest_remote_hash(&clone, "does-not-exist", "origin")).await {
        Err(GitwatchError::InvalidBranch(branch)) => assert_eq!(branch, "does-not-exist"),
        other => panic!("expected invalid branch error, got {other:?}"),
    }

    match with_timeout(detector.fetch(&clone, "no-such-remote")).await {
        Err(GitwatchError::GitCommand { op, output }) => {
            assert_eq!(op, "fetch");
            assert!(!output.is_empty());
        }
        other => panic!("expected git command error, got {other:?}"),
    }
}
