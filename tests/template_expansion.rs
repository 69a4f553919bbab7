// tests/template_expansion.rs

use std::sync::atomic::Ordering;
use std::sync::Arc;

use gitwatch::git::ChangeDetector;
use gitwatch::trigger::TemplateEngine;
use gitwatch_test_utils::builders::RepoWatchBuilder;
use gitwatch_test_utils::fakes::FakeDetector;
use gitwatch_test_utils::{init_tracing, with_timeout};

fn engine() -> (TemplateEngine, Arc<FakeDetector>) {
    let detector = Arc::new(FakeDetector::new());
    let dyn_detector: Arc<dyn ChangeDetector> = detector.clone();
    (TemplateEngine::new(dyn_detector), detector)
}

#[tokio::test]
async fn expands_repo_name_and_short_hash() {
    init_tracing();
    let (engine, _) = engine();
    let repo = RepoWatchBuilder::new("demo", "/srv/demo").build();

    let out = with_timeout(engine.expand(
        "echo {{repo_name}} {{commit_hash}}",
        &repo,
        "0123456789abcdef",
        "x",
    ))
    .await;

    assert_eq!(out, "echo demo 0123456");
}

#[tokio::test]
async fn full_hash_branch_message_and_path_tokens() {
    init_tracing();
    let (engine, _) = engine();
    let repo = RepoWatchBuilder::new("demo", "/srv/demo").branch("release").build();

    let out = with_timeout(engine.expand(
        "{{commit_hash_full}}|{{branch}}|{{commit_message}}|{{repo_path}}",
        &repo,
        "0123456789abcdef",
        "fix things",
    ))
    .await;

    assert_eq!(out, "0123456789abcdef|release|fix things|/srv/demo");
}

#[tokio::test]
async fn template_without_tokens_is_returned_untouched_without_lookups() {
    init_tracing();
    let (engine, detector) = engine();
    let repo = RepoWatchBuilder::new("demo", "/srv/demo").build();

    let out = with_timeout(engine.expand("make build", &repo, "abc", "msg")).await;

    assert_eq!(out, "make build");
    assert_eq!(detector.recent_calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn commit_list_tokens_fetch_recent_summaries() {
    init_tracing();
    let (engine, detector) = engine();
    *detector.recent.lock().unwrap() = "aaa first\nbbb second".to_string();
    let repo = RepoWatchBuilder::new("demo", "/srv/demo").build();

    let out = with_timeout(engine.expand(
        "notify '{{commits_oneline}}'",
        &repo,
        "abc",
        "msg",
    ))
    .await;

    assert_eq!(out, "notify 'aaa first | bbb second'");
    assert!(detector.recent_count() > 0);
}

#[tokio::test]
async fn failing_commit_lookup_substitutes_empty_and_does_not_abort() {
    init_tracing();
    let (engine, detector) = engine();
    detector.fail_recent.store(true, Ordering::SeqCst);
    let repo = RepoWatchBuilder::new("demo", "/srv/demo").build();

    let out = with_timeout(engine.expand(
        "post [{{commits}}] for {{repo_name}}",
        &repo,
        "abc",
        "msg",
    ))
    .await;

    assert_eq!(out, "post [] for demo");
}

#[tokio::test]
async fn unrecognized_tokens_stay_verbatim() {
    init_tracing();
    let (engine, _) = engine();
    let repo = RepoWatchBuilder::new("demo", "/srv/demo").build();

    let out = with_timeout(engine.expand(
        "echo {{mystery_token}} {{repo_name}}",
        &repo,
        "abc",
        "msg",
    ))
    .await;

    assert_eq!(out, "echo {{mystery_token}} demo");
}

#[tokio::test]
async fn date_token_expands_to_iso_date() {
    init_tracing();
    let (engine, _) = engine();
    let repo = RepoWatchBuilder::new("demo", "/srv/demo").build();

    let out = with_timeout(engine.expand("{{date}}", &repo, "abc", "msg")).await;

    // YYYY-MM-DD
    let parts: Vec<&str> = out.split('-').collect();
    assert_eq!(parts.len(), 3, "unexpected date format: {out}");
    assert_eq!(parts[0].len(), 4);
    assert_eq!(parts[1].len(), 2);
    assert_eq!(parts[2].len(), 2);
}
