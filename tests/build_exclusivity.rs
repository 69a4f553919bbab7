// tests/build_exclusivity.rs

//! Global single-build invariant and cancellation behaviour, exercised
//! through the coordinator with real `sh` processes.

use std::time::{Duration, Instant};

use gitwatch::build::ExecuteOutcome;
use gitwatch::model::CANCELLED_EXIT_CODE;
use gitwatch::types::BuildStatus;
use gitwatch_test_utils::builders::RepoWatchBuilder;
use gitwatch_test_utils::harness::TestHarness;
use gitwatch_test_utils::{init_tracing, with_timeout};

fn temp_path() -> String {
    std::env::temp_dir().display().to_string()
}

#[tokio::test]
async fn concurrent_executes_run_exactly_one_build() {
    init_tracing();
    let watch = RepoWatchBuilder::new("demo", &temp_path())
        .trigger(|t| t.name("slow").command("sleep 1"))
        .build();
    let harness = TestHarness::new(vec![watch]);
    let repo_id = harness.sole_repo_id();
    let c = &harness.coordinator;

    let (a, b) = tokio::join!(
        c.execute_trigger(repo_id, "slow", "aaa111", "msg"),
        c.execute_trigger(repo_id, "slow", "bbb222", "msg"),
    );

    let outcomes = [a.expect("first execute"), b.expect("second execute")];
    let finished = outcomes
        .iter()
        .filter(|o| matches!(o, ExecuteOutcome::Finished(_)))
        .count();
    let skipped = outcomes
        .iter()
        .filter(|o| matches!(o, ExecuteOutcome::Skipped))
        .count();

    assert_eq!(finished, 1, "exactly one build must run");
    assert_eq!(skipped, 1, "the loser must be skipped, not queued");
    assert_eq!(harness.store.build_count(), 1);
}

#[tokio::test]
async fn skipped_execute_returns_immediately() {
    init_tracing();
    let watch = RepoWatchBuilder::new("demo", &temp_path())
        .trigger(|t| t.name("slow").command("sleep 2"))
        .build();
    let harness = TestHarness::new(vec![watch]);
    let repo_id = harness.sole_repo_id();

    let c = harness.coordinator.clone();
    let running = tokio::spawn(async move { c.execute_trigger(repo_id, "slow", "aaa", "m").await });

    // Wait for the build to take the slot.
    while !harness.slot.is_held() {
        tokio::time::sleep(Duration::from_millis(10)).await;
    }

    let started = Instant::now();
    let second = harness
        .coordinator
        .execute_trigger(repo_id, "slow", "bbb", "m")
        .await
        .expect("second execute");

    assert!(matches!(second, ExecuteOutcome::Skipped));
    assert!(
        started.elapsed() < Duration::from_millis(500),
        "skip must not wait for the running build"
    );

    harness.coordinator.cancel_current_build().await;
    let _ = with_timeout(async { running.await }).await;
}

#[tokio::test]
async fn cancel_frees_the_slot_for_the_next_build() {
    init_tracing();
    let watch = RepoWatchBuilder::new("demo", &temp_path())
        .trigger(|t| t.name("slow").command("sleep 30"))
        .trigger(|t| t.name("quick").command("echo ok"))
        .build();
    let harness = TestHarness::new(vec![watch]);
    let repo_id = harness.sole_repo_id();

    let c = harness.coordinator.clone();
    let running = tokio::spawn(async move { c.execute_trigger(repo_id, "slow", "aaa", "m").await });

    while !harness.slot.is_held() {
        tokio::time::sleep(Duration::from_millis(10)).await;
    }

    let cancelled = harness
        .coordinator
        .cancel_current_build()
        .await
        .expect("a build was running");

    assert_eq!(cancelled.status, BuildStatus::Cancelled);
    assert_eq!(cancelled.exit_code, Some(CANCELLED_EXIT_CODE));
    assert!(!harness.slot.is_held(), "cancel must free the slot immediately");

    // A subsequent execute succeeds without waiting.
    let next = with_timeout(harness.coordinator.execute_trigger(repo_id, "quick", "bbb", "m"))
        .await
        .expect("next execute");
    match next {
        ExecuteOutcome::Finished(build) => {
            assert_eq!(build.status, BuildStatus::Success);
            assert!(build.output.contains("ok"));
        }
        other => panic!("expected a finished build, got {other:?}"),
    }

    // The interrupted execute also resolves with the cancelled record.
    let first = with_timeout(async { running.await })
        .await
        .expect("join")
        .expect("execute resolves");
    match first {
        ExecuteOutcome::Finished(build) => assert_eq!(build.status, BuildStatus::Cancelled),
        other => panic!("expected the cancelled build, got {other:?}"),
    }
}

#[tokio::test]
async fn cancel_without_running_build_is_a_noop() {
    init_tracing();
    let watch = RepoWatchBuilder::new("demo", &temp_path()).build();
    let harness = TestHarness::new(vec![watch]);

    assert!(harness.coordinator.cancel_current_build().await.is_none());
    assert!(!harness.slot.is_held());
}

#[tokio::test]
async fn repo_status_settles_back_to_idle_after_build() {
    init_tracing();
    let watch = RepoWatchBuilder::new("demo", &temp_path())
        .trigger(|t| t.name("quick").command("echo done"))
        .build();
    let harness = TestHarness::new(vec![watch]);
    let repo_id = harness.sole_repo_id();

    let outcome = with_timeout(harness.coordinator.execute_trigger(repo_id, "quick", "abc", "m"))
        .await
        .expect("execute");
    assert!(matches!(outcome, ExecuteOutcome::Finished(_)));

    // Terminal state is held briefly, then relaxes to idle.
    tokio::time::sleep(Duration::from_millis(200)).await;
    assert_eq!(
        harness.coordinator.repo_status(repo_id),
        Some(gitwatch::types::RepoStatus::Idle)
    );
}
