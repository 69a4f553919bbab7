// tests/monitoring_loop.rs

//! End-to-end monitoring: scheduler ticks flow through the dispatch loop
//! into real check pipelines.

use std::time::Duration;

use gitwatch::monitor::MonitorCoordinator;
use gitwatch::store::Store;
use gitwatch::types::CheckResult;
use gitwatch_test_utils::builders::RepoWatchBuilder;
use gitwatch_test_utils::harness::TestHarness;
use gitwatch_test_utils::{init_tracing, with_timeout};

fn temp_path() -> String {
    std::env::temp_dir().display().to_string()
}

#[tokio::test]
async fn scheduled_ticks_drive_checks_until_stopped() {
    init_tracing();
    let watch = RepoWatchBuilder::new("demo", &temp_path())
        .interval(Duration::from_millis(60))
        .last_commit_hash("abc123")
        .build();

    let TestHarness {
        coordinator,
        store,
        tick_rx,
        ..
    } = TestHarness::new(vec![watch]);

    let _dispatch = MonitorCoordinator::spawn_tick_loop(coordinator.clone(), tick_rx);
    coordinator.start_monitoring().expect("start monitoring");
    assert_eq!(coordinator.scheduled_count(), 1);

    // The immediate tick plus at least one recurring tick produce checks.
    with_timeout(async {
        while store.check_count() < 2 {
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
    })
    .await;

    coordinator.stop_monitoring();
    assert_eq!(coordinator.scheduled_count(), 0);

    // No further checks once the timers are gone.
    tokio::time::sleep(Duration::from_millis(150)).await;
    let settled = store.check_count();
    tokio::time::sleep(Duration::from_millis(150)).await;
    assert_eq!(store.check_count(), settled);
}

#[tokio::test]
async fn check_all_now_checks_every_repository_sequentially() {
    init_tracing();
    let one = RepoWatchBuilder::new("one", &temp_path())
        .last_commit_hash("abc123")
        .build();
    let two = RepoWatchBuilder::new("two", &temp_path())
        .last_commit_hash("abc123")
        .build();

    let harness = TestHarness::new(vec![one, two]);
    with_timeout(harness.coordinator.check_all_now()).await;

    assert_eq!(harness.store.check_count(), 2);
    for id in harness.coordinator.repo_ids() {
        let checks = harness
            .store
            .checks_for_repo(id)
            .await
            .expect("store query");
        assert_eq!(checks.len(), 1);
        assert_eq!(checks[0].result, CheckResult::NoChanges);
    }
}

#[tokio::test]
async fn toggling_a_repository_stops_and_restarts_its_checks() {
    init_tracing();
    let watch = RepoWatchBuilder::new("demo", &temp_path())
        .last_commit_hash("abc123")
        .interval(Duration::from_secs(3600))
        .build();
    let harness = TestHarness::new(vec![watch]);
    let repo_id = harness.sole_repo_id();

    harness
        .coordinator
        .set_repo_enabled(repo_id, false)
        .expect("disable");
    assert!(with_timeout(harness.coordinator.check_repository(repo_id))
        .await
        .is_none());

    harness
        .coordinator
        .set_repo_enabled(repo_id, true)
        .expect("enable");
    assert!(with_timeout(harness.coordinator.check_repository(repo_id))
        .await
        .is_some());
    assert_eq!(harness.coordinator.scheduled_count(), 1);
}

#[tokio::test]
async fn repo_lookup_by_name_works() {
    init_tracing();
    let watch = RepoWatchBuilder::new("lookup-me", &temp_path()).build();
    let harness = TestHarness::new(vec![watch]);

    let id = harness
        .coordinator
        .repo_id_by_name("lookup-me")
        .expect("repo exists");
    assert_eq!(harness.coordinator.repo_watch(id).unwrap().name, "lookup-me");
    assert!(harness.coordinator.repo_id_by_name("missing").is_none());
}
