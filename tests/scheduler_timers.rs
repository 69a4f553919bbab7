// tests/scheduler_timers.rs

use std::time::Duration;

use gitwatch::errors::GitwatchError;
use gitwatch::monitor::Scheduler;
use gitwatch_test_utils::builders::RepoWatchBuilder;
use gitwatch_test_utils::init_tracing;
use tokio::sync::mpsc;
use tokio::time::timeout;
use uuid::Uuid;

#[tokio::test]
async fn first_tick_fires_before_the_interval_elapses() {
    init_tracing();
    let (tx, mut rx) = mpsc::channel::<Uuid>(16);
    let mut scheduler = Scheduler::new(tx);

    // With an hour-long interval, any tick within a second must be the
    // immediate first one.
    let repo = RepoWatchBuilder::new("demo", "/tmp/demo")
        .interval(Duration::from_secs(3600))
        .build();
    scheduler.start_one(&repo).expect("registration succeeds");

    let first = timeout(Duration::from_secs(1), rx.recv())
        .await
        .expect("immediate tick expected")
        .expect("channel open");
    assert_eq!(first, repo.id);

    scheduler.stop();
    assert_eq!(scheduler.active_count(), 0);
}

#[tokio::test]
async fn timer_keeps_firing_at_the_configured_interval() {
    init_tracing();
    let (tx, mut rx) = mpsc::channel::<Uuid>(64);
    let mut scheduler = Scheduler::new(tx);

    let repo = RepoWatchBuilder::new("demo", "/tmp/demo")
        .interval(Duration::from_millis(50))
        .build();
    scheduler.start_one(&repo).expect("registration succeeds");

    for _ in 0..3 {
        let id = timeout(Duration::from_secs(2), rx.recv())
            .await
            .expect("recurring tick expected")
            .expect("channel open");
        assert_eq!(id, repo.id);
    }

    scheduler.stop();
}

#[tokio::test]
async fn zero_interval_is_rejected_at_registration() {
    init_tracing();
    let (tx, _rx) = mpsc::channel::<Uuid>(16);
    let mut scheduler = Scheduler::new(tx);

    let repo = RepoWatchBuilder::new("demo", "/tmp/demo")
        .interval(Duration::ZERO)
        .build();

    match scheduler.start_one(&repo) {
        Err(GitwatchError::Config(msg)) => assert!(msg.contains("interval")),
        other => panic!("expected a config error, got {other:?}"),
    }
    assert_eq!(scheduler.active_count(), 0);
}

#[tokio::test]
async fn stop_one_silences_a_single_repository() {
    init_tracing();
    let (tx, mut rx) = mpsc::channel::<Uuid>(64);
    let mut scheduler = Scheduler::new(tx);

    let fast = RepoWatchBuilder::new("fast", "/tmp/fast")
        .interval(Duration::from_millis(30))
        .build();
    let slow = RepoWatchBuilder::new("slow", "/tmp/slow")
        .interval(Duration::from_secs(3600))
        .build();

    scheduler.start(&[fast.clone(), slow.clone()]).expect("start");
    assert_eq!(scheduler.active_count(), 2);

    // Both fire their immediate tick.
    let mut seen = Vec::new();
    for _ in 0..2 {
        let id = timeout(Duration::from_secs(1), rx.recv())
            .await
            .expect("tick expected")
            .expect("channel open");
        seen.push(id);
    }
    assert!(seen.contains(&fast.id));
    assert!(seen.contains(&slow.id));

    scheduler.stop_one(fast.id);
    assert!(!scheduler.is_running(fast.id));
    assert!(scheduler.is_running(slow.id));

    // Drain anything already in flight, then expect silence from `fast`.
    tokio::time::sleep(Duration::from_millis(60)).await;
    while rx.try_recv().is_ok() {}
    let quiet = timeout(Duration::from_millis(150), rx.recv()).await;
    assert!(quiet.is_err(), "no further ticks expected after stop_one");
}

#[tokio::test]
async fn start_skips_disabled_repositories() {
    init_tracing();
    let (tx, _rx) = mpsc::channel::<Uuid>(16);
    let mut scheduler = Scheduler::new(tx);

    let enabled = RepoWatchBuilder::new("on", "/tmp/on")
        .interval(Duration::from_secs(3600))
        .build();
    let disabled = RepoWatchBuilder::new("off", "/tmp/off")
        .interval(Duration::from_secs(3600))
        .disabled()
        .build();

    scheduler.start(&[enabled.clone(), disabled.clone()]).expect("start");
    assert!(scheduler.is_running(enabled.id));
    assert!(!scheduler.is_running(disabled.id));
}

#[tokio::test]
async fn re_registering_replaces_the_existing_timer() {
    init_tracing();
    let (tx, mut rx) = mpsc::channel::<Uuid>(64);
    let mut scheduler = Scheduler::new(tx);

    let mut repo = RepoWatchBuilder::new("demo", "/tmp/demo")
        .interval(Duration::from_secs(3600))
        .build();
    scheduler.start_one(&repo).expect("first registration");
    assert_eq!(scheduler.active_count(), 1);

    // Interval change: re-register the same repository.
    repo.interval = Duration::from_millis(40);
    scheduler.start_one(&repo).expect("re-registration");
    assert_eq!(scheduler.active_count(), 1);

    // The new timer ticks at the faster cadence (immediate + recurring).
    for _ in 0..2 {
        timeout(Duration::from_secs(1), rx.recv())
            .await
            .expect("tick expected")
            .expect("channel open");
    }
}
