//! Pre-wired coordinator stack for integration tests.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use uuid::Uuid;

use gitwatch::build::{BuildExecutor, BuildSlot};
use gitwatch::exec::ProcessRunner;
use gitwatch::git::ChangeDetector;
use gitwatch::model::RepoWatch;
use gitwatch::monitor::{MonitorCoordinator, MonitorOptions};
use gitwatch::notify::Notifier;
use gitwatch::store::{MemoryStore, Store};
use gitwatch::trigger::TemplateEngine;

use crate::fakes::{FakeDetector, RecordingNotifier};

/// A full coordinator wired with fakes at the detector and notifier seams
/// and a real process runner (tests use trivial `sh` commands).
pub struct TestHarness {
    pub coordinator: Arc<MonitorCoordinator>,
    pub detector: Arc<FakeDetector>,
    pub notifier: Arc<RecordingNotifier>,
    pub store: Arc<MemoryStore>,
    pub slot: Arc<BuildSlot>,
    pub tick_rx: mpsc::Receiver<Uuid>,
}

impl TestHarness {
    pub fn new(watches: Vec<RepoWatch>) -> Self {
        Self::with_options(watches, MonitorOptions {
            settle_delay: Duration::from_millis(50),
            pull_retries: 0,
            command_timeout: Duration::from_secs(5),
        })
    }

    pub fn with_options(watches: Vec<RepoWatch>, options: MonitorOptions) -> Self {
        let detector = Arc::new(FakeDetector::new());
        let notifier = Arc::new(RecordingNotifier::new());
        let store = Arc::new(MemoryStore::new());
        let slot = Arc::new(BuildSlot::new());
        let runner = ProcessRunner::new(Duration::from_millis(20));

        let detector_dyn: Arc<dyn ChangeDetector> = detector.clone();
        let notifier_dyn: Arc<dyn Notifier> = notifier.clone();
        let store_dyn: Arc<dyn Store> = store.clone();

        let templates = TemplateEngine::new(Arc::clone(&detector_dyn));

        let executor = Arc::new(BuildExecutor::new(
            Arc::clone(&slot),
            runner.clone(),
            templates,
            Arc::clone(&notifier_dyn),
            Arc::clone(&store_dyn),
            options.command_timeout,
            options.settle_delay,
        ));

        let (tick_tx, tick_rx) = mpsc::channel(32);
        let coordinator = MonitorCoordinator::new(
            watches,
            detector_dyn,
            executor,
            notifier_dyn,
            store_dyn,
            Arc::clone(&slot),
            runner,
            tick_tx,
            options,
        );

        Self {
            coordinator,
            detector,
            notifier,
            store,
            slot,
            tick_rx,
        }
    }

    /// The id of the only configured repository.
    pub fn sole_repo_id(&self) -> Uuid {
        let ids = self.coordinator.repo_ids();
        assert_eq!(ids.len(), 1, "harness expected exactly one repository");
        ids[0]
    }
}
