// src/lib.rs

pub mod build;
pub mod cli;
pub mod config;
pub mod errors;
pub mod exec;
pub mod git;
pub mod logging;
pub mod model;
pub mod monitor;
pub mod notify;
pub mod store;
pub mod trigger;
pub mod types;

use std::sync::Arc;

use anyhow::{bail, Result};
use tokio::sync::mpsc;
use tracing::info;

use crate::build::{BuildExecutor, BuildSlot};
use crate::cli::CliArgs;
use crate::config::{load_and_validate, ConfigFile};
use crate::exec::ProcessRunner;
use crate::git::{ChangeDetector, GitClient};
use crate::monitor::{MonitorCoordinator, MonitorOptions};
use crate::notify::{LogNotifier, Notifier};
use crate::store::{MemoryStore, Store};
use crate::trigger::TemplateEngine;

/// High-level entry point used by `main.rs`.
///
/// This wires together:
/// - config loading
/// - the change detector, process runner and build executor
/// - the monitoring coordinator and its tick dispatch loop
/// - Ctrl-C handling
pub async fn run(args: CliArgs) -> Result<()> {
    let cfg = load_and_validate(&args.config)?;

    if args.dry_run {
        print_dry_run(&cfg);
        return Ok(());
    }

    let mut watches = cfg.to_watches();
    if let Some(name) = &args.repo {
        watches.retain(|w| &w.name == name);
        if watches.is_empty() {
            bail!("no configured repository named '{name}'");
        }
    }

    let settings = cfg.config.clone();

    let detector: Arc<dyn ChangeDetector> = Arc::new(GitClient::new());
    let notifier: Arc<dyn Notifier> = Arc::new(LogNotifier::new());
    let store: Arc<dyn Store> = Arc::new(MemoryStore::new());
    let slot = Arc::new(BuildSlot::new());
    let runner = ProcessRunner::new(settings.flush_interval());
    let templates = TemplateEngine::new(Arc::clone(&detector));

    let executor = Arc::new(BuildExecutor::new(
        Arc::clone(&slot),
        runner.clone(),
        templates,
        Arc::clone(&notifier),
        Arc::clone(&store),
        settings.build_timeout(),
        settings.settle_delay(),
    ));

    let options = MonitorOptions {
        settle_delay: settings.settle_delay(),
        pull_retries: settings.pull_retries,
        command_timeout: settings.build_timeout(),
    };

    let (tick_tx, tick_rx) = mpsc::channel(32);
    let coordinator = MonitorCoordinator::new(
        watches, detector, executor, notifier, store, slot, runner, tick_tx, options,
    );
    let _dispatch = MonitorCoordinator::spawn_tick_loop(Arc::clone(&coordinator), tick_rx);

    if args.once {
        coordinator.check_all_now().await;
        return Ok(());
    }

    coordinator.start_monitoring()?;
    info!("monitoring started; press Ctrl-C to stop");

    tokio::signal::ctrl_c().await?;
    info!("shutdown requested; stopping timers");
    coordinator.stop_monitoring();

    Ok(())
}

/// Simple dry-run output: print repositories and their triggers.
fn print_dry_run(cfg: &ConfigFile) {
    println!("gitwatch dry-run");
    println!("  build_timeout_secs = {}", cfg.config.build_timeout_secs);
    println!("  settle_delay_ms = {}", cfg.config.settle_delay_ms);
    println!("  pull_retries = {}", cfg.config.pull_retries);
    println!();

    println!("repositories ({}):", cfg.repo.len());
    for (name, repo) in cfg.repo.iter() {
        println!("  - {name}");
        println!("      path: {}", repo.path);
        if repo.watch_tags {
            println!("      watching: tags");
        } else {
            println!("      watching: {}/{}", repo.remote, repo.branch);
        }
        println!("      interval: {}s", repo.interval_secs);
        if !repo.enabled {
            println!("      enabled: false");
        }
        for trigger in &repo.trigger {
            println!("      trigger '{}':", trigger.name);
            println!("          flag: {}", trigger.flag.as_deref().unwrap_or("(any commit)"));
            println!("          command: {}", trigger.command);
            if let Some(dir) = &trigger.working_directory {
                println!("          working_directory: {dir}");
            }
            if trigger.priority != 0 {
                println!("          priority: {}", trigger.priority);
            }
            if !trigger.enabled {
                println!("          enabled: false");
            }
        }
    }
}
