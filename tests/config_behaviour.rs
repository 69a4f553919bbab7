// tests/config_behaviour.rs

use std::io::Write as _;
use std::time::Duration;

use gitwatch::config::{load_and_validate, ConfigFile, RawConfigFile};
use gitwatch::errors::GitwatchError;

fn parse(toml_str: &str) -> Result<ConfigFile, GitwatchError> {
    let raw: RawConfigFile = toml::from_str(toml_str).expect("TOML should deserialize");
    ConfigFile::try_from(raw)
}

const FULL_CONFIG: &str = r#"
[config]
build_timeout_secs = 120
flush_interval_ms = 50
settle_delay_ms = 500
pull_retries = 2

[repo.backend]
path = "/srv/checkouts/backend"
branch = "develop"
interval_secs = 60

[[repo.backend.trigger]]
name = "deploy"
flag = "--deploy,--prod"
command = "make deploy REV={{commit_hash}}"
priority = 10

[[repo.backend.trigger]]
name = "tests"
command = "make test"

[repo.docs]
path = "/srv/checkouts/docs"
watch_tags = true
enabled = false
"#;

#[test]
fn full_config_parses_with_defaults_applied() {
    let cfg = parse(FULL_CONFIG).expect("config should validate");

    assert_eq!(cfg.config.build_timeout(), Duration::from_secs(120));
    assert_eq!(cfg.config.flush_interval(), Duration::from_millis(50));
    assert_eq!(cfg.config.settle_delay(), Duration::from_millis(500));
    assert_eq!(cfg.config.pull_retries, 2);

    let watches = cfg.to_watches();
    assert_eq!(watches.len(), 2);

    let backend = watches.iter().find(|w| w.name == "backend").unwrap();
    assert_eq!(backend.branch, "develop");
    assert_eq!(backend.remote, "origin");
    assert_eq!(backend.interval, Duration::from_secs(60));
    assert!(backend.enabled);
    assert!(!backend.watch_tags);
    assert_eq!(backend.triggers.len(), 2);

    let deploy = &backend.triggers[0];
    assert_eq!(deploy.name, "deploy");
    assert_eq!(deploy.commit_flag.as_deref(), Some("--deploy,--prod"));
    assert_eq!(deploy.priority, 10);
    assert_eq!(deploy.repo_id, backend.id);

    let docs = watches.iter().find(|w| w.name == "docs").unwrap();
    assert!(docs.watch_tags);
    assert!(!docs.enabled);
    assert_eq!(docs.interval, Duration::from_secs(300));
}

#[test]
fn minimal_config_uses_all_defaults() {
    let cfg = parse(
        r#"
[repo.app]
path = "/srv/app"
"#,
    )
    .expect("minimal config should validate");

    assert_eq!(cfg.config.build_timeout(), Duration::from_secs(3600));
    assert_eq!(cfg.config.flush_interval(), Duration::from_millis(100));
    assert_eq!(cfg.config.pull_retries, 0);

    let watches = cfg.to_watches();
    assert_eq!(watches[0].branch, "main");
    assert_eq!(watches[0].remote, "origin");
    assert!(watches[0].triggers.is_empty());
}

#[test]
fn empty_config_is_rejected() {
    match parse("") {
        Err(GitwatchError::Config(msg)) => assert!(msg.contains("no repositories")),
        other => panic!("expected config error, got {other:?}"),
    }
}

#[test]
fn zero_interval_is_rejected() {
    let result = parse(
        r#"
[repo.app]
path = "/srv/app"
interval_secs = 0
"#,
    );
    match result {
        Err(GitwatchError::Config(msg)) => assert!(msg.contains("interval_secs")),
        other => panic!("expected config error, got {other:?}"),
    }
}

#[test]
fn duplicate_trigger_names_are_rejected() {
    let result = parse(
        r#"
[repo.app]
path = "/srv/app"

[[repo.app.trigger]]
name = "deploy"
command = "make a"

[[repo.app.trigger]]
name = "deploy"
command = "make b"
"#,
    );
    match result {
        Err(GitwatchError::Config(msg)) => assert!(msg.contains("duplicate trigger")),
        other => panic!("expected config error, got {other:?}"),
    }
}

#[test]
fn empty_trigger_command_is_rejected() {
    let result = parse(
        r#"
[repo.app]
path = "/srv/app"

[[repo.app.trigger]]
name = "deploy"
command = "  "
"#,
    );
    match result {
        Err(GitwatchError::Config(msg)) => assert!(msg.contains("empty command")),
        other => panic!("expected config error, got {other:?}"),
    }
}

#[test]
fn empty_branch_is_rejected() {
    let result = parse(
        r#"
[repo.app]
path = "/srv/app"
branch = ""
"#,
    );
    match result {
        Err(GitwatchError::Config(msg)) => assert!(msg.contains("branch")),
        other => panic!("expected config error, got {other:?}"),
    }
}

#[test]
fn load_and_validate_reads_from_disk() {
    let mut file = tempfile::NamedTempFile::new().expect("temp file");
    file.write_all(FULL_CONFIG.as_bytes()).expect("write config");

    let cfg = load_and_validate(file.path()).expect("config should load");
    assert_eq!(cfg.repo.len(), 2);
}

#[test]
fn missing_file_is_an_io_error() {
    match load_and_validate("/nonexistent/Gitwatch.toml") {
        Err(GitwatchError::Io(_)) => {}
        other => panic!("expected IO error, got {other:?}"),
    }
}

#[test]
fn malformed_toml_is_a_toml_error() {
    let mut file = tempfile::NamedTempFile::new().expect("temp file");
    file.write_all(b"[repo.app\npath=").expect("write config");

    match load_and_validate(file.path()) {
        Err(GitwatchError::Toml(_)) => {}
        other => panic!("expected TOML error, got {other:?}"),
    }
}
