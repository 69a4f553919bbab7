// src/exec/runner.rs

//! Process runner: launches a shell command, streams combined stdout+stderr
//! in coalesced batches, enforces a hard timeout and supports cancellation.
//!
//! Every run is registered in an in-flight map keyed by a generated id for
//! the duration of execution and removed unconditionally on completion,
//! error or cancellation.

use std::collections::HashMap;
use std::path::PathBuf;
use std::process::Stdio;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::Command;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::errors::{GitwatchError, Result};

/// Default cadence for flushing buffered output to the consumer.
pub const DEFAULT_FLUSH_INTERVAL: Duration = Duration::from_millis(100);

/// One command execution request.
#[derive(Debug)]
pub struct RunRequest {
    pub command: String,
    pub working_dir: PathBuf,
    /// Hard limit; the process is killed and the run fails with a timeout
    /// error when exceeded.
    pub timeout: Duration,
    /// Optional consumer of coalesced output batches.
    pub output_tx: Option<mpsc::Sender<String>>,
}

/// Result of a command that ran to completion.
#[derive(Debug, Clone)]
pub struct CommandResult {
    pub output: String,
    pub exit_code: i32,
}

impl CommandResult {
    pub fn is_success(&self) -> bool {
        self.exit_code == 0
    }
}

/// How a run ended: normal process exit, or killed by a cancel request.
/// Timeouts surface as an error instead.
#[derive(Debug, Clone)]
pub enum RunOutcome {
    Completed(CommandResult),
    Cancelled { output: String },
}

/// Launches shell commands and tracks every in-flight run.
///
/// Cloning is cheap; clones share the in-flight registry.
#[derive(Debug, Clone)]
pub struct ProcessRunner {
    inner: Arc<RunnerInner>,
}

#[derive(Debug)]
struct RunnerInner {
    running: Mutex<HashMap<Uuid, oneshot::Sender<()>>>,
    flush_interval: Duration,
}

impl Default for ProcessRunner {
    fn default() -> Self {
        Self::new(DEFAULT_FLUSH_INTERVAL)
    }
}

impl ProcessRunner {
    pub fn new(flush_interval: Duration) -> Self {
        Self {
            inner: Arc::new(RunnerInner {
                running: Mutex::new(HashMap::new()),
                flush_interval,
            }),
        }
    }

    /// Number of currently tracked runs.
    pub fn running_count(&self) -> usize {
        self.lock_running().len()
    }

    /// Terminate one in-flight run by id. Unknown ids are ignored.
    pub fn cancel(&self, run_id: Uuid) {
        let sender = self.lock_running().remove(&run_id);
        if let Some(tx) = sender {
            debug!(run_id = %run_id, "cancelling run");
            let _ = tx.send(());
        }
    }

    /// Terminate every tracked run.
    pub fn cancel_all(&self) {
        let senders: Vec<_> = self.lock_running().drain().collect();
        for (run_id, tx) in senders {
            debug!(run_id = %run_id, "cancelling run");
            let _ = tx.send(());
        }
    }

    /// Run a shell command to completion, streaming coalesced output batches
    /// to `req.output_tx` at the configured cadence.
    ///
    /// Residual output read after process exit is appended before the result
    /// is finalized.
    pub async fn run(&self, req: RunRequest) -> Result<RunOutcome> {
        let run_id = Uuid::new_v4();
        let (cancel_tx, cancel_rx) = oneshot::channel::<()>();
        self.lock_running().insert(run_id, cancel_tx);

        let result = self.run_inner(run_id, req, cancel_rx).await;

        // Removed on every exit path, including launch failure and timeout.
        self.lock_running().remove(&run_id);
        result
    }

    async fn run_inner(
        &self,
        run_id: Uuid,
        req: RunRequest,
        mut cancel_rx: oneshot::Receiver<()>,
    ) -> Result<RunOutcome> {
        info!(
            run_id = %run_id,
            cmd = %req.command,
            cwd = %req.working_dir.display(),
            "starting process"
        );

        // Login-style shell so user PATH customizations apply.
        let mut cmd = if cfg!(windows) {
            let mut c = Command::new("cmd");
            c.arg("/C").arg(&req.command);
            c
        } else {
            let mut c = Command::new("sh");
            c.arg("-lc").arg(&req.command);
            c
        };

        cmd.current_dir(&req.working_dir)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let mut child = cmd
            .spawn()
            .map_err(|err| GitwatchError::ProcessLaunch(err.to_string()))?;

        // Both pipes feed one chunk channel; ordering is by arrival.
        let (chunk_tx, chunk_rx) = mpsc::channel::<String>(64);
        if let Some(stdout) = child.stdout.take() {
            spawn_reader(stdout, chunk_tx.clone());
        }
        if let Some(stderr) = child.stderr.take() {
            spawn_reader(stderr, chunk_tx.clone());
        }
        drop(chunk_tx);

        let collector = tokio::spawn(collect_output(
            chunk_rx,
            req.output_tx.clone(),
            self.inner.flush_interval,
        ));

        // Exactly one of these branches resolves the run; the others are
        // dropped, so there is no double-resolution window.
        tokio::select! {
            status = child.wait() => {
                let status = status?;
                let output = finish_collector(collector).await;
                let exit_code = status.code().unwrap_or(-1);
                info!(run_id = %run_id, exit_code, "process exited");
                Ok(RunOutcome::Completed(CommandResult {
                    output: finalize_output(output),
                    exit_code,
                }))
            }

            _ = tokio::time::sleep(req.timeout) => {
                warn!(run_id = %run_id, timeout = ?req.timeout, "process timed out; killing");
                if let Err(err) = child.kill().await {
                    warn!(run_id = %run_id, error = %err, "failed to kill timed-out process");
                }
                let _ = finish_collector(collector).await;
                Err(GitwatchError::ProcessTimeout(req.timeout))
            }

            _ = &mut cancel_rx => {
                info!(run_id = %run_id, "cancellation requested; killing process");
                if let Err(err) = child.kill().await {
                    warn!(run_id = %run_id, error = %err, "failed to kill cancelled process");
                }
                let output = finish_collector(collector).await;
                Ok(RunOutcome::Cancelled {
                    output: finalize_output(output),
                })
            }
        }
    }

    fn lock_running(&self) -> MutexGuard<'_, HashMap<Uuid, oneshot::Sender<()>>> {
        self.inner
            .running
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

/// Read raw chunks from one pipe into the shared chunk channel.
fn spawn_reader<R>(mut src: R, tx: mpsc::Sender<String>) -> JoinHandle<()>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut buf = [0u8; 8192];
        loop {
            match src.read(&mut buf).await {
                Ok(0) | Err(_) => break,
                Ok(n) => {
                    let chunk = String::from_utf8_lossy(&buf[..n]).into_owned();
                    if tx.send(chunk).await.is_err() {
                        break;
                    }
                }
            }
        }
    })
}

/// Accumulate the full output while flushing pending batches to the consumer
/// at a fixed cadence. Ends when both pipe readers are done, then flushes the
/// residual batch.
async fn collect_output(
    mut rx: mpsc::Receiver<String>,
    consumer: Option<mpsc::Sender<String>>,
    every: Duration,
) -> String {
    let mut full = String::new();
    let mut pending = String::new();

    let mut ticker = tokio::time::interval(every);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            chunk = rx.recv() => match chunk {
                Some(c) => {
                    full.push_str(&c);
                    pending.push_str(&c);
                }
                None => break,
            },
            _ = ticker.tick() => {
                flush_pending(&consumer, &mut pending).await;
            }
        }
    }

    flush_pending(&consumer, &mut pending).await;
    full
}

async fn flush_pending(consumer: &Option<mpsc::Sender<String>>, pending: &mut String) {
    if pending.is_empty() {
        return;
    }
    let batch = std::mem::take(pending);
    if let Some(tx) = consumer {
        let _ = tx.send(batch).await;
    }
}

async fn finish_collector(collector: JoinHandle<String>) -> String {
    collector.await.unwrap_or_default()
}

fn finalize_output(output: String) -> String {
    let trimmed = output.trim();
    if trimmed.is_empty() {
        "[no output captured]".to_string()
    } else {
        trimmed.to_string()
    }
}
