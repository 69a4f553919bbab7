// src/git/shell.rs

//! Thin wrapper around running one `git` subprocess.

use std::path::Path;
use std::process::Stdio;

use tokio::process::Command;
use tracing::debug;

use crate::errors::Result;

/// Captured output of one git invocation.
#[derive(Debug, Clone)]
pub struct GitOutput {
    pub stdout: String,
    pub stderr: String,
    pub exit_code: i32,
}

impl GitOutput {
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }

    /// Trimmed stdout, the usual payload of a porcelain query.
    pub fn trimmed(&self) -> String {
        self.stdout.trim().to_string()
    }

    /// Stdout and stderr together, for error reporting.
    pub fn combined(&self) -> String {
        let mut out = self.stdout.trim().to_string();
        let err = self.stderr.trim();
        if !err.is_empty() {
            if !out.is_empty() {
                out.push('\n');
            }
            out.push_str(err);
        }
        out
    }
}

/// Run `git <args>` with the repository path as working directory.
///
/// A non-zero exit is NOT an error at this level; callers inspect
/// [`GitOutput::success`] and map failures to their own error variants.
pub async fn run_git(path: &Path, args: &[&str]) -> Result<GitOutput> {
    debug!(path = %path.display(), ?args, "running git");

    let output = Command::new("git")
        .args(args)
        .current_dir(path)
        .stdin(Stdio::null())
        .output()
        .await?;

    Ok(GitOutput {
        stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
        stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        exit_code: output.status.code().unwrap_or(-1),
    })
}
