// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Captured `git` subprocess invocations.

use std::path::Path;
use std::process::Stdio;
use std::time::Duration;
use thiserror::Error;

/// Bound on any single git invocation.
const GIT_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Error)]
pub enum GitError {
    #[error("failed to run git: {0}")]
    Spawn(#[from] std::io::Error),

    #[error("git {args:?} timed out after {}s", GIT_TIMEOUT.as_secs())]
    Timeout { args: Vec<String> },

    #[error("git {args:?} failed (rc={rc}): {stderr}")]
    Failed { args: Vec<String>, rc: i32, stderr: String },
}

/// Captured output of one git invocation.
#[derive(Debug, Clone)]
pub struct GitOutput {
    pub rc: i32,
    pub stdout: String,
    pub stderr: String,
}

impl GitOutput {
    pub fn ok(&self) -> bool {
        self.rc == 0
    }

    pub fn stdout_trimmed(&self) -> &str {
        self.stdout.trim()
    }
}

/// Run `git <args>` in `dir`, capturing rc/stdout/stderr.
///
/// A non-zero exit is NOT an error here; callers that require success use
/// [`git_ok`].
pub async fn git_capture(dir: &Path, args: &[&str]) -> Result<GitOutput, GitError> {
    let mut cmd = tokio::process::Command::new("git");
    cmd.args(args)
        .current_dir(dir)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());

    let fut = cmd.output();
    let output = match tokio::time::timeout(GIT_TIMEOUT, fut).await {
        Ok(result) => result?,
        Err(_) => {
            return Err(GitError::Timeout { args: args.iter().map(|s| s.to_string()).collect() })
        }
    };

    let out = GitOutput {
        rc: output.status.code().unwrap_or(-1),
        stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
        stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
    };
    tracing::debug!(args = ?args, rc = out.rc, "git");
    Ok(out)
}

/// Run `git <args>` and require a zero exit code.
pub async fn git_ok(dir: &Path, args: &[&str]) -> Result<GitOutput, GitError> {
    let out = git_capture(dir, args).await?;
    if !out.ok() {
        return Err(GitError::Failed {
            args: args.iter().map(|s| s.to_string()).collect(),
            rc: out.rc,
            stderr: out.stderr.trim().to_string(),
        });
    }
    Ok(out)
}
