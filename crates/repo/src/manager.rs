// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Working-tree lifecycle: bootstrap, safe restart, rollback, promotion.

use crate::git::{git_capture, git_ok, GitError};
use std::path::{Path, PathBuf};

/// What to do with uncommitted changes before a restart.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnsyncedPolicy {
    /// Stash to a timestamped rescue ref, then hard-reset to HEAD.
    RescueAndReset,
    /// Refuse the restart if the tree is dirty.
    Reject,
}

/// Result of [`RepoManager::safe_restart`]. A refusal is a normal outcome,
/// not an error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RestartOutcome {
    pub ok: bool,
    pub message: String,
}

/// One line of `list_commits` output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitInfo {
    pub sha: String,
    pub subject: String,
}

/// Owns the repository working tree at a known path.
#[derive(Debug, Clone)]
pub struct RepoManager {
    repo_dir: PathBuf,
    branch_dev: String,
    branch_stable: String,
}

impl RepoManager {
    pub fn new(
        repo_dir: impl Into<PathBuf>,
        branch_dev: impl Into<String>,
        branch_stable: impl Into<String>,
    ) -> Self {
        Self {
            repo_dir: repo_dir.into(),
            branch_dev: branch_dev.into(),
            branch_stable: branch_stable.into(),
        }
    }

    pub fn repo_dir(&self) -> &Path {
        &self.repo_dir
    }

    pub fn branch_dev(&self) -> &str {
        &self.branch_dev
    }

    /// Initialise the repository on first run. Idempotent.
    ///
    /// Creates the directory, sets identity, commits whatever contents are
    /// present, and creates the dev and stable branches.
    pub async fn ensure_repo_present(&self) -> Result<(), GitError> {
        if self.repo_dir.join(".git").exists() {
            return Ok(());
        }
        tracing::info!(dir = %self.repo_dir.display(), "bootstrapping repository");
        tokio::fs::create_dir_all(&self.repo_dir).await.map_err(GitError::Spawn)?;

        git_ok(&self.repo_dir, &["init"]).await?;
        git_ok(&self.repo_dir, &["config", "user.name", "Ouroboros"]).await?;
        git_ok(&self.repo_dir, &["config", "user.email", "ouroboros@local"]).await?;
        git_ok(&self.repo_dir, &["add", "-A"]).await?;
        git_ok(
            &self.repo_dir,
            &["commit", "--allow-empty", "-m", "Initial commit"],
        )
        .await?;
        git_ok(&self.repo_dir, &["branch", "-M", &self.branch_dev]).await?;
        git_ok(&self.repo_dir, &["branch", &self.branch_stable]).await?;
        Ok(())
    }

    /// True when the working tree has uncommitted changes.
    pub async fn is_dirty(&self) -> Result<bool, GitError> {
        let out = git_ok(&self.repo_dir, &["status", "--porcelain"]).await?;
        Ok(!out.stdout_trimmed().is_empty())
    }

    /// The contract used before every restart and at boot.
    ///
    /// On a clean tree this is a no-op success, so calling it twice in
    /// succession changes nothing after the first call.
    pub async fn safe_restart(
        &self,
        reason: &str,
        policy: UnsyncedPolicy,
    ) -> Result<RestartOutcome, GitError> {
        if !self.is_dirty().await? {
            return Ok(RestartOutcome { ok: true, message: "clean tree".to_string() });
        }

        match policy {
            UnsyncedPolicy::Reject => {
                Ok(RestartOutcome { ok: false, message: "working tree dirty".to_string() })
            }
            UnsyncedPolicy::RescueAndReset => {
                let rescue = self.rescue_unsynced(reason).await?;
                git_ok(&self.repo_dir, &["reset", "--hard", "HEAD"]).await?;
                git_ok(&self.repo_dir, &["clean", "-fd"]).await?;
                tracing::info!(reason, rescue = %rescue, "rescued unsynced work and reset");
                Ok(RestartOutcome { ok: true, message: format!("rescued to {rescue}") })
            }
        }
    }

    /// Stash uncommitted (including untracked) work to a timestamped ref.
    async fn rescue_unsynced(&self, reason: &str) -> Result<String, GitError> {
        // Stage everything so `stash create` captures untracked files too
        git_ok(&self.repo_dir, &["add", "-A"]).await?;
        let stash = git_ok(
            &self.repo_dir,
            &["stash", "create", &format!("rescue: {reason}")],
        )
        .await?;
        let sha = stash.stdout_trimmed().to_string();
        let ref_name =
            format!("refs/rescue/{}", chrono::Utc::now().format("%Y%m%d-%H%M%S"));
        if !sha.is_empty() {
            git_ok(&self.repo_dir, &["update-ref", &ref_name, &sha]).await?;
        }
        Ok(ref_name)
    }

    /// Current `(branch, sha)` of HEAD.
    pub async fn head(&self) -> Result<(String, String), GitError> {
        let branch = git_ok(&self.repo_dir, &["rev-parse", "--abbrev-ref", "HEAD"]).await?;
        let sha = git_ok(&self.repo_dir, &["rev-parse", "HEAD"]).await?;
        Ok((branch.stdout_trimmed().to_string(), sha.stdout_trimmed().to_string()))
    }

    /// Recent history, newest first.
    pub async fn list_commits(&self, n: usize) -> Result<Vec<CommitInfo>, GitError> {
        let count = format!("-{n}");
        let out =
            git_ok(&self.repo_dir, &["log", &count, "--pretty=format:%H\t%s"]).await?;
        Ok(out
            .stdout
            .lines()
            .filter_map(|line| {
                let (sha, subject) = line.split_once('\t')?;
                Some(CommitInfo { sha: sha.to_string(), subject: subject.to_string() })
            })
            .collect())
    }

    /// Recent tags, newest first.
    pub async fn list_versions(&self, n: usize) -> Result<Vec<String>, GitError> {
        let out =
            git_ok(&self.repo_dir, &["tag", "--sort=-creatordate"]).await?;
        Ok(out.stdout.lines().take(n).map(|s| s.to_string()).collect())
    }

    /// Hard-reset the dev branch to a named commit or tag.
    ///
    /// The caller is responsible for triggering a restart afterwards.
    pub async fn rollback_to(&self, reference: &str) -> Result<(), GitError> {
        git_ok(&self.repo_dir, &["checkout", &self.branch_dev]).await?;
        git_ok(&self.repo_dir, &["reset", "--hard", reference]).await?;
        Ok(())
    }

    /// Fast-forward the stable branch to match dev.
    pub async fn promote_to_stable(&self) -> Result<(), GitError> {
        // ff-only: fails if stable has diverged from dev
        let refspec = format!("{}:{}", self.branch_dev, self.branch_stable);
        let out = git_capture(&self.repo_dir, &["fetch", ".", &refspec]).await?;
        if !out.ok() {
            return Err(GitError::Failed {
                args: vec!["fetch".to_string(), ".".to_string(), refspec],
                rc: out.rc,
                stderr: out.stderr.trim().to_string(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
#[path = "manager_tests.rs"]
mod tests;
