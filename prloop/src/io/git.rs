//! Git adapter for the publisher and root discovery.
//!
//! Publishing must commit and push deterministically, so we keep a small,
//! explicit wrapper around `git` subprocess calls.

use std::path::{Path, PathBuf};
use std::process::{Command, Output};

use anyhow::{Context, Result, anyhow};
use tracing::{debug, instrument, warn};

/// Wrapper for executing git commands in a working directory.
#[derive(Debug, Clone)]
pub struct Git {
    workdir: PathBuf,
}

impl Git {
    pub fn new(workdir: impl Into<PathBuf>) -> Self {
        Self {
            workdir: workdir.into(),
        }
    }

    /// Return the current branch name (errors on detached HEAD).
    #[instrument(skip_all)]
    pub fn current_branch(&self) -> Result<String> {
        let out = self.run_capture(&["rev-parse", "--abbrev-ref", "HEAD"])?;
        let name = out.trim().to_string();
        if name == "HEAD" {
            warn!("detached HEAD detected");
            return Err(anyhow!("detached HEAD (refuse to publish)"));
        }
        debug!(branch = %name, "current branch");
        Ok(name)
    }

    /// Return the full HEAD SHA.
    pub fn head_sha(&self) -> Result<String> {
        let out = self.run_capture(&["rev-parse", "HEAD"])?;
        Ok(out.trim().to_string())
    }

    /// Root of the main worktree that owns this checkout.
    ///
    /// For a linked worktree this is the primary checkout, not the worktree itself.
    pub fn main_worktree_root(&self) -> Result<PathBuf> {
        let out = self.run_capture(&["rev-parse", "--git-common-dir"])?;
        let common = self.workdir.join(out.trim());
        let common = common
            .canonicalize()
            .with_context(|| format!("canonicalize {}", common.display()))?;
        match common.file_name() {
            Some(name) if name == ".git" => common
                .parent()
                .map(Path::to_path_buf)
                .ok_or_else(|| anyhow!("git dir {} has no parent", common.display())),
            _ => Ok(common),
        }
    }

    /// True if the worktree has tracked modifications or untracked files.
    #[instrument(skip_all)]
    pub fn has_uncommitted_changes(&self) -> Result<bool> {
        let out = self.run_capture(&["status", "--porcelain=v1", "-uall"])?;
        let changed: Vec<&str> = out.lines().filter(|line| !line.trim().is_empty()).collect();
        debug!(changed = ?changed, "worktree status");
        Ok(!changed.is_empty())
    }

    /// Stage all changes (respects .gitignore).
    pub fn add_all(&self) -> Result<()> {
        self.run_checked(&["add", "-A"])?;
        Ok(())
    }

    /// True if there is anything staged for commit.
    pub fn has_staged_changes(&self) -> Result<bool> {
        let out = self.run_capture(&["diff", "--cached", "--name-only"])?;
        Ok(!out.trim().is_empty())
    }

    /// Commit staged changes with a message.
    ///
    /// If there are no staged changes, this returns Ok(false) and does nothing.
    #[instrument(skip_all)]
    pub fn commit_staged(&self, message: &str) -> Result<bool> {
        if !self.has_staged_changes()? {
            debug!("no staged changes, skipping commit");
            return Ok(false);
        }
        debug!("committing staged changes");
        self.run_checked(&["commit", "-m", message])?;
        Ok(true)
    }

    /// True if `refname` resolves (e.g. `refs/remotes/origin/main`).
    pub fn ref_exists(&self, refname: &str) -> Result<bool> {
        let status = self
            .run(&["show-ref", "--verify", "--quiet", refname])?
            .status;
        Ok(status.success())
    }

    /// Commits on HEAD not yet on `<remote>/<branch>`. Zero if the remote ref is unknown.
    pub fn commits_ahead_of_remote(&self, remote: &str, branch: &str) -> Result<u32> {
        let remote_ref = format!("refs/remotes/{remote}/{branch}");
        if !self.ref_exists(&remote_ref)? {
            debug!(remote_ref, "no remote-tracking ref");
            return Ok(0);
        }
        let range = format!("{remote_ref}..HEAD");
        let out = self.run_capture(&["rev-list", "--count", &range])?;
        out.trim()
            .parse()
            .with_context(|| format!("parse rev-list count '{}'", out.trim()))
    }

    /// Push `branch` to `remote`. Never forced: a diverged remote is an error.
    #[instrument(skip_all, fields(remote = remote, branch = branch))]
    pub fn push(&self, remote: &str, branch: &str) -> Result<()> {
        debug!(remote, branch, "pushing");
        self.run_checked(&["push", remote, branch])?;
        Ok(())
    }

    fn run_capture(&self, args: &[&str]) -> Result<String> {
        let output = self.run_checked(args)?;
        Ok(String::from_utf8_lossy(&output.stdout).to_string())
    }

    fn run_checked(&self, args: &[&str]) -> Result<Output> {
        let output = self.run(args)?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(anyhow!("git {} failed: {}", args.join(" "), stderr.trim()));
        }
        Ok(output)
    }

    fn run(&self, args: &[&str]) -> Result<Output> {
        Command::new("git")
            .args(args)
            .current_dir(&self.workdir)
            .output()
            .with_context(|| format!("spawn git {}", args.join(" ")))
    }
}
