//! Canonical locations under the deployment root.
//!
//! All worktrees of one deployment share the same `.prloop/` directory, so the
//! ledger and loop lock live next to the main checkout, never per-worktree.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tracing::debug;

use crate::io::git::Git;

/// All canonical paths within `.prloop/` for a deployment root.
#[derive(Debug, Clone)]
pub struct DeploymentPaths {
    pub root: PathBuf,
    pub state_dir: PathBuf,
    pub config_path: PathBuf,
    pub ledger_path: PathBuf,
    pub lock_path: PathBuf,
    pub logs_dir: PathBuf,
}

impl DeploymentPaths {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        let state_dir = root.join(".prloop");
        Self {
            root: root.clone(),
            state_dir: state_dir.clone(),
            config_path: state_dir.join("config.toml"),
            ledger_path: state_dir.join("progress.jsonl"),
            lock_path: state_dir.join("loop.lock"),
            logs_dir: state_dir.join("logs"),
        }
    }

    /// Log file for one delegate invocation, keyed by a filesystem-safe stamp.
    pub fn delegate_log_path(&self, stamp: &str) -> PathBuf {
        self.logs_dir.join(format!("delegate-{stamp}.log"))
    }

    /// Create `.prloop/` with a catch-all `.gitignore`, so loop state never
    /// shows up as a working-copy change when the worktree is the root itself.
    pub fn ensure_state_dir(&self) -> Result<()> {
        fs::create_dir_all(&self.logs_dir)
            .with_context(|| format!("create {}", self.logs_dir.display()))?;
        let ignore = self.state_dir.join(".gitignore");
        if !ignore.exists() {
            fs::write(&ignore, "*\n").with_context(|| format!("write {}", ignore.display()))?;
        }
        Ok(())
    }

    /// Resolve a path from config relative to the deployment root.
    pub fn resolve(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.root.join(path)
        }
    }
}

/// Pick the deployment root.
///
/// An explicit root wins. Otherwise, inside a git checkout, the main worktree
/// owning `cwd` is used so linked worktrees share state. Falls back to `cwd`.
pub fn resolve_root(explicit: Option<&Path>, cwd: &Path) -> PathBuf {
    if let Some(root) = explicit {
        return root.to_path_buf();
    }
    match Git::new(cwd).main_worktree_root() {
        Ok(root) => {
            debug!(root = %root.display(), "deployment root from git");
            root
        }
        Err(err) => {
            debug!(err = %err, "not in a git checkout, using cwd as deployment root");
            cwd.to_path_buf()
        }
    }
}
