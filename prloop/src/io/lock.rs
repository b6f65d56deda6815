use std::fs::{self, File, OpenOptions};
use std::path::Path;

use anyhow::{Context, Result, anyhow};
use fs2::FileExt;

/// Exclusive per-deployment loop lock backed by `.prloop/loop.lock`.
/// Automatically released when dropped.
pub struct LoopLock {
    _file: File,
}

impl LoopLock {
    /// Try to acquire the lock (non-blocking).
    /// Returns an error if another loop instance already holds it.
    pub fn acquire(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("create directory {}", parent.display()))?;
        }
        let file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .read(true)
            .write(true)
            .open(path)
            .with_context(|| format!("open lock file {}", path.display()))?;

        file.try_lock_exclusive().map_err(|_| {
            anyhow!(
                "another remediation loop is already running ({})",
                path.display()
            )
        })?;

        Ok(Self { _file: file })
    }
}
