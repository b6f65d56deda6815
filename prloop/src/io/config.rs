//! Loop configuration stored under `.prloop/config.toml`.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use serde::Deserialize;

use crate::core::backoff::BackoffPolicy;

pub const DEFAULT_COMMIT_MESSAGE: &str = "fix: automated CI remediation";
pub const DEFAULT_COMMENT_BODY: &str =
    "Automated CI fix pushed. The remediation loop committed changes to address failing checks or review feedback on this PR.";

/// Loop configuration (TOML).
///
/// This file is intended to be edited by humans. Missing fields default to
/// the values the loop runs with out of the box.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct LoopConfig {
    /// Working copy the delegate edits and the publisher commits from,
    /// relative to the deployment root.
    pub worktree: PathBuf,

    /// Remote the publisher pushes to.
    pub remote: String,

    /// Message for automated remediation commits.
    pub commit_message: String,

    /// Comment posted on the PR after a successful push.
    pub comment_body: String,

    /// Upper bound passed to the PR listing query.
    pub pr_list_limit: u32,

    pub delegate: DelegateConfig,

    pub backoff: BackoffConfig,
}

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct DelegateConfig {
    /// Agent command; the rendered prompt is written to its stdin.
    pub command: Vec<String>,

    /// Optional wall-clock ceiling per invocation. Unset means no deadline.
    pub timeout_secs: Option<u64>,

    /// Truncate captured agent output beyond this many bytes.
    pub output_limit_bytes: usize,
}

impl Default for DelegateConfig {
    fn default() -> Self {
        Self {
            command: ["codex", "exec", "--sandbox", "danger-full-access", "-"]
                .map(String::from)
                .to_vec(),
            timeout_secs: None,
            output_limit_bytes: 1_000_000,
        }
    }
}

impl DelegateConfig {
    pub fn ceiling(&self) -> Option<Duration> {
        self.timeout_secs.map(Duration::from_secs)
    }
}

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct BackoffConfig {
    pub hot_delay_secs: u64,
    pub cold_delay_secs: u64,
    /// Attempts newer than this keep the loop on the hot delay.
    pub active_window_secs: u64,
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self {
            hot_delay_secs: 60,
            cold_delay_secs: 300,
            active_window_secs: 300,
        }
    }
}

impl BackoffConfig {
    pub fn policy(&self) -> BackoffPolicy {
        BackoffPolicy {
            hot: Duration::from_secs(self.hot_delay_secs),
            cold: Duration::from_secs(self.cold_delay_secs),
            active_window: Duration::from_secs(self.active_window_secs),
        }
    }
}

impl Default for LoopConfig {
    fn default() -> Self {
        Self {
            worktree: PathBuf::from("."),
            remote: "origin".to_string(),
            commit_message: DEFAULT_COMMIT_MESSAGE.to_string(),
            comment_body: DEFAULT_COMMENT_BODY.to_string(),
            pr_list_limit: 1000,
            delegate: DelegateConfig::default(),
            backoff: BackoffConfig::default(),
        }
    }
}

impl LoopConfig {
    pub fn validate(&self) -> Result<()> {
        if self.remote.trim().is_empty() {
            return Err(anyhow!("remote must be non-empty"));
        }
        if self.commit_message.trim().is_empty() {
            return Err(anyhow!("commit_message must be non-empty"));
        }
        if self.comment_body.trim().is_empty() {
            return Err(anyhow!("comment_body must be non-empty"));
        }
        if self.pr_list_limit == 0 {
            return Err(anyhow!("pr_list_limit must be > 0"));
        }
        if self.delegate.command.is_empty() || self.delegate.command[0].trim().is_empty() {
            return Err(anyhow!("delegate.command must be a non-empty array"));
        }
        if self.delegate.timeout_secs == Some(0) {
            return Err(anyhow!("delegate.timeout_secs must be > 0 when set"));
        }
        if self.delegate.output_limit_bytes == 0 {
            return Err(anyhow!("delegate.output_limit_bytes must be > 0"));
        }
        if self.backoff.hot_delay_secs == 0 || self.backoff.cold_delay_secs == 0 {
            return Err(anyhow!("backoff delays must be > 0"));
        }
        Ok(())
    }
}

/// Load config from a TOML file.
///
/// If the file is missing, returns `LoopConfig::default()`.
pub fn load_config(path: &Path) -> Result<LoopConfig> {
    if !path.exists() {
        let cfg = LoopConfig::default();
        cfg.validate()?;
        return Ok(cfg);
    }
    let contents = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    let cfg: LoopConfig =
        toml::from_str(&contents).with_context(|| format!("parse {}", path.display()))?;
    cfg.validate()
        .with_context(|| format!("invalid config {}", path.display()))?;
    Ok(cfg)
}
