//! Glue between the binary's subcommands and the library.
//!
//! Each function returns the text destined for stdout so the binary stays a
//! thin dispatcher.

use std::path::Path;

use anyhow::{Context, Result};
use tracing::{debug, info};

use crate::core::attention::attention_rows;
use crate::core::types::PublishOutcome;
use crate::detect::detect;
use crate::io::config::{LoopConfig, load_config};
use crate::io::delegate::CommandDelegate;
use crate::io::git::Git;
use crate::io::lock::LoopLock;
use crate::io::paths::DeploymentPaths;
use crate::io::review::{GhCli, ReviewSystem};
use crate::looping::{LoopOptions, LoopSettings, ThreadSleeper, run_loop};
use crate::publish::{PublishRequest, publish};

/// `list-attention-prs`: pretty JSON array of the PRs that need attention.
pub fn list_attention_prs<R: ReviewSystem + ?Sized>(review: &R) -> Result<String> {
    review.ensure_authenticated()?;
    let prs = detect(review)?;
    let mut out =
        serde_json::to_string_pretty(&attention_rows(&prs)).context("serialize attention rows")?;
    out.push('\n');
    Ok(out)
}

/// `publish-changes`: publish the working copy at `git` for one PR.
pub fn publish_changes<R: ReviewSystem + ?Sized>(
    cfg: &LoopConfig,
    git: &Git,
    review: &R,
    pr: u64,
    branch: &str,
) -> Result<String> {
    let request = PublishRequest {
        pr,
        branch,
        remote: &cfg.remote,
        commit_message: &cfg.commit_message,
        comment_body: &cfg.comment_body,
    };
    let message = match publish(git, review, &request)? {
        PublishOutcome::NoChanges => format!("No changes to publish for PR #{pr}.\n"),
        PublishOutcome::Published { commit } => format!(
            "Published {commit} to {}/{branch} and commented on PR #{pr}.\n",
            cfg.remote
        ),
    };
    Ok(message)
}

/// `run-loop`: hold the deployment lock and run cycles until killed.
pub fn run_remediation_loop(
    paths: &DeploymentPaths,
    cfg: &LoopConfig,
    bin: &str,
    max_cycles: Option<u64>,
) -> Result<()> {
    let _lock = LoopLock::acquire(&paths.lock_path)?;
    let settings = LoopSettings::from_config(paths, cfg, bin);
    let review = GhCli::new(&settings.worktree, cfg.pr_list_limit);
    let delegate = CommandDelegate::new(cfg.delegate.command.clone());

    let outcome = run_loop(
        paths,
        &settings,
        &review,
        &delegate,
        &ThreadSleeper,
        &LoopOptions { max_cycles },
        |report| debug!(?report, "cycle report"),
    )?;
    info!(cycles = outcome.cycles, "remediation loop stopped");
    Ok(())
}

/// Path the agent should use to call back into this binary.
pub fn self_invocation() -> String {
    std::env::current_exe()
        .ok()
        .and_then(|path| path.to_str().map(str::to_string))
        .unwrap_or_else(|| env!("CARGO_PKG_NAME").to_string())
}

/// Load `.prloop/config.toml` for the deployment rooted at `root`.
pub fn load_deployment(root: &Path) -> Result<(DeploymentPaths, LoopConfig)> {
    let paths = DeploymentPaths::new(root);
    let cfg = load_config(&paths.config_path)?;
    Ok((paths, cfg))
}
