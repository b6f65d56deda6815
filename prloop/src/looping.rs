//! The remediation control loop behind `prloop run-loop`.
//!
//! One cycle is detect, delegate, publish, record, then schedule. Only a
//! failed authentication check at startup stops the loop; every per-cycle
//! failure is logged, recorded where it maps to a PR, and the next cycle runs
//! after the computed delay.

use std::path::PathBuf;
use std::thread;
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::Utc;
use tracing::{error, info, instrument, warn};

use crate::core::backoff::{BackoffPolicy, format_timestamp, next_delay};
use crate::core::types::{
    DelegateStatus, ProgressRecord, PublishOutcome, PullRequestSummary, status,
};
use crate::detect::detect;
use crate::error::chain;
use crate::io::config::LoopConfig;
use crate::io::delegate::{Delegate, DelegateRequest};
use crate::io::git::Git;
use crate::io::ledger::Ledger;
use crate::io::paths::DeploymentPaths;
use crate::io::prompt::render_remediation_prompt;
use crate::io::review::ReviewSystem;
use crate::publish::{PublishRequest, publish};

/// Blocks between cycles. Tests substitute a recorder.
pub trait Sleeper {
    fn sleep(&self, duration: Duration);
}

/// [`Sleeper`] backed by [`thread::sleep`].
#[derive(Debug, Default, Clone, Copy)]
pub struct ThreadSleeper;

impl Sleeper for ThreadSleeper {
    fn sleep(&self, duration: Duration) {
        thread::sleep(duration);
    }
}

/// Per-deployment values the loop needs each cycle.
#[derive(Debug, Clone)]
pub struct LoopSettings {
    /// Working copy handed to the delegate and published from.
    pub worktree: PathBuf,
    pub remote: String,
    pub commit_message: String,
    pub comment_body: String,
    pub backoff: BackoffPolicy,
    pub delegate_ceiling: Option<Duration>,
    pub output_limit_bytes: usize,
    /// How the agent should invoke this tool from inside its prompt.
    pub bin: String,
}

impl LoopSettings {
    pub fn from_config(paths: &DeploymentPaths, cfg: &LoopConfig, bin: impl Into<String>) -> Self {
        Self {
            worktree: paths.resolve(&cfg.worktree),
            remote: cfg.remote.clone(),
            commit_message: cfg.commit_message.clone(),
            comment_body: cfg.comment_body.clone(),
            backoff: cfg.backoff.policy(),
            delegate_ceiling: cfg.delegate.ceiling(),
            output_limit_bytes: cfg.delegate.output_limit_bytes,
            bin: bin.into(),
        }
    }
}

/// Bounds on a loop invocation. The default runs forever.
#[derive(Debug, Clone, Default)]
pub struct LoopOptions {
    pub max_cycles: Option<u64>,
}

/// What the publish step did after a successful delegate run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CyclePublish {
    NoChanges { pr: u64 },
    Published { pr: u64, commit: String },
    Failed { pr: u64, error: String },
    /// The worktree has changes but its branch belongs to no attention PR.
    Unmatched { branch: String },
}

/// Summary of one cycle, handed to the `on_cycle` callback.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CycleReport {
    pub cycle: u64,
    /// PR numbers handed to the delegate. `None` when detection was unavailable.
    pub attention: Option<Vec<u64>>,
    /// `None` when the cycle went idle without delegating.
    pub delegate: Option<DelegateStatus>,
    pub publish: Option<CyclePublish>,
    /// Records the loop appended to the ledger this cycle.
    pub recorded: Vec<ProgressRecord>,
    pub next_delay: Duration,
}

/// Summary of a bounded loop invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoopOutcome {
    pub cycles: u64,
}

/// Run cycles until `options.max_cycles` is reached, or forever.
///
/// Fails only if the review system rejects authentication up front.
pub fn run_loop<R, D, S, F>(
    paths: &DeploymentPaths,
    settings: &LoopSettings,
    review: &R,
    delegate: &D,
    sleeper: &S,
    options: &LoopOptions,
    mut on_cycle: F,
) -> Result<LoopOutcome>
where
    R: ReviewSystem + ?Sized,
    D: Delegate + ?Sized,
    S: Sleeper + ?Sized,
    F: FnMut(&CycleReport),
{
    review
        .ensure_authenticated()
        .context("review system authentication")?;
    if let Err(err) = paths.ensure_state_dir() {
        warn!(error = %format!("{err:#}"), "cannot prepare state directory, continuing");
    }
    info!(
        root = %paths.root.display(),
        worktree = %settings.worktree.display(),
        "remediation loop started"
    );

    let mut cycle = 0u64;
    loop {
        cycle += 1;
        let report = run_cycle(cycle, paths, settings, review, delegate);
        on_cycle(&report);

        if options.max_cycles.is_some_and(|max| cycle >= max) {
            info!(cycles = cycle, "cycle limit reached");
            return Ok(LoopOutcome { cycles: cycle });
        }
        info!(cycle, delay_secs = report.next_delay.as_secs(), "sleeping");
        sleeper.sleep(report.next_delay);
    }
}

/// Run one detect, delegate, publish, record, schedule pass.
#[instrument(skip_all, fields(cycle = cycle))]
pub fn run_cycle<R, D>(
    cycle: u64,
    paths: &DeploymentPaths,
    settings: &LoopSettings,
    review: &R,
    delegate: &D,
) -> CycleReport
where
    R: ReviewSystem + ?Sized,
    D: Delegate + ?Sized,
{
    info!("cycle started");
    let ledger = Ledger::new(&paths.ledger_path);
    let mut report = CycleReport {
        cycle,
        attention: None,
        delegate: None,
        publish: None,
        recorded: Vec::new(),
        next_delay: settings.backoff.cold,
    };

    let attention = match detect(review) {
        Ok(prs) => Some(prs),
        Err(err) => {
            warn!(
                error = %chain(&err),
                "detection unavailable, the agent will discover PRs itself"
            );
            None
        }
    };
    report.attention = attention
        .as_ref()
        .map(|prs| prs.iter().map(|pr| pr.number).collect());

    let mut pending = Vec::new();
    if attention.as_ref().is_some_and(Vec::is_empty) {
        info!("no PRs need attention");
    } else {
        let handed = attention.as_deref().unwrap_or_default();
        if invoke_delegate(paths, settings, delegate, attention.as_deref()) {
            report.delegate = Some(DelegateStatus::Success);
            report.publish = publish_step(settings, review, handed, &mut pending);
        } else {
            report.delegate = Some(DelegateStatus::Failure);
            pending.extend(handed.iter().map(|pr| record_for(pr, status::FAILED)));
        }
    }

    for record in pending {
        match ledger.append(&record) {
            Ok(()) => report.recorded.push(record),
            Err(err) => error!(
                pr = %record.pr,
                status = %record.status,
                error = %chain(&err),
                "failed to record progress, attempt is missing from the ledger"
            ),
        }
    }

    report.next_delay = schedule(&ledger, &settings.backoff);
    info!(
        recorded = report.recorded.len(),
        next_delay_secs = report.next_delay.as_secs(),
        "cycle finished"
    );
    report
}

/// True only when the delegate ran and reported success.
fn invoke_delegate<D: Delegate + ?Sized>(
    paths: &DeploymentPaths,
    settings: &LoopSettings,
    delegate: &D,
    prs: Option<&[PullRequestSummary]>,
) -> bool {
    let prompt = match render_remediation_prompt(prs, &settings.bin) {
        Ok(prompt) => prompt,
        Err(err) => {
            error!(error = %format!("{err:#}"), "failed to render delegate prompt");
            return false;
        }
    };
    let stamp = Utc::now().format("%Y%m%dT%H%M%S%.3fZ").to_string();
    let request = DelegateRequest {
        workdir: settings.worktree.clone(),
        prompt,
        log_path: paths.delegate_log_path(&stamp),
        ceiling: settings.delegate_ceiling,
        output_limit_bytes: settings.output_limit_bytes,
    };

    match delegate.invoke(&request) {
        Ok(outcome) if outcome.succeeded() => {
            info!(log = %request.log_path.display(), "delegate succeeded");
            true
        }
        Ok(_) => {
            warn!(log = %request.log_path.display(), "delegate reported failure");
            false
        }
        Err(err) => {
            warn!(error = %err, "delegate did not complete");
            false
        }
    }
}

fn publish_step<R: ReviewSystem + ?Sized>(
    settings: &LoopSettings,
    review: &R,
    attention: &[PullRequestSummary],
    pending: &mut Vec<ProgressRecord>,
) -> Option<CyclePublish> {
    let git = Git::new(&settings.worktree);
    match git.has_uncommitted_changes() {
        Ok(true) => {}
        Ok(false) => {
            info!("delegate left nothing to publish");
            return None;
        }
        Err(err) => {
            warn!(error = %format!("{err:#}"), "cannot inspect worktree, skipping publish");
            return None;
        }
    }
    let branch = match git.current_branch() {
        Ok(branch) => branch,
        Err(err) => {
            warn!(error = %format!("{err:#}"), "cannot read worktree branch, skipping publish");
            return None;
        }
    };
    let Some(pr) = attention.iter().find(|pr| pr.branch == branch) else {
        warn!(%branch, "worktree changes belong to no attention PR, leaving them unpublished");
        return Some(CyclePublish::Unmatched { branch });
    };

    let request = PublishRequest {
        pr: pr.number,
        branch: &pr.branch,
        remote: &settings.remote,
        commit_message: &settings.commit_message,
        comment_body: &settings.comment_body,
    };
    let result = match publish(&git, review, &request) {
        Ok(PublishOutcome::Published { commit }) => {
            pending.push(record_for(pr, status::SUCCESS));
            CyclePublish::Published {
                pr: pr.number,
                commit,
            }
        }
        Ok(PublishOutcome::NoChanges) => {
            pending.push(record_for(pr, status::NO_CHANGES));
            CyclePublish::NoChanges { pr: pr.number }
        }
        Err(err) => {
            error!(pr = pr.number, error = %err, "publish failed");
            pending.push(record_for(pr, status::PUBLISH_FAILED));
            CyclePublish::Failed {
                pr: pr.number,
                error: err.to_string(),
            }
        }
    };
    Some(result)
}

fn record_for(pr: &PullRequestSummary, status: &str) -> ProgressRecord {
    ProgressRecord::new(
        pr.number.to_string(),
        &pr.branch,
        format_timestamp(Utc::now()),
        status,
    )
}

fn schedule(ledger: &Ledger, policy: &BackoffPolicy) -> Duration {
    let last = ledger.read_last().unwrap_or_else(|err| {
        warn!(error = %chain(&err), "ledger unreadable, using cold delay");
        None
    });
    next_delay(policy, last.as_ref(), Utc::now())
}
