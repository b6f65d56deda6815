//! Error taxonomy for the remediation loop.
//!
//! Each component surfaces its own error type so the loop can decide per
//! failure whether a cycle step is skipped, recorded, or retried. CLI glue
//! wraps these in `anyhow` with context.

use std::error::Error as StdError;
use std::path::PathBuf;

use thiserror::Error;

/// The review system could not be queried or its answer could not be parsed.
#[derive(Debug, Error)]
pub enum QueryError {
    #[error("review system is not authenticated: {0}")]
    Unauthenticated(String),
    #[error("failed to run {command}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },
    #[error("{command} failed: {stderr}")]
    Command { command: String, stderr: String },
    #[error("malformed response from {command}")]
    Malformed {
        command: String,
        #[source]
        source: serde_json::Error,
    },
}

/// Ledger append or read failure.
#[derive(Debug, Error)]
pub enum LedgerError {
    /// Rejected before anything was written.
    #[error("invalid progress record: {0}")]
    InvalidRecord(String),
    #[error("failed to write ledger {}", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to read ledger {}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to encode progress record")]
    Encode(#[from] serde_json::Error),
}

/// The delegate could not be run to completion.
#[derive(Debug, Error)]
pub enum DelegateError {
    #[error("delegate command is empty")]
    EmptyCommand,
    #[error("failed to run delegate: {0:#}")]
    Run(anyhow::Error),
    #[error("delegate exceeded its {0:?} ceiling")]
    TimedOut(std::time::Duration),
}

/// Publishing did not complete. Local state may hold unpublished work.
#[derive(Debug, Error)]
pub enum PublishError {
    #[error("worktree is on branch '{actual}', expected '{expected}'")]
    BranchMismatch { expected: String, actual: String },
    #[error(
        "branch '{branch}' already has {ahead} unpublished commit(s); push them before publishing more"
    )]
    UnpublishedCommits { branch: String, ahead: u32 },
    #[error("git failed: {0:#}")]
    Git(anyhow::Error),
    /// The commit exists locally but did not reach the remote.
    #[error("push of '{branch}' failed (commit {commit} is local only): {cause:#}")]
    Push {
        branch: String,
        commit: String,
        cause: anyhow::Error,
    },
    /// The commit was pushed but the PR was not notified.
    #[error("pushed {commit} but failed to comment on PR #{pr}: {cause:#}")]
    Comment {
        pr: u64,
        commit: String,
        cause: anyhow::Error,
    },
}

/// Render an error and its sources on one line, `outer: inner: root`.
pub fn chain(err: &(dyn StdError + 'static)) -> String {
    let mut out = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        out.push_str(": ");
        out.push_str(&cause.to_string());
        source = cause.source();
    }
    out
}
