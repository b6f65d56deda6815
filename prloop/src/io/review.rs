//! Review-system adapter backed by the `gh` CLI.
//!
//! The [`ReviewSystem`] trait is the narrow read/write contract the detector
//! and publisher depend on. Tests substitute an in-memory fake.

use std::process::{Command, Output};

use anyhow::Result;
use serde::Deserialize;
use tracing::{debug, instrument};

use crate::core::types::{MergeStateStatus, PullRequestSummary, ReviewDecision};
use crate::error::QueryError;

/// Fields requested from `gh pr list`.
const PR_FIELDS: &str =
    "number,title,headRefName,reviewDecision,mergeStateStatus,statusCheckRollup,isDraft";

/// Read/write access to the code-review system for the configured repository.
pub trait ReviewSystem {
    /// Fail unless calls can be authenticated.
    fn ensure_authenticated(&self) -> Result<(), QueryError>;

    /// Every open pull request, drafts included, in upstream order.
    fn list_open_pull_requests(&self) -> Result<Vec<PullRequestSummary>, QueryError>;

    /// Post a comment on a pull request.
    fn post_comment(&self, pr: u64, body: &str) -> Result<()>;
}

/// [`ReviewSystem`] that shells out to `gh` in the repository's directory.
#[derive(Debug, Clone)]
pub struct GhCli {
    workdir: std::path::PathBuf,
    list_limit: u32,
}

impl GhCli {
    pub fn new(workdir: impl Into<std::path::PathBuf>, list_limit: u32) -> Self {
        Self {
            workdir: workdir.into(),
            list_limit,
        }
    }

    fn run(&self, args: &[&str]) -> Result<Output, QueryError> {
        Command::new("gh")
            .args(args)
            .current_dir(&self.workdir)
            .output()
            .map_err(|source| QueryError::Spawn {
                command: describe(args),
                source,
            })
    }

    fn run_checked(&self, args: &[&str]) -> Result<Output, QueryError> {
        let output = self.run(args)?;
        if !output.status.success() {
            return Err(QueryError::Command {
                command: describe(args),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }
        Ok(output)
    }
}

impl ReviewSystem for GhCli {
    #[instrument(skip_all)]
    fn ensure_authenticated(&self) -> Result<(), QueryError> {
        let output = self.run(&["auth", "status"])?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(QueryError::Unauthenticated(stderr.trim().to_string()));
        }
        debug!("gh is authenticated");
        Ok(())
    }

    #[instrument(skip_all, fields(limit = self.list_limit))]
    fn list_open_pull_requests(&self) -> Result<Vec<PullRequestSummary>, QueryError> {
        let limit = self.list_limit.to_string();
        let args = [
            "pr", "list", "--state", "open", "--limit", &limit, "--json", PR_FIELDS,
        ];
        let output = self.run_checked(&args)?;
        let prs = parse_pr_list(&output.stdout).map_err(|source| QueryError::Malformed {
            command: describe(&args),
            source,
        })?;
        debug!(count = prs.len(), "listed open pull requests");
        Ok(prs)
    }

    #[instrument(skip_all, fields(pr = pr))]
    fn post_comment(&self, pr: u64, body: &str) -> Result<()> {
        let number = pr.to_string();
        self.run_checked(&["pr", "comment", &number, "--body", body])?;
        debug!(pr, "posted comment");
        Ok(())
    }
}

fn describe(args: &[&str]) -> String {
    let head: Vec<&str> = args.iter().take(2).copied().collect();
    format!("gh {}", head.join(" "))
}

/// Wire shape of one `gh pr list --json` entry.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GhPullRequest {
    number: u64,
    #[serde(default)]
    title: String,
    #[serde(default)]
    head_ref_name: String,
    #[serde(default)]
    review_decision: Option<String>,
    #[serde(default)]
    merge_state_status: Option<String>,
    #[serde(default)]
    status_check_rollup: Option<Vec<GhCheck>>,
    #[serde(default)]
    is_draft: bool,
}

/// A check run (`conclusion`) or a legacy commit status (`state`).
#[derive(Debug, Deserialize)]
struct GhCheck {
    #[serde(default)]
    conclusion: Option<String>,
    #[serde(default)]
    state: Option<String>,
}

impl GhCheck {
    fn outcome(self) -> Option<String> {
        self.conclusion
            .filter(|c| !c.is_empty())
            .or(self.state.filter(|s| !s.is_empty()))
    }
}

impl From<GhPullRequest> for PullRequestSummary {
    fn from(pr: GhPullRequest) -> Self {
        Self {
            number: pr.number,
            title: pr.title,
            branch: pr.head_ref_name,
            review_decision: ReviewDecision::parse(pr.review_decision.as_deref()),
            merge_state_status: MergeStateStatus::parse(pr.merge_state_status.as_deref()),
            ci_conclusions: pr
                .status_check_rollup
                .unwrap_or_default()
                .into_iter()
                .filter_map(GhCheck::outcome)
                .collect(),
            is_draft: pr.is_draft,
        }
    }
}

/// Parse `gh pr list --json` output.
pub fn parse_pr_list(raw: &[u8]) -> Result<Vec<PullRequestSummary>, serde_json::Error> {
    let prs: Vec<GhPullRequest> = serde_json::from_slice(raw)?;
    Ok(prs.into_iter().map(PullRequestSummary::from).collect())
}
