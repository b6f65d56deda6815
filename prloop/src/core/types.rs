//! Shared deterministic types for the remediation loop.
//!
//! These types define stable contracts between the detector, ledger,
//! scheduler and publisher. They do not depend on external state or I/O.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Review decision reported by the review system for a pull request.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ReviewDecision {
    Approved,
    ChangesRequested,
    NeedsWork,
    /// No decision recorded (or the upstream field was absent/empty).
    #[default]
    None,
    /// Any other upstream value (e.g. `REVIEW_REQUIRED`); never triggers attention.
    Other(String),
}

impl ReviewDecision {
    /// Parse an upstream value. Absent or blank input maps to `None`.
    pub fn parse(raw: Option<&str>) -> Self {
        match raw.map(str::trim).unwrap_or_default() {
            "" | "NONE" => Self::None,
            "APPROVED" => Self::Approved,
            "CHANGES_REQUESTED" => Self::ChangesRequested,
            "NEEDS_WORK" => Self::NeedsWork,
            other => Self::Other(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::Approved => "APPROVED",
            Self::ChangesRequested => "CHANGES_REQUESTED",
            Self::NeedsWork => "NEEDS_WORK",
            Self::None => "NONE",
            Self::Other(raw) => raw,
        }
    }

    /// True for decisions that ask the author for further work.
    pub fn requests_changes(&self) -> bool {
        matches!(self, Self::ChangesRequested | Self::NeedsWork)
    }
}

impl fmt::Display for ReviewDecision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Mergeability of a pull request relative to its base branch.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum MergeStateStatus {
    Behind,
    Clean,
    #[default]
    Unknown,
    /// Any other upstream value (`DIRTY`, `BLOCKED`, `UNSTABLE`, ...).
    Other(String),
}

impl MergeStateStatus {
    /// Parse an upstream value. Absent or blank input maps to `Unknown`.
    pub fn parse(raw: Option<&str>) -> Self {
        match raw.map(str::trim).unwrap_or_default() {
            "" | "UNKNOWN" => Self::Unknown,
            "BEHIND" => Self::Behind,
            "CLEAN" => Self::Clean,
            other => Self::Other(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::Behind => "BEHIND",
            Self::Clean => "CLEAN",
            Self::Unknown => "UNKNOWN",
            Self::Other(raw) => raw,
        }
    }
}

impl fmt::Display for MergeStateStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// CI conclusion that marks a check as failing.
pub const CI_FAILURE: &str = "FAILURE";

/// Snapshot of one open pull request, produced fresh every detection cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PullRequestSummary {
    pub number: u64,
    pub title: String,
    /// Source (head) branch name.
    pub branch: String,
    pub review_decision: ReviewDecision,
    pub merge_state_status: MergeStateStatus,
    /// Per-check conclusions in upstream order.
    pub ci_conclusions: Vec<String>,
    pub is_draft: bool,
}

impl PullRequestSummary {
    /// True if any check concluded with `FAILURE`. An empty list is not a failure.
    pub fn has_ci_failure(&self) -> bool {
        self.ci_conclusions.iter().any(|c| c == CI_FAILURE)
    }

    /// Comma-joined conclusions, as reported to operators.
    pub fn ci_status(&self) -> String {
        self.ci_conclusions.join(",")
    }

    /// Failing CI, a changes-requesting review, or a branch behind its base.
    pub fn needs_attention(&self) -> bool {
        self.has_ci_failure()
            || self.review_decision.requests_changes()
            || self.merge_state_status == MergeStateStatus::Behind
    }
}

/// Well-known progress status tokens. The ledger accepts any short token.
pub mod status {
    pub const SUCCESS: &str = "success";
    pub const FAILED: &str = "failed";
    pub const NO_CHANGES: &str = "no-changes";
    pub const PUBLISH_FAILED: &str = "publish-failed";
    pub const UNKNOWN: &str = "unknown";
}

fn default_status() -> String {
    status::UNKNOWN.to_string()
}

/// One remediation attempt, persisted as a single NDJSON line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressRecord {
    /// PR number as text.
    pub pr: String,
    pub branch: String,
    /// ISO-8601 UTC instant. Older or hand-edited entries may carry junk here.
    #[serde(default)]
    pub timestamp: String,
    #[serde(default = "default_status")]
    pub status: String,
}

impl ProgressRecord {
    pub fn new(
        pr: impl Into<String>,
        branch: impl Into<String>,
        timestamp: impl Into<String>,
        status: impl Into<String>,
    ) -> Self {
        Self {
            pr: pr.into(),
            branch: branch.into(),
            timestamp: timestamp.into(),
            status: status.into(),
        }
    }
}

/// Whether the delegate reported success.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DelegateStatus {
    Success,
    Failure,
}

/// Result of one delegate invocation that ran to completion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DelegateOutcome {
    pub status: DelegateStatus,
    /// Captured agent output (bounded).
    pub raw_output: String,
}

impl DelegateOutcome {
    pub fn succeeded(&self) -> bool {
        self.status == DelegateStatus::Success
    }
}

/// Result of a publish attempt that did not fail.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PublishOutcome {
    /// The working copy was clean; nothing was committed, pushed or posted.
    NoChanges,
    /// One commit was created, pushed, and announced on the PR.
    Published { commit: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    fn summary(ci: &[&str], review: ReviewDecision, merge: MergeStateStatus) -> PullRequestSummary {
        PullRequestSummary {
            number: 7,
            title: "t".to_string(),
            branch: "b".to_string(),
            review_decision: review,
            merge_state_status: merge,
            ci_conclusions: ci.iter().map(|c| c.to_string()).collect(),
            is_draft: false,
        }
    }

    #[test]
    fn quiet_pr_does_not_need_attention() {
        for merge in [
            MergeStateStatus::Clean,
            MergeStateStatus::Unknown,
            MergeStateStatus::Other("DIRTY".to_string()),
        ] {
            let pr = summary(&[], ReviewDecision::None, merge);
            assert!(!pr.has_ci_failure());
            assert!(!pr.needs_attention());
        }
    }

    #[test]
    fn any_failure_conclusion_needs_attention() {
        for review in [
            ReviewDecision::Approved,
            ReviewDecision::None,
            ReviewDecision::ChangesRequested,
        ] {
            let pr = summary(
                &["SUCCESS", "FAILURE", "SKIPPED"],
                review,
                MergeStateStatus::Clean,
            );
            assert!(pr.needs_attention());
        }
    }

    #[test]
    fn review_and_merge_signals_trigger_attention() {
        assert!(summary(&[], ReviewDecision::ChangesRequested, MergeStateStatus::Clean).needs_attention());
        assert!(summary(&[], ReviewDecision::NeedsWork, MergeStateStatus::Clean).needs_attention());
        assert!(summary(&[], ReviewDecision::Approved, MergeStateStatus::Behind).needs_attention());
        assert!(
            !summary(
                &["SUCCESS"],
                ReviewDecision::Other("REVIEW_REQUIRED".to_string()),
                MergeStateStatus::Clean
            )
            .needs_attention()
        );
    }

    #[test]
    fn parse_defaults_absent_values() {
        assert_eq!(ReviewDecision::parse(None), ReviewDecision::None);
        assert_eq!(ReviewDecision::parse(Some("")), ReviewDecision::None);
        assert_eq!(MergeStateStatus::parse(None), MergeStateStatus::Unknown);
        assert_eq!(
            MergeStateStatus::parse(Some("BLOCKED")).as_str(),
            "BLOCKED"
        );
    }

    #[test]
    fn progress_record_serializes_in_ledger_field_order() {
        let record = ProgressRecord::new("42", "fix-ci", "2026-01-02T03:04:05Z", "success");
        let line = serde_json::to_string(&record).expect("serialize");
        assert_eq!(
            line,
            r#"{"pr":"42","branch":"fix-ci","timestamp":"2026-01-02T03:04:05Z","status":"success"}"#
        );
    }

    #[test]
    fn progress_record_tolerates_missing_optional_fields() {
        let record: ProgressRecord =
            serde_json::from_str(r#"{"pr":"1","branch":"main"}"#).expect("parse");
        assert_eq!(record.timestamp, "");
        assert_eq!(record.status, status::UNKNOWN);
    }
}
