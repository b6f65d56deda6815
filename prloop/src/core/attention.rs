//! Attention classification and the operator-facing report rows.

use serde::Serialize;

use crate::core::types::PullRequestSummary;

/// Keep non-draft PRs that need attention, preserving upstream order.
pub fn filter_attention(prs: Vec<PullRequestSummary>) -> Vec<PullRequestSummary> {
    prs.into_iter()
        .filter(|pr| !pr.is_draft && pr.needs_attention())
        .collect()
}

/// One entry of the `list-attention-prs` JSON array.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AttentionRow {
    pub number: u64,
    pub title: String,
    pub head_ref_name: String,
    pub review_decision: String,
    pub merge_state_status: String,
    pub ci_status: String,
    pub has_ci_failure: bool,
    pub needs_attention: bool,
}

impl From<&PullRequestSummary> for AttentionRow {
    fn from(pr: &PullRequestSummary) -> Self {
        Self {
            number: pr.number,
            title: pr.title.clone(),
            head_ref_name: pr.branch.clone(),
            review_decision: pr.review_decision.as_str().to_string(),
            merge_state_status: pr.merge_state_status.as_str().to_string(),
            ci_status: pr.ci_status(),
            has_ci_failure: pr.has_ci_failure(),
            needs_attention: pr.needs_attention(),
        }
    }
}

/// Build report rows for the given PRs.
pub fn attention_rows(prs: &[PullRequestSummary]) -> Vec<AttentionRow> {
    prs.iter().map(AttentionRow::from).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::{MergeStateStatus, ReviewDecision};

    fn pr(
        number: u64,
        ci: &[&str],
        review: ReviewDecision,
        merge: MergeStateStatus,
        is_draft: bool,
    ) -> PullRequestSummary {
        PullRequestSummary {
            number,
            title: format!("pr {number}"),
            branch: format!("branch-{number}"),
            review_decision: review,
            merge_state_status: merge,
            ci_conclusions: ci.iter().map(|c| c.to_string()).collect(),
            is_draft,
        }
    }

    #[test]
    fn keeps_failing_and_behind_prs_in_order() {
        let prs = vec![
            pr(1, &["FAILURE"], ReviewDecision::None, MergeStateStatus::Clean, false),
            pr(2, &[], ReviewDecision::Approved, MergeStateStatus::Clean, false),
            pr(3, &[], ReviewDecision::None, MergeStateStatus::Behind, false),
        ];

        let numbers: Vec<u64> = filter_attention(prs).iter().map(|p| p.number).collect();
        assert_eq!(numbers, vec![1, 3]);
    }

    #[test]
    fn drafts_never_reported() {
        let prs = vec![pr(
            9,
            &["FAILURE"],
            ReviewDecision::ChangesRequested,
            MergeStateStatus::Behind,
            true,
        )];
        assert!(filter_attention(prs).is_empty());
    }

    #[test]
    fn row_serializes_with_camel_case_keys() {
        let summary = pr(
            4,
            &["SUCCESS", "FAILURE"],
            ReviewDecision::ChangesRequested,
            MergeStateStatus::Unknown,
            false,
        );
        let value = serde_json::to_value(AttentionRow::from(&summary)).expect("serialize");
        assert_eq!(
            value,
            serde_json::json!({
                "number": 4,
                "title": "pr 4",
                "headRefName": "branch-4",
                "reviewDecision": "CHANGES_REQUESTED",
                "mergeStateStatus": "UNKNOWN",
                "ciStatus": "SUCCESS,FAILURE",
                "hasCiFailure": true,
                "needsAttention": true
            })
        );
    }
}
