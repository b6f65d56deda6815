//! Prompt rendering for the remediation delegate.

use anyhow::{Context, Result};
use minijinja::{Environment, context};
use serde::Serialize;

use crate::core::types::PullRequestSummary;

const REMEDIATE_TEMPLATE: &str = include_str!("prompts/remediate.md");

/// PR fields exposed to the template.
#[derive(Debug, Clone, Serialize)]
struct PrContext {
    number: u64,
    title: String,
    branch: String,
    ci_status: String,
    has_ci_failure: bool,
    review_decision: String,
    merge_state_status: String,
}

impl From<&PullRequestSummary> for PrContext {
    fn from(pr: &PullRequestSummary) -> Self {
        Self {
            number: pr.number,
            title: pr.title.clone(),
            branch: pr.branch.clone(),
            ci_status: pr.ci_status(),
            has_ci_failure: pr.has_ci_failure(),
            review_decision: pr.review_decision.to_string(),
            merge_state_status: pr.merge_state_status.to_string(),
        }
    }
}

/// Render the delegate prompt.
///
/// `prs` is `None` when detection was unavailable this cycle; the agent is
/// then told to run the attention query itself. `bin` is how the agent should
/// invoke this tool.
pub fn render_remediation_prompt(prs: Option<&[PullRequestSummary]>, bin: &str) -> Result<String> {
    let mut env = Environment::new();
    env.add_template("remediate", REMEDIATE_TEMPLATE)
        .context("load remediation template")?;
    let template = env.get_template("remediate")?;
    let prs: Option<Vec<PrContext>> = prs.map(|prs| prs.iter().map(PrContext::from).collect());
    let rendered = template
        .render(context! {
            prs => prs,
            bin => bin,
        })
        .context("render remediation prompt")?;
    Ok(rendered)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::{MergeStateStatus, ReviewDecision};

    fn pr(number: u64, ci: &[&str]) -> PullRequestSummary {
        PullRequestSummary {
            number,
            title: format!("Title {number}"),
            branch: format!("feature-{number}"),
            review_decision: ReviewDecision::ChangesRequested,
            merge_state_status: MergeStateStatus::Clean,
            ci_conclusions: ci.iter().map(|c| c.to_string()).collect(),
            is_draft: false,
        }
    }

    #[test]
    fn lists_each_pr_with_signals() {
        let prs = vec![pr(5, &["SUCCESS", "FAILURE"]), pr(8, &[])];
        let prompt = render_remediation_prompt(Some(&prs), "prloop").expect("render");
        assert!(prompt.contains("PR #5: Title 5"));
        assert!(prompt.contains("`feature-5`"));
        assert!(prompt.contains("CI: SUCCESS,FAILURE (failing)"));
        assert!(prompt.contains("PR #8: Title 8"));
        assert!(prompt.contains("CI: no checks reported"));
        assert!(prompt.contains("review decision: CHANGES_REQUESTED"));
        assert!(prompt.contains("prloop publish-changes"));
    }

    #[test]
    fn unavailable_detection_defers_to_agent() {
        let prompt = render_remediation_prompt(None, "/usr/bin/prloop").expect("render");
        assert!(prompt.contains("/usr/bin/prloop list-attention-prs"));
        assert!(!prompt.contains("PR #"));
    }
}
