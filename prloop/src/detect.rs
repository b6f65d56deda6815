//! Attention detection: query open PRs and keep the ones that need work.

use tracing::{debug, info, instrument};

use crate::core::attention::filter_attention;
use crate::core::types::PullRequestSummary;
use crate::error::QueryError;
use crate::io::review::ReviewSystem;

/// Open, non-draft pull requests with failing CI, a changes-requesting
/// review, or a branch behind its base, in the order the review system
/// returned them.
#[instrument(skip_all)]
pub fn detect<R: ReviewSystem + ?Sized>(
    review: &R,
) -> Result<Vec<PullRequestSummary>, QueryError> {
    let open = review.list_open_pull_requests()?;
    let total = open.len();
    let attention = filter_attention(open);
    debug!(
        numbers = ?attention.iter().map(|pr| pr.number).collect::<Vec<_>>(),
        "attention set"
    );
    info!(open = total, attention = attention.len(), "detected PRs");
    Ok(attention)
}
