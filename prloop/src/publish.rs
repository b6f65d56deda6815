//! Publish working-copy changes as one commit on the PR branch.
//!
//! The sequence is commit, push, comment. Each step that fails leaves the
//! earlier steps in place, and the returned [`PublishError`] says which one
//! stopped the sequence.

use tracing::{info, instrument, warn};

use crate::core::types::PublishOutcome;
use crate::error::PublishError;
use crate::io::git::Git;
use crate::io::review::ReviewSystem;

/// Inputs for one publish attempt.
#[derive(Debug, Clone)]
pub struct PublishRequest<'a> {
    pub pr: u64,
    pub branch: &'a str,
    pub remote: &'a str,
    pub commit_message: &'a str,
    /// Comment text; the pushed commit id is appended.
    pub comment_body: &'a str,
}

/// Commit every pending change in `git`'s working copy, push it, and notify
/// the PR.
///
/// A clean working copy returns [`PublishOutcome::NoChanges`] without touching
/// the branch, the remote, or the PR.
#[instrument(skip_all, fields(pr = request.pr, branch = request.branch))]
pub fn publish<R: ReviewSystem + ?Sized>(
    git: &Git,
    review: &R,
    request: &PublishRequest<'_>,
) -> Result<PublishOutcome, PublishError> {
    if !git.has_uncommitted_changes().map_err(PublishError::Git)? {
        info!("working copy is clean, nothing to publish");
        return Ok(PublishOutcome::NoChanges);
    }

    let actual = git.current_branch().map_err(PublishError::Git)?;
    if actual != request.branch {
        return Err(PublishError::BranchMismatch {
            expected: request.branch.to_string(),
            actual,
        });
    }

    let ahead = git
        .commits_ahead_of_remote(request.remote, request.branch)
        .map_err(PublishError::Git)?;
    if ahead > 0 {
        return Err(PublishError::UnpublishedCommits {
            branch: request.branch.to_string(),
            ahead,
        });
    }

    git.add_all().map_err(PublishError::Git)?;
    if !git
        .commit_staged(request.commit_message)
        .map_err(PublishError::Git)?
    {
        warn!("changes vanished after staging");
        return Ok(PublishOutcome::NoChanges);
    }
    let commit = git.head_sha().map_err(PublishError::Git)?;
    info!(%commit, "committed remediation");

    git.push(request.remote, request.branch)
        .map_err(|cause| PublishError::Push {
            branch: request.branch.to_string(),
            commit: commit.clone(),
            cause,
        })?;
    info!(remote = request.remote, "pushed");

    let body = format!("{}\n\nCommit: {commit}", request.comment_body.trim_end());
    review
        .post_comment(request.pr, &body)
        .map_err(|cause| PublishError::Comment {
            pr: request.pr,
            commit: commit.clone(),
            cause,
        })?;
    info!("notified PR");

    Ok(PublishOutcome::Published { commit })
}
