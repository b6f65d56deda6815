//! Test-only fakes for the review system, delegate and sleeper, plus a
//! throwaway git checkout wired to a local bare remote.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::time::Duration;

use anyhow::{Context, Result, anyhow, bail};
use tempfile::TempDir;

use crate::core::types::{
    DelegateOutcome, DelegateStatus, MergeStateStatus, PullRequestSummary, ReviewDecision,
};
use crate::error::{DelegateError, QueryError};
use crate::io::delegate::{Delegate, DelegateRequest};
use crate::io::review::ReviewSystem;
use crate::looping::Sleeper;

/// Build a PR summary with deterministic title and branch.
pub fn pr(
    number: u64,
    ci: &[&str],
    review: ReviewDecision,
    merge: MergeStateStatus,
) -> PullRequestSummary {
    PullRequestSummary {
        number,
        title: format!("PR {number}"),
        branch: format!("branch-{number}"),
        review_decision: review,
        merge_state_status: merge,
        ci_conclusions: ci.iter().map(|c| c.to_string()).collect(),
        is_draft: false,
    }
}

/// Failing-CI PR on an explicit branch.
pub fn failing_pr(number: u64, branch: &str) -> PullRequestSummary {
    PullRequestSummary {
        branch: branch.to_string(),
        ..pr(
            number,
            &["FAILURE"],
            ReviewDecision::None,
            MergeStateStatus::Clean,
        )
    }
}

/// In-memory review system that records every comment.
#[derive(Debug, Default)]
pub struct FakeReview {
    pub prs: RefCell<Vec<PullRequestSummary>>,
    pub unauthenticated: bool,
    pub query_fails: RefCell<bool>,
    pub comment_fails: bool,
    pub comments: RefCell<Vec<(u64, String)>>,
    pub queries: RefCell<u32>,
}

impl FakeReview {
    pub fn with_prs(prs: Vec<PullRequestSummary>) -> Self {
        Self {
            prs: RefCell::new(prs),
            ..Self::default()
        }
    }

    pub fn comments(&self) -> Vec<(u64, String)> {
        self.comments.borrow().clone()
    }
}

impl ReviewSystem for FakeReview {
    fn ensure_authenticated(&self) -> Result<(), QueryError> {
        if self.unauthenticated {
            return Err(QueryError::Unauthenticated("not logged in".to_string()));
        }
        Ok(())
    }

    fn list_open_pull_requests(&self) -> Result<Vec<PullRequestSummary>, QueryError> {
        *self.queries.borrow_mut() += 1;
        if *self.query_fails.borrow() {
            return Err(QueryError::Command {
                command: "gh pr list".to_string(),
                stderr: "network unreachable".to_string(),
            });
        }
        Ok(self.prs.borrow().clone())
    }

    fn post_comment(&self, pr: u64, body: &str) -> Result<()> {
        if self.comment_fails {
            bail!("comment rejected");
        }
        self.comments.borrow_mut().push((pr, body.to_string()));
        Ok(())
    }
}

/// What a scripted delegate invocation does.
#[derive(Debug, Clone)]
pub enum ScriptedResult {
    Success,
    Failure,
    Error,
}

/// One scripted invocation: files written into the workdir, then a result.
#[derive(Debug, Clone)]
pub struct ScriptedInvoke {
    pub result: ScriptedResult,
    pub writes: Vec<(String, String)>,
}

impl ScriptedInvoke {
    pub fn success() -> Self {
        Self {
            result: ScriptedResult::Success,
            writes: Vec::new(),
        }
    }

    pub fn failure() -> Self {
        Self {
            result: ScriptedResult::Failure,
            writes: Vec::new(),
        }
    }

    pub fn error() -> Self {
        Self {
            result: ScriptedResult::Error,
            writes: Vec::new(),
        }
    }

    pub fn writing(mut self, path: &str, contents: &str) -> Self {
        self.writes.push((path.to_string(), contents.to_string()));
        self
    }
}

/// Delegate that replays queued invocations and remembers every request.
#[derive(Debug, Default)]
pub struct ScriptedDelegate {
    queue: RefCell<VecDeque<ScriptedInvoke>>,
    pub requests: RefCell<Vec<DelegateRequest>>,
}

impl ScriptedDelegate {
    pub fn new(invocations: Vec<ScriptedInvoke>) -> Self {
        Self {
            queue: RefCell::new(invocations.into()),
            requests: RefCell::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> usize {
        self.requests.borrow().len()
    }
}

impl Delegate for ScriptedDelegate {
    fn invoke(&self, request: &DelegateRequest) -> Result<DelegateOutcome, DelegateError> {
        self.requests.borrow_mut().push(request.clone());
        let step = self
            .queue
            .borrow_mut()
            .pop_front()
            .ok_or_else(|| DelegateError::Run(anyhow!("no scripted invocation left")))?;
        for (path, contents) in &step.writes {
            fs::write(request.workdir.join(path), contents)
                .map_err(|err| DelegateError::Run(err.into()))?;
        }
        match step.result {
            ScriptedResult::Success => Ok(DelegateOutcome {
                status: DelegateStatus::Success,
                raw_output: "done".to_string(),
            }),
            ScriptedResult::Failure => Ok(DelegateOutcome {
                status: DelegateStatus::Failure,
                raw_output: "gave up".to_string(),
            }),
            ScriptedResult::Error => Err(DelegateError::Run(anyhow!("agent crashed"))),
        }
    }
}

/// Sleeper that records requested delays instead of blocking.
#[derive(Debug, Default)]
pub struct RecordingSleeper {
    pub delays: RefCell<Vec<Duration>>,
}

impl Sleeper for RecordingSleeper {
    fn sleep(&self, duration: Duration) {
        self.delays.borrow_mut().push(duration);
    }
}

/// A working clone on `branch` that tracks a bare `origin` in the same tempdir.
pub struct TestRepo {
    temp: TempDir,
    remote: PathBuf,
    work: PathBuf,
    branch: String,
}

impl TestRepo {
    pub fn new(branch: &str) -> Result<Self> {
        let temp = tempfile::tempdir().context("tempdir")?;
        let remote = temp.path().join("origin.git");
        let work = temp.path().join("work");

        git(temp.path(), &["init", "--bare", "--quiet", path_str(&remote)?])?;
        git(temp.path(), &["init", "--quiet", path_str(&work)?])?;
        git(&work, &["config", "user.email", "loop@example.com"])?;
        git(&work, &["config", "user.name", "Remediation Loop"])?;
        git(&work, &["config", "commit.gpgsign", "false"])?;
        git(&work, &["remote", "add", "origin", path_str(&remote)?])?;
        git(&work, &["checkout", "--quiet", "-b", "main"])?;
        fs::write(work.join("README.md"), "hello\n").context("write README")?;
        git(&work, &["add", "-A"])?;
        git(&work, &["commit", "--quiet", "-m", "initial"])?;
        git(&work, &["push", "--quiet", "-u", "origin", "main"])?;
        git(&work, &["checkout", "--quiet", "-b", branch])?;
        git(&work, &["push", "--quiet", "-u", "origin", branch])?;

        Ok(Self {
            temp,
            remote,
            work,
            branch: branch.to_string(),
        })
    }

    /// Working copy root.
    pub fn path(&self) -> &Path {
        &self.work
    }

    pub fn write_file(&self, rel: &str, contents: &str) -> Result<()> {
        fs::write(self.work.join(rel), contents).with_context(|| format!("write {rel}"))
    }

    /// Commits on the branch in the working copy.
    pub fn local_commit_count(&self) -> Result<u32> {
        count(&git(&self.work, &["rev-list", "--count", "HEAD"])?)
    }

    /// Commits on the branch as seen by the bare remote.
    pub fn remote_commit_count(&self) -> Result<u32> {
        let out = git(&self.remote, &["rev-list", "--count", &self.branch])?;
        count(&out)
    }

    /// Advance the remote branch behind the working copy's back.
    pub fn push_conflicting_commit(&self) -> Result<()> {
        let other = self.temp.path().join("other");
        git(
            self.temp.path(),
            &[
                "clone",
                "--quiet",
                "--branch",
                &self.branch,
                path_str(&self.remote)?,
                path_str(&other)?,
            ],
        )?;
        git(&other, &["config", "user.email", "other@example.com"])?;
        git(&other, &["config", "user.name", "Someone Else"])?;
        git(&other, &["config", "commit.gpgsign", "false"])?;
        fs::write(other.join("CONFLICT.md"), "theirs\n").context("write conflict")?;
        git(&other, &["add", "-A"])?;
        git(&other, &["commit", "--quiet", "-m", "concurrent change"])?;
        git(&other, &["push", "--quiet", "origin", &self.branch])?;
        Ok(())
    }
}

fn path_str(path: &Path) -> Result<&str> {
    path.to_str()
        .ok_or_else(|| anyhow!("non-utf8 path {}", path.display()))
}

fn count(raw: &str) -> Result<u32> {
    raw.trim()
        .parse()
        .with_context(|| format!("parse count '{}'", raw.trim()))
}

fn git(dir: &Path, args: &[&str]) -> Result<String> {
    let output = Command::new("git")
        .args(args)
        .current_dir(dir)
        .output()
        .with_context(|| format!("spawn git {}", args.join(" ")))?;
    if !output.status.success() {
        bail!(
            "git {} failed: {}",
            args.join(" "),
            String::from_utf8_lossy(&output.stderr).trim()
        );
    }
    Ok(String::from_utf8_lossy(&output.stdout).to_string())
}
