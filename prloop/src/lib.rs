//! Autonomous remediation loop for open pull requests.
//!
//! The loop finds PRs with failing CI, a changes-requesting review, or a
//! branch behind its base, hands them to an external coding agent, publishes
//! whatever the agent changed, and records every attempt in an append-only
//! ledger that also paces the next cycle.
//!
//! - **[`core`]**: Pure, deterministic logic (attention predicate, backoff,
//!   history summaries). No I/O.
//! - **[`io`]**: Side effects (config, git, `gh`, subprocesses, the ledger).
//!   Each external system sits behind a trait or a small wrapper so tests can
//!   substitute fakes.
//!
//! Orchestration modules ([`detect`], [`publish`], [`looping`], [`history`],
//! [`cli`]) combine the two to implement the CLI commands.

pub mod cli;
pub mod core;
pub mod detect;
pub mod error;
pub mod exit_codes;
pub mod history;
pub mod io;
pub mod logging;
pub mod looping;
pub mod publish;
#[cfg(any(test, feature = "test-support"))]
pub mod test_support;
