//! `prloop`: keep open pull requests green without a human in the loop.
//!
//! One-shot commands inspect PRs, record progress, and publish fixes; they are
//! what the delegated agent calls back into. `run-loop` drives the agent on a
//! schedule paced by the progress ledger.

use std::path::PathBuf;

use anyhow::{Context, Result};
use chrono::Utc;
use clap::{Parser, Subcommand};

use prloop::cli::{
    list_attention_prs, load_deployment, publish_changes, run_remediation_loop, self_invocation,
};
use prloop::exit_codes;
use prloop::history::{RecordArgs, record_progress, show_progress_history};
use prloop::io::git::Git;
use prloop::io::paths::resolve_root;
use prloop::io::review::GhCli;
use prloop::logging;

#[derive(Parser)]
#[command(
    name = "prloop",
    version,
    about = "Autonomous CI and review remediation loop for open pull requests"
)]
struct Cli {
    /// Deployment root holding `.prloop/`. Defaults to the main git checkout.
    #[arg(long, global = true, env = "PRLOOP_ROOT")]
    root: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Print open PRs with failing CI, requested changes, or a stale base as JSON.
    ListAttentionPrs,
    /// Append one remediation attempt to the progress ledger.
    RecordProgress {
        /// PR number.
        pr: String,
        /// PR head branch.
        branch: String,
        /// ISO-8601 instant; blank or omitted means now.
        timestamp: Option<String>,
        /// Outcome token such as success, failed, no-changes; defaults to unknown.
        status: Option<String>,
    },
    /// Show every recorded attempt with totals and the most recent ten.
    ShowProgressHistory,
    /// Commit, push, and announce pending changes in the current checkout.
    PublishChanges {
        /// PR number to notify.
        pr: u64,
        /// Branch the current checkout must be on.
        branch: String,
    },
    /// Detect, delegate, publish, and record on an adaptive schedule.
    RunLoop {
        /// Stop after this many cycles instead of running indefinitely.
        #[arg(long)]
        max_cycles: Option<u64>,
    },
}

fn main() {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(err) => {
            let code = if err.use_stderr() {
                exit_codes::FAILURE
            } else {
                exit_codes::OK
            };
            let _ = err.print();
            std::process::exit(code);
        }
    };

    let default_level = match cli.command {
        Command::RunLoop { .. } => "info",
        _ => "warn",
    };
    logging::init(default_level);

    if let Err(err) = run(cli) {
        eprintln!("error: {err:#}");
        std::process::exit(exit_codes::FAILURE);
    }
}

fn run(cli: Cli) -> Result<()> {
    let cwd = std::env::current_dir().context("read current directory")?;
    let root = resolve_root(cli.root.as_deref(), &cwd);
    let (paths, cfg) = load_deployment(&root)?;

    match cli.command {
        Command::ListAttentionPrs => {
            let review = GhCli::new(&cwd, cfg.pr_list_limit);
            print!("{}", list_attention_prs(&review)?);
        }
        Command::RecordProgress {
            pr,
            branch,
            timestamp,
            status,
        } => {
            let args = RecordArgs {
                pr,
                branch,
                timestamp,
                status,
            };
            print!("{}", record_progress(&paths, &args, Utc::now())?);
        }
        Command::ShowProgressHistory => {
            print!("{}", show_progress_history(&paths)?);
        }
        Command::PublishChanges { pr, branch } => {
            let review = GhCli::new(&cwd, cfg.pr_list_limit);
            let git = Git::new(&cwd);
            print!("{}", publish_changes(&cfg, &git, &review, pr, &branch)?);
        }
        Command::RunLoop { max_cycles } => {
            run_remediation_loop(&paths, &cfg, &self_invocation(), max_cycles)?;
        }
    }
    Ok(())
}
