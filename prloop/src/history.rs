//! `record-progress` and `show-progress-history`.

use anyhow::{Result, bail};
use chrono::{DateTime, Utc};
use tracing::warn;

use crate::core::backoff::{format_timestamp, parse_timestamp};
use crate::core::history::render_report;
use crate::core::types::{ProgressRecord, status};
use crate::error::chain;
use crate::io::ledger::Ledger;
use crate::io::paths::DeploymentPaths;

/// Arguments of one `record-progress` call. Blank optionals take defaults.
#[derive(Debug, Clone, Default)]
pub struct RecordArgs {
    pub pr: String,
    pub branch: String,
    pub timestamp: Option<String>,
    pub status: Option<String>,
}

/// Append one record and return the confirmation text.
pub fn record_progress(
    paths: &DeploymentPaths,
    args: &RecordArgs,
    now: DateTime<Utc>,
) -> Result<String> {
    if args.pr.trim().is_empty() || args.branch.trim().is_empty() {
        bail!("usage: record-progress <pr-number> <branch> [timestamp] [status]");
    }
    let at = match non_blank(args.timestamp.as_deref()) {
        Some(raw) => match parse_timestamp(raw) {
            Some(at) => at,
            None => bail!("timestamp '{raw}' is not ISO-8601"),
        },
        None => now,
    };
    let timestamp = format_timestamp(at);
    let status = non_blank(args.status.as_deref()).unwrap_or(status::UNKNOWN);
    let record = ProgressRecord::new(args.pr.trim(), args.branch.trim(), timestamp, status);

    paths.ensure_state_dir()?;
    let ledger = Ledger::new(&paths.ledger_path);
    ledger.append(&record)?;

    let mut out = format!(
        "Recorded PR #{} on {}: {} at {}\n",
        record.pr, record.branch, record.status, record.timestamp
    );
    // The record is durable here; the total is best-effort.
    match ledger.read_all() {
        Ok(records) => out.push_str(&format!("Total attempts recorded: {}\n", records.len())),
        Err(err) => warn!(
            error = %chain(&err),
            "recorded, but could not count ledger entries"
        ),
    }
    Ok(out)
}

/// Render the full ledger report. An absent or empty ledger is not an error.
pub fn show_progress_history(paths: &DeploymentPaths) -> Result<String> {
    let records = Ledger::new(&paths.ledger_path).read_all()?;
    Ok(render_report(&records))
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}
