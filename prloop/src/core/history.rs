//! Operator summaries derived by folding over the progress ledger.

use std::collections::BTreeSet;

use crate::core::types::ProgressRecord;

/// Number of trailing attempts listed by `show-progress-history`.
pub const RECENT_ATTEMPTS: usize = 10;

/// Aggregate view of the ledger.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistorySummary {
    /// Total attempts (ledger length).
    pub total: usize,
    /// Distinct `pr` values across all records.
    pub unique_prs: usize,
    /// The most recent attempts, oldest first.
    pub recent: Vec<ProgressRecord>,
}

pub fn summarize(records: &[ProgressRecord], recent_limit: usize) -> HistorySummary {
    HistorySummary {
        total: records.len(),
        unique_prs: unique_pr_count(records),
        recent: records[records.len().saturating_sub(recent_limit)..].to_vec(),
    }
}

pub fn unique_pr_count(records: &[ProgressRecord]) -> usize {
    records
        .iter()
        .map(|record| record.pr.as_str())
        .collect::<BTreeSet<_>>()
        .len()
}

const HEADERS: [&str; 4] = ["PR", "BRANCH", "TIMESTAMP", "STATUS"];

/// Render records as a left-aligned, space-padded table.
pub fn render_table(records: &[ProgressRecord]) -> String {
    let mut widths = HEADERS.map(str::len);
    for record in records {
        for (width, cell) in widths.iter_mut().zip(cells(record)) {
            *width = (*width).max(cell.len());
        }
    }

    let mut out = String::new();
    let rule = widths.map(|width| "-".repeat(width));
    push_row(&mut out, &widths, HEADERS);
    push_row(&mut out, &widths, rule.each_ref().map(String::as_str));
    for record in records {
        push_row(&mut out, &widths, cells(record));
    }
    out
}

/// Full report printed by `show-progress-history`.
pub fn render_report(records: &[ProgressRecord]) -> String {
    if records.is_empty() {
        return "No progress history found.\n".to_string();
    }
    let summary = summarize(records, RECENT_ATTEMPTS);
    let mut out = render_table(records);
    out.push_str(&format!("\nTotal attempts: {}\n", summary.total));
    out.push_str(&format!("Unique PRs: {}\n", summary.unique_prs));
    out.push_str(&format!("\nLast {} attempts:\n", summary.recent.len()));
    for record in &summary.recent {
        out.push_str(&format!(
            "  {}  PR #{} ({})  {}\n",
            display_or_dash(&record.timestamp),
            record.pr,
            record.branch,
            record.status
        ));
    }
    out
}

fn cells(record: &ProgressRecord) -> [&str; 4] {
    [
        record.pr.as_str(),
        record.branch.as_str(),
        display_or_dash(&record.timestamp),
        record.status.as_str(),
    ]
}

fn display_or_dash(value: &str) -> &str {
    if value.trim().is_empty() { "-" } else { value }
}

fn push_row(out: &mut String, widths: &[usize; 4], cells: [&str; 4]) {
    let mut line = String::new();
    for (i, (width, cell)) in widths.iter().copied().zip(cells).enumerate() {
        if i > 0 {
            line.push_str("  ");
        }
        line.push_str(&format!("{cell:<width$}"));
    }
    out.push_str(line.trim_end());
    out.push('\n');
}
