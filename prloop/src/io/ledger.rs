//! Append-only progress ledger (`.prloop/progress.jsonl`).
//!
//! One JSON object per line. Records are never rewritten; every aggregate is
//! derived by reading the file back.

use std::fs::{self, File, OpenOptions};
use std::io::{BufRead, BufReader, ErrorKind, Write};
use std::path::{Path, PathBuf};

use fs2::FileExt;
use tracing::{debug, instrument, warn};

use crate::core::types::ProgressRecord;
use crate::error::LedgerError;

/// Handle to a ledger file. The file is created on first append.
#[derive(Debug, Clone)]
pub struct Ledger {
    path: PathBuf,
}

impl Ledger {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Durably append one record.
    ///
    /// The line is written under an exclusive file lock and synced before
    /// returning, so concurrent appenders never interleave partial lines.
    #[instrument(skip_all, fields(pr = %record.pr, branch = %record.branch, status = %record.status))]
    pub fn append(&self, record: &ProgressRecord) -> Result<(), LedgerError> {
        validate_record(record)?;
        let mut line = serde_json::to_string(record)?;
        line.push('\n');

        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(|source| self.write_err(source))?;
        }
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(|source| self.write_err(source))?;
        file.lock_exclusive().map_err(|source| self.write_err(source))?;
        let written = file
            .write_all(line.as_bytes())
            .and_then(|()| file.sync_data());
        let unlocked = FileExt::unlock(&file);
        written.map_err(|source| self.write_err(source))?;
        if let Err(err) = unlocked {
            warn!(err = %err, "failed to release ledger lock");
        }
        debug!(path = %self.path.display(), "appended progress record");
        Ok(())
    }

    /// Read every record in append order. A missing ledger is empty.
    ///
    /// Lines that are not valid records are skipped with a warning.
    pub fn read_all(&self) -> Result<Vec<ProgressRecord>, LedgerError> {
        let file = match File::open(&self.path) {
            Ok(file) => file,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(source) => return Err(self.read_err(source)),
        };
        let mut records = Vec::new();
        // Split on raw bytes so one corrupt line cannot fail the whole read.
        for (idx, line) in BufReader::new(file).split(b'\n').enumerate() {
            let line = line.map_err(|source| self.read_err(source))?;
            if line.trim_ascii().is_empty() {
                continue;
            }
            match serde_json::from_slice::<ProgressRecord>(&line) {
                Ok(record) => records.push(record),
                Err(err) => warn!(
                    path = %self.path.display(),
                    line = idx + 1,
                    err = %err,
                    "skipping malformed ledger line"
                ),
            }
        }
        Ok(records)
    }

    /// The most recently appended record, if any.
    pub fn read_last(&self) -> Result<Option<ProgressRecord>, LedgerError> {
        Ok(self.read_all()?.pop())
    }

    fn write_err(&self, source: std::io::Error) -> LedgerError {
        LedgerError::Write {
            path: self.path.clone(),
            source,
        }
    }

    fn read_err(&self, source: std::io::Error) -> LedgerError {
        LedgerError::Read {
            path: self.path.clone(),
            source,
        }
    }
}

fn validate_record(record: &ProgressRecord) -> Result<(), LedgerError> {
    if record.pr.trim().is_empty() {
        return Err(LedgerError::InvalidRecord("pr must be non-empty".to_string()));
    }
    if record.branch.trim().is_empty() {
        return Err(LedgerError::InvalidRecord(
            "branch must be non-empty".to_string(),
        ));
    }
    if record.pr.contains('\n') || record.branch.contains('\n') {
        return Err(LedgerError::InvalidRecord(
            "pr and branch must be single-line".to_string(),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::status;

    fn record(pr: &str, status: &str) -> ProgressRecord {
        ProgressRecord::new(pr, "fix-ci", "2026-04-01T12:00:00Z", status)
    }

    #[test]
    fn append_then_read_preserves_order() {
        let temp = tempfile::tempdir().expect("tempdir");
        let ledger = Ledger::new(temp.path().join("nested/dir/progress.jsonl"));
        let records = vec![
            record("1", status::FAILED),
            record("2", status::SUCCESS),
            record("1", status::NO_CHANGES),
        ];
        for r in &records {
            ledger.append(r).expect("append");
        }

        assert_eq!(ledger.read_all().expect("read"), records);
        assert_eq!(ledger.read_last().expect("last"), records.last().cloned());
    }

    #[test]
    fn missing_ledger_reads_empty() {
        let temp = tempfile::tempdir().expect("tempdir");
        let ledger = Ledger::new(temp.path().join("progress.jsonl"));
        assert!(ledger.read_all().expect("read").is_empty());
        assert_eq!(ledger.read_last().expect("last"), None);
        assert!(!ledger.path().exists());
    }

    #[test]
    fn rejects_blank_required_fields_without_writing() {
        let temp = tempfile::tempdir().expect("tempdir");
        let ledger = Ledger::new(temp.path().join("progress.jsonl"));

        let err = ledger
            .append(&ProgressRecord::new(" ", "fix-ci", "", "unknown"))
            .unwrap_err();
        assert!(matches!(err, LedgerError::InvalidRecord(_)));
        let err = ledger
            .append(&ProgressRecord::new("42", "", "", "unknown"))
            .unwrap_err();
        assert!(matches!(err, LedgerError::InvalidRecord(_)));
        assert!(!ledger.path().exists());
    }

    #[test]
    fn writes_one_json_object_per_line() {
        let temp = tempfile::tempdir().expect("tempdir");
        let ledger = Ledger::new(temp.path().join("progress.jsonl"));
        ledger.append(&record("7", status::SUCCESS)).expect("append");
        let contents = fs::read_to_string(ledger.path()).expect("read");
        assert_eq!(
            contents,
            "{\"pr\":\"7\",\"branch\":\"fix-ci\",\"timestamp\":\"2026-04-01T12:00:00Z\",\"status\":\"success\"}\n"
        );
    }

    #[test]
    fn concurrent_appends_never_interleave() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("progress.jsonl");
        let handles: Vec<_> = (0..8)
            .map(|worker| {
                let ledger = Ledger::new(&path);
                std::thread::spawn(move || {
                    for attempt in 0..25 {
                        let record = ProgressRecord::new(
                            format!("{worker}"),
                            format!("branch-{worker}-{attempt}"),
                            "2026-04-01T12:00:00Z",
                            status::UNKNOWN,
                        );
                        ledger.append(&record).expect("append");
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().expect("join");
        }

        let contents = fs::read_to_string(&path).expect("read");
        assert_eq!(contents.lines().count(), 200);
        assert_eq!(Ledger::new(&path).read_all().expect("parse").len(), 200);
    }

    #[test]
    fn skips_malformed_lines() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("progress.jsonl");
        fs::write(
            &path,
            "{\"pr\":\"1\",\"branch\":\"a\",\"timestamp\":\"t\",\"status\":\"s\"}\nnot json\n\n{\"pr\":\"2\",\"branch\":\"b\"}\n",
        )
        .expect("seed");
        let records = Ledger::new(&path).read_all().expect("read");
        let prs: Vec<&str> = records.iter().map(|r| r.pr.as_str()).collect();
        assert_eq!(prs, vec!["1", "2"]);
        assert_eq!(records[1].status, status::UNKNOWN);
    }

    #[test]
    fn non_utf8_line_is_skipped_like_any_malformed_line() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("progress.jsonl");
        let mut seed = b"{\"pr\":\"1\",\"branch\":\"a\",\"timestamp\":\"t\",\"status\":\"s\"}\n".to_vec();
        seed.extend_from_slice(b"\xff\xfe garbage\n");
        seed.extend_from_slice(b"{\"pr\":\"2\",\"branch\":\"b\",\"timestamp\":\"t\",\"status\":\"s\"}\n");
        fs::write(&path, seed).expect("seed");

        let ledger = Ledger::new(&path);
        let prs: Vec<String> = ledger
            .read_all()
            .expect("read")
            .into_iter()
            .map(|r| r.pr)
            .collect();
        assert_eq!(prs, vec!["1", "2"]);

        ledger.append(&record("3", status::SUCCESS)).expect("append");
        assert_eq!(ledger.read_all().expect("read").len(), 3);
    }

    #[test]
    fn unwritable_location_is_write_failure() {
        let temp = tempfile::tempdir().expect("tempdir");
        let blocker = temp.path().join("blocker");
        fs::write(&blocker, "file, not dir").expect("seed");
        let ledger = Ledger::new(blocker.join("progress.jsonl"));
        let err = ledger.append(&record("1", status::SUCCESS)).unwrap_err();
        assert!(matches!(err, LedgerError::Write { .. }));
    }
}
