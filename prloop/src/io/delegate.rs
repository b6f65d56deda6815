//! Delegate abstraction for the external coding agent.
//!
//! The [`Delegate`] trait decouples the control loop from the actual agent
//! backend (a configurable command, `codex exec` by default). Tests use
//! scripted delegates that return predetermined outcomes without spawning
//! processes.

use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::time::Duration;

use anyhow::Context;
use tracing::{debug, info, instrument, warn};

use crate::core::types::{DelegateOutcome, DelegateStatus};
use crate::error::DelegateError;
use crate::io::process::{CommandOutput, RunOptions, run_command};

/// Parameters for one delegate invocation.
#[derive(Debug, Clone)]
pub struct DelegateRequest {
    /// Working copy the agent is allowed to modify.
    pub workdir: PathBuf,
    /// Prompt fed to the agent on stdin.
    pub prompt: String,
    /// Where the invocation's stdout/stderr is logged.
    pub log_path: PathBuf,
    /// Optional wall-clock ceiling; `None` lets the agent run as long as it needs.
    pub ceiling: Option<Duration>,
    /// Truncate captured output beyond this many bytes.
    pub output_limit_bytes: usize,
}

/// Opaque remediation capability: run the agent once against a working copy.
pub trait Delegate {
    fn invoke(&self, request: &DelegateRequest) -> Result<DelegateOutcome, DelegateError>;
}

/// Delegate that spawns a configured command and pipes the prompt to it.
#[derive(Debug, Clone)]
pub struct CommandDelegate {
    command: Vec<String>,
}

impl CommandDelegate {
    pub fn new(command: Vec<String>) -> Self {
        Self { command }
    }
}

impl Delegate for CommandDelegate {
    #[instrument(skip_all, fields(program = self.command.first().map(String::as_str), ceiling_secs = request.ceiling.map(|c| c.as_secs())))]
    fn invoke(&self, request: &DelegateRequest) -> Result<DelegateOutcome, DelegateError> {
        let (program, args) = self
            .command
            .split_first()
            .ok_or(DelegateError::EmptyCommand)?;
        info!(workdir = %request.workdir.display(), "starting delegate");

        let mut cmd = Command::new(program);
        cmd.args(args).current_dir(&request.workdir);

        let output = run_command(
            cmd,
            &RunOptions {
                stdin: Some(request.prompt.as_bytes()),
                ceiling: request.ceiling,
                output_limit_bytes: request.output_limit_bytes,
                stream_path: Some(request.log_path.as_path()),
            },
        )
        .with_context(|| format!("run {program}"))
        .map_err(DelegateError::Run)?;

        // Replaces the live stdout stream with the complete, bounded record.
        write_delegate_log(&request.log_path, &output, request.output_limit_bytes)
            .map_err(DelegateError::Run)?;

        if output.timed_out
            && let Some(ceiling) = request.ceiling
        {
            warn!(ceiling_secs = ceiling.as_secs(), "delegate exceeded ceiling");
            return Err(DelegateError::TimedOut(ceiling));
        }

        let raw_output = String::from_utf8_lossy(&output.stdout).to_string();
        if !output.status.success() {
            warn!(exit_code = ?output.status.code(), "delegate exited unsuccessfully");
            return Ok(DelegateOutcome {
                status: DelegateStatus::Failure,
                raw_output,
            });
        }

        debug!("delegate completed successfully");
        Ok(DelegateOutcome {
            status: DelegateStatus::Success,
            raw_output,
        })
    }
}

fn write_delegate_log(
    path: &Path,
    output: &CommandOutput,
    output_limit: usize,
) -> anyhow::Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("create delegate log dir {}", parent.display()))?;
    }
    let mut buf = String::new();
    buf.push_str(&format!("=== exit: {:?} ===\n", output.status.code()));
    buf.push_str("=== stdout ===\n");
    buf.push_str(&String::from_utf8_lossy(&output.stdout));
    buf.push_str(&output.stdout_truncated_notice("delegate"));
    buf.push_str("\n=== stderr ===\n");
    buf.push_str(&String::from_utf8_lossy(&output.stderr));
    buf.push_str(&output.stderr_truncated_notice("delegate"));
    if output.timed_out {
        buf.push_str("\n[delegate exceeded ceiling]\n");
    }

    if buf.len() > output_limit {
        let cut = floor_char_boundary(&buf, output_limit);
        let truncated = format!("{}\n[truncated {} bytes]\n", &buf[..cut], buf.len() - cut);
        return fs::write(path, truncated)
            .with_context(|| format!("write delegate log {}", path.display()));
    }

    fs::write(path, buf).with_context(|| format!("write delegate log {}", path.display()))
}

fn floor_char_boundary(s: &str, mut idx: usize) -> usize {
    while idx > 0 && !s.is_char_boundary(idx) {
        idx -= 1;
    }
    idx
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(temp: &Path, ceiling: Option<Duration>) -> DelegateRequest {
        DelegateRequest {
            workdir: temp.to_path_buf(),
            prompt: "fix the build".to_string(),
            log_path: temp.join("logs/delegate.log"),
            ceiling,
            output_limit_bytes: 10_000,
        }
    }

    fn sh(script: &str) -> CommandDelegate {
        CommandDelegate::new(vec!["sh".into(), "-c".into(), script.into()])
    }

    #[test]
    fn success_captures_output_and_log() {
        let temp = tempfile::tempdir().expect("tempdir");
        let outcome = sh("cat; echo ' - done'")
            .invoke(&request(temp.path(), None))
            .expect("invoke");
        assert!(outcome.succeeded());
        assert_eq!(outcome.raw_output, "fix the build - done\n");

        let log = fs::read_to_string(temp.path().join("logs/delegate.log")).expect("log");
        assert!(log.contains("=== stdout ===\nfix the build - done"));
    }

    #[test]
    fn nonzero_exit_is_failure_outcome() {
        let temp = tempfile::tempdir().expect("tempdir");
        let outcome = sh("cat >/dev/null; echo partial; exit 3")
            .invoke(&request(temp.path(), None))
            .expect("invoke");
        assert_eq!(outcome.status, DelegateStatus::Failure);
        assert_eq!(outcome.raw_output, "partial\n");
    }

    #[test]
    fn ceiling_surfaces_delegate_error() {
        let temp = tempfile::tempdir().expect("tempdir");
        let err = sh("cat >/dev/null; exec sleep 5")
            .invoke(&request(temp.path(), Some(Duration::from_millis(100))))
            .unwrap_err();
        assert!(matches!(err, DelegateError::TimedOut(_)));
    }

    #[test]
    fn missing_program_surfaces_delegate_error() {
        let temp = tempfile::tempdir().expect("tempdir");
        let err = CommandDelegate::new(vec!["prloop-no-such-agent".into()])
            .invoke(&request(temp.path(), None))
            .unwrap_err();
        assert!(matches!(err, DelegateError::Run(_)));
    }

    #[test]
    fn empty_command_is_rejected() {
        let temp = tempfile::tempdir().expect("tempdir");
        let err = CommandDelegate::new(Vec::new())
            .invoke(&request(temp.path(), None))
            .unwrap_err();
        assert!(matches!(err, DelegateError::EmptyCommand));
    }
}
