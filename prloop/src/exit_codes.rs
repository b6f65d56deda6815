//! Stable exit codes for `prloop` commands.

/// Command succeeded (including "nothing to do" outcomes and `--help`).
pub const OK: i32 = 0;
/// Command failed, or its arguments were missing or invalid.
pub const FAILURE: i32 = 1;
