//! I/O adapters for the remediation loop.

pub mod config;
pub mod delegate;
pub mod git;
pub mod ledger;
pub mod lock;
pub mod paths;
pub mod process;
pub mod prompt;
pub mod review;
