//! Deterministic, pure logic shared by the remediation loop.
//!
//! Core modules must be free of I/O side effects. They operate on in-memory
//! data structures and return deterministic outputs suitable for tests.

pub mod attention;
pub mod backoff;
pub mod history;
pub mod types;
