//! Execution result types.

use std::time::Duration;

use serde::Serialize;

/// Outcome of a command that ran to completion.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ExecutionResult {
    /// Exit status, or `128 + signal` if the shell was killed by a signal.
    pub status: i32,
    /// Captured standard output.
    pub stdout: String,
    /// Captured standard error.
    pub stderr: String,
    /// Wall-clock time from spawn to reap.
    pub duration: Duration,
}

impl ExecutionResult {
    /// Create a new execution result.
    pub fn new(status: i32, stdout: String, stderr: String, duration: Duration) -> Self {
        Self {
            status,
            stdout,
            stderr,
            duration,
        }
    }

    /// Check if command succeeded (exit status 0).
    pub fn success(&self) -> bool {
        self.status == 0
    }

    /// Get stdout lines.
    pub fn stdout_lines(&self) -> impl Iterator<Item = &str> {
        self.stdout.lines()
    }

    /// Split into `(status, stdout, stderr)`.
    pub fn into_parts(self) -> (i32, String, String) {
        (self.status, self.stdout, self.stderr)
    }
}
