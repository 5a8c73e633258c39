//! Error types for sy.

use std::time::Duration;

use thiserror::Error;

/// Main error type for sy operations.
#[derive(Error, Debug)]
pub enum SyError {
    /// The number of `{}` placeholders in a template differs from the
    /// number of arguments supplied.
    #[error("number of arguments do not match the format string {template:?}: expected {expected}, got {given}")]
    ArgumentCountMismatch {
        template: String,
        expected: usize,
        given: usize,
    },

    /// An empty command template was passed to the executor.
    #[error("missing command")]
    EmptyCommand,

    /// The shell process could not be started.
    #[error("failed to spawn command \"{command}\": {source}")]
    Launch {
        command: String,
        #[source]
        source: std::io::Error,
    },

    /// The command did not finish before its deadline. The process group
    /// has already been terminated and reaped.
    #[error("Command \"{command}\" timed out after {} secs", .timeout.as_secs())]
    Timeout {
        command: String,
        timeout: Duration,
        stdout: String,
        stderr: String,
    },

    /// The command exited with a status other than the expected one.
    #[error("{prefix}Command \"{command}\" did not exit with status {expected}: {}", .stderr.trim())]
    CommandFailed {
        prefix: String,
        command: String,
        expected: i32,
        status: i32,
        stdout: String,
        stderr: String,
    },

    /// A command name could not be resolved against the search path.
    #[error("Command {name} not found in path: {search_path}")]
    CommandNotFound { name: String, search_path: String },

    /// No user of that name exists.
    #[error("unknown user: {0}")]
    UnknownUser(String),

    /// No group of that name exists.
    #[error("unknown group: {0}")]
    UnknownGroup(String),

    /// An archive could not be unpacked.
    #[error("cannot extract {path}: {reason}")]
    Archive { path: String, reason: String },

    /// HTTP transfer failed.
    #[error("download failed: {0}")]
    Http(#[from] reqwest::Error),

    /// A mail could not be built or delivered.
    #[error("mail not sent: {0}")]
    Mail(String),

    /// The logging system could not be set up.
    #[error("cannot initialize logging: {0}")]
    Logging(String),

    /// Invalid regular expression.
    #[error("invalid pattern: {0}")]
    Pattern(#[from] regex::Error),

    /// Invalid IP address or netmask.
    #[error("invalid address: {0}")]
    InvalidAddress(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Internal lock was poisoned.
    #[error("internal lock poisoned")]
    LockPoisoned,

    /// A blocking task could not be joined.
    #[error("blocking task failed: {0}")]
    Join(String),
}

impl SyError {
    /// Captured stdout, for errors raised after the command produced output.
    pub fn stdout(&self) -> Option<&str> {
        match self {
            Self::Timeout { stdout, .. } | Self::CommandFailed { stdout, .. } => Some(stdout),
            _ => None,
        }
    }

    /// Captured stderr, for errors raised after the command produced output.
    pub fn stderr(&self) -> Option<&str> {
        match self {
            Self::Timeout { stderr, .. } | Self::CommandFailed { stderr, .. } => Some(stderr),
            _ => None,
        }
    }

    /// The formatted command line the error refers to, if any.
    pub fn command(&self) -> Option<&str> {
        match self {
            Self::Launch { command, .. }
            | Self::Timeout { command, .. }
            | Self::CommandFailed { command, .. } => Some(command),
            _ => None,
        }
    }

    /// Whether this error is a timeout.
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }
}

/// Convenience Result type for sy operations.
pub type Result<T> = std::result::Result<T, SyError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timeout_display() {
        let err = SyError::Timeout {
            command: "sleep 5".into(),
            timeout: Duration::from_secs(1),
            stdout: String::new(),
            stderr: String::new(),
        };
        assert_eq!(err.to_string(), "Command \"sleep 5\" timed out after 1 secs");
        assert!(err.is_timeout());
    }

    #[test]
    fn test_command_failed_display_trims_stderr() {
        let err = SyError::CommandFailed {
            prefix: String::new(),
            command: "false".into(),
            expected: 0,
            status: 1,
            stdout: "out\n".into(),
            stderr: "  boom\n".into(),
        };
        assert_eq!(
            err.to_string(),
            "Command \"false\" did not exit with status 0: boom"
        );
        assert_eq!(err.stdout(), Some("out\n"));
        assert_eq!(err.command(), Some("false"));
    }

    #[test]
    fn test_command_failed_prefix() {
        let err = SyError::CommandFailed {
            prefix: "Unable to set hostname: ".into(),
            command: "/bin/hostname x".into(),
            expected: 0,
            status: 1,
            stdout: String::new(),
            stderr: "denied".into(),
        };
        assert!(err.to_string().starts_with("Unable to set hostname: Command"));
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: SyError = io_err.into();
        assert!(matches!(err, SyError::Io(_)));
        assert!(err.to_string().contains("I/O error"));
        assert!(err.stdout().is_none());
    }

    #[test]
    fn test_argument_mismatch_display() {
        let err = SyError::ArgumentCountMismatch {
            template: "cmd {} {}".into(),
            expected: 2,
            given: 1,
        };
        let msg = err.to_string();
        assert!(msg.contains("cmd {} {}"));
        assert!(msg.contains("expected 2"));
    }
}
