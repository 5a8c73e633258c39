//! Command building and representation.

use std::time::Duration;

use super::format::format_cmd;
use crate::Result;

/// A command template plus the arguments substituted into it.
///
/// Options left unset fall back to the [`Executor`](super::Executor)
/// defaults when the command is run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Command {
    /// Template with `{}` placeholders.
    pub template: String,
    /// Arguments, escaped and substituted in order.
    pub args: Vec<String>,
    /// Maximum execution time.
    pub timeout: Option<Duration>,
    /// Read size per stream per wakeup.
    pub buffer_size: Option<usize>,
    /// Exit status treated as success by `check`.
    pub expect: i32,
    /// Text prepended to `CommandFailed` messages.
    pub prefix: String,
}

impl Command {
    /// Create a new command from a template.
    pub fn new(template: impl Into<String>) -> Self {
        Self {
            template: template.into(),
            ..Default::default()
        }
    }

    /// Append one argument.
    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Append several arguments.
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Set the execution timeout.
    pub fn timeout(mut self, duration: Duration) -> Self {
        self.timeout = Some(duration);
        self
    }

    /// Set the read buffer size.
    pub fn buffer_size(mut self, size: usize) -> Self {
        self.buffer_size = Some(size);
        self
    }

    /// Set the exit status `check` expects.
    pub fn expect(mut self, status: i32) -> Self {
        self.expect = status;
        self
    }

    /// Set the prefix for failure messages.
    pub fn prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = prefix.into();
        self
    }

    /// The escaped command line handed to the shell.
    pub fn command_line(&self) -> Result<String> {
        format_cmd(&self.template, &self.args)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_new() {
        let cmd = Command::new("ls -la");
        assert_eq!(cmd.template, "ls -la");
        assert!(cmd.args.is_empty());
        assert!(cmd.timeout.is_none());
        assert!(cmd.buffer_size.is_none());
        assert_eq!(cmd.expect, 0);
        assert!(cmd.prefix.is_empty());
    }

    #[test]
    fn test_command_builder_chain() {
        let cmd = Command::new("ls {} {}")
            .arg("/etc/passwd")
            .arg("my file")
            .timeout(Duration::from_secs(15))
            .buffer_size(1024)
            .expect(2)
            .prefix("listing: ");

        assert_eq!(cmd.args, vec!["/etc/passwd", "my file"]);
        assert_eq!(cmd.timeout, Some(Duration::from_secs(15)));
        assert_eq!(cmd.buffer_size, Some(1024));
        assert_eq!(cmd.expect, 2);
        assert_eq!(cmd.prefix, "listing: ");
        assert_eq!(cmd.command_line().unwrap(), r"ls /etc/passwd my\ file");
    }

    #[test]
    fn test_command_args() {
        let cmd = Command::new("echo {} {}").args(["a", "b"]);
        assert_eq!(cmd.args.len(), 2);
        assert_eq!(cmd.command_line().unwrap(), "echo a b");
    }

    #[test]
    fn test_command_line_mismatch() {
        assert!(Command::new("echo {}").command_line().is_err());
    }
}
