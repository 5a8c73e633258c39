//! Command execution engine.

use std::time::{Duration, Instant};

use tracing::{debug, error, warn};

use super::collector::Collected;
use super::command::Command;
use super::process::{exit_code, ProcessHandle, DEFAULT_BUFFER_SIZE, DEFAULT_SHELL};
use super::result::ExecutionResult;
use crate::error::SyError;
use crate::Result;

/// Default execution timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

/// Runs commands with a set of defaults for options a [`Command`] leaves
/// unset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Executor {
    /// Shell that interprets the command line.
    pub shell: String,
    /// Timeout used when the command has none.
    pub timeout: Duration,
    /// Buffer size used when the command has none.
    pub buffer_size: usize,
}

impl Default for Executor {
    fn default() -> Self {
        Self {
            shell: DEFAULT_SHELL.to_string(),
            timeout: DEFAULT_TIMEOUT,
            buffer_size: DEFAULT_BUFFER_SIZE,
        }
    }
}

impl Executor {
    /// Create an executor with the default shell, timeout and buffer size.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the shell.
    pub fn with_shell(mut self, shell: impl Into<String>) -> Self {
        self.shell = shell.into();
        self
    }

    /// Set the default timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set the default buffer size.
    pub fn with_buffer_size(mut self, size: usize) -> Self {
        self.buffer_size = size;
        self
    }

    /// Execute a command and capture its status and output.
    ///
    /// The exit status is returned as is; only a timeout or a launch
    /// failure is an error. On timeout the process group has been sent
    /// SIGTERM and reaped before the error is returned.
    pub fn run(&self, command: &Command) -> Result<ExecutionResult> {
        if command.template.is_empty() {
            return Err(SyError::EmptyCommand);
        }
        let timeout = command.timeout.unwrap_or(self.timeout);
        let buffer_size = command.buffer_size.unwrap_or(self.buffer_size);
        let command_line = command.command_line()?;
        debug!(command = %command_line, "spawning");

        let start = Instant::now();
        let mut process = ProcessHandle::spawn(&self.shell, &command_line, buffer_size)
            .map_err(|source| SyError::Launch {
                command: command_line.clone(),
                source,
            })?;

        let collected = match process.collect(timeout) {
            Ok(collected) => collected,
            Err(e) => {
                if let Err(cleanup_err) = teardown(&mut process) {
                    warn!(pid = process.pid(), error = %cleanup_err, "failed to reap child");
                }
                return Err(e.into());
            }
        };

        match collected {
            Collected::Complete => {}
            Collected::TimedOut => {
                teardown(&mut process)?;
                let (stdout, stderr) = process.output();
                let err = SyError::Timeout {
                    command: command_line,
                    timeout,
                    stdout,
                    stderr,
                };
                error!("{}", err);
                return Err(err);
            }
        }

        let status = exit_code(process.cleanup()?);
        let (stdout, stderr) = process.output();
        let duration = start.elapsed();

        debug!(
            status,
            stdout = stdout.trim(),
            stderr = stderr.trim(),
            "command result"
        );
        debug!(elapsed_secs = duration.as_secs(), "command took");

        Ok(ExecutionResult::new(status, stdout, stderr, duration))
    }

    /// Execute a command and fail unless it exits with `command.expect`.
    ///
    /// Returns `(stdout, stderr)`.
    pub fn check(&self, command: &Command) -> Result<(String, String)> {
        let result = self.run(command)?;
        if result.status != command.expect {
            return Err(SyError::CommandFailed {
                prefix: command.prefix.clone(),
                command: command.command_line()?,
                expected: command.expect,
                status: result.status,
                stdout: result.stdout,
                stderr: result.stderr,
            });
        }
        Ok((result.stdout, result.stderr))
    }

    /// Execute a command through [`check`](Self::check) and return its
    /// stdout lines.
    pub fn outlines(&self, command: &Command) -> Result<Vec<String>> {
        let (out, _) = self.check(command)?;
        Ok(out.lines().map(str::to_string).collect())
    }

    /// Execute a command on tokio's blocking pool.
    pub async fn run_async(&self, command: Command) -> Result<ExecutionResult> {
        let executor = self.clone();
        tokio::task::spawn_blocking(move || executor.run(&command))
            .await
            .map_err(|e| SyError::Join(e.to_string()))?
    }

    /// Async counterpart of [`check`](Self::check).
    pub async fn check_async(&self, command: Command) -> Result<(String, String)> {
        let executor = self.clone();
        tokio::task::spawn_blocking(move || executor.check(&command))
            .await
            .map_err(|e| SyError::Join(e.to_string()))?
    }
}

/// Signal the process group and reap the shell. A failed signal is logged
/// and the wait still happens.
fn teardown(process: &mut ProcessHandle) -> std::io::Result<std::process::ExitStatus> {
    if let Err(e) = process.terminate() {
        warn!(pid = process.pid(), error = %e, "failed to signal process group");
    }
    process.cleanup()
}

/// Run `template` with `args` using the default executor.
///
/// ```no_run
/// let result = sy::execution::run("ls -R {}", &["/tmp"])?;
/// println!("{} {}", result.status, result.stdout);
/// # Ok::<(), sy::SyError>(())
/// ```
pub fn run<S: AsRef<str>>(template: &str, args: &[S]) -> Result<ExecutionResult> {
    Executor::default().run(&build(template, args))
}

/// Run with an explicit timeout using the default executor.
pub fn run_with_timeout<S: AsRef<str>>(
    template: &str,
    args: &[S],
    timeout: Duration,
) -> Result<ExecutionResult> {
    Executor::default().run(&build(template, args).timeout(timeout))
}

/// Run and require exit status 0. Returns `(stdout, stderr)`.
pub fn check<S: AsRef<str>>(template: &str, args: &[S]) -> Result<(String, String)> {
    Executor::default().check(&build(template, args))
}

/// Run, require exit status 0 and return stdout lines.
pub fn outlines<S: AsRef<str>>(template: &str, args: &[S]) -> Result<Vec<String>> {
    Executor::default().outlines(&build(template, args))
}

fn build<S: AsRef<str>>(template: &str, args: &[S]) -> Command {
    Command::new(template).args(args.iter().map(|a| a.as_ref().to_string()))
}
