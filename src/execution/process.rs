//! Child process launch and teardown.
//!
//! A [`ProcessHandle`] owns one `<shell> -c <command>` child running in its
//! own process group, plus the read ends of its stdout and stderr pipes.
//! The handle is always reaped: explicitly through [`ProcessHandle::cleanup`]
//! or, failing that, when it is dropped.

use std::io::{self, Read};
use std::os::unix::io::{AsRawFd, RawFd};
use std::os::unix::process::{CommandExt, ExitStatusExt};
use std::process::{Child, ChildStderr, ChildStdout, ExitStatus, Stdio};
use std::time::Duration;

use tracing::{trace, warn};

use super::collector::{self, Collected};

/// Shell used to interpret command lines.
pub const DEFAULT_SHELL: &str = "/bin/sh";

/// Default number of bytes read from a pipe per wakeup.
pub const DEFAULT_BUFFER_SIZE: usize = 8192;

/// One of the two captured output streams.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stream {
    /// Standard output.
    Stdout,
    /// Standard error.
    Stderr,
}

/// A running (or finished but not yet released) child process.
#[derive(Debug)]
pub struct ProcessHandle {
    child: Child,
    stdout: Option<ChildStdout>,
    stderr: Option<ChildStderr>,
    out: Vec<u8>,
    err: Vec<u8>,
    out_eof: bool,
    err_eof: bool,
    scratch: Vec<u8>,
    status: Option<ExitStatus>,
}

impl ProcessHandle {
    /// Start `shell -c command_line` in a new process group.
    ///
    /// Stdin is the null device; stdout and stderr are pipes whose write
    /// ends live only in the child.
    pub fn spawn(shell: &str, command_line: &str, buffer_size: usize) -> io::Result<Self> {
        let mut child = std::process::Command::new(shell)
            .arg("-c")
            .arg(command_line)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .process_group(0)
            .spawn()?;

        let stdout = child.stdout.take();
        let stderr = child.stderr.take();
        trace!(pid = child.id(), "spawned shell");

        Ok(Self {
            child,
            out_eof: stdout.is_none(),
            err_eof: stderr.is_none(),
            stdout,
            stderr,
            out: Vec::new(),
            err: Vec::new(),
            scratch: vec![0u8; buffer_size.max(1)],
            status: None,
        })
    }

    /// Process id of the shell, which is also its process group id.
    pub fn pid(&self) -> u32 {
        self.child.id()
    }

    /// Whether the stream has reached end-of-file.
    pub fn is_eof(&self, stream: Stream) -> bool {
        match stream {
            Stream::Stdout => self.out_eof,
            Stream::Stderr => self.err_eof,
        }
    }

    /// Raw descriptor of a stream that is still open and not at EOF.
    pub(crate) fn raw_fd(&self, stream: Stream) -> Option<RawFd> {
        if self.is_eof(stream) {
            return None;
        }
        match stream {
            Stream::Stdout => self.stdout.as_ref().map(AsRawFd::as_raw_fd),
            Stream::Stderr => self.stderr.as_ref().map(AsRawFd::as_raw_fd),
        }
    }

    /// Read one chunk from a ready stream into its buffer.
    ///
    /// A zero-length read marks the stream as EOF. Returns the number of
    /// bytes appended.
    pub(crate) fn read_chunk(&mut self, stream: Stream) -> io::Result<usize> {
        let read = match stream {
            Stream::Stdout => match self.stdout.as_mut() {
                Some(pipe) => pipe.read(&mut self.scratch),
                None => Ok(0),
            },
            Stream::Stderr => match self.stderr.as_mut() {
                Some(pipe) => pipe.read(&mut self.scratch),
                None => Ok(0),
            },
        };

        let n = match read {
            Ok(n) => n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => return Ok(0),
            Err(e) => return Err(e),
        };

        let (buf, eof) = match stream {
            Stream::Stdout => (&mut self.out, &mut self.out_eof),
            Stream::Stderr => (&mut self.err, &mut self.err_eof),
        };
        if n == 0 {
            *eof = true;
        } else {
            buf.extend_from_slice(&self.scratch[..n]);
        }
        Ok(n)
    }

    /// Collect output until both streams close or `timeout` elapses.
    pub fn collect(&mut self, timeout: Duration) -> io::Result<Collected> {
        collector::collect(self, timeout)
    }

    /// Output captured so far, decoded lossily.
    pub fn output(&self) -> (String, String) {
        (
            String::from_utf8_lossy(&self.out).into_owned(),
            String::from_utf8_lossy(&self.err).into_owned(),
        )
    }

    /// Send SIGTERM to the whole process group.
    ///
    /// A no-op once the handle has been reaped, since the pid may have been
    /// reused.
    pub fn terminate(&self) -> io::Result<()> {
        if self.status.is_some() {
            return Ok(());
        }
        let pgid = libc::pid_t::try_from(self.child.id())
            .map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, "pid out of range"))?;

        // SAFETY: kill(2) has no memory-safety preconditions. The negative
        // pid addresses the group created by `process_group(0)` at spawn.
        let rc = unsafe { libc::kill(-pgid, libc::SIGTERM) };
        if rc != 0 {
            let err = io::Error::last_os_error();
            // Group already gone.
            if err.raw_os_error() != Some(libc::ESRCH) {
                return Err(err);
            }
        }
        Ok(())
    }

    /// Close both read ends and wait for the shell to exit.
    ///
    /// Idempotent: later calls return the recorded status without waiting
    /// or closing anything again.
    pub fn cleanup(&mut self) -> io::Result<ExitStatus> {
        if let Some(status) = self.status {
            return Ok(status);
        }
        drop(self.stdout.take());
        drop(self.stderr.take());
        let status = self.child.wait()?;
        self.status = Some(status);
        Ok(status)
    }

    /// Whether the child has been reaped.
    pub fn is_cleaned(&self) -> bool {
        self.status.is_some()
    }
}

impl Drop for ProcessHandle {
    fn drop(&mut self) {
        if self.status.is_none() {
            if let Err(e) = self.cleanup() {
                warn!(pid = self.child.id(), error = %e, "failed to reap child");
            }
        }
    }
}

/// Convert a wait status into a plain integer.
///
/// Normal exits give the exit code; death by signal gives `128 + signal`,
/// the same convention shells use for `$?`.
pub fn exit_code(status: ExitStatus) -> i32 {
    status
        .code()
        .or_else(|| status.signal().map(|sig| 128 + sig))
        .unwrap_or(-1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_spawn_and_cleanup() {
        let mut handle = ProcessHandle::spawn(DEFAULT_SHELL, "exit 4", DEFAULT_BUFFER_SIZE).unwrap();
        assert!(handle.pid() > 0);
        assert!(!handle.is_cleaned());

        let status = handle.cleanup().unwrap();
        assert_eq!(exit_code(status), 4);
        assert!(handle.is_cleaned());
    }

    #[test]
    fn test_cleanup_twice_is_noop() {
        let mut handle = ProcessHandle::spawn(DEFAULT_SHELL, "true", DEFAULT_BUFFER_SIZE).unwrap();
        let first = handle.cleanup().unwrap();
        let second = handle.cleanup().unwrap();
        assert_eq!(first, second);
        assert_eq!(exit_code(second), 0);
        // Drop after cleanup must not wait again.
        drop(handle);
    }

    #[test]
    fn test_terminate_after_cleanup_is_noop() {
        let mut handle = ProcessHandle::spawn(DEFAULT_SHELL, "true", DEFAULT_BUFFER_SIZE).unwrap();
        handle.cleanup().unwrap();
        assert!(handle.terminate().is_ok());
    }

    #[test]
    fn test_terminate_reports_signal() {
        let mut handle =
            ProcessHandle::spawn(DEFAULT_SHELL, "sleep 30", DEFAULT_BUFFER_SIZE).unwrap();
        handle.terminate().unwrap();
        let status = handle.cleanup().unwrap();
        assert_eq!(exit_code(status), 128 + libc::SIGTERM);
    }

    #[test]
    fn test_read_chunk_bounded_by_buffer_size() {
        let mut handle = ProcessHandle::spawn(DEFAULT_SHELL, "printf abcdefghij", 4).unwrap();
        while !handle.is_eof(Stream::Stdout) {
            let n = handle.read_chunk(Stream::Stdout).unwrap();
            assert!(n <= 4);
        }
        assert_eq!(handle.output().0, "abcdefghij");
        handle.cleanup().unwrap();
    }

    #[test]
    fn test_spawn_missing_shell() {
        let result = ProcessHandle::spawn("/nonexistent/shell", "true", DEFAULT_BUFFER_SIZE);
        assert!(result.is_err());
    }

    #[test]
    fn test_drop_reaps_without_cleanup() {
        let handle = ProcessHandle::spawn(DEFAULT_SHELL, "true", DEFAULT_BUFFER_SIZE).unwrap();
        drop(handle);
    }
}
