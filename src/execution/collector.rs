//! Deadline-bounded output collection over the child's pipes.

use std::io;
use std::time::{Duration, Instant};

use tracing::trace;

use super::process::{ProcessHandle, Stream};

const STREAMS: [Stream; 2] = [Stream::Stdout, Stream::Stderr];

/// How collection ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Collected {
    /// Both streams reached end-of-file.
    Complete,
    /// The deadline passed first. Output read so far stays in the handle.
    TimedOut,
}

/// Poll the open streams of `handle` until both are at EOF or `timeout`
/// has elapsed since the call started.
///
/// The deadline is re-checked after every wakeup that delivered data, so
/// enforcement is best-effort rather than exact. A timeout too large to
/// represent as an instant means no deadline at all.
pub(crate) fn collect(handle: &mut ProcessHandle, timeout: Duration) -> io::Result<Collected> {
    let deadline = Instant::now().checked_add(timeout);

    loop {
        let open: Vec<(Stream, libc::c_int)> = STREAMS
            .iter()
            .filter_map(|&stream| handle.raw_fd(stream).map(|fd| (stream, fd)))
            .collect();
        if open.is_empty() {
            return Ok(Collected::Complete);
        }

        let mut fds: Vec<libc::pollfd> = open
            .iter()
            .map(|&(_, fd)| libc::pollfd {
                fd,
                events: libc::POLLIN,
                revents: 0,
            })
            .collect();

        let wait_ms = match deadline {
            Some(deadline) => poll_timeout_ms(deadline.saturating_duration_since(Instant::now())),
            None => -1,
        };

        // SAFETY: `fds` is a live, correctly sized array of pollfd structs
        // for the duration of the call, and every descriptor in it is owned
        // by `handle`.
        let ready = unsafe { libc::poll(fds.as_mut_ptr(), fds.len() as libc::nfds_t, wait_ms) };
        if ready < 0 {
            let err = io::Error::last_os_error();
            if err.kind() == io::ErrorKind::Interrupted {
                continue;
            }
            return Err(err);
        }
        if ready == 0 {
            trace!(pid = handle.pid(), "poll timed out");
            return Ok(Collected::TimedOut);
        }

        for (pfd, &(stream, _)) in fds.iter().zip(&open) {
            if pfd.revents & (libc::POLLIN | libc::POLLHUP | libc::POLLERR) != 0 {
                let n = handle.read_chunk(stream)?;
                trace!(pid = handle.pid(), ?stream, bytes = n, "read");
            }
        }

        if handle.is_eof(Stream::Stdout) && handle.is_eof(Stream::Stderr) {
            return Ok(Collected::Complete);
        }
        if deadline.is_some_and(|deadline| Instant::now() >= deadline) {
            return Ok(Collected::TimedOut);
        }
    }
}

/// Milliseconds for poll(2), rounded up so a sub-millisecond remainder
/// still waits.
fn poll_timeout_ms(remaining: Duration) -> libc::c_int {
    let ms = remaining.as_nanos().div_ceil(1_000_000);
    libc::c_int::try_from(ms).unwrap_or(libc::c_int::MAX)
}
