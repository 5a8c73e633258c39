//! Small helpers layered on top of the rest of the crate.

use std::time::Duration;

use tracing::debug;

/// Call `f` up to `tries` times until it succeeds.
///
/// Sleeps `delay` between attempts and returns the last error if every
/// attempt fails. `tries` of zero is treated as one.
///
/// ```
/// use std::cell::Cell;
/// use std::time::Duration;
///
/// let calls = Cell::new(0);
/// let value = sy::util::retry(3, Duration::ZERO, || {
///     calls.set(calls.get() + 1);
///     if calls.get() < 3 { Err("flaky") } else { Ok(calls.get()) }
/// });
/// assert_eq!(value, Ok(3));
/// ```
pub fn retry<T, E, F>(tries: usize, delay: Duration, mut f: F) -> Result<T, E>
where
    E: std::fmt::Display,
    F: FnMut() -> Result<T, E>,
{
    let tries = tries.max(1);
    let mut attempt = 1;
    loop {
        match f() {
            Ok(value) => return Ok(value),
            Err(e) if attempt < tries => {
                debug!(attempt, error = %e, "retrying");
                std::thread::sleep(delay);
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}
