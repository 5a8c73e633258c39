//! Atomic in-place file rewriting.
//!
//! All rewrites follow this pattern:
//! 1. Resolve `~`, variables and symlinks to the real target
//! 2. Take an exclusive lock on the original
//! 3. Write the new content to a temporary file in the same directory
//! 4. Copy permission bits and ownership onto the temporary file
//! 5. Rename it over the original
//!
//! Readers see either the old or the new file, never a partial one. The
//! temporary file is removed on every failure path.

use std::fs::{self, File, OpenOptions};
use std::io::{self, Read, Write};
use std::os::unix::fs::MetadataExt;
use std::os::unix::io::AsRawFd;
use std::path::Path;

use tempfile::Builder;
use tracing::{debug, warn};

use super::{expand_path, line_regex};
use crate::Result;

/// Replace the content of `path` with the output of `filter`.
///
/// `filter` receives the original content and a buffer for the new
/// content; whatever it returns is returned from here.
///
/// ```no_run
/// // Replace every line starting with XXX with YYY.
/// let n = sy::path::rewrite("/etc/hosts", |original, new| {
///     let mut replaced = 0;
///     for line in original.split_inclusive('\n') {
///         if line.starts_with("XXX") {
///             new.push_str("YYY\n");
///             replaced += 1;
///         } else {
///             new.push_str(line);
///         }
///     }
///     replaced
/// })?;
/// # Ok::<(), sy::SyError>(())
/// ```
pub fn rewrite<T, F>(path: impl AsRef<Path>, filter: F) -> Result<T>
where
    F: FnOnce(&str, &mut String) -> T,
{
    let path = fs::canonicalize(expand_path(path.as_ref().to_string_lossy()))?;
    let dir = path.parent().unwrap_or(Path::new("/"));
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();

    let mut original = OpenOptions::new().read(true).write(true).open(&path)?;
    lock_exclusive(&original)?;

    let mut content = String::new();
    original.read_to_string(&mut content)?;

    let mut replacement = String::with_capacity(content.len());
    let ret = filter(&content, &mut replacement);

    let mut tmp = Builder::new()
        .prefix(&name)
        .suffix(".replacement")
        .tempfile_in(dir)?;
    tmp.write_all(replacement.as_bytes())?;
    tmp.as_file().sync_all()?;

    let meta = original.metadata()?;
    fs::set_permissions(tmp.path(), meta.permissions())?;
    if let Err(e) = std::os::unix::fs::chown(tmp.path(), Some(meta.uid()), Some(meta.gid())) {
        if e.kind() != io::ErrorKind::PermissionDenied {
            return Err(e.into());
        }
        warn!(path = %path.display(), error = %e, "could not preserve ownership");
    }

    tmp.persist(&path).map_err(|e| e.error)?;
    debug!(path = %path.display(), "rewrote file");

    // Lock is released when the original descriptor closes.
    drop(original);
    Ok(ret)
}

/// Remove every line matching `pattern`. Returns the number removed.
///
/// The pattern may match anywhere in the line; see [`super::contains`].
pub fn remove_lines(path: impl AsRef<Path>, pattern: &str) -> Result<usize> {
    let regex = line_regex(pattern)?;
    rewrite(path, |original, new| {
        let mut removed = 0;
        for line in original.split_inclusive('\n') {
            if regex.is_match(line) {
                removed += 1;
            } else {
                new.push_str(line);
            }
        }
        removed
    })
}

/// Replace every line matching `pattern` with `replacement`. A newline is
/// appended to `replacement` if it lacks one. Returns the number replaced.
pub fn replace_lines(path: impl AsRef<Path>, pattern: &str, replacement: &str) -> Result<usize> {
    let regex = line_regex(pattern)?;
    let mut replacement = replacement.to_string();
    if !replacement.ends_with('\n') {
        replacement.push('\n');
    }
    rewrite(path, |original, new| {
        let mut replaced = 0;
        for line in original.split_inclusive('\n') {
            if regex.is_match(line) {
                new.push_str(&replacement);
                replaced += 1;
            } else {
                new.push_str(line);
            }
        }
        replaced
    })
}

/// Replace all matches of `pattern` in the whole file.
///
/// `^` and `$` match at line boundaries and `replacement` may use `$1` or
/// `${name}` back references. Returns the number of substitutions.
pub fn replace(path: impl AsRef<Path>, pattern: &str, replacement: &str) -> Result<usize> {
    let regex = line_regex(pattern)?;
    rewrite(path, |original, new| {
        let count = regex.find_iter(original).count();
        new.push_str(&regex.replace_all(original, replacement));
        count
    })
}

fn lock_exclusive(file: &File) -> io::Result<()> {
    // SAFETY: the descriptor is owned by `file`, which outlives the call.
    let rc = unsafe { libc::flock(file.as_raw_fd(), libc::LOCK_EX) };
    if rc != 0 {
        return Err(io::Error::last_os_error());
    }
    Ok(())
}
