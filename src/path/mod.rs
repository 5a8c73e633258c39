//! File and path helpers.
//!
//! Reading and writing normalise line endings to `\n`. Line edits
//! ([`remove_lines`], [`replace_lines`], [`replace`]) rewrite the file
//! atomically; see [`rewrite`].

mod archive;
mod owner;
mod rewrite;

use std::borrow::Cow;
use std::fs::{self, OpenOptions};
use std::io::{self, BufRead, BufReader, Write};
use std::os::unix::fs::PermissionsExt;
use std::path::{Component, Path, PathBuf};

use md5::{Digest, Md5};
use regex::{Regex, RegexBuilder};

use crate::Result;

pub use archive::{extract, ArchiveKind};
pub use owner::{chown, current_user, group, group_id, owner, owner_id};
pub use rewrite::{remove_lines, replace, replace_lines, rewrite};

/// Convert `\r\n` and lone `\r` to `\n`.
pub fn normalize_newlines(content: &str) -> Cow<'_, str> {
    if !content.contains('\r') {
        return Cow::Borrowed(content);
    }
    Cow::Owned(content.replace("\r\n", "\n").replace('\r', "\n"))
}

/// Write `content` to `path`, replacing the file if it exists.
pub fn dump(path: impl AsRef<Path>, content: &str) -> Result<()> {
    fs::write(path, normalize_newlines(content).as_bytes())?;
    Ok(())
}

/// Write raw bytes to `path` without newline conversion.
pub fn dump_bytes(path: impl AsRef<Path>, content: &[u8]) -> Result<()> {
    fs::write(path, content)?;
    Ok(())
}

/// Append `content` to `path`, creating the file if needed.
pub fn append(path: impl AsRef<Path>, content: &str) -> Result<()> {
    let mut file = OpenOptions::new().create(true).append(true).open(path)?;
    file.write_all(normalize_newlines(content).as_bytes())?;
    Ok(())
}

/// Read a whole file as text with normalised newlines.
pub fn slurp(path: impl AsRef<Path>) -> Result<String> {
    let content = fs::read_to_string(path)?;
    Ok(normalize_newlines(&content).into_owned())
}

/// Read a file as lines, without line terminators.
pub fn lines(path: impl AsRef<Path>) -> Result<Vec<String>> {
    Ok(slurp(path)?.lines().map(str::to_string).collect())
}

/// Whether any line of the file matches `pattern`.
///
/// The pattern is searched anywhere in the line, including its trailing
/// newline; `^` and `$` anchor at line boundaries.
pub fn contains(path: impl AsRef<Path>, pattern: &str) -> Result<bool> {
    let regex = line_regex(pattern)?;
    let reader = BufReader::new(fs::File::open(path)?);
    for line in reader.split(b'\n') {
        let mut line = String::from_utf8_lossy(&line?).into_owned();
        line.push('\n');
        if regex.is_match(&line) {
            return Ok(true);
        }
    }
    Ok(false)
}

/// MD5 digest of a file's content.
pub fn md5_digest(path: impl AsRef<Path>) -> Result<[u8; 16]> {
    let mut file = fs::File::open(path)?;
    let mut hasher = Md5::new();
    io::copy(&mut file, &mut hasher)?;
    let mut digest = [0u8; 16];
    digest.copy_from_slice(&hasher.finalize());
    Ok(digest)
}

/// MD5 digest of a file's content as lowercase hex.
///
/// ```no_run
/// let sum = sy::path::md5sum("/etc/hosts")?;
/// assert_eq!(sum.len(), 32);
/// # Ok::<(), sy::SyError>(())
/// ```
pub fn md5sum(path: impl AsRef<Path>) -> Result<String> {
    Ok(hex::encode(md5_digest(path)?))
}

/// Permission bits of a file or directory, e.g. `0o644`.
pub fn mode(path: impl AsRef<Path>) -> Result<u32> {
    Ok(fs::symlink_metadata(path)?.permissions().mode() & 0o7777)
}

/// Remove a directory tree. With `force`, errors are ignored like `rm -rf`.
pub fn rmtree(path: impl AsRef<Path>, force: bool) -> Result<()> {
    match fs::remove_dir_all(path) {
        Err(_) if force => Ok(()),
        other => Ok(other?),
    }
}

/// Expand `~` and environment variables, then normalise the path.
///
/// Variables that are not set are left as written, so a file whose name
/// really contains `$` is still reachable.
///
/// ```
/// std::env::set_var("SY_DOC_DIR", "/srv/app");
/// let p = sy::path::expand_path("$SY_DOC_DIR/./logs/../conf");
/// assert_eq!(p, std::path::PathBuf::from("/srv/app/conf"));
/// ```
pub fn expand_path(path: impl AsRef<str>) -> PathBuf {
    let expanded = shellexpand::full_with_context_no_errors(
        path.as_ref(),
        || std::env::var("HOME").ok(),
        |var| std::env::var(var).ok(),
    );
    normalize_path(Path::new(expanded.as_ref()))
}

/// Lexically normalise a path: drop `.`, fold `..`, collapse separators.
pub fn normalize_path(path: &Path) -> PathBuf {
    let mut parts: Vec<Component<'_>> = Vec::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => match parts.last() {
                Some(Component::Normal(_)) => {
                    parts.pop();
                }
                Some(Component::RootDir) | Some(Component::Prefix(_)) => {}
                _ => parts.push(component),
            },
            _ => parts.push(component),
        }
    }
    if parts.is_empty() {
        return PathBuf::from(".");
    }
    parts.iter().collect()
}

/// Compile a pattern for per-line matching.
pub(crate) fn line_regex(pattern: &str) -> Result<Regex> {
    Ok(RegexBuilder::new(pattern).multi_line(true).build()?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SyError;
    use tempfile::TempDir;

    const BASIC: &str = "This line contains letters and some more\nThis line contains a num8er\n";

    #[test]
    fn test_dump_normalizes_newlines() {
        let dir = TempDir::new().unwrap();
        let p = dir.path().join("f");

        dump(&p, "a\r\nb\rc\n").unwrap();
        assert_eq!(fs::read_to_string(&p).unwrap(), "a\nb\nc\n");

        dump_bytes(&p, b"\r\n").unwrap();
        assert_eq!(fs::read(&p).unwrap(), b"\r\n");
        assert_eq!(slurp(&p).unwrap(), "\n");
    }

    #[test]
    fn test_append() {
        let dir = TempDir::new().unwrap();
        let p = dir.path().join("f");

        append(&p, "one\n").unwrap();
        append(&p, "two\r\n").unwrap();
        assert_eq!(slurp(&p).unwrap(), "one\ntwo\n");
        assert_eq!(lines(&p).unwrap(), vec!["one", "two"]);
    }

    #[test]
    fn test_slurp_missing_file() {
        assert!(matches!(slurp("/nonexistent/file"), Err(SyError::Io(_))));
        assert!(slurp("").is_err());
    }

    #[test]
    fn test_contains() {
        let dir = TempDir::new().unwrap();
        let p = dir.path().join("basic");
        dump(&p, BASIC).unwrap();

        assert!(contains(&p, "letters").unwrap());
        assert!(contains(&p, r"\d").unwrap());
        assert!(contains(&p, "num.er\n").unwrap());
        assert!(contains(&p, "more$").unwrap());
        assert!(!contains(&p, "people").unwrap());
        assert!(matches!(contains(&p, "("), Err(SyError::Pattern(_))));
    }

    #[test]
    fn test_mode() {
        let dir = TempDir::new().unwrap();
        let p = dir.path().join("f");
        dump(&p, "x").unwrap();
        fs::set_permissions(&p, fs::Permissions::from_mode(0o640)).unwrap();
        assert_eq!(mode(&p).unwrap(), 0o640);
    }

    #[test]
    fn test_rmtree() {
        let dir = TempDir::new().unwrap();
        let tree = dir.path().join("a/b/c");
        fs::create_dir_all(&tree).unwrap();
        dump(tree.join("f"), "x").unwrap();

        rmtree(dir.path().join("a"), false).unwrap();
        assert!(!dir.path().join("a").exists());

        assert!(rmtree(dir.path().join("a"), false).is_err());
        assert!(rmtree(dir.path().join("a"), true).is_ok());
    }

    #[test]
    fn test_normalize_path() {
        assert_eq!(normalize_path(Path::new("/a/./b/../c")), PathBuf::from("/a/c"));
        assert_eq!(normalize_path(Path::new("/../x")), PathBuf::from("/x"));
        assert_eq!(normalize_path(Path::new("../x/..")), PathBuf::from(".."));
        assert_eq!(normalize_path(Path::new("a//b/")), PathBuf::from("a/b"));
        assert_eq!(normalize_path(Path::new("")), PathBuf::from("."));
    }

    #[test]
    fn test_md5sum() {
        let dir = TempDir::new().unwrap();
        let p = dir.path().join("f");
        dump(&p, "hello\n").unwrap();
        assert_eq!(md5sum(&p).unwrap(), "b1946ac92492d2347c6235b4d2611184");

        dump(&p, "").unwrap();
        assert_eq!(md5sum(&p).unwrap(), "d41d8cd98f00b204e9800998ecf8427e");
        assert_eq!(md5_digest(&p).unwrap()[0], 0xd4);
    }

    #[test]
    fn test_expand_path_tilde() {
        let home = std::env::var("HOME").unwrap();
        let p = expand_path("~/.bashrc");
        assert_eq!(p, normalize_path(&Path::new(&home).join(".bashrc")));
    }

    #[test]
    fn test_expand_path_keeps_undefined_var() {
        assert_eq!(
            expand_path("/srv/$SY_SURELY_UNDEFINED_VAR/x"),
            PathBuf::from("/srv/$SY_SURELY_UNDEFINED_VAR/x")
        );
    }

    #[test]
    fn test_line_edits_on_dollar_file_name() {
        let dir = TempDir::new().unwrap();
        let p = dir.path().join("a$SY_SURELY_UNDEFINED_VAR");
        dump(&p, "one\ntwo\n").unwrap();
        assert_eq!(remove_lines(&p, "one").unwrap(), 1);
        assert_eq!(slurp(&p).unwrap(), "two\n");
    }
}
