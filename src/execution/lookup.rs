//! Resolving command names to executable paths.

use std::collections::HashMap;
use std::ffi::OsStr;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::sync::{OnceLock, RwLock};

use tracing::debug;

use crate::error::SyError;
use crate::Result;

/// Directories searched after `$PATH`.
const DEFAULT_DIRS: &[&str] = &[
    "/bin",
    "/sbin",
    "/usr/bin",
    "/usr/sbin",
    "/usr/local/bin",
    "/usr/local/sbin",
];

/// Extra directories on Solaris.
const SOLARIS_DIRS: &[&str] = &[
    "/usr/sfw/bin",
    "/usr/xpg4/bin",
    "/usr/xpg5/bin",
    "/usr/java/bin",
    "/usr/ccs/bin",
];

/// Read-through cache of resolved command paths.
///
/// Lookups take the read lock; a miss resolves outside any lock and then
/// inserts under the write lock only if no other thread got there first,
/// so each name is stored once.
#[derive(Debug)]
pub struct CommandLookup {
    search_path: Vec<PathBuf>,
    cache: RwLock<HashMap<String, PathBuf>>,
}

impl CommandLookup {
    /// Create a lookup over an explicit list of directories.
    pub fn new(search_path: Vec<PathBuf>) -> Self {
        Self {
            search_path,
            cache: RwLock::new(HashMap::new()),
        }
    }

    /// Create a lookup over `$PATH` followed by the default directories.
    pub fn from_env() -> Self {
        Self::new(default_search_path(std::env::var_os("PATH").as_deref()))
    }

    /// The directories searched, in order.
    pub fn search_path(&self) -> &[PathBuf] {
        &self.search_path
    }

    /// Return the full path of the first executable named `name`.
    pub fn find(&self, name: &str) -> Result<PathBuf> {
        {
            let cache = self.cache.read().map_err(|_| SyError::LockPoisoned)?;
            if let Some(path) = cache.get(name) {
                return Ok(path.clone());
            }
        }

        let found = self
            .search_path
            .iter()
            .map(|dir| dir.join(name))
            .find(|candidate| is_executable(candidate))
            .ok_or_else(|| SyError::CommandNotFound {
                name: name.to_string(),
                search_path: self.joined_search_path(),
            })?;
        debug!(name, path = %found.display(), "resolved command");

        let mut cache = self.cache.write().map_err(|_| SyError::LockPoisoned)?;
        Ok(cache.entry(name.to_string()).or_insert(found).clone())
    }

    /// Number of cached names.
    pub fn cached(&self) -> usize {
        self.cache.read().map(|c| c.len()).unwrap_or(0)
    }

    fn joined_search_path(&self) -> String {
        self.search_path
            .iter()
            .map(|p| p.display().to_string())
            .collect::<Vec<_>>()
            .join(":")
    }
}

/// Resolve `name` through the process-wide lookup.
///
/// ```no_run
/// let ifconfig = sy::execution::find("ifconfig")?;
/// # Ok::<(), sy::SyError>(())
/// ```
pub fn find(name: &str) -> Result<PathBuf> {
    static LOOKUP: OnceLock<CommandLookup> = OnceLock::new();
    LOOKUP.get_or_init(CommandLookup::from_env).find(name)
}

/// Build the search path: `$PATH` entries, then the defaults and every
/// `/opt/*/bin`, skipping duplicates.
pub fn default_search_path(env_path: Option<&OsStr>) -> Vec<PathBuf> {
    let mut dirs: Vec<PathBuf> = env_path
        .map(|p| std::env::split_paths(p).collect())
        .unwrap_or_default();

    let mut extra: Vec<PathBuf> = DEFAULT_DIRS.iter().map(PathBuf::from).collect();
    extra.extend(opt_bin_dirs());
    if cfg!(any(target_os = "solaris", target_os = "illumos")) {
        extra.extend(SOLARIS_DIRS.iter().map(PathBuf::from));
    }

    for dir in extra {
        if !dirs.contains(&dir) {
            dirs.push(dir);
        }
    }
    dirs
}

fn opt_bin_dirs() -> Vec<PathBuf> {
    let Ok(entries) = std::fs::read_dir("/opt") else {
        return Vec::new();
    };
    let mut dirs: Vec<PathBuf> = entries
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path().join("bin"))
        .filter(|bin| bin.is_dir())
        .collect();
    dirs.sort();
    dirs
}

fn is_executable(path: &Path) -> bool {
    path.metadata()
        .map(|m| m.is_file() && m.permissions().mode() & 0o111 != 0)
        .unwrap_or(false)
}
