//! # sy
//!
//! Simple tools for system administration tasks.
//!
//! The centre of the crate is [`execution`]: run a shell command line built
//! from a template and escaped arguments, capture stdout and stderr
//! separately, and kill the whole process group if it runs past its
//! timeout. Around it sit helpers for the chores such scripts do next.
//!
//! ## Features
//!
//! - **Commands**: `run`, `check`, `outlines` with timeouts and safe `{}`
//!   substitution, plus a cached command path lookup
//! - **Files**: atomic line removal and replacement, newline-normalised
//!   reading and writing, `~`/`$VAR` path expansion, ownership, MD5 sums
//!   and tar/zip extraction
//! - **Prompts**: questions, confirmations and menus over any reader/writer
//! - **Network**: address checks, netmask arithmetic, hosts file editing,
//!   HTTP downloads and SMTP mail
//! - **Logging**: stderr, rotated file and syslog sinks
//!
//! ## Quick Start
//!
//! ```no_run
//! use std::time::Duration;
//! use sy::execution::{self, Command, Executor};
//!
//! fn main() -> sy::Result<()> {
//!     sy::logging::try_init().ok();
//!
//!     let result = execution::run("ls -l {}", &["/tmp/my dir"])?;
//!     println!("status {} stdout {}", result.status, result.stdout);
//!
//!     let executor = Executor::new().with_timeout(Duration::from_secs(10));
//!     for line in executor.outlines(&Command::new("mount"))? {
//!         println!("{line}");
//!     }
//!
//!     sy::path::replace_lines("/etc/motd", "^Welcome", "Welcome to db01")?;
//!     Ok(())
//! }
//! ```

#[cfg(not(unix))]
compile_error!("sy requires a POSIX platform");

pub mod cli;
pub mod config;
pub mod error;
pub mod execution;
pub mod logging;
pub mod net;
pub mod path;
pub mod prompt;
pub mod util;

// Re-export commonly used types
pub use error::{Result, SyError};
pub use execution::{check, find, outlines, run, Command, ExecutionResult, Executor};
pub use prompt::Prompter;
