//! Command execution engine.
//!
//! This module runs shell command lines with:
//! - Safe argument substitution (`{}` placeholders, shell escaping)
//! - Separate stdout/stderr capture through pipes
//! - A wall-clock timeout that kills the whole process group
//! - A cached lookup of command paths
//!
//! # Example
//!
//! ```no_run
//! use sy::execution::{self, Command, Executor};
//! use std::time::Duration;
//!
//! let result = execution::run("ls {} {} | sort", &["/etc/passwd", "/etc/hosts"])?;
//! assert_eq!(result.status, 0);
//!
//! let (out, _err) = Executor::new().check(
//!     &Command::new("uname -{}").arg("r").timeout(Duration::from_secs(5)),
//! )?;
//! println!("kernel {}", out.trim());
//! # Ok::<(), sy::SyError>(())
//! ```

mod collector;
mod command;
mod executor;
mod format;
mod lookup;
mod process;
mod result;

pub use collector::Collected;
pub use command::Command;
pub use executor::{check, outlines, run, run_with_timeout, Executor, DEFAULT_TIMEOUT};
pub use format::{format_cmd, shell_escape, PLACEHOLDER};
pub use lookup::{default_search_path, find, CommandLookup};
pub use process::{exit_code, ProcessHandle, Stream, DEFAULT_BUFFER_SIZE, DEFAULT_SHELL};
pub use result::ExecutionResult;
