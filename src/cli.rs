//! Command-line interface for sy.
//!
//! Uses lexopt for minimal binary size overhead (~34KB).

use std::ffi::OsString;
use std::path::PathBuf;
use std::str::FromStr;

/// What the binary should do.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Subcommand {
    /// Run and report the exit status.
    Run,
    /// Run and fail unless the expected status is returned.
    Check,
    /// Run, check and print stdout line by line.
    Lines,
    /// Resolve a command name to its path.
    Find,
}

impl FromStr for Subcommand {
    type Err = ArgsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "run" => Ok(Self::Run),
            "check" | "do" => Ok(Self::Check),
            "lines" | "outlines" => Ok(Self::Lines),
            "find" => Ok(Self::Find),
            other => Err(ArgsError::UnknownSubcommand(other.to_string())),
        }
    }
}

/// Command-line arguments.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Args {
    /// Subcommand to execute.
    pub subcommand: Option<Subcommand>,
    /// Command template, or the name to look up for `find`.
    pub target: Option<String>,
    /// Arguments substituted into the template.
    pub args: Vec<String>,
    /// Timeout in seconds.
    pub timeout: Option<u64>,
    /// Read buffer size in bytes.
    pub buffer_size: Option<usize>,
    /// Expected exit status for `check` and `lines`.
    pub expect: i32,
    /// Prefix for failure messages.
    pub prefix: String,
    /// Print results as JSON.
    pub json: bool,
    /// Path to configuration file.
    pub config: Option<PathBuf>,
    /// Log level (error, warn, info, debug, trace).
    pub log_level: Option<String>,
    /// Also write logs to this file.
    pub log_file: Option<PathBuf>,
    /// Show version and exit.
    pub version: bool,
    /// Show help and exit.
    pub help: bool,
}

/// Parse command-line arguments.
pub fn parse_args() -> Result<Args, ArgsError> {
    parse_args_from(std::env::args_os())
}

/// Parse arguments from an iterator (for testing).
pub fn parse_args_from<I>(args: I) -> Result<Args, ArgsError>
where
    I: IntoIterator<Item = OsString>,
{
    use lexopt::prelude::*;

    let mut result = Args::default();
    let mut parser = lexopt::Parser::from_iter(args);

    while let Some(arg) = parser.next()? {
        match arg {
            Short('h') | Long("help") => {
                result.help = true;
            }
            Short('V') | Long("version") => {
                result.version = true;
            }
            Short('t') | Long("timeout") => {
                let value: String = parser.value()?.parse()?;
                result.timeout = Some(
                    value
                        .parse()
                        .map_err(|_| ArgsError::InvalidValue("timeout", value))?,
                );
            }
            Short('b') | Long("buffer-size") => {
                let value: String = parser.value()?.parse()?;
                result.buffer_size = Some(
                    value
                        .parse::<usize>()
                        .ok()
                        .filter(|size| *size > 0)
                        .ok_or(ArgsError::InvalidValue("buffer-size", value))?,
                );
            }
            Short('e') | Long("expect") => {
                let value: String = parser.value()?.parse()?;
                result.expect = value
                    .parse()
                    .map_err(|_| ArgsError::InvalidValue("expect", value))?;
            }
            Short('p') | Long("prefix") => {
                result.prefix = parser.value()?.parse()?;
            }
            Long("json") => {
                result.json = true;
            }
            Short('c') | Long("config") => {
                result.config = Some(parser.value()?.parse()?);
            }
            Short('l') | Long("log-level") => {
                result.log_level = Some(parser.value()?.parse()?);
            }
            Long("log-file") => {
                result.log_file = Some(parser.value()?.parse()?);
            }
            Value(val) => {
                let val: String = val.string()?;
                if result.subcommand.is_none() {
                    result.subcommand = Some(val.parse()?);
                } else if result.target.is_none() {
                    result.target = Some(val);
                } else {
                    result.args.push(val);
                }
            }
            _ => return Err(arg.unexpected().into()),
        }
    }

    Ok(result)
}

/// Print help message.
pub fn print_help() {
    let version = env!("CARGO_PKG_VERSION");
    println!(
        r#"sy {version}
Run shell commands with timeouts and safe argument substitution

USAGE:
    sy [OPTIONS] <COMMAND> <TEMPLATE> [ARGS]...
    sy [OPTIONS] find <NAME>

COMMANDS:
    run       Run the template and exit with its status
    check     Run and fail unless it exits with --expect (alias: do)
    lines     Like check, printing stdout line by line (alias: outlines)
    find      Print the full path of an executable

Each {{}} in TEMPLATE is replaced by the next ARG, shell-escaped.
Put ARGS that start with '-' after '--'.

OPTIONS:
    -t, --timeout <SECS>       Kill the command after SECS [default: 60]
    -b, --buffer-size <BYTES>  Pipe read size [default: 8192]
    -e, --expect <STATUS>      Exit status check expects [default: 0]
    -p, --prefix <TEXT>        Prefix for failure messages
        --json                 Print the result as JSON
    -c, --config <FILE>        Path to configuration file (JSON)
    -l, --log-level <LVL>      Log level (error, warn, info, debug, trace)
        --log-file <FILE>      Also append logs to FILE (rotated at 10 MiB)
    -h, --help                 Print help
    -V, --version              Print version

ENVIRONMENT VARIABLES:
    SY_TIMEOUT        Timeout in seconds (overrides config)
    SY_BUFFER_SIZE    Pipe read size (overrides config)
    SY_SHELL          Shell for command lines [default: /bin/sh]
    SY_LOG_LEVEL      Log level (overrides config)
    SY_LOG_FILE       Log file (overrides config)
    SY_SYSLOG         Also log to syslog under this facility
    RUST_LOG          Alternative log level setting

EXIT STATUS:
    run returns the command's status, 124 on timeout, 1 on other
    failures and 2 on usage errors.

EXAMPLES:
    sy run 'ls -l {{}} | wc -l' '/tmp/my dir'
    sy -t 5 check 'ping -c 1 {{}}' db01
    sy --json run 'uname -a'
    sy find ifconfig
"#
    );
}

/// Print version.
pub fn print_version() {
    println!("sy {}", env!("CARGO_PKG_VERSION"));
}

/// Argument parsing errors.
#[derive(Debug)]
pub enum ArgsError {
    /// Lexopt parsing error.
    Lexopt(lexopt::Error),
    /// Invalid argument value.
    InvalidValue(&'static str, String),
    /// First positional argument is not a known subcommand.
    UnknownSubcommand(String),
}

impl std::fmt::Display for ArgsError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Lexopt(e) => write!(f, "{}", e),
            Self::InvalidValue(name, value) => {
                write!(f, "invalid value for --{}: '{}'", name, value)
            }
            Self::UnknownSubcommand(cmd) => {
                write!(f, "unknown command: '{}'", cmd)
            }
        }
    }
}

impl std::error::Error for ArgsError {}

impl From<lexopt::Error> for ArgsError {
    fn from(e: lexopt::Error) -> Self {
        Self::Lexopt(e)
    }
}
