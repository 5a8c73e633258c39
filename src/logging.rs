//! Logging initialization and configuration.
//!
//! Events always go through an `EnvFilter`. Each [`Sink`] adds one output
//! layer: stderr, a size-rotated file or the local syslog daemon.

use std::ffi::CString;
use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Mutex;

use tracing::{Level, Metadata, Subscriber};
use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::{
    layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer, Registry,
};

use crate::error::SyError;

/// Filter used when neither `RUST_LOG` nor an explicit level is given.
pub const DEFAULT_FILTER: &str = "sy=info";

/// Size at which a log file is rotated.
pub const DEFAULT_MAX_BYTES: u64 = 10 * 1024 * 1024;

/// Rotated log files kept next to the live one.
pub const DEFAULT_KEEP: usize = 5;

/// Where log events are written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Sink {
    /// Compact lines on standard error.
    Stderr,
    /// Plain lines appended to a file, rotated at `max_bytes` with `keep`
    /// old files named `path.1` (newest) to `path.<keep>`.
    File {
        path: PathBuf,
        max_bytes: u64,
        keep: usize,
    },
    /// The local syslog daemon.
    Syslog(Facility),
}

impl Sink {
    /// A file sink with the default rotation settings.
    pub fn file(path: impl Into<PathBuf>) -> Self {
        Self::File {
            path: path.into(),
            max_bytes: DEFAULT_MAX_BYTES,
            keep: DEFAULT_KEEP,
        }
    }
}

/// Initialize the logging system.
///
/// Uses the `RUST_LOG` environment variable for filtering. If not set,
/// defaults to `sy=info`.
///
/// # Panics
///
/// Panics if called more than once, or if another tracing subscriber
/// has already been set.
pub fn init() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().compact().with_writer(std::io::stderr))
        .init();
}

/// Try to initialize the logging system.
///
/// Returns `Ok(())` if successful, or `Err` if logging has already been
/// initialized.
pub fn try_init() -> Result<(), tracing_subscriber::util::TryInitError> {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().compact().with_writer(std::io::stderr))
        .try_init()
}

/// Initialize logging with an explicit filter such as `debug` or
/// `sy=trace`.
///
/// A bare level applies to this crate only. An unparsable filter falls
/// back to the default.
pub fn init_with_filter(level: &str) -> Result<(), tracing_subscriber::util::TryInitError> {
    tracing_subscriber::registry()
        .with(filter_for(level))
        .with(tracing_subscriber::fmt::layer().compact().with_writer(std::io::stderr))
        .try_init()
}

/// Initialize logging with `level` and one layer per sink.
///
/// Fails if a log file cannot be opened or a subscriber is already set.
pub fn init_with_sinks(level: &str, sinks: &[Sink]) -> crate::Result<()> {
    subscriber(level, sinks)?
        .try_init()
        .map_err(|e| SyError::Logging(e.to_string()))
}

fn subscriber(
    level: &str,
    sinks: &[Sink],
) -> crate::Result<impl Subscriber + Send + Sync + 'static> {
    let mut layers: Vec<Box<dyn Layer<Registry> + Send + Sync>> = Vec::with_capacity(sinks.len());
    for sink in sinks {
        let layer = match sink {
            Sink::Stderr => tracing_subscriber::fmt::layer()
                .compact()
                .with_writer(std::io::stderr)
                .boxed(),
            Sink::File {
                path,
                max_bytes,
                keep,
            } => tracing_subscriber::fmt::layer()
                .with_ansi(false)
                .with_writer(Mutex::new(RotatingFile::open(path, *max_bytes, *keep)?))
                .boxed(),
            Sink::Syslog(facility) => tracing_subscriber::fmt::layer()
                .with_ansi(false)
                .without_time()
                .with_level(false)
                .with_writer(SyslogWriter {
                    facility: *facility,
                })
                .boxed(),
        };
        layers.push(layer);
    }
    Ok(tracing_subscriber::registry()
        .with(layers)
        .with(filter_for(level)))
}

fn filter_for(level: &str) -> EnvFilter {
    let directive = if level.contains('=') || level.contains(',') {
        level.to_string()
    } else {
        format!("sy={level}")
    };
    EnvFilter::try_new(directive).unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER))
}

/// Append-only log file that rolls over once it would exceed `max_bytes`.
struct RotatingFile {
    path: PathBuf,
    max_bytes: u64,
    keep: usize,
    file: File,
    written: u64,
}

impl RotatingFile {
    fn open(path: &Path, max_bytes: u64, keep: usize) -> io::Result<Self> {
        if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
            fs::create_dir_all(dir)?;
        }
        let file = append(path)?;
        let written = file.metadata()?.len();
        Ok(Self {
            path: path.to_path_buf(),
            max_bytes,
            keep,
            file,
            written,
        })
    }

    fn rotate(&mut self) -> io::Result<()> {
        if self.keep == 0 {
            self.file.set_len(0)?;
        } else {
            for n in (1..self.keep).rev() {
                let from = numbered(&self.path, n);
                if from.exists() {
                    fs::rename(&from, numbered(&self.path, n + 1))?;
                }
            }
            fs::rename(&self.path, numbered(&self.path, 1))?;
            self.file = append(&self.path)?;
        }
        self.written = 0;
        Ok(())
    }
}

impl Write for RotatingFile {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if self.written > 0 && self.written + buf.len() as u64 > self.max_bytes {
            self.rotate()?;
        }
        let n = self.file.write(buf)?;
        self.written += n as u64;
        Ok(n)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.file.flush()
    }
}

fn append(path: &Path) -> io::Result<File> {
    OpenOptions::new().create(true).append(true).open(path)
}

fn numbered(path: &Path, n: usize) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(format!(".{n}"));
    PathBuf::from(name)
}

/// Syslog facility an event is filed under.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Facility {
    Auth,
    AuthPriv,
    Cron,
    Daemon,
    Kern,
    Lpr,
    Mail,
    News,
    Syslog,
    User,
    Uucp,
    Local0,
    Local1,
    Local2,
    Local3,
    Local4,
    Local5,
    Local6,
    Local7,
}

impl Facility {
    fn code(self) -> libc::c_int {
        match self {
            Self::Auth => libc::LOG_AUTH,
            Self::AuthPriv => libc::LOG_AUTHPRIV,
            Self::Cron => libc::LOG_CRON,
            Self::Daemon => libc::LOG_DAEMON,
            Self::Kern => libc::LOG_KERN,
            Self::Lpr => libc::LOG_LPR,
            Self::Mail => libc::LOG_MAIL,
            Self::News => libc::LOG_NEWS,
            Self::Syslog => libc::LOG_SYSLOG,
            Self::User => libc::LOG_USER,
            Self::Uucp => libc::LOG_UUCP,
            Self::Local0 => libc::LOG_LOCAL0,
            Self::Local1 => libc::LOG_LOCAL1,
            Self::Local2 => libc::LOG_LOCAL2,
            Self::Local3 => libc::LOG_LOCAL3,
            Self::Local4 => libc::LOG_LOCAL4,
            Self::Local5 => libc::LOG_LOCAL5,
            Self::Local6 => libc::LOG_LOCAL6,
            Self::Local7 => libc::LOG_LOCAL7,
        }
    }
}

impl FromStr for Facility {
    type Err = SyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s.to_ascii_lowercase().as_str() {
            "auth" => Self::Auth,
            "authpriv" => Self::AuthPriv,
            "cron" => Self::Cron,
            "daemon" => Self::Daemon,
            "kern" => Self::Kern,
            "lpr" => Self::Lpr,
            "mail" => Self::Mail,
            "news" => Self::News,
            "syslog" => Self::Syslog,
            "user" => Self::User,
            "uucp" => Self::Uucp,
            "local0" => Self::Local0,
            "local1" => Self::Local1,
            "local2" => Self::Local2,
            "local3" => Self::Local3,
            "local4" => Self::Local4,
            "local5" => Self::Local5,
            "local6" => Self::Local6,
            "local7" => Self::Local7,
            _ => return Err(SyError::Logging(format!("unknown syslog facility: {s}"))),
        })
    }
}

fn severity(level: &Level) -> libc::c_int {
    match *level {
        Level::ERROR => libc::LOG_ERR,
        Level::WARN => libc::LOG_WARNING,
        Level::INFO => libc::LOG_INFO,
        Level::DEBUG | Level::TRACE => libc::LOG_DEBUG,
    }
}

struct SyslogWriter {
    facility: Facility,
}

impl<'a> MakeWriter<'a> for SyslogWriter {
    type Writer = SyslogLine;

    fn make_writer(&'a self) -> Self::Writer {
        SyslogLine::new(self.facility.code() | libc::LOG_INFO)
    }

    fn make_writer_for(&'a self, meta: &Metadata<'_>) -> Self::Writer {
        SyslogLine::new(self.facility.code() | severity(meta.level()))
    }
}

/// One formatted event, handed to syslog(3) when dropped.
struct SyslogLine {
    priority: libc::c_int,
    buf: Vec<u8>,
}

impl SyslogLine {
    fn new(priority: libc::c_int) -> Self {
        Self {
            priority,
            buf: Vec::new(),
        }
    }
}

impl Write for SyslogLine {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.buf.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl Drop for SyslogLine {
    fn drop(&mut self) {
        if let Some(message) = syslog_message(&self.buf) {
            // SAFETY: both strings are NUL-terminated and outlive the call;
            // the fixed "%s" format consumes exactly one string argument.
            unsafe {
                libc::syslog(
                    self.priority,
                    b"%s\0".as_ptr().cast::<libc::c_char>(),
                    message.as_ptr(),
                )
            };
        }
    }
}

fn syslog_message(buf: &[u8]) -> Option<CString> {
    let text: Vec<u8> = buf
        .strip_suffix(b"\n")
        .unwrap_or(buf)
        .iter()
        .copied()
        .filter(|b| *b != 0)
        .collect();
    if text.is_empty() {
        return None;
    }
    CString::new(text).ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_try_init_idempotent() {
        // First call may or may not succeed depending on test order
        let _ = try_init();
        let _ = try_init();
    }

    #[test]
    fn test_filter_for_bare_level() {
        assert!(filter_for("debug").to_string().contains("sy=debug"));
        assert!(filter_for("sy=trace,warn").to_string().contains("sy=trace"));
    }

    #[test]
    fn test_logging_works() {
        let _ = init_with_filter("debug");

        tracing::info!("test info message");
        tracing::debug!(command = "true", "test debug message");
        tracing::error!("test error message");
    }

    #[test]
    fn test_file_sink_receives_events() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("logs/sy.log");
        let subscriber = subscriber("info", &[Sink::file(&path)]).unwrap();

        tracing::subscriber::with_default(subscriber, || {
            tracing::info!(host = "db01", "backup started");
            tracing::debug!("filtered out");
        });

        let text = fs::read_to_string(&path).unwrap();
        assert!(text.contains("backup started"));
        assert!(text.contains("host=\"db01\""));
        assert!(!text.contains("filtered out"));
        assert!(!text.contains('\x1b'));
    }

    #[test]
    fn test_rotating_file_keeps_newest() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("sy.log");
        let mut file = RotatingFile::open(&path, 10, 2).unwrap();

        for line in ["aaaaaaaa\n", "bbbbbbbb\n", "cccccccc\n", "dddddddd\n"] {
            file.write_all(line.as_bytes()).unwrap();
        }

        assert_eq!(fs::read_to_string(&path).unwrap(), "dddddddd\n");
        assert_eq!(fs::read_to_string(numbered(&path, 1)).unwrap(), "cccccccc\n");
        assert_eq!(fs::read_to_string(numbered(&path, 2)).unwrap(), "bbbbbbbb\n");
        assert!(!numbered(&path, 3).exists());
    }

    #[test]
    fn test_rotating_file_without_backups_truncates() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("sy.log");
        fs::write(&path, "old contents\n").unwrap();
        let mut file = RotatingFile::open(&path, 10, 0).unwrap();

        file.write_all(b"new\n").unwrap();

        assert_eq!(fs::read_to_string(&path).unwrap(), "new\n");
        assert!(!numbered(&path, 1).exists());
    }

    #[test]
    fn test_file_sink_unwritable_path() {
        let dir = TempDir::new().unwrap();
        let blocker = dir.path().join("file");
        fs::write(&blocker, "").unwrap();
        let err = init_with_sinks("info", &[Sink::file(blocker.join("sy.log"))]).unwrap_err();
        assert!(matches!(err, SyError::Io(_)));
    }

    #[test]
    fn test_facility_parsing() {
        assert_eq!("daemon".parse::<Facility>().unwrap(), Facility::Daemon);
        assert_eq!("LOCAL3".parse::<Facility>().unwrap(), Facility::Local3);
        assert_eq!(Facility::Mail.code(), libc::LOG_MAIL);
        assert!(matches!(
            "nope".parse::<Facility>(),
            Err(SyError::Logging(_))
        ));
    }

    #[test]
    fn test_syslog_priority() {
        let writer = SyslogWriter {
            facility: Facility::Local0,
        };
        assert_eq!(severity(&Level::WARN), libc::LOG_WARNING);
        assert_eq!(severity(&Level::TRACE), libc::LOG_DEBUG);
        let line = writer.make_writer();
        assert_eq!(line.priority, libc::LOG_LOCAL0 | libc::LOG_INFO);
    }

    #[test]
    fn test_syslog_message_cleanup() {
        assert_eq!(
            syslog_message(b"disk\0 full\n").unwrap().as_bytes(),
            b"disk full"
        );
        assert!(syslog_message(b"\n").is_none());
    }
}
