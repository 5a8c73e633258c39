//! Configuration management for sy.
//!
//! Configuration is loaded with the following priority (highest to lowest):
//! 1. Command-line arguments
//! 2. Environment variables
//! 3. Configuration file (JSON)
//! 4. Default values

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::cli::Args;
use crate::execution::{Executor, DEFAULT_BUFFER_SIZE, DEFAULT_SHELL, DEFAULT_TIMEOUT};
use crate::logging::{Facility, Sink};

/// Application configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Command execution defaults.
    pub exec: ExecSection,
    /// Logging configuration.
    pub logging: LoggingSection,
}

/// Command execution section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExecSection {
    /// Seconds before a command is killed.
    pub timeout_secs: u64,
    /// Bytes read per stream per wakeup.
    pub buffer_size: usize,
    /// Shell used to interpret command lines.
    pub shell: String,
}

impl Default for ExecSection {
    fn default() -> Self {
        Self {
            timeout_secs: DEFAULT_TIMEOUT.as_secs(),
            buffer_size: DEFAULT_BUFFER_SIZE,
            shell: DEFAULT_SHELL.to_string(),
        }
    }
}

/// Logging configuration section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSection {
    /// Log level (error, warn, info, debug, trace) or a full filter.
    pub level: String,
    /// Also append events to this file, rotated by size.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file: Option<PathBuf>,
    /// Also send events to syslog under this facility (`daemon`, `local0`...).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub syslog: Option<String>,
}

impl Default for LoggingSection {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            file: None,
            syslog: None,
        }
    }
}

impl Config {
    /// Load configuration from a JSON file.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(ConfigError::Io)?;
        serde_json::from_str(&content).map_err(ConfigError::Json)
    }

    /// Apply environment variable overrides.
    pub fn apply_env(&mut self) {
        self.apply_vars(|key| std::env::var(key).ok());
    }

    /// Apply overrides from a variable source.
    ///
    /// Unparsable numeric values are ignored.
    pub fn apply_vars<F>(&mut self, var: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(timeout) = var("SY_TIMEOUT").and_then(|v| v.parse().ok()) {
            self.exec.timeout_secs = timeout;
        }

        if let Some(size) = var("SY_BUFFER_SIZE").and_then(|v| v.parse().ok()) {
            self.exec.buffer_size = size;
        }

        if let Some(shell) = var("SY_SHELL").filter(|s| !s.is_empty()) {
            self.exec.shell = shell;
        }

        if let Some(file) = var("SY_LOG_FILE").filter(|f| !f.is_empty()) {
            self.logging.file = Some(PathBuf::from(file));
        }

        if let Some(facility) = var("SY_SYSLOG").filter(|f| !f.is_empty()) {
            self.logging.syslog = Some(facility);
        }

        if let Some(level) = var("SY_LOG_LEVEL") {
            self.logging.level = level;
        } else if let Some(level) = var("RUST_LOG") {
            self.logging.level = level;
        }
    }

    /// Apply CLI argument overrides.
    pub fn apply_args(&mut self, args: &Args) {
        if let Some(timeout) = args.timeout {
            self.exec.timeout_secs = timeout;
        }

        if let Some(size) = args.buffer_size {
            self.exec.buffer_size = size;
        }

        if let Some(ref level) = args.log_level {
            self.logging.level = level.clone();
        }

        if let Some(ref file) = args.log_file {
            self.logging.file = Some(file.clone());
        }
    }

    /// Load configuration with full priority chain.
    ///
    /// Priority: CLI args > env vars > config file > defaults
    pub fn load(args: &Args) -> Result<Self, ConfigError> {
        let mut config = match args.config {
            Some(ref path) => Config::from_file(path)?,
            None => Config::default(),
        };

        config.apply_env();
        config.apply_args(args);
        config.validate()?;

        Ok(config)
    }

    /// Reject values no command could run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.exec.buffer_size == 0 {
            return Err(ConfigError::Invalid("exec.buffer_size must be positive"));
        }
        if self.exec.shell.is_empty() {
            return Err(ConfigError::Invalid("exec.shell must not be empty"));
        }
        if let Some(ref facility) = self.logging.syslog {
            if facility.parse::<Facility>().is_err() {
                return Err(ConfigError::Invalid("logging.syslog is not a syslog facility"));
            }
        }
        Ok(())
    }

    /// Build an executor with these defaults.
    pub fn executor(&self) -> Executor {
        Executor::new()
            .with_shell(self.exec.shell.clone())
            .with_timeout(Duration::from_secs(self.exec.timeout_secs))
            .with_buffer_size(self.exec.buffer_size)
    }

    /// Get the log level filter string.
    pub fn log_filter(&self) -> &str {
        &self.logging.level
    }

    /// Log outputs: stderr, then the file and syslog sinks if configured.
    ///
    /// An unknown syslog facility is skipped; `validate` rejects it first.
    pub fn log_sinks(&self) -> Vec<Sink> {
        let mut sinks = vec![Sink::Stderr];
        if let Some(ref path) = self.logging.file {
            sinks.push(Sink::file(path));
        }
        if let Some(Ok(facility)) = self.logging.syslog.as_deref().map(str::parse::<Facility>) {
            sinks.push(Sink::Syslog(facility));
        }
        sinks
    }
}

/// Configuration errors.
#[derive(Debug)]
pub enum ConfigError {
    /// IO error reading config file.
    Io(std::io::Error),
    /// JSON parsing error.
    Json(serde_json::Error),
    /// A value is out of range.
    Invalid(&'static str),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io(e) => write!(f, "failed to read config file: {}", e),
            Self::Json(e) => write!(f, "failed to parse config file: {}", e),
            Self::Invalid(reason) => write!(f, "invalid configuration: {}", reason),
        }
    }
}

impl std::error::Error for ConfigError {}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.exec.timeout_secs, 60);
        assert_eq!(config.exec.buffer_size, 8192);
        assert_eq!(config.exec.shell, "/bin/sh");
        assert_eq!(config.logging.level, "info");
        assert_eq!(config.log_sinks(), vec![Sink::Stderr]);
    }

    #[test]
    fn test_config_from_json() {
        let json = r#"{
            "exec": {
                "timeout_secs": 15,
                "shell": "/bin/bash"
            },
            "logging": {
                "level": "debug"
            }
        }"#;

        let mut file = NamedTempFile::new().unwrap();
        file.write_all(json.as_bytes()).unwrap();

        let config = Config::from_file(file.path()).unwrap();
        assert_eq!(config.exec.timeout_secs, 15);
        assert_eq!(config.exec.buffer_size, 8192); // Default
        assert_eq!(config.exec.shell, "/bin/bash");
        assert_eq!(config.log_filter(), "debug");
    }

    #[test]
    fn test_config_bad_json() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(b"{ not json").unwrap();
        assert!(matches!(
            Config::from_file(file.path()),
            Err(ConfigError::Json(_))
        ));
    }

    #[test]
    fn test_apply_vars() {
        let vars: HashMap<&str, &str> = [
            ("SY_TIMEOUT", "5"),
            ("SY_BUFFER_SIZE", "oops"),
            ("SY_SHELL", "/bin/dash"),
            ("RUST_LOG", "trace"),
        ]
        .into_iter()
        .collect();

        let mut config = Config::default();
        config.apply_vars(|k| vars.get(k).map(|v| v.to_string()));

        assert_eq!(config.exec.timeout_secs, 5);
        assert_eq!(config.exec.buffer_size, 8192);
        assert_eq!(config.exec.shell, "/bin/dash");
        assert_eq!(config.logging.level, "trace");
    }

    #[test]
    fn test_sy_log_level_wins_over_rust_log() {
        let mut config = Config::default();
        config.apply_vars(|k| match k {
            "SY_LOG_LEVEL" => Some("warn".into()),
            "RUST_LOG" => Some("trace".into()),
            _ => None,
        });
        assert_eq!(config.logging.level, "warn");
    }

    #[test]
    fn test_apply_args() {
        let mut config = Config::default();
        let args = Args {
            timeout: Some(3),
            buffer_size: Some(512),
            log_level: Some("debug".to_string()),
            ..Args::default()
        };

        config.apply_args(&args);

        assert_eq!(config.exec.timeout_secs, 3);
        assert_eq!(config.exec.buffer_size, 512);
        assert_eq!(config.logging.level, "debug");
    }

    #[test]
    fn test_validate() {
        let mut config = Config::default();
        assert!(config.validate().is_ok());
        config.exec.buffer_size = 0;
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_log_sinks_from_json() {
        let json = r#"{ "logging": { "file": "/var/log/sy.log", "syslog": "local3" } }"#;
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(json.as_bytes()).unwrap();

        let config = Config::from_file(file.path()).unwrap();
        assert!(config.validate().is_ok());
        assert_eq!(
            config.log_sinks(),
            vec![
                Sink::Stderr,
                Sink::file("/var/log/sy.log"),
                Sink::Syslog(Facility::Local3),
            ]
        );
    }

    #[test]
    fn test_log_file_priority() {
        let mut config = Config::default();
        config.apply_vars(|k| (k == "SY_LOG_FILE").then(|| "/tmp/env.log".to_string()));
        assert_eq!(config.logging.file, Some(PathBuf::from("/tmp/env.log")));

        let args = Args {
            log_file: Some(PathBuf::from("/tmp/cli.log")),
            ..Args::default()
        };
        config.apply_args(&args);
        assert_eq!(config.logging.file, Some(PathBuf::from("/tmp/cli.log")));
    }

    #[test]
    fn test_validate_rejects_unknown_facility() {
        let mut config = Config::default();
        config.logging.syslog = Some("printer".to_string());
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
        assert_eq!(config.log_sinks(), vec![Sink::Stderr]);
    }

    #[test]
    fn test_executor_from_config() {
        let mut config = Config::default();
        config.exec.timeout_secs = 7;
        let executor = config.executor();
        assert_eq!(executor.timeout, Duration::from_secs(7));
        assert_eq!(executor.shell, "/bin/sh");
    }

    #[test]
    fn test_config_serialization() {
        let config = Config::default();
        let json = serde_json::to_string_pretty(&config).unwrap();
        assert!(json.contains("\"timeout_secs\""));
        assert!(json.contains("\"shell\""));
    }
}
