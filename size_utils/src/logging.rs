//! Logging
//!
//! `tracing` subscriber set-up shared by the tools:
//! - daily rolling log file in the temp dir (plain text or JSON lines)
//! - stderr output, filtered separately so progress spinners stay readable
//! - cleanup of old log files
//!
//! # Examples
//!
//! ```no_run
//! use size_utils::logging::{init_logging, LogConfig};
//! use tracing::info;
//!
//! init_logging("fit-size", LogConfig::default()).expect("Failed to initialize logging");
//! info!("Program started");
//! ```

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use tracing::Level;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

#[derive(Debug, Clone)]
pub struct LogConfig {
    /// Defaults to the system temp dir.
    pub log_dir: PathBuf,
    /// Log files kept per program.
    pub max_files: usize,
    pub level: Level,
    /// Level shown on stderr; file logging is unaffected.
    pub stderr_level: Level,
    /// Write the file log as JSON lines.
    pub json: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            log_dir: std::env::temp_dir(),
            max_files: 5,
            level: Level::INFO,
            stderr_level: Level::WARN,
            json: false,
        }
    }
}

impl LogConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_log_dir<P: AsRef<Path>>(mut self, dir: P) -> Self {
        self.log_dir = dir.as_ref().to_path_buf();
        self
    }

    pub fn with_max_files(mut self, count: usize) -> Self {
        self.max_files = count;
        self
    }

    pub fn with_level(mut self, level: Level) -> Self {
        self.level = level;
        self
    }

    pub fn with_stderr_level(mut self, level: Level) -> Self {
        self.stderr_level = level;
        self
    }

    pub fn with_json(mut self, json: bool) -> Self {
        self.json = json;
        self
    }

    /// `RUST_LOG`-style directives for the optimizer crates.
    fn filter_directives(&self, program_name: &str) -> String {
        let program_target = program_name.replace('-', "_");
        format!(
            "{}={},size_utils={}",
            program_target, self.level, self.level
        )
    }
}

/// Installs the global subscriber. Log file: `{log_dir}/{program_name}.log.<date>`.
///
/// `RUST_LOG` overrides the configured level when set.
pub fn init_logging(program_name: &str, config: LogConfig) -> Result<()> {
    std::fs::create_dir_all(&config.log_dir)
        .with_context(|| format!("Failed to create log directory: {:?}", config.log_dir))?;

    let log_file_name = format!("{}.log", program_name);
    let file_appender = RollingFileAppender::new(Rotation::DAILY, &config.log_dir, &log_file_name);

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.filter_directives(program_name)));

    let (json_layer, text_layer) = if config.json {
        let layer = fmt::layer()
            .json()
            .with_writer(file_appender)
            .with_target(true)
            .with_thread_ids(true);
        (Some(layer), None)
    } else {
        let layer = fmt::layer()
            .with_writer(file_appender)
            .with_ansi(false)
            .with_target(true)
            .with_thread_ids(true)
            .with_line_number(true);
        (None, Some(layer))
    };

    let stderr_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_ansi(true)
        .with_target(false)
        .with_line_number(false)
        .with_filter(LevelFilter::from_level(config.stderr_level));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(json_layer)
        .with(text_layer)
        .with(stderr_layer)
        .try_init()
        .context("Logging was already initialized")?;

    tracing::info!(
        program = program_name,
        log_dir = ?config.log_dir,
        log_file = log_file_name,
        max_files = config.max_files,
        level = ?config.level,
        json = config.json,
        "Logging system initialized"
    );

    cleanup_old_logs(&config.log_dir, program_name, config.max_files)?;
    Ok(())
}

/// Deletes all but the `max_files` newest `{program_name}.log*` files.
/// Returns how many were removed.
pub fn cleanup_old_logs(log_dir: &Path, program_name: &str, max_files: usize) -> Result<usize> {
    use std::fs;

    let entries = fs::read_dir(log_dir)
        .with_context(|| format!("Failed to read log directory: {:?}", log_dir))?;

    let prefix = format!("{}.log", program_name);
    let mut log_files: Vec<(PathBuf, std::time::SystemTime)> = Vec::new();

    for entry in entries {
        let path = entry?.path();
        if !path.is_file() {
            continue;
        }
        let matches = path
            .file_name()
            .map(|name| name.to_string_lossy().starts_with(&prefix))
            .unwrap_or(false);
        if !matches {
            continue;
        }
        if let Ok(modified) = fs::metadata(&path).and_then(|m| m.modified()) {
            log_files.push((path, modified));
        }
    }

    if log_files.len() <= max_files {
        return Ok(0);
    }

    // newest first
    log_files.sort_by(|a, b| b.1.cmp(&a.1));

    let mut removed = 0;
    for (path, _) in log_files.iter().skip(max_files) {
        match fs::remove_file(path) {
            Ok(()) => {
                removed += 1;
                tracing::debug!(path = ?path, "Removed old log file");
            }
            Err(e) => tracing::warn!(path = ?path, error = %e, "Failed to remove old log file"),
        }
    }
    Ok(removed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_builder() {
        let config = LogConfig::new()
            .with_log_dir("/tmp/fit-size-logs")
            .with_max_files(2)
            .with_level(Level::DEBUG)
            .with_json(true);
        assert_eq!(config.log_dir, PathBuf::from("/tmp/fit-size-logs"));
        assert_eq!(config.max_files, 2);
        assert!(config.json);
        assert_eq!(
            config.filter_directives("fit-size"),
            "fit_size=DEBUG,size_utils=DEBUG"
        );
    }

    #[test]
    fn test_cleanup_keeps_newest() {
        let dir = tempfile::tempdir().unwrap();
        for day in 1..=4u64 {
            let path = dir.path().join(format!("fit-size.log.2026-10-0{}", day));
            fs::write(&path, "x").unwrap();
            let mtime = std::time::UNIX_EPOCH + std::time::Duration::from_secs(1_790_000_000 + day * 86_400);
            fs::File::options()
                .write(true)
                .open(&path)
                .unwrap()
                .set_modified(mtime)
                .unwrap();
        }
        fs::write(dir.path().join("other-tool.log.2026-10-01"), "x").unwrap();

        let removed = cleanup_old_logs(dir.path(), "fit-size", 2).unwrap();
        assert_eq!(removed, 2);

        assert!(dir.path().join("fit-size.log.2026-10-04").exists());
        assert!(dir.path().join("fit-size.log.2026-10-03").exists());
        assert!(!dir.path().join("fit-size.log.2026-10-01").exists());
        assert!(dir.path().join("other-tool.log.2026-10-01").exists());
    }

    #[test]
    fn test_cleanup_under_limit() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("fit-size.log"), "x").unwrap();
        assert_eq!(cleanup_old_logs(dir.path(), "fit-size", 5).unwrap(), 0);
    }
}
