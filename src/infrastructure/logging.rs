//! Logging system configuration and initialization
//!
//! - Console output on stderr, so stdout stays free for command output
//! - Optional daily-rolling file output through a non-blocking writer
//! - Optional JSON formatting for the file layer
//! - `RUST_LOG` overrides the configured level and module filters

#![allow(clippy::uninlined_format_args)]

use anyhow::{Result, anyhow};
use chrono::Utc;
use lazy_static::lazy_static;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::{debug, info, warn};
use tracing_appender::{non_blocking, rolling};
use tracing_subscriber::{
    EnvFilter, Registry,
    fmt::{self, time::FormatTime},
    layer::SubscriberExt,
    util::SubscriberInitExt,
};

pub use crate::infrastructure::config::LoggingConfig;

// File writer guards must outlive the subscriber
lazy_static! {
    static ref LOG_GUARDS: Mutex<Vec<tracing_appender::non_blocking::WorkerGuard>> = Mutex::new(Vec::new());
}

/// RFC 3339-ish UTC timestamps with milliseconds
struct UtcTimeFormatter;

impl FormatTime for UtcTimeFormatter {
    fn format_time(&self, w: &mut fmt::format::Writer<'_>) -> std::fmt::Result {
        write!(w, "{}", Utc::now().format("%Y-%m-%dT%H:%M:%S%.3fZ"))
    }
}

/// Initialize logging with the default configuration
pub fn init_logging() -> Result<()> {
    init_logging_with_config(LoggingConfig::default())
}

/// Filter from `RUST_LOG` when set, otherwise the configured level plus module filters.
///
/// Module filters quiet browser protocol and HTTP internals unless the level is `trace`.
pub fn build_env_filter(config: &LoggingConfig) -> Result<EnvFilter> {
    if let Ok(filter) = EnvFilter::try_from_default_env() {
        return Ok(filter);
    }

    let mut filter = EnvFilter::try_new(&config.level)
        .map_err(|e| anyhow!("Invalid log level '{}': {}", config.level, e))?;

    if !config.level.eq_ignore_ascii_case("trace") {
        let mut modules: Vec<_> = config.module_filters.iter().collect();
        modules.sort();
        for (module, level) in modules {
            let directive = format!("{module}={level}");
            match directive.parse() {
                Ok(directive) => filter = filter.add_directive(directive),
                Err(e) => warn!("Ignoring log filter '{}': {}", directive, e),
            }
        }
    }

    Ok(filter)
}

/// Initialize logging with custom configuration
pub fn init_logging_with_config(config: LoggingConfig) -> Result<()> {
    if !config.file_output && !config.console_output {
        return Err(anyhow!("No logging output configured"));
    }

    let env_filter = build_env_filter(&config)?;
    let registry = Registry::default().with(env_filter);

    if config.file_output {
        std::fs::create_dir_all(&config.log_dir)
            .map_err(|e| anyhow!("Failed to create log directory {:?}: {}", config.log_dir, e))?;
        cleanup_old_logs(&config.log_dir, &config.file_name, config.max_files)?;

        let file_appender = rolling::daily(&config.log_dir, &config.file_name);
        let (file_writer, file_guard) = non_blocking(file_appender);
        LOG_GUARDS
            .lock()
            .map_err(|_| anyhow!("Log guard registry poisoned"))?
            .push(file_guard);

        if config.json_format {
            let file_layer = fmt::Layer::new()
                .json()
                .with_writer(file_writer)
                .with_timer(UtcTimeFormatter)
                .with_target(true)
                .with_file(true)
                .with_line_number(true)
                .with_ansi(false);
            let console_layer = config.console_output.then(|| {
                fmt::Layer::new()
                    .with_writer(std::io::stderr)
                    .with_timer(UtcTimeFormatter)
                    .with_target(false)
            });
            registry.with(file_layer).with(console_layer).try_init()?;
        } else {
            let file_layer = fmt::Layer::new()
                .with_writer(file_writer)
                .with_timer(UtcTimeFormatter)
                .with_target(true)
                .with_ansi(false);
            let console_layer = config.console_output.then(|| {
                fmt::Layer::new()
                    .with_writer(std::io::stderr)
                    .with_timer(UtcTimeFormatter)
                    .with_target(false)
            });
            registry.with(file_layer).with(console_layer).try_init()?;
        }
    } else {
        let console_layer = config.console_output.then(|| {
            fmt::Layer::new()
                .with_writer(std::io::stderr)
                .with_timer(UtcTimeFormatter)
                .with_target(false)
        });
        registry.with(console_layer).try_init()?;
    }

    debug!(
        "Logging initialized: level={}, console={}, file={}, json={}",
        config.level, config.console_output, config.file_output, config.json_format
    );
    if config.file_output {
        info!("Log directory: {:?}", config.log_dir);
    }

    Ok(())
}

/// Delete the oldest rolled files for `file_name`, keeping `max_files` of them
pub fn cleanup_old_logs(log_dir: &Path, file_name: &str, max_files: u32) -> Result<usize> {
    if !log_dir.exists() {
        return Ok(0);
    }

    let mut log_files: Vec<(PathBuf, std::time::SystemTime)> = Vec::new();
    for entry in std::fs::read_dir(log_dir)? {
        let entry = entry?;
        let path = entry.path();
        let is_ours = path
            .file_name()
            .and_then(|n| n.to_str())
            .is_some_and(|n| n.starts_with(file_name));
        if !is_ours || !path.is_file() {
            continue;
        }
        if let Ok(modified) = entry.metadata().and_then(|m| m.modified()) {
            log_files.push((path, modified));
        }
    }

    // Newest first
    log_files.sort_by(|a, b| b.1.cmp(&a.1));

    let mut removed = 0;
    for (path, _) in log_files.iter().skip(max_files as usize) {
        match std::fs::remove_file(path) {
            Ok(()) => removed += 1,
            Err(e) => warn!("Failed to remove old log file {:?}: {}", path, e),
        }
    }
    Ok(removed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::{Duration, SystemTime};

    #[test]
    fn test_logging_config_default() {
        let config = LoggingConfig::default();
        assert_eq!(config.level, "info");
        assert!(config.console_output);
        assert!(!config.file_output);
        assert!(config.module_filters.contains_key("chromiumoxide"));
    }

    #[test]
    fn test_filter_rejects_garbage_level() {
        if std::env::var_os("RUST_LOG").is_some() {
            return;
        }
        let config = LoggingConfig {
            level: "info,product_import=loud".to_string(),
            ..Default::default()
        };
        assert!(build_env_filter(&config).is_err());
        assert!(build_env_filter(&LoggingConfig::default()).is_ok());
    }

    #[test]
    fn test_no_outputs_is_an_error() {
        let config = LoggingConfig {
            console_output: false,
            file_output: false,
            ..Default::default()
        };
        assert!(init_logging_with_config(config).is_err());
    }

    #[test]
    fn test_init_with_console_and_json_file() {
        let dir = tempfile::tempdir().unwrap();
        let config = LoggingConfig {
            file_output: true,
            json_format: true,
            log_dir: dir.path().join("logs"),
            ..Default::default()
        };
        assert!(init_logging_with_config(config).is_ok());
        assert!(dir.path().join("logs").is_dir());
    }

    #[test]
    fn test_cleanup_keeps_newest_files() {
        let dir = tempfile::tempdir().unwrap();
        let base = SystemTime::now() - Duration::from_secs(3600);
        for day in 1..=4 {
            let path = dir.path().join(format!("app.log.2026-10-0{day}"));
            let file = std::fs::File::create(&path).unwrap();
            file.set_modified(base + Duration::from_secs(day * 60)).unwrap();
        }
        std::fs::write(dir.path().join("unrelated.txt"), "keep").unwrap();

        let removed = cleanup_old_logs(dir.path(), "app.log", 2).unwrap();
        assert_eq!(removed, 2);
        assert!(dir.path().join("app.log.2026-10-04").exists());
        assert!(dir.path().join("app.log.2026-10-03").exists());
        assert!(!dir.path().join("app.log.2026-10-01").exists());
        assert!(dir.path().join("unrelated.txt").exists());
    }
}
