//! Logging infrastructure for wox-settings
//!
//! Logs are written to `~/.local/state/wox-settings/wox-settings.log` following XDG standards.
//!
//! The configured level applies to this workspace's own targets only:
//!
//! | Target | Emits |
//! |--------|-------|
//! | `wox_settings_core::migration` | one-shot migration steps, skipped legacy files |
//! | `wox_settings_core::manager` | setting updates, side-effect failures |
//! | `wox_settings_core` | store, legacy loader, everything else in the library |
//! | `wox_settings` | the CLI |
//!
//! Third-party crates stay at `warn`. `RUST_LOG` overrides all of it.

use crate::config::{Config, LoggingConfig};
use crate::error::{Error, Result};
use std::path::PathBuf;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
    EnvFilter,
};

const LOG_FILE_NAME: &str = "wox-settings.log";

/// Targets that follow the configured level.
pub const TARGETS: &[&str] = &[
    "wox_settings_core::migration",
    "wox_settings_core::manager",
    "wox_settings_core",
    "wox_settings",
];

/// Level for everything outside [`TARGETS`].
const DEPENDENCY_LEVEL: &str = "warn";

/// Initialize the logging system
///
/// Sets up tracing with:
/// - File output to XDG state directory
/// - Daily rotation, keeping at most `max_files` files
/// - Per-target levels from config, or RUST_LOG when set
pub fn init(config: &LoggingConfig) -> Result<LoggingGuard> {
    let filter = build_filter(config)?;
    let log_dir = Config::state_dir();

    std::fs::create_dir_all(&log_dir)?;

    let file_appender = RollingFileAppender::builder()
        .rotation(Rotation::DAILY)
        .filename_prefix(LOG_FILE_NAME)
        .max_log_files(config.max_files.max(1))
        .build(&log_dir)
        .map_err(|e| Error::Config(format!("failed to create log appender: {}", e)))?;

    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    // Spans close with timing so a slow migration shows up in the log
    let file_layer = fmt::layer()
        .with_writer(non_blocking)
        .with_ansi(false)
        .with_target(true)
        .with_file(true)
        .with_line_number(true)
        .with_span_events(FmtSpan::CLOSE);

    tracing_subscriber::registry()
        .with(filter)
        .with(file_layer)
        .init();

    tracing::info!(
        log_dir = %log_dir.display(),
        level = %config.level,
        max_files = config.max_files,
        "Logging initialized"
    );

    Ok(LoggingGuard { _guard: guard })
}

/// Filter from `RUST_LOG`, falling back to [`filter_directives`].
pub fn build_filter(config: &LoggingConfig) -> Result<EnvFilter> {
    if let Ok(filter) = EnvFilter::try_from_default_env() {
        return Ok(filter);
    }
    EnvFilter::try_new(filter_directives(&config.level)?)
        .map_err(|e| Error::Config(format!("invalid log level '{}': {}", config.level, e)))
}

/// Directive string applying `level` to [`TARGETS`].
pub fn filter_directives(level: &str) -> Result<String> {
    let level = level.trim().to_ascii_lowercase();
    if !matches!(
        level.as_str(),
        "trace" | "debug" | "info" | "warn" | "error" | "off"
    ) {
        return Err(Error::Config(format!("invalid log level '{}'", level)));
    }

    let mut directives = vec![DEPENDENCY_LEVEL.to_string()];
    directives.extend(TARGETS.iter().map(|target| format!("{}={}", target, level)));
    Ok(directives.join(","))
}

/// Initialize logging for tests (logs to stdout)
pub fn init_test() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .with_span_events(FmtSpan::CLOSE)
        .try_init();
}

/// Guard that keeps the logging system alive
///
/// When dropped, flushes any pending log writes.
pub struct LoggingGuard {
    _guard: tracing_appender::non_blocking::WorkerGuard,
}

/// Returns the log file path
pub fn log_file_path() -> PathBuf {
    Config::log_path()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_file_path() {
        let path = log_file_path();
        assert!(path.ends_with(LOG_FILE_NAME));
    }

    #[test]
    fn test_directives_scope_level_to_workspace_targets() {
        let directives = filter_directives("Debug").unwrap();
        assert_eq!(
            directives,
            "warn,wox_settings_core::migration=debug,wox_settings_core::manager=debug,\
             wox_settings_core=debug,wox_settings=debug"
        );
    }

    #[test]
    fn test_invalid_level_rejected() {
        let err = filter_directives("loud").unwrap_err();
        assert!(matches!(err, Error::Config(_)));

        let config = LoggingConfig {
            level: "loud".to_string(),
            max_files: 1,
        };
        if std::env::var_os("RUST_LOG").is_none() {
            assert!(build_filter(&config).is_err());
        }
    }
}
