//! Logging initialization.
//!
//! - **Production**: JSON logs to a daily rolling file plus compact stdout
//!   for the journal
//! - **Development**: pretty stdout with span events
//!
//! The filter comes from `RUST_LOG`, then `BILLSPC_LOG_LEVEL`, then the
//! configured level.

use std::path::PathBuf;
use std::sync::OnceLock;

use billspc_core::LoggingConfig;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Environment variable overriding the configured log level.
pub const LOG_LEVEL_ENV: &str = "BILLSPC_LOG_LEVEL";

const LOG_FILE_PREFIX: &str = "billspc";

// Non-blocking writers stop flushing once their guard drops.
static FILE_GUARD: OnceLock<WorkerGuard> = OnceLock::new();
static STDOUT_GUARD: OnceLock<WorkerGuard> = OnceLock::new();

/// Install the global subscriber.
///
/// # Errors
///
/// Returns an error if the filter directive cannot be parsed or the log
/// directory cannot be created.
pub fn init(config: &LoggingConfig) -> anyhow::Result<()> {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(fallback_level(config)))?;

    if config.production {
        init_production(env_filter)
    } else {
        init_development(env_filter);
        Ok(())
    }
}

fn fallback_level(config: &LoggingConfig) -> String {
    std::env::var(LOG_LEVEL_ENV).unwrap_or_else(|_| config.level.clone())
}

fn init_production(env_filter: EnvFilter) -> anyhow::Result<()> {
    let log_dir = log_directory();
    std::fs::create_dir_all(&log_dir)?;

    let file_appender = RollingFileAppender::new(Rotation::DAILY, &log_dir, LOG_FILE_PREFIX);
    let (file_writer, file_guard) = tracing_appender::non_blocking(file_appender);
    let (stdout_writer, stdout_guard) = tracing_appender::non_blocking(std::io::stdout());

    let file_layer = tracing_subscriber::fmt::layer()
        .json()
        .with_writer(file_writer)
        .with_target(true)
        .with_file(true)
        .with_line_number(true);

    // journald adds its own timestamps and does not render ANSI
    let stdout_layer = tracing_subscriber::fmt::layer()
        .compact()
        .with_writer(stdout_writer)
        .with_target(true)
        .without_time()
        .with_ansi(false);

    tracing_subscriber::registry()
        .with(env_filter)
        .with(file_layer)
        .with(stdout_layer)
        .init();

    let _ = FILE_GUARD.set(file_guard);
    let _ = STDOUT_GUARD.set(stdout_guard);
    Ok(())
}

fn init_development(env_filter: EnvFilter) {
    let stdout_layer = tracing_subscriber::fmt::layer()
        .pretty()
        .with_target(true)
        .with_file(true)
        .with_line_number(true)
        .with_span_events(FmtSpan::NEW | FmtSpan::CLOSE);

    tracing_subscriber::registry()
        .with(env_filter)
        .with(stdout_layer)
        .init();
}

/// Where production log files go.
fn log_directory() -> PathBuf {
    #[cfg(target_os = "linux")]
    {
        PathBuf::from("/var/log/billspc")
    }
    #[cfg(not(target_os = "linux"))]
    {
        directories::ProjectDirs::from("", "", "billspc")
            .map_or_else(|| PathBuf::from("./logs"), |dirs| dirs.data_dir().join("logs"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_directory_is_named_for_the_service() {
        let dir = log_directory();
        assert!(dir.to_string_lossy().contains("billspc") || dir.ends_with("logs"));
    }

    #[test]
    fn test_configured_level_parses_as_filter() {
        let config = LoggingConfig {
            production: false,
            level: "billspc_core=debug,info".to_string(),
        };
        assert!(EnvFilter::try_new(&config.level).is_ok());
    }
}
