//! Logging
//!
//! Initializes `tracing` for component-boundary spans/events (DSL parse,
//! condition resolution, plan build, each fetch-strategy query) so a caller
//! can observe query shape without the planner returning it (SPEC_FULL.md §2).

use tracing_subscriber::fmt::writer::MakeWriterExt;
use tracing_subscriber::EnvFilter;

use crate::config::LoggingConfig;

/// Initializes the global `tracing` subscriber from `config`. Call once at
/// process startup; a second call is a caller bug, not handled here.
///
/// `format = "json"` emits structured JSON events (useful piped into log
/// aggregation); anything else emits the default human-readable format.
pub fn init(config: &LoggingConfig) {
    let filter = EnvFilter::try_new(&config.level).unwrap_or_else(|_| EnvFilter::new("info"));
    let writer = std::io::stdout.with_max_level(tracing::Level::TRACE);

    let subscriber = tracing_subscriber::fmt().with_env_filter(filter).with_writer(writer);

    if config.format == "json" {
        subscriber.json().init();
    } else {
        subscriber.init();
    }
}

/// Initializes logging to a rolling daily file under `directory`, returning
/// the guard that must be kept alive for the duration of the process (the
/// non-blocking writer flushes on drop).
pub fn init_to_file(config: &LoggingConfig, directory: impl AsRef<std::path::Path>, file_name_prefix: &str) -> tracing_appender::non_blocking::WorkerGuard {
    let file_appender = tracing_appender::rolling::daily(directory, file_name_prefix);
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);
    let filter = EnvFilter::try_new(&config.level).unwrap_or_else(|_| EnvFilter::new("info"));

    let subscriber = tracing_subscriber::fmt().with_env_filter(filter).with_writer(non_blocking);

    if config.format == "json" {
        subscriber.json().init();
    } else {
        subscriber.init();
    }
    guard
}
