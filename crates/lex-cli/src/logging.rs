//! Tracing initialization.
//!
//! Logs go to a daily-rolling file under ${LEX_HOME}/logs; stdout and
//! stderr belong to the renderers.

use lex_core::config::{Config, paths};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// Initializes the global subscriber. Returns a guard that must be kept
/// alive for the lifetime of the process so buffered log lines get flushed.
///
/// Logging is best-effort: failure to set up the log file disables it
/// rather than failing the command.
pub fn init(config: &Config) -> Option<WorkerGuard> {
    // RUST_LOG wins; otherwise the configured level, with noisy HTTP crates
    // capped at warn.
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        tracing_subscriber::EnvFilter::new(format!(
            "{},hyper=warn,reqwest=warn",
            config.log_level
        ))
    });

    let log_dir = paths::logs_dir();
    if std::fs::create_dir_all(&log_dir).is_err() {
        return None;
    }
    let file_appender = tracing_appender::rolling::daily(&log_dir, "lex.log");
    let (writer, guard) = tracing_appender::non_blocking(file_appender);

    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_writer(writer)
        .with_ansi(false);

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .try_init()
        .ok()?;

    Some(guard)
}
