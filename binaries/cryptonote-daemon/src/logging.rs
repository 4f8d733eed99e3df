//! Structured logging setup (§6 `--log-file`/`--log-level`), built on
//! `tracing-subscriber`'s `EnvFilter` layer with an optional rolling file
//! appender, generalizing the fixed five-level scheme (§6: "0..4, 0 = ERROR
//! baseline") onto `tracing`'s level hierarchy. The filter is wrapped in a
//! `reload::Layer` so the REPL's `set_log` command (§6) can change it
//! without restarting the process.

use std::path::Path;

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{reload, EnvFilter, Registry};

pub type FilterHandle = reload::Handle<EnvFilter, Registry>;

/// Holds the guard returned by `tracing_appender`'s non-blocking writer;
/// dropping it flushes the background thread, so the daemon keeps this
/// alive for its whole lifetime.
pub struct LoggingGuard(#[allow(dead_code)] Option<WorkerGuard>);

fn level_filter(log_level: u8) -> &'static str {
    match log_level {
        0 => "error",
        1 => "warn",
        2 => "info",
        3 => "debug",
        _ => "trace",
    }
}

pub fn init(log_level: u8, log_file: Option<&Path>) -> (LoggingGuard, FilterHandle) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level_filter(log_level)));
    let (filter, handle) = reload::Layer::new(filter);

    match log_file {
        Some(path) => {
            let directory = path
                .parent()
                .filter(|p| !p.as_os_str().is_empty())
                .unwrap_or_else(|| Path::new("."));
            let file_name = path.file_name().unwrap_or_else(|| std::ffi::OsStr::new("cryptonote-daemon.log"));
            let appender = tracing_appender::rolling::never(directory, file_name);
            let (non_blocking, guard) = tracing_appender::non_blocking(appender);
            let fmt_layer = tracing_subscriber::fmt::layer().with_writer(non_blocking).with_ansi(false);
            Registry::default().with(filter).with(fmt_layer).init();
            (LoggingGuard(Some(guard)), handle)
        }
        None => {
            let fmt_layer = tracing_subscriber::fmt::layer();
            Registry::default().with(filter).with(fmt_layer).init();
            (LoggingGuard(None), handle)
        }
    }
}
