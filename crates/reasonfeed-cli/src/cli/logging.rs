//! Tracing subscriber setup.

use std::path::PathBuf;

use reasonfeed_core::config::{Config, paths};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;

/// Filter variable checked before `RUST_LOG`.
const LOG_ENV: &str = "REASONFEED_LOG";
const DEFAULT_LEVEL: &str = "warn";

/// Installs the global subscriber.
///
/// Logs go to stderr, or to a daily-rotated file when `log_file` is set. The
/// returned guard flushes the file writer on drop and must outlive logging.
pub fn init(config: &Config) -> Option<WorkerGuard> {
    let target = config
        .log_file
        .as_deref()
        .map(str::trim)
        .filter(|file| !file.is_empty())
        .map(resolve_log_path)
        .and_then(|path| {
            let name = path.file_name()?.to_os_string();
            let dir = path.parent().map(PathBuf::from).unwrap_or_default();
            Some((dir, name))
        });

    match target {
        Some((dir, name)) => {
            let appender = tracing_appender::rolling::daily(dir, name);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let _ = tracing_subscriber::fmt()
                .with_env_filter(env_filter())
                .with_writer(writer)
                .with_ansi(false)
                .try_init();
            Some(guard)
        }
        None => {
            let _ = tracing_subscriber::fmt()
                .with_env_filter(env_filter())
                .with_writer(std::io::stderr)
                .try_init();
            None
        }
    }
}

fn env_filter() -> EnvFilter {
    EnvFilter::try_from_env(LOG_ENV)
        .or_else(|_| EnvFilter::try_from_default_env())
        .unwrap_or_else(|_| EnvFilter::new(DEFAULT_LEVEL))
}

/// Relative paths resolve against REASONFEED_HOME.
fn resolve_log_path(file: &str) -> PathBuf {
    let path = PathBuf::from(file);
    if path.is_absolute() {
        path
    } else {
        paths::reasonfeed_home().join(path)
    }
}
