//! Logging setup for the Kiwi processes.
//!
//! Console output always; when a log directory is given, a second layer
//! writes a daily-rotated file named after the module. File writes go
//! through a background thread, so the returned [`LogGuard`] must live until
//! the process exits or buffered lines are lost.

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Keeps the file writer flushing. Drop it last.
#[must_use = "dropping the guard stops file logging"]
pub struct LogGuard {
    _file: Option<WorkerGuard>,
}

/// Install the global subscriber. Call once, before any other work.
///
/// `RUST_LOG` overrides `log_level` when set. Files land in
/// `<log_dir>/<module_name>.YYYY-MM-DD`.
pub fn init_logging(log_level: &str, log_dir: Option<&str>, module_name: &str) -> LogGuard {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level));

    let console_layer = fmt::layer().with_target(true).with_thread_ids(true);

    let (file_layer, file_guard) = match log_dir {
        Some(dir) => {
            let (writer, guard) = tracing_appender::non_blocking(tracing_appender::rolling::daily(dir, module_name));
            let layer = fmt::layer()
                .with_writer(writer)
                .with_ansi(false)
                .with_target(true)
                .with_thread_ids(true);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(console_layer)
        .with(file_layer)
        .init();

    LogGuard { _file: file_guard }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_layer_flushes_when_guard_drops() {
        let dir = tempfile::tempdir().unwrap();
        let guard = init_logging("info", dir.path().to_str(), "kiwi-test");
        tracing::info!("logging-smoke-line");
        drop(guard);

        let logged: String = std::fs::read_dir(dir.path())
            .unwrap()
            .map(|entry| entry.unwrap().path())
            .filter(|path| path.file_name().unwrap().to_string_lossy().starts_with("kiwi-test"))
            .map(|path| std::fs::read_to_string(path).unwrap())
            .collect();
        assert!(logged.contains("logging-smoke-line"));
    }
}
