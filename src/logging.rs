//! Tracing setup: compact stdout output plus a daily-rolling file under the
//! given root, filtered through `RUST_LOG` (default `info`).

use std::path::Path;

use once_cell::sync::OnceCell;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

static INITIALIZED: OnceCell<()> = OnceCell::new();

/// Keeps the non-blocking file writer alive; drop flushes and stops it.
pub struct LoggingGuards {
    _file_guards: Vec<WorkerGuard>,
}

/// Initializes the global subscriber. Idempotent: repeated calls return an
/// empty guard set. When the log directory cannot be created, file logging
/// is disabled and only stdout output remains.
pub fn init(root: &Path) -> LoggingGuards {
    if INITIALIZED.set(()).is_err() {
        return LoggingGuards {
            _file_guards: Vec::new(),
        };
    }

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let stdout_layer = fmt::layer().with_target(true).with_level(true).compact();

    let base = tracing_subscriber::registry().with(filter).with(stdout_layer);

    let log_dir = root.join("logs");
    if let Err(err) = std::fs::create_dir_all(&log_dir) {
        base.try_init().ok();
        tracing::warn!("file logging disabled ({}): {}", log_dir.display(), err);
        return LoggingGuards {
            _file_guards: Vec::new(),
        };
    }

    let appender = tracing_appender::rolling::daily(&log_dir, "rfsentry.log");
    let (writer, guard) = tracing_appender::non_blocking(appender);
    let file_layer = fmt::layer()
        .with_target(true)
        .with_level(true)
        .with_ansi(false)
        .compact()
        .with_writer(writer);

    base.with(file_layer).try_init().ok();

    LoggingGuards {
        _file_guards: vec![guard],
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn init_is_idempotent() {
        let dir = std::env::temp_dir().join("rfsentry-logging-test");
        let _first = init(&dir);
        let second = init(&dir);
        assert!(second._file_guards.is_empty());
    }
}
