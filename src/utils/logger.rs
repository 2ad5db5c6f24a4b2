use std::fmt::Display;
use std::path::Path;

use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use crate::utils::clock;
use crate::utils::constants::{DEFAULT_LOG_FILTER, LOG_FILE_PREFIX};

fn filter(level: Option<&str>) -> EnvFilter {
    match level {
        Some(level) => EnvFilter::new(format!("pigeonhole={}", level)),
        None => EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER)),
    }
}

pub fn init_tracing() {
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter(None))
        .compact()
        .with_line_number(true)
        .with_file(true)
        .finish();
    let _ = tracing::subscriber::set_global_default(subscriber);
}

//Console output plus an optional daily rolling file. The returned guard must outlive the runtime or
//buffered file lines are lost.
pub fn init_server_tracing(level: Option<&str>, log_dir: Option<&Path>) -> Option<WorkerGuard> {
    let console = fmt::layer()
        .compact()
        .with_line_number(true)
        .with_file(true);

    match log_dir {
        Some(dir) => {
            let appender = tracing_appender::rolling::daily(dir, LOG_FILE_PREFIX);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let file = fmt::layer().with_ansi(false).with_writer(writer);
            let _ = tracing_subscriber::registry()
                .with(filter(level))
                .with(console)
                .with(file)
                .try_init();
            Some(guard)
        }
        None => {
            let _ = tracing_subscriber::registry()
                .with(filter(level))
                .with(console)
                .try_init();
            None
        }
    }
}

/// Emits one audit line: `timestamp, actor, description`.
pub fn audit(actor: &str, description: impl Display) {
    info!(target: "pigeonhole::audit", "{}, {}, {}", clock::now(), actor, description);
}
