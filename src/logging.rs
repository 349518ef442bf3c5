use std::fs;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Console output for the operator plus daily-rotated JSON files under
/// `logs/` for later inspection. `RUST_LOG` overrides the default filter.
pub fn init_logging() {
    let _ = fs::create_dir_all("logs");

    let file_appender = tracing_appender::rolling::daily("logs", "jobflow.log");
    let (file_writer, guard) = tracing_appender::non_blocking(file_appender);

    let filter = EnvFilter::from_default_env()
        .add_directive("jobflow=info".parse().expect("valid filter directive"));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().json().with_writer(file_writer))
        .with(fmt::layer().compact().with_writer(std::io::stdout))
        .init();

    // The guard flushes the file writer on drop; the subscriber is global,
    // so the guard must live as long as the process.
    std::mem::forget(guard);
}
