//! Logging Infrastructure
//!
//! Structured logging setup. `RUST_LOG` overrides the configured level,
//! and an optional directory enables daily-rolled file output.

use std::path::Path;
use tracing_subscriber::EnvFilter;

/// Initialize the logger
pub fn init_logger(log_level: &str, log_dir: Option<&str>) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(log_level));

    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_file(false)
        .with_line_number(false)
        .with_thread_ids(false)
        .with_target(true);

    // File output only when the directory already exists
    if let Some(dir) = log_dir
        && Path::new(dir).exists()
    {
        let file_appender = tracing_appender::rolling::daily(dir, "checkout-server");
        subscriber.with_writer(file_appender).init();
        return;
    }

    subscriber.init();
}
