//! Tracing initialization: an `EnvFilter` layered over a non-blocking file
//! appender, with an additional stdout layer in non-JSON mode.

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

pub struct LogOptions {
    pub log_dir: String,
    pub log_file: String,
    pub json: bool,
}

impl Default for LogOptions {
    fn default() -> Self {
        Self {
            log_dir: "logs".to_string(),
            log_file: "pipeline.log".to_string(),
            json: false,
        }
    }
}

pub fn init_logging(opts: &LogOptions) -> WorkerGuard {
    let file_appender = tracing_appender::rolling::daily(&opts.log_dir, &opts.log_file);
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let registry = tracing_subscriber::registry().with(filter);

    if opts.json {
        let file_layer = fmt::layer()
            .json()
            .with_target(true)
            .with_writer(non_blocking)
            .with_ansi(false);
        registry.with(file_layer).init();
    } else {
        let file_layer = fmt::layer()
            .with_target(false)
            .with_writer(non_blocking)
            .with_ansi(false);
        let stdout_layer = fmt::layer().with_target(false).with_ansi(true);
        registry.with(file_layer).with(stdout_layer).init();
    }

    guard
}
