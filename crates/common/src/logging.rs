//! Logging and tracing initialization.

use std::fs::OpenOptions;
use std::sync::Mutex;

use crate::config::LoggingConfig;
use crate::error::{VigilError, VigilResult};

/// Initialize the global tracing subscriber.
///
/// `RUST_LOG` takes precedence over the configured level. When a log file is
/// configured, output is appended there without ANSI colors instead of going
/// to stdout. A second call is a no-op.
pub fn init_logging(config: &LoggingConfig) -> VigilResult<()> {
    use tracing_subscriber::{fmt, EnvFilter};

    let env_filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(&config.level).map_err(|e| {
            VigilError::config(format!("Invalid log filter '{}': {e}", config.level))
        })?,
    };

    let builder = fmt::Subscriber::builder()
        .with_env_filter(env_filter)
        .with_target(true)
        .with_thread_ids(false);

    match (&config.file, config.json) {
        (Some(path), json) => {
            let file = OpenOptions::new().create(true).append(true).open(path)?;
            let writer = Mutex::new(file);
            if json {
                let subscriber = builder.json().with_writer(writer).finish();
                tracing::subscriber::set_global_default(subscriber).ok();
            } else {
                let subscriber = builder.with_ansi(false).with_writer(writer).finish();
                tracing::subscriber::set_global_default(subscriber).ok();
            }
        }
        (None, true) => {
            tracing::subscriber::set_global_default(builder.json().finish()).ok();
        }
        (None, false) => {
            tracing::subscriber::set_global_default(builder.finish()).ok();
        }
    }
    Ok(())
}

/// Initialize logging with defaults (useful for tests and quick scripts).
pub fn init_default_logging() {
    let _ = init_logging(&LoggingConfig::default());
}
