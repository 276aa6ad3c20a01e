//! Process-wide `tracing` subscriber setup.

use crate::options::LoggingOptions;
use conduit_shared::{ConduitError, ConduitResult};
use std::sync::OnceLock;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::fmt::writer::BoxMakeWriter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, fmt};

/// Keeps the non-blocking file writer flushing for the life of the process.
static LOG_GUARD: OnceLock<Option<WorkerGuard>> = OnceLock::new();

/// Install the global subscriber described by `options`.
///
/// `RUST_LOG`, when set, overrides `options.filter`. Calling this again, or
/// after the host application installed its own subscriber, is a no-op.
///
/// # Errors
///
/// Returns [`ConduitError::Config`] if the filter does not parse or the log
/// directory cannot be created.
pub fn init_logging(options: &LoggingOptions) -> ConduitResult<()> {
    if LOG_GUARD.get().is_some() {
        return Ok(());
    }

    let directives = match std::env::var("RUST_LOG") {
        Ok(value) if !value.trim().is_empty() => value,
        _ => options.filter.clone(),
    };
    let filter = EnvFilter::try_new(&directives).map_err(|e| {
        ConduitError::Config(format!("invalid log filter {:?}: {}", directives, e))
    })?;

    let (writer, guard) = match &options.directory {
        Some(directory) => {
            std::fs::create_dir_all(directory).map_err(|e| {
                ConduitError::Config(format!(
                    "Failed to create log directory {}: {}",
                    directory.display(),
                    e
                ))
            })?;
            let appender = tracing_appender::rolling::daily(directory, &options.file_prefix);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            (BoxMakeWriter::new(writer), Some(guard))
        }
        None => (BoxMakeWriter::new(std::io::stderr), None),
    };

    let registry = tracing_subscriber::registry().with(filter);
    let installed = if options.json {
        registry
            .with(fmt::layer().json().with_writer(writer))
            .try_init()
    } else {
        registry
            .with(
                fmt::layer()
                    .with_ansi(options.directory.is_none())
                    .with_writer(writer),
            )
            .try_init()
    };

    match installed {
        Ok(()) => {
            let _ = LOG_GUARD.set(guard);
            tracing::debug!(filter = %directives, json = options.json, "Logging initialized");
        }
        Err(e) => {
            // Someone else owns the global subscriber; leave it in place.
            let _ = LOG_GUARD.set(None);
            tracing::debug!("Global subscriber already set, skipping: {}", e);
        }
    }
    Ok(())
}
