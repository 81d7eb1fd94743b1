//! # surveybot-logging
//!
//! Logging for the surveybot conversation engine.
//!
//! ## Key Types
//!
//! - [`Logger`] - Survey lifecycle event logging
//! - [`LogEvent`] - Log event types
//! - [`LogFormat`] - Output formats (Pretty, JSON, Compact)
//! - [`TranscriptWriter`] - JSONL transcript of a terminal survey run

mod events;
mod transcript;

pub use events::{LogEvent, LogFormat, Logger};
pub use transcript::{TranscriptLine, TranscriptWriter};

use std::path::Path;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Initialize tracing for the application
pub fn init_tracing(level: &str, format: LogFormat) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    match format {
        LogFormat::Json => {
            tracing_subscriber::registry()
                .with(filter)
                .with(fmt::layer().json().with_target(false))
                .init();
        }
        LogFormat::Pretty | LogFormat::Compact => {
            tracing_subscriber::registry()
                .with(filter)
                .with(fmt::layer().with_target(false))
                .init();
        }
    }
}

/// Initialize tracing with an additional daily-rotated JSON log file in `dir`.
///
/// Keep the returned guard alive for the lifetime of the process; dropping it
/// flushes and stops the file writer.
pub fn init_tracing_with_file(level: &str, format: LogFormat, dir: &Path) -> WorkerGuard {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    let appender = tracing_appender::rolling::daily(dir, "surveybot.log");
    let (file_writer, guard) = tracing_appender::non_blocking(appender);
    match format {
        LogFormat::Json => {
            tracing_subscriber::registry()
                .with(filter)
                .with(fmt::layer().json().with_target(false))
                .with(file_layer(file_writer))
                .init();
        }
        LogFormat::Pretty | LogFormat::Compact => {
            tracing_subscriber::registry()
                .with(filter)
                .with(fmt::layer().with_target(false))
                .with(file_layer(file_writer))
                .init();
        }
    }

    guard
}

fn file_layer<S>(
    file_writer: tracing_appender::non_blocking::NonBlocking,
) -> impl tracing_subscriber::Layer<S>
where
    S: tracing::Subscriber + for<'a> tracing_subscriber::registry::LookupSpan<'a>,
{
    fmt::layer()
        .json()
        .with_target(false)
        .with_ansi(false)
        .with_writer(file_writer)
}
