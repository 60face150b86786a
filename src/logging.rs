//! Run log for schema promotion
//!
//! Every event is appended to the run log as `YYYY-MM-DD HH:MM:SS - LEVEL - message`.
//! The terminal only sees `ERROR` events unless debug output is requested.

use std::fmt;
use std::fs::OpenOptions;
use std::path::Path;
use std::sync::Mutex;

use chrono::Local;
use tracing::{Event, Subscriber};
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::fmt::format::Writer;
use tracing_subscriber::fmt::{FmtContext, FormatEvent, FormatFields};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

use crate::error::{OpsError, Result};

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// `DATE - LEVEL - message` line format
#[derive(Debug, Clone, Copy, Default)]
pub struct RunLogFormat;

impl<S, N> FormatEvent<S, N> for RunLogFormat
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    N: for<'a> FormatFields<'a> + 'static,
{
    fn format_event(
        &self,
        ctx: &FmtContext<'_, S, N>,
        mut writer: Writer<'_>,
        event: &Event<'_>,
    ) -> fmt::Result {
        write!(
            writer,
            "{} - {} - ",
            Local::now().format(TIMESTAMP_FORMAT),
            event.metadata().level()
        )?;
        ctx.field_format().format_fields(writer.by_ref(), event)?;
        writeln!(writer)
    }
}

/// Install the global subscriber for a promotion run.
///
/// The file receives INFO and above (DEBUG with `debug`, or whatever
/// `RUST_LOG` selects). The terminal receives ERROR, or everything with `debug`.
pub fn init_run_log(path: &Path, debug: bool) -> Result<()> {
    let file = OpenOptions::new().create(true).append(true).open(path)?;

    let file_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(if debug { "debug" } else { "info" }));
    let file_layer = tracing_subscriber::fmt::layer()
        .event_format(RunLogFormat)
        .with_ansi(false)
        .with_writer(Mutex::new(file))
        .with_filter(file_filter);

    let terminal_level = if debug { LevelFilter::DEBUG } else { LevelFilter::ERROR };
    let terminal_layer = tracing_subscriber::fmt::layer()
        .event_format(RunLogFormat)
        .with_writer(std::io::stderr)
        .with_filter(terminal_level);

    tracing_subscriber::registry()
        .with(file_layer)
        .with(terminal_layer)
        .try_init()
        .map_err(|e| OpsError::Logging(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use regex::Regex;
    use std::fs;

    #[test]
    fn test_run_log_line_format() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("schema_promotion.log");
        let file = OpenOptions::new().create(true).append(true).open(&path).unwrap();

        let subscriber = tracing_subscriber::fmt()
            .with_ansi(false)
            .event_format(RunLogFormat)
            .with_writer(Mutex::new(file))
            .finish();

        tracing::subscriber::with_default(subscriber, || {
            tracing::info!("Processing subject: {}", "orders-value");
            tracing::error!("Failed to fetch schema for subject {} from source", "bad-subject");
        });

        let content = fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 2);

        let line = Regex::new(r"^\d{4}-\d{2}-\d{2} \d{2}:\d{2}:\d{2} - (INFO|ERROR) - (.+)$").unwrap();
        let first = line.captures(lines[0]).unwrap();
        assert_eq!(&first[1], "INFO");
        assert_eq!(&first[2], "Processing subject: orders-value");
        let second = line.captures(lines[1]).unwrap();
        assert_eq!(&second[1], "ERROR");
        assert_eq!(&second[2], "Failed to fetch schema for subject bad-subject from source");
    }

    #[test]
    fn test_run_log_appends() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("run.log");
        fs::write(&path, "2024-01-01 00:00:00 - INFO - earlier run\n").unwrap();

        let file = OpenOptions::new().append(true).open(&path).unwrap();
        let subscriber = tracing_subscriber::fmt()
            .with_ansi(false)
            .event_format(RunLogFormat)
            .with_writer(Mutex::new(file))
            .finish();
        tracing::subscriber::with_default(subscriber, || {
            tracing::warn!("second run");
        });

        let content = fs::read_to_string(&path).unwrap();
        assert!(content.starts_with("2024-01-01 00:00:00 - INFO - earlier run\n"));
        assert!(content.trim_end().ends_with(" - WARN - second run"));
    }
}
