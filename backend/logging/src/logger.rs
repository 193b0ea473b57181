//! Structured logger
//!
//! Console output (human-readable or JSON), an optional daily-rolling NDJSON
//! file, and `RUST_LOG` taking precedence over the configured level.

use std::path::Path;

use anyhow::{Context, Result};
use tracing::Subscriber;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{
    filter::LevelFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter,
};

/// Log file prefix; files are named `datapipe.YYYY-MM-DD.log`.
pub const LOG_FILE_PREFIX: &str = "datapipe";

const FALLBACK_LEVEL: &str = "info";

#[derive(Debug, Clone, Copy)]
pub struct LogOptions<'a> {
    pub level: &'a str,
    pub dir: Option<&'a Path>,
    pub json: bool,
}

impl Default for LogOptions<'_> {
    fn default() -> Self {
        Self {
            level: FALLBACK_LEVEL,
            dir: None,
            json: false,
        }
    }
}

/// Initialize the global logger. Calling it again is a no-op.
pub fn init_logger(opts: LogOptions<'_>) -> Result<()> {
    let rust_log = std::env::var("RUST_LOG").ok();
    let subscriber = build_subscriber(opts, rust_log.as_deref())?;
    // Already initialized (tests, repeated calls): keep the first one.
    let _ = subscriber.try_init();
    Ok(())
}

/// `RUST_LOG` wins when it parses; otherwise the configured level, and
/// `info` when that is not a level name.
pub fn filter_from(rust_log: Option<&str>, level: &str) -> EnvFilter {
    if let Some(directives) = rust_log.filter(|s| !s.trim().is_empty()) {
        if let Ok(filter) = EnvFilter::try_new(directives) {
            return filter;
        }
    }
    match level.parse::<LevelFilter>() {
        Ok(level) => EnvFilter::new(level.to_string()),
        Err(_) => EnvFilter::new(FALLBACK_LEVEL),
    }
}

fn build_subscriber(
    opts: LogOptions<'_>,
    rust_log: Option<&str>,
) -> Result<impl Subscriber + Send + Sync + 'static> {
    let file_layer = match opts.dir {
        Some(dir) => {
            let appender = RollingFileAppender::builder()
                .rotation(Rotation::DAILY)
                .filename_prefix(LOG_FILE_PREFIX)
                .filename_suffix("log")
                .build(dir)
                .with_context(|| format!("Failed to open log directory {}", dir.display()))?;
            Some(fmt::layer().json().with_writer(appender).with_ansi(false))
        }
        None => None,
    };

    let (console_text, console_json) = if opts.json {
        (None, Some(fmt::layer().json().with_writer(std::io::stdout)))
    } else {
        (
            Some(
                fmt::layer()
                    .with_writer(std::io::stdout)
                    .with_target(false)
                    .with_ansi(true),
            ),
            None,
        )
    };

    Ok(tracing_subscriber::registry()
        .with(filter_from(rust_log, opts.level))
        .with(console_text)
        .with(console_json)
        .with(file_layer))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rust_log_wins_over_level() {
        assert_eq!(filter_from(Some("warn"), "debug").to_string(), "warn");
        assert_eq!(filter_from(None, "debug").to_string(), "debug");
        assert_eq!(filter_from(Some(""), "error").to_string(), "error");
    }

    #[test]
    fn unknown_level_falls_back_to_info() {
        assert_eq!(filter_from(None, "loud").to_string(), "info");
    }

    #[test]
    fn file_layer_writes_ndjson() {
        let dir = tempfile::tempdir().unwrap();
        let subscriber = build_subscriber(
            LogOptions {
                level: "info",
                dir: Some(dir.path()),
                json: true,
            },
            None,
        )
        .unwrap();

        tracing::subscriber::with_default(subscriber, || {
            tracing::info!(script = "data_ingestion.py", attempt = 1, "Running");
            tracing::debug!("filtered out");
        });

        let file = std::fs::read_dir(dir.path())
            .unwrap()
            .filter_map(Result::ok)
            .find(|e| e.file_name().to_string_lossy().starts_with(LOG_FILE_PREFIX))
            .expect("log file created");
        let contents = std::fs::read_to_string(file.path()).unwrap();
        let lines: Vec<&str> = contents.lines().collect();
        assert_eq!(lines.len(), 1, "{contents}");
        let event: serde_json::Value = serde_json::from_str(lines[0]).unwrap();
        assert_eq!(event["fields"]["script"], "data_ingestion.py");
        assert_eq!(event["fields"]["message"], "Running");
    }
}
