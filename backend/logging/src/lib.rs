//! Structured logging for datapipe: console plus rolling NDJSON files.

pub mod logger;

pub use logger::{filter_from, init_logger, LogOptions, LOG_FILE_PREFIX};
