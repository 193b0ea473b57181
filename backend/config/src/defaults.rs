//! Config defaults: the reference daily pipeline.

use crate::schema::{
    DataPipeConfig, LoggingConfig, PipelineConfig, RetryConfig, ScheduleConfig, StorageConfig,
};

pub use datapipe_executor::DEFAULT_INTERPRETER;
pub use datapipe_scheduler::retry::{DEFAULT_DELAY_SECONDS, DEFAULT_RETRIES};

pub const DEFAULT_PIPELINE_NAME: &str = "data_pipeline";

pub const DEFAULT_WORKFLOWS_DIR: &str = "../workflows";

/// Stage scripts in execution order.
pub const DEFAULT_SCRIPTS: [&str; 5] = [
    "data_ingestion.py",
    "data_cleaning.py",
    "data_analysis.py",
    "cash_flow.py",
    "data_visualization.py",
];

pub const DEFAULT_SCHEDULE_NAME: &str = "Daily Data Pipeline";

/// Every day at 02:00.
pub const DEFAULT_CRON: &str = "0 2 * * *";

pub const DEFAULT_TIMEZONE: &str = "UTC";

pub const DEFAULT_DB_PATH: &str = "datapipe.db";

pub const DEFAULT_LOG_LEVEL: &str = "info";

/// Apply all defaults to a freshly loaded config.
pub fn apply_all_defaults(config: DataPipeConfig) -> DataPipeConfig {
    let config = apply_pipeline_defaults(config);
    let config = apply_retry_defaults(config);
    let config = apply_schedule_defaults(config);
    let config = apply_storage_defaults(config);
    apply_logging_defaults(config)
}

fn apply_pipeline_defaults(mut config: DataPipeConfig) -> DataPipeConfig {
    let pipeline = config.pipeline.get_or_insert_with(PipelineConfig::default);
    pipeline
        .name
        .get_or_insert_with(|| DEFAULT_PIPELINE_NAME.to_string());
    pipeline
        .interpreter
        .get_or_insert_with(|| DEFAULT_INTERPRETER.to_string());
    pipeline
        .workflows_dir
        .get_or_insert_with(|| DEFAULT_WORKFLOWS_DIR.to_string());
    pipeline
        .scripts
        .get_or_insert_with(|| DEFAULT_SCRIPTS.iter().map(|s| s.to_string()).collect());
    config
}

fn apply_retry_defaults(mut config: DataPipeConfig) -> DataPipeConfig {
    let retry = config.retry.get_or_insert_with(RetryConfig::default);
    retry.retries.get_or_insert(DEFAULT_RETRIES);
    retry.delay_seconds.get_or_insert(DEFAULT_DELAY_SECONDS);
    config
}

fn apply_schedule_defaults(mut config: DataPipeConfig) -> DataPipeConfig {
    let schedule = config.schedule.get_or_insert_with(ScheduleConfig::default);
    schedule
        .name
        .get_or_insert_with(|| DEFAULT_SCHEDULE_NAME.to_string());
    schedule.cron.get_or_insert_with(|| DEFAULT_CRON.to_string());
    schedule
        .timezone
        .get_or_insert_with(|| DEFAULT_TIMEZONE.to_string());
    config
}

fn apply_storage_defaults(mut config: DataPipeConfig) -> DataPipeConfig {
    let storage = config.storage.get_or_insert_with(StorageConfig::default);
    storage
        .db_path
        .get_or_insert_with(|| DEFAULT_DB_PATH.to_string());
    config
}

fn apply_logging_defaults(mut config: DataPipeConfig) -> DataPipeConfig {
    let logging = config.logging.get_or_insert_with(LoggingConfig::default);
    logging
        .level
        .get_or_insert_with(|| DEFAULT_LOG_LEVEL.to_string());
    logging.json.get_or_insert(false);
    config
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fills_every_section() {
        let cfg = apply_all_defaults(DataPipeConfig::default());
        assert_eq!(cfg.pipeline.unwrap().scripts.unwrap().len(), 5);
        assert_eq!(cfg.retry.unwrap().retries, Some(2));
        assert_eq!(cfg.schedule.unwrap().cron.as_deref(), Some("0 2 * * *"));
        assert_eq!(cfg.storage.unwrap().db_path.as_deref(), Some("datapipe.db"));
        assert_eq!(cfg.logging.unwrap().level.as_deref(), Some("info"));
    }

    #[test]
    fn does_not_override_user_values() {
        let cfg = DataPipeConfig {
            retry: Some(RetryConfig {
                retries: Some(5),
                ..Default::default()
            }),
            schedule: Some(ScheduleConfig {
                timezone: Some("Europe/Berlin".to_string()),
                ..Default::default()
            }),
            ..Default::default()
        };
        let cfg = apply_all_defaults(cfg);
        let retry = cfg.retry.unwrap();
        assert_eq!(retry.retries, Some(5));
        assert_eq!(retry.delay_seconds, Some(DEFAULT_DELAY_SECONDS));
        assert_eq!(cfg.schedule.unwrap().timezone.as_deref(), Some("Europe/Berlin"));
    }
}
