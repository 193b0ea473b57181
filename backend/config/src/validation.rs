//! Config validation: every problem found in one pass, with the YAML path
//! that caused it.

use crate::schema::DataPipeConfig;
use datapipe_scheduler::cron_parser::{parse_timezone, validate_cron};
use thiserror::Error;

/// A config validation error with field path and message.
#[derive(Debug, Error)]
#[error("Config validation error at '{path}': {message}")]
pub struct ConfigValidationError {
    pub path: String,
    pub message: String,
}

#[derive(Debug, Default)]
pub struct ValidationReport {
    pub errors: Vec<ConfigValidationError>,
    pub warnings: Vec<ConfigValidationError>,
}

impl ValidationReport {
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    fn error(&mut self, path: impl Into<String>, message: impl Into<String>) {
        self.errors.push(ConfigValidationError {
            path: path.into(),
            message: message.into(),
        });
    }

    fn warn(&mut self, path: impl Into<String>, message: impl Into<String>) {
        self.warnings.push(ConfigValidationError {
            path: path.into(),
            message: message.into(),
        });
    }
}

/// Validate the config and return a report of all errors and warnings.
pub fn validate(config: &DataPipeConfig) -> ValidationReport {
    let mut report = ValidationReport::default();
    validate_pipeline(config, &mut report);
    validate_retry(config, &mut report);
    validate_schedule(config, &mut report);
    validate_executor(config, &mut report);
    validate_storage(config, &mut report);
    validate_logging(config, &mut report);
    report
}

fn validate_pipeline(config: &DataPipeConfig, report: &mut ValidationReport) {
    let Some(pipeline) = &config.pipeline else { return };
    if let Some(name) = &pipeline.name {
        if name.trim().is_empty() {
            report.error("pipeline.name", "Pipeline name cannot be empty");
        }
    }
    if let Some(interpreter) = &pipeline.interpreter {
        if interpreter.trim().is_empty() {
            report.error(
                "pipeline.interpreter",
                "Interpreter cannot be empty; scripts are always launched through it",
            );
        }
    }
    if let Some(scripts) = &pipeline.scripts {
        if scripts.is_empty() {
            report.error("pipeline.scripts", "At least one script is required");
        }
        for (i, script) in scripts.iter().enumerate() {
            if script.trim().is_empty() {
                report.error(format!("pipeline.scripts[{i}]"), "Script path cannot be empty");
            }
        }
    }
}

fn validate_retry(config: &DataPipeConfig, report: &mut ValidationReport) {
    let Some(retry) = &config.retry else { return };
    if retry.delay_seconds == Some(0) && retry.retries.unwrap_or(1) > 0 {
        report.warn(
            "retry.delaySeconds",
            "delaySeconds is 0; failed scripts are retried immediately",
        );
    }
}

fn validate_schedule(config: &DataPipeConfig, report: &mut ValidationReport) {
    let Some(schedule) = &config.schedule else { return };
    if let Some(name) = &schedule.name {
        if name.trim().is_empty() {
            report.error("schedule.name", "Schedule name cannot be empty");
        }
    }
    if let Some(cron) = &schedule.cron {
        if let Err(e) = validate_cron(cron) {
            report.error("schedule.cron", format!("{e:#}"));
        }
    }
    if let Some(tz) = &schedule.timezone {
        if let Err(e) = parse_timezone(tz) {
            report.error("schedule.timezone", format!("{e:#}"));
        }
    }
}

fn validate_executor(config: &DataPipeConfig, report: &mut ValidationReport) {
    let Some(executor) = &config.executor else { return };
    if executor.timeout_secs == Some(0) {
        report.error("executor.timeoutSecs", "timeoutSecs must be > 0; omit it to disable");
    }
    if let Some(dir) = &executor.working_dir {
        if dir.trim().is_empty() {
            report.error("executor.workingDir", "workingDir cannot be empty");
        }
    }
}

fn validate_storage(config: &DataPipeConfig, report: &mut ValidationReport) {
    let Some(storage) = &config.storage else { return };
    if storage.db_path.as_deref().map(str::trim) == Some("") {
        report.error("storage.dbPath", "dbPath cannot be empty");
    }
}

fn validate_logging(config: &DataPipeConfig, report: &mut ValidationReport) {
    let Some(level) = config.logging.as_ref().and_then(|l| l.level.as_deref()) else {
        return;
    };
    const LEVELS: [&str; 6] = ["off", "error", "warn", "info", "debug", "trace"];
    if !LEVELS.contains(&level.to_ascii_lowercase().as_str()) {
        report.warn(
            "logging.level",
            format!("Unknown log level '{level}'; falling back to 'info'"),
        );
    }
}
