//! datapipe configuration schema.
//!
//! Every section and field is optional so a partial YAML file is valid;
//! `defaults::apply_all_defaults` fills the gaps.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use datapipe_core::{PipelineDefinition, PipelineError, ScheduleSpec};
use datapipe_scheduler::RetryPolicy;

use crate::defaults::*;

// ---------------------------------------------------------------------------
// Top-level config
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DataPipeConfig {
    /// Which scripts run, in which order, under which interpreter
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pipeline: Option<PipelineConfig>,

    /// Per-script retry bound and delay
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retry: Option<RetryConfig>,

    /// Cron schedule registered by `deploy`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schedule: Option<ScheduleConfig>,

    /// Subprocess settings
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub executor: Option<ExecutorConfig>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub storage: Option<StorageConfig>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub logging: Option<LoggingConfig>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PipelineConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Program each script is passed to.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub interpreter: Option<String>,
    /// Base directory for relative script paths.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub workflows_dir: Option<String>,
    /// Script paths in execution order.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scripts: Option<Vec<String>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RetryConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retries: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delay_seconds: Option<u64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScheduleConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cron: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timezone: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutorConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub working_dir: Option<String>,
    /// Kill a script after this many seconds. Unset means wait forever.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_secs: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub env: Option<HashMap<String, String>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StorageConfig {
    /// SQLite file holding deployments and the run log.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub db_path: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoggingConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub level: Option<String>,
    /// Directory for rolling NDJSON log files; unset logs to the console only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dir: Option<String>,
    /// Emit JSON on the console instead of human-readable lines.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub json: Option<bool>,
}

// ---------------------------------------------------------------------------
// Resolved views
// ---------------------------------------------------------------------------

impl DataPipeConfig {
    pub fn pipeline_name(&self) -> &str {
        self.pipeline
            .as_ref()
            .and_then(|p| p.name.as_deref())
            .unwrap_or(DEFAULT_PIPELINE_NAME)
    }

    pub fn interpreter(&self) -> &str {
        self.pipeline
            .as_ref()
            .and_then(|p| p.interpreter.as_deref())
            .unwrap_or(DEFAULT_INTERPRETER)
    }

    pub fn workflows_dir(&self) -> &str {
        self.pipeline
            .as_ref()
            .and_then(|p| p.workflows_dir.as_deref())
            .unwrap_or(DEFAULT_WORKFLOWS_DIR)
    }

    /// Script paths in execution order, joined onto `workflowsDir` when relative.
    pub fn script_paths(&self) -> Vec<PathBuf> {
        let base = Path::new(self.workflows_dir());
        match self.pipeline.as_ref().and_then(|p| p.scripts.as_ref()) {
            Some(scripts) => scripts.iter().map(|s| resolve_script(base, s)).collect(),
            None => DEFAULT_SCRIPTS.iter().map(|s| resolve_script(base, s)).collect(),
        }
    }

    pub fn pipeline_definition(&self) -> Result<PipelineDefinition, PipelineError> {
        PipelineDefinition::from_paths(self.pipeline_name(), self.script_paths())
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        let retry = self.retry.clone().unwrap_or_default();
        RetryPolicy::new(
            retry.retries.unwrap_or(DEFAULT_RETRIES),
            retry.delay_seconds.unwrap_or(DEFAULT_DELAY_SECONDS),
        )
    }

    pub fn schedule_spec(&self) -> ScheduleSpec {
        let schedule = self.schedule.clone().unwrap_or_default();
        ScheduleSpec::new(
            schedule.name.unwrap_or_else(|| DEFAULT_SCHEDULE_NAME.to_string()),
            schedule.cron.unwrap_or_else(|| DEFAULT_CRON.to_string()),
            schedule.timezone.unwrap_or_else(|| DEFAULT_TIMEZONE.to_string()),
        )
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.executor
            .as_ref()
            .and_then(|e| e.timeout_secs)
            .map(Duration::from_secs)
    }

    pub fn db_path(&self) -> &str {
        self.storage
            .as_ref()
            .and_then(|s| s.db_path.as_deref())
            .unwrap_or(DEFAULT_DB_PATH)
    }

    pub fn log_level(&self) -> &str {
        self.logging
            .as_ref()
            .and_then(|l| l.level.as_deref())
            .unwrap_or(DEFAULT_LOG_LEVEL)
    }
}

fn resolve_script(base: &Path, script: &str) -> PathBuf {
    let path = Path::new(script);
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        base.join(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_config_resolves_to_reference_pipeline() {
        let cfg = DataPipeConfig::default();
        let pipeline = cfg.pipeline_definition().unwrap();
        let names: Vec<_> = pipeline.tasks().iter().map(|t| t.name()).collect();
        assert_eq!(
            names,
            ["data_ingestion", "data_cleaning", "data_analysis", "cash_flow", "data_visualization"]
        );
        assert_eq!(
            pipeline.tasks()[0].path(),
            Path::new("../workflows/data_ingestion.py")
        );
        assert_eq!(cfg.retry_policy(), RetryPolicy::new(2, 10));
        assert_eq!(
            cfg.schedule_spec(),
            ScheduleSpec::new("Daily Data Pipeline", "0 2 * * *", "UTC")
        );
        assert_eq!(cfg.interpreter(), "python3");
        assert!(cfg.timeout().is_none());
    }

    #[test]
    fn parses_camel_case_yaml() {
        let yaml = r#"
pipeline:
  workflowsDir: /srv/jobs
  scripts: [extract.py, /opt/load.py]
retry:
  delaySeconds: 1
executor:
  timeoutSecs: 600
"#;
        let cfg: DataPipeConfig = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(
            cfg.script_paths(),
            [PathBuf::from("/srv/jobs/extract.py"), PathBuf::from("/opt/load.py")]
        );
        assert_eq!(cfg.retry_policy(), RetryPolicy::new(2, 1));
        assert_eq!(cfg.timeout(), Some(Duration::from_secs(600)));
    }
}
