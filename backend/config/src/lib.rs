//! `datapipe-config`: datapipe runtime configuration.
//!
//! Provides:
//! - Typed config schema with resolved pipeline, retry and schedule views
//! - YAML read/write with atomic backup rotation
//! - Environment overrides
//! - Default value application
//! - Validation reports
//! - The CI workflow YAML gate

pub mod defaults;
pub mod env;
pub mod io;
pub mod schema;
pub mod validation;
pub mod workflow_lint;

pub use defaults::apply_all_defaults;
pub use env::{apply_env_overrides, apply_env_overrides_with};
pub use io::{config_dir, config_file_path, load_config, write_config};
pub use schema::DataPipeConfig;
pub use validation::{validate, ConfigValidationError, ValidationReport};
pub use workflow_lint::{validate_workflow_dir, WorkflowLintError};

use anyhow::{bail, Result};
use std::path::Path;

/// Load a config file and apply environment overrides and defaults, without
/// validating. Lets the caller set up logging before problems are reported.
pub async fn load_resolved(path: &Path) -> Result<DataPipeConfig> {
    let config = load_config(path).await?;
    let config = apply_env_overrides(config);
    Ok(apply_all_defaults(config))
}

/// Validate a resolved config. Warnings are logged; any error fails with
/// every problem listed.
pub fn ensure_valid(config: &DataPipeConfig, path: &Path) -> Result<()> {
    let report = validate(config);
    for warning in &report.warnings {
        tracing::warn!(path = %warning.path, message = %warning.message, "Config warning");
    }
    if report.is_valid() {
        return Ok(());
    }
    for error in &report.errors {
        tracing::error!(path = %error.path, message = %error.message, "Config error");
    }
    let details: Vec<String> = report.errors.iter().map(ToString::to_string).collect();
    bail!("{} is invalid:\n  {}", path.display(), details.join("\n  "))
}

/// Load, resolve and validate a config file.
pub async fn load_and_prepare(path: &Path) -> Result<DataPipeConfig> {
    let config = load_resolved(path).await?;
    ensure_valid(&config, path)?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn rejects_invalid_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("datapipe.yaml");
        std::fs::write(&path, "schedule:\n  cron: \"0 2 * *\"\n").unwrap();

        let err = load_and_prepare(&path).await.unwrap_err();
        assert!(err.to_string().contains("schedule.cron"), "{err}");
    }

    #[tokio::test]
    async fn partial_file_is_completed_with_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("datapipe.yaml");
        std::fs::write(&path, "retry:\n  retries: 4\n").unwrap();

        let cfg = load_and_prepare(&path).await.unwrap();
        assert_eq!(cfg.retry_policy().total_attempts(), 5);
        assert_eq!(cfg.schedule_spec().cron_expression, "0 2 * * *");
    }
}
