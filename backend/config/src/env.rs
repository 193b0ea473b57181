//! Environment variable overrides applied on top of the config file.
//!
//! | Variable               | Overrides                 |
//! |------------------------|---------------------------|
//! | `DATAPIPE_DB`          | `storage.dbPath`          |
//! | `DATAPIPE_INTERPRETER` | `pipeline.interpreter`    |
//! | `DATAPIPE_LOG_DIR`     | `logging.dir`             |
//!
//! `RUST_LOG` is handled by the logger and wins over `logging.level`.

use std::collections::HashMap;

use tracing::debug;

use crate::schema::{DataPipeConfig, LoggingConfig, PipelineConfig, StorageConfig};

pub const ENV_DB: &str = "DATAPIPE_DB";
pub const ENV_INTERPRETER: &str = "DATAPIPE_INTERPRETER";
pub const ENV_LOG_DIR: &str = "DATAPIPE_LOG_DIR";

/// Apply overrides from the process environment.
pub fn apply_env_overrides(config: DataPipeConfig) -> DataPipeConfig {
    apply_env_overrides_with(config, &std::env::vars().collect())
}

/// Apply overrides from a provided map (useful for testing).
pub fn apply_env_overrides_with(
    mut config: DataPipeConfig,
    env: &HashMap<String, String>,
) -> DataPipeConfig {
    // An empty variable counts as unset.
    let get = |key: &str| env.get(key).filter(|v| !v.is_empty()).cloned();

    if let Some(db) = get(ENV_DB) {
        debug!(var = ENV_DB, value = %db, "Config override from environment");
        config
            .storage
            .get_or_insert_with(StorageConfig::default)
            .db_path = Some(db);
    }
    if let Some(interpreter) = get(ENV_INTERPRETER) {
        debug!(var = ENV_INTERPRETER, value = %interpreter, "Config override from environment");
        config
            .pipeline
            .get_or_insert_with(PipelineConfig::default)
            .interpreter = Some(interpreter);
    }
    if let Some(dir) = get(ENV_LOG_DIR) {
        debug!(var = ENV_LOG_DIR, value = %dir, "Config override from environment");
        config.logging.get_or_insert_with(LoggingConfig::default).dir = Some(dir);
    }
    config
}
