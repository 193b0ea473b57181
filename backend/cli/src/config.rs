use std::path::{Path, PathBuf};

use anyhow::Result;

use datapipe_config::{config_dir, config_file_path, ensure_valid, load_resolved, DataPipeConfig};
use datapipe_executor::ProcessExecutor;
use datapipe_logging::{init_logger, LogOptions};

/// `--config` wins; otherwise the file in the config directory.
pub fn resolve_config_path(explicit: Option<PathBuf>) -> PathBuf {
    explicit.unwrap_or_else(|| config_file_path(&config_dir()))
}

/// Load the config, start logging with its settings, then validate it so
/// warnings and errors reach the configured log outputs.
pub async fn load(path: &Path) -> Result<DataPipeConfig> {
    let cfg = load_resolved(path).await?;

    let logging = cfg.logging.clone().unwrap_or_default();
    init_logger(LogOptions {
        level: cfg.log_level(),
        dir: logging.dir.as_deref().map(Path::new),
        json: logging.json.unwrap_or(false),
    })?;

    ensure_valid(&cfg, path)?;
    Ok(cfg)
}

pub fn build_executor(cfg: &DataPipeConfig) -> ProcessExecutor {
    let mut executor = ProcessExecutor::new(cfg.interpreter());
    let Some(settings) = &cfg.executor else {
        return executor;
    };
    if let Some(dir) = &settings.working_dir {
        executor = executor.with_working_dir(dir);
    }
    if let Some(env) = &settings.env {
        executor = executor.with_env(env.clone());
    }
    if let Some(timeout) = cfg.timeout() {
        executor = executor.with_timeout(timeout);
    }
    executor
}
