//! Config file read/write with atomic backup rotation.

use crate::schema::DataPipeConfig;
use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, info, warn};

/// Config file name within the config directory.
const CONFIG_FILE_NAME: &str = "datapipe.yaml";

/// Number of rolling backups to keep.
const MAX_BACKUPS: usize = 5;

/// Resolve the datapipe config directory.
/// Priority: `DATAPIPE_CONFIG_DIR` env > `~/.datapipe/` > `./.datapipe/`
pub fn config_dir() -> PathBuf {
    if let Ok(dir) = std::env::var("DATAPIPE_CONFIG_DIR") {
        if !dir.is_empty() {
            return PathBuf::from(dir);
        }
    }
    dirs::home_dir()
        .map(|home| home.join(".datapipe"))
        .unwrap_or_else(|| PathBuf::from(".datapipe"))
}

pub fn config_file_path(config_dir: &Path) -> PathBuf {
    config_dir.join(CONFIG_FILE_NAME)
}

/// Load and parse the config from disk.
///
/// A missing file is not an error: the caller gets an empty config and
/// defaults take over.
pub async fn load_config(path: &Path) -> Result<DataPipeConfig> {
    if !fs::try_exists(path).await.unwrap_or(false) {
        debug!(path = %path.display(), "Config file does not exist; using defaults");
        return Ok(DataPipeConfig::default());
    }

    let raw = fs::read_to_string(path)
        .await
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    // An empty file parses as YAML null.
    if raw.trim().is_empty() {
        return Ok(DataPipeConfig::default());
    }

    let config: DataPipeConfig = serde_yaml::from_str(&raw)
        .with_context(|| format!("Failed to parse config YAML at: {}", path.display()))?;

    info!(path = %path.display(), "Loaded config");
    Ok(config)
}

/// Write config to disk atomically, keeping rolling backups of the old file.
pub async fn write_config(config: &DataPipeConfig, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).await.with_context(|| {
            format!("Failed to create config directory: {}", parent.display())
        })?;
    }

    if fs::try_exists(path).await.unwrap_or(false) {
        rotate_backups(path).await;
    }

    let yaml = serde_yaml::to_string(config).context("Failed to serialize config to YAML")?;

    let tmp_path = sibling(path, "tmp");
    fs::write(&tmp_path, yaml.as_bytes())
        .await
        .with_context(|| format!("Failed to write temp config: {}", tmp_path.display()))?;
    fs::rename(&tmp_path, path)
        .await
        .with_context(|| format!("Failed to rename temp config to: {}", path.display()))?;

    info!(path = %path.display(), "Wrote config");
    Ok(())
}

/// `datapipe.yaml` -> `datapipe.yaml.<suffix>`
fn sibling(path: &Path, suffix: &str) -> PathBuf {
    let mut name = path.as_os_str().to_os_string();
    name.push(".");
    name.push(suffix);
    PathBuf::from(name)
}

/// Backup path for generation `n` (1 is the newest).
pub fn backup_path(path: &Path, n: usize) -> PathBuf {
    sibling(path, &format!("bak.{n}"))
}

/// Shift `.bak.1..N-1` up by one (dropping the oldest) and copy the current
/// file to `.bak.1`. Failures only warn; they never block the write.
async fn rotate_backups(path: &Path) {
    for i in (1..MAX_BACKUPS).rev() {
        let old = backup_path(path, i);
        if fs::try_exists(&old).await.unwrap_or(false) {
            if let Err(e) = fs::rename(&old, backup_path(path, i + 1)).await {
                warn!(backup = %old.display(), error = %e, "Failed to rotate config backup");
            }
        }
    }

    let bak = backup_path(path, 1);
    if let Err(e) = fs::copy(path, &bak).await {
        warn!(backup = %bak.display(), error = %e, "Failed to create config backup");
    }
}
