use std::path::Path;

use anyhow::Result;

use datapipe_config::{apply_all_defaults, write_config, DataPipeConfig};

/// Write the default config. An existing file is kept as `.bak.1`.
pub async fn run(path: &Path) -> Result<()> {
    let existed = path.exists();
    write_config(&apply_all_defaults(DataPipeConfig::default()), path).await?;
    println!("✅ Wrote default config to {}", path.display());
    if existed {
        println!("   Previous file backed up as {}.bak.1", path.display());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use datapipe_config::load_and_prepare;

    #[tokio::test]
    async fn written_defaults_load_cleanly() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("datapipe.yaml");
        run(&path).await.unwrap();
        run(&path).await.unwrap();

        let cfg = load_and_prepare(&path).await.unwrap();
        assert_eq!(cfg.pipeline_definition().unwrap().len(), 5);
        assert!(dir.path().join("datapipe.yaml.bak.1").exists());
    }
}
