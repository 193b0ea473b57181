use std::path::Path;

use anyhow::Result;

use datapipe_config::validate_workflow_dir;

pub const DEFAULT_WORKFLOWS_DIR: &str = ".github/workflows";

pub fn run(dir: &Path) -> Result<()> {
    let files = validate_workflow_dir(dir)?;
    for file in &files {
        println!("  🟢 {}", file.display());
    }
    println!("\n✅ {} workflow file(s) parsed", files.len());
    Ok(())
}
