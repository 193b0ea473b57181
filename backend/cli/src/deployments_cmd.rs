use anyhow::Result;
use chrono::Utc;

use datapipe_config::DataPipeConfig;
use datapipe_scheduler::cron_parser::next_fire;
use datapipe_scheduler::DeploymentStore;

pub fn run(cfg: &DataPipeConfig) -> Result<()> {
    let deployments = DeploymentStore::open(cfg.db_path())?.list()?;
    if deployments.is_empty() {
        println!("No deployments. Register one with 'datapipe deploy'.");
        return Ok(());
    }

    let now = Utc::now();
    for d in &deployments {
        let state = if d.active { "🟢 active" } else { "🟡 inactive" };
        println!("{}  {state}", d.name);
        println!(
            "   schedule: {} ({})  scripts: {}",
            d.schedule.cron_expression,
            d.schedule.timezone,
            d.pipeline.len()
        );
        if d.active {
            // Stored rows are validated on insert; a failure here means the
            // row predates a stricter parser.
            match next_fire(&d.schedule, now) {
                Ok(Some(next)) => println!("   next run: {}", next.format("%Y-%m-%d %H:%M UTC")),
                Ok(None) => println!("   next run: never"),
                Err(e) => println!("   next run: 🔴 {e:#}"),
            }
        }
    }
    Ok(())
}
