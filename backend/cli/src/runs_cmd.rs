use anyhow::Result;
use chrono::DateTime;
use tracing::info;

use datapipe_config::DataPipeConfig;
use datapipe_scheduler::{RunLog, RunLogEntry};

const SECS_PER_DAY: i64 = 24 * 3600;

/// Print the most recent runs, newest first. With `prune_days`, runs older
/// than that are deleted first.
pub fn run(cfg: &DataPipeConfig, limit: usize, prune_days: Option<u32>) -> Result<()> {
    let log = RunLog::open(cfg.db_path())?;
    if let Some(days) = prune_days {
        let removed = log.prune(i64::from(days) * SECS_PER_DAY)?;
        info!(removed, days, "Pruned run log");
        println!("🧹 Removed {removed} run(s) older than {days} day(s)");
    }
    let entries = log.recent(limit)?;
    if entries.is_empty() {
        println!("No runs recorded yet. Start one with 'datapipe run'.");
        return Ok(());
    }
    for entry in &entries {
        println!("{}", format_entry(entry));
    }
    Ok(())
}

fn format_entry(entry: &RunLogEntry) -> String {
    let started = DateTime::from_timestamp(entry.started_at, 0)
        .map(|t| t.format("%Y-%m-%d %H:%M:%S").to_string())
        .unwrap_or_else(|| entry.started_at.to_string());
    let secs = entry.finished_at - entry.started_at;
    let completed = entry.completed_tasks.len();
    match &entry.failed_task {
        None => format!(
            "✅ {started}  {}  {completed} scripts  {secs}s",
            entry.pipeline
        ),
        Some(task) => format!(
            "❌ {started}  {}  aborted at {task} after {completed} scripts: {}",
            entry.pipeline,
            entry.error.as_deref().unwrap_or("unknown error")
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};
    use datapipe_config::schema::StorageConfig;
    use datapipe_core::{PipelineResult, Task};

    fn entry(failed: Option<&str>) -> RunLogEntry {
        RunLogEntry {
            id: "run-1".into(),
            pipeline: "data_pipeline".into(),
            started_at: 1_767_232_800, // 2026-01-01 02:00:00 UTC
            finished_at: 1_767_232_842,
            status: if failed.is_some() { "aborted" } else { "ok" }.into(),
            completed_tasks: vec!["data_ingestion.py".into()],
            failed_task: failed.map(str::to_string),
            error: failed.map(|_| "exited with status 1".to_string()),
        }
    }

    #[test]
    fn formats_success() {
        assert_eq!(
            format_entry(&entry(None)),
            "✅ 2026-01-01 02:00:00  data_pipeline  1 scripts  42s"
        );
    }

    #[test]
    fn formats_abort_with_cause() {
        let line = format_entry(&entry(Some("data_cleaning.py")));
        assert!(line.starts_with("❌ 2026-01-01 02:00:00"), "{line}");
        assert!(line.contains("aborted at data_cleaning.py"), "{line}");
        assert!(line.ends_with("exited with status 1"), "{line}");
    }

    fn finished(age: Duration) -> PipelineResult {
        let started = Utc::now() - age;
        PipelineResult {
            run_id: uuid::Uuid::new_v4(),
            pipeline: "data_pipeline".into(),
            started_at: started,
            finished_at: started,
            completed_tasks: vec![Task::new("ingest.py").unwrap()],
            failed_task: None,
            error: None,
        }
    }

    #[test]
    fn prune_days_removes_old_runs() {
        let dir = tempfile::tempdir().unwrap();
        let db = dir.path().join("datapipe.db");
        let cfg = DataPipeConfig {
            storage: Some(StorageConfig {
                db_path: Some(db.display().to_string()),
            }),
            ..Default::default()
        };
        {
            let log = RunLog::open(cfg.db_path()).unwrap();
            log.record(&finished(Duration::days(40))).unwrap();
            log.record(&finished(Duration::hours(1))).unwrap();
        }

        run(&cfg, 10, Some(30)).unwrap();
        assert_eq!(RunLog::open(cfg.db_path()).unwrap().recent(10).unwrap().len(), 1);

        run(&cfg, 10, None).unwrap();
        assert_eq!(RunLog::open(cfg.db_path()).unwrap().recent(10).unwrap().len(), 1);
    }
}
