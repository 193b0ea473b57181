//! Durable run log for pipeline runs.
//!
//! Every finished run writes one row with the tasks that completed and, for
//! aborted runs, the failing task and cause.

use anyhow::{Context, Result};
use rusqlite::types::Type;
use serde::{Deserialize, Serialize};

use datapipe_core::PipelineResult;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunLogEntry {
    pub id: String,
    pub pipeline: String,
    pub started_at: i64,
    pub finished_at: i64,
    pub status: String, // "ok" | "aborted"
    pub completed_tasks: Vec<String>,
    pub failed_task: Option<String>,
    pub error: Option<String>,
}

impl From<&PipelineResult> for RunLogEntry {
    fn from(result: &PipelineResult) -> Self {
        Self {
            id: result.run_id.to_string(),
            pipeline: result.pipeline.clone(),
            started_at: result.started_at.timestamp(),
            finished_at: result.finished_at.timestamp(),
            status: if result.is_success() { "ok" } else { "aborted" }.to_string(),
            completed_tasks: result.completed_tasks.iter().map(ToString::to_string).collect(),
            failed_task: result.failed_task.as_ref().map(ToString::to_string),
            error: result.error.clone(),
        }
    }
}

pub struct RunLog {
    conn: rusqlite::Connection,
}

impl RunLog {
    pub fn open(db_path: &str) -> Result<Self> {
        let conn = rusqlite::Connection::open(db_path).context("open run log")?;
        Self::init(conn)
    }

    /// Create an in-memory log (for testing).
    pub fn in_memory() -> Result<Self> {
        Self::init(rusqlite::Connection::open_in_memory().context("open in-memory run log")?)
    }

    fn init(conn: rusqlite::Connection) -> Result<Self> {
        conn.execute_batch(
            r#"
            PRAGMA journal_mode=WAL;
            CREATE TABLE IF NOT EXISTS pipeline_runs (
                id              TEXT PRIMARY KEY,
                pipeline        TEXT NOT NULL,
                started_at      INTEGER NOT NULL,
                finished_at     INTEGER NOT NULL,
                status          TEXT NOT NULL,
                completed_tasks TEXT NOT NULL,
                failed_task     TEXT,
                error           TEXT
            );
            CREATE INDEX IF NOT EXISTS pipeline_runs_started_at ON pipeline_runs(started_at);
            "#,
        )?;
        Ok(Self { conn })
    }

    pub fn record(&self, result: &PipelineResult) -> Result<RunLogEntry> {
        let entry = RunLogEntry::from(result);
        let completed = serde_json::to_string(&entry.completed_tasks)?;
        self.conn.execute(
            "INSERT INTO pipeline_runs
             (id, pipeline, started_at, finished_at, status, completed_tasks, failed_task, error)
             VALUES (?1,?2,?3,?4,?5,?6,?7,?8)",
            rusqlite::params![
                entry.id, entry.pipeline, entry.started_at, entry.finished_at,
                entry.status, completed, entry.failed_task, entry.error,
            ],
        )?;
        Ok(entry)
    }

    /// Most recent runs first. A row whose task list cannot be decoded is an
    /// error rather than being skipped.
    pub fn recent(&self, limit: usize) -> Result<Vec<RunLogEntry>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, pipeline, started_at, finished_at, status, completed_tasks, failed_task, error
             FROM pipeline_runs ORDER BY started_at DESC, rowid DESC LIMIT ?1",
        )?;
        let entries = stmt
            .query_map(rusqlite::params![limit as i64], |row| {
                let completed: String = row.get(5)?;
                let completed_tasks = serde_json::from_str(&completed).map_err(|e| {
                    rusqlite::Error::FromSqlConversionFailure(5, Type::Text, Box::new(e))
                })?;
                Ok(RunLogEntry {
                    id: row.get(0)?,
                    pipeline: row.get(1)?,
                    started_at: row.get(2)?,
                    finished_at: row.get(3)?,
                    status: row.get(4)?,
                    completed_tasks,
                    failed_task: row.get(6)?,
                    error: row.get(7)?,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()
            .context("read run log")?;
        Ok(entries)
    }

    /// Prune entries older than `max_age_secs`.
    pub fn prune(&self, max_age_secs: i64) -> Result<usize> {
        let cutoff = chrono::Utc::now().timestamp() - max_age_secs;
        let n = self.conn.execute(
            "DELETE FROM pipeline_runs WHERE started_at < ?1",
            rusqlite::params![cutoff],
        )?;
        Ok(n)
    }
}
