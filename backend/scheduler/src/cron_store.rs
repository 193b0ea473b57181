//! Durable SQLite-backed deployment store.
//!
//! One row per schedule name; registering an existing name updates the row in
//! place and keeps its id.

use std::sync::{Mutex, MutexGuard};

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::OptionalExtension;
use tracing::info;
use uuid::Uuid;

use datapipe_core::{
    PipelineDefinition, PipelineError, RegistrationHandle, ScheduleRegistrar, ScheduleSpec,
};

use crate::registrar::{check_schedule, Deployment};

pub struct DeploymentStore {
    conn: Mutex<rusqlite::Connection>,
}

impl DeploymentStore {
    pub fn open(db_path: &str) -> Result<Self> {
        let conn = rusqlite::Connection::open(db_path).context("open deployment store")?;
        Self::init(conn)
    }

    /// Create an in-memory store (for testing).
    pub fn in_memory() -> Result<Self> {
        let conn = rusqlite::Connection::open_in_memory().context("open in-memory deployment store")?;
        Self::init(conn)
    }

    fn init(conn: rusqlite::Connection) -> Result<Self> {
        conn.execute_batch(
            r#"
            PRAGMA journal_mode=WAL;
            CREATE TABLE IF NOT EXISTS deployments (
                id          TEXT PRIMARY KEY,
                name        TEXT NOT NULL UNIQUE,
                pipeline    TEXT NOT NULL,
                cron        TEXT NOT NULL,
                timezone    TEXT NOT NULL,
                active      INTEGER NOT NULL DEFAULT 0,
                created_at  TEXT NOT NULL,
                updated_at  TEXT NOT NULL
            );
            "#,
        )?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn conn(&self) -> Result<MutexGuard<'_, rusqlite::Connection>> {
        self.conn
            .lock()
            .map_err(|_| anyhow!("deployment store lock poisoned"))
    }

    /// Insert or update the deployment for `schedule.name`. Returns its id.
    pub fn upsert(&self, pipeline: &PipelineDefinition, schedule: &ScheduleSpec) -> Result<Uuid> {
        let pipeline_json = serde_json::to_string(pipeline).context("serialize pipeline")?;
        let now = Utc::now().to_rfc3339();
        let conn = self.conn()?;
        conn.execute(
            r#"INSERT INTO deployments
               (id, name, pipeline, cron, timezone, active, created_at, updated_at)
               VALUES (?1, ?2, ?3, ?4, ?5, 0, ?6, ?6)
               ON CONFLICT(name) DO UPDATE SET
                 pipeline=excluded.pipeline,
                 cron=excluded.cron,
                 timezone=excluded.timezone,
                 updated_at=excluded.updated_at"#,
            rusqlite::params![
                Uuid::new_v4().to_string(),
                schedule.name,
                pipeline_json,
                schedule.cron_expression,
                schedule.timezone,
                now,
            ],
        )?;
        let id: String = conn.query_row(
            "SELECT id FROM deployments WHERE name = ?1",
            rusqlite::params![schedule.name],
            |row| row.get(0),
        )?;
        Uuid::parse_str(&id).context("stored deployment id is not a UUID")
    }

    pub fn get(&self, name: &str) -> Result<Option<Deployment>> {
        let conn = self.conn()?;
        let row = conn
            .query_row(
                "SELECT id, name, pipeline, cron, timezone, active, created_at, updated_at
                 FROM deployments WHERE name = ?1",
                rusqlite::params![name],
                read_row,
            )
            .optional()?;
        row.map(into_deployment).transpose()
    }

    pub fn list(&self) -> Result<Vec<Deployment>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT id, name, pipeline, cron, timezone, active, created_at, updated_at
             FROM deployments ORDER BY name",
        )?;
        let rows = stmt
            .query_map([], read_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        rows.into_iter().map(into_deployment).collect()
    }

    pub fn set_active(&self, id: &Uuid, active: bool) -> Result<bool> {
        let n = self.conn()?.execute(
            "UPDATE deployments SET active = ?1, updated_at = ?2 WHERE id = ?3",
            rusqlite::params![active as i32, Utc::now().to_rfc3339(), id.to_string()],
        )?;
        Ok(n > 0)
    }

    pub fn deactivate(&self, name: &str) -> Result<bool> {
        let n = self.conn()?.execute(
            "UPDATE deployments SET active = 0, updated_at = ?1 WHERE name = ?2",
            rusqlite::params![Utc::now().to_rfc3339(), name],
        )?;
        Ok(n > 0)
    }

    pub fn delete(&self, name: &str) -> Result<bool> {
        let n = self
            .conn()?
            .execute("DELETE FROM deployments WHERE name = ?1", rusqlite::params![name])?;
        Ok(n > 0)
    }
}

type RawRow = (String, String, String, String, String, i32, String, String);

fn read_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<RawRow> {
    Ok((
        row.get(0)?,
        row.get(1)?,
        row.get(2)?,
        row.get(3)?,
        row.get(4)?,
        row.get(5)?,
        row.get(6)?,
        row.get(7)?,
    ))
}

fn into_deployment(raw: RawRow) -> Result<Deployment> {
    let (id, name, pipeline, cron, timezone, active, created_at, updated_at) = raw;
    Ok(Deployment {
        id: Uuid::parse_str(&id).context("stored deployment id is not a UUID")?,
        schedule: ScheduleSpec::new(name.clone(), cron, timezone),
        name,
        pipeline: serde_json::from_str(&pipeline).context("decode stored pipeline")?,
        active: active != 0,
        created_at: parse_time(&created_at)?,
        updated_at: parse_time(&updated_at)?,
    })
}

fn parse_time(raw: &str) -> Result<DateTime<Utc>> {
    Ok(DateTime::parse_from_rfc3339(raw)
        .with_context(|| format!("bad timestamp '{raw}'"))?
        .with_timezone(&Utc))
}

#[async_trait]
impl ScheduleRegistrar for DeploymentStore {
    async fn register(
        &self,
        pipeline: &PipelineDefinition,
        schedule: &ScheduleSpec,
    ) -> Result<RegistrationHandle, PipelineError> {
        check_schedule(schedule)?;
        let deployment_id = self
            .upsert(pipeline, schedule)
            .map_err(|e| PipelineError::registration(&schedule.name, format!("{e:#}")))?;
        info!(
            deployment = %schedule.name,
            id = %deployment_id,
            cron = %schedule.cron_expression,
            timezone = %schedule.timezone,
            tasks = pipeline.len(),
            "Registered deployment"
        );
        Ok(RegistrationHandle {
            deployment_id,
            name: schedule.name.clone(),
        })
    }

    async fn activate(&self, handle: &RegistrationHandle) -> Result<(), PipelineError> {
        let updated = self
            .set_active(&handle.deployment_id, true)
            .map_err(|e| PipelineError::registration(&handle.name, format!("{e:#}")))?;
        if !updated {
            return Err(PipelineError::UnknownDeployment(handle.name.clone()));
        }
        info!(deployment = %handle.name, "Activated deployment");
        Ok(())
    }
}
