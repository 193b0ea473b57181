use std::fmt;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::PipelineError;

/// A single external script, identified by its filesystem path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    path: PathBuf,
}

impl Task {
    /// Build a task. The path must be non-empty.
    pub fn new(path: impl Into<PathBuf>) -> Result<Self, PipelineError> {
        let path = path.into();
        if path.as_os_str().is_empty() {
            return Err(PipelineError::InvalidTask("script path is empty".to_string()));
        }
        Ok(Self { path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Short name for logs: the file stem, falling back to the full path.
    pub fn name(&self) -> String {
        self.path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.path.display().to_string())
    }
}

impl fmt::Display for Task {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.path.display())
    }
}

/// The fixed, ordered list of tasks making up one end-to-end run.
///
/// Insertion order is execution order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineDefinition {
    pub name: String,
    tasks: Vec<Task>,
}

impl PipelineDefinition {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            tasks: Vec::new(),
        }
    }

    /// Append a task at the end of the sequence.
    pub fn with_task(mut self, task: Task) -> Self {
        self.tasks.push(task);
        self
    }

    /// Build a pipeline from script paths, in the order given.
    pub fn from_paths<I, P>(name: impl Into<String>, paths: I) -> Result<Self, PipelineError>
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        let tasks = paths
            .into_iter()
            .map(Task::new)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self {
            name: name.into(),
            tasks,
        })
    }

    pub fn tasks(&self) -> &[Task] {
        &self.tasks
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }
}

/// When a pipeline should be triggered by the external scheduler.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduleSpec {
    pub name: String,
    /// 5-field cron expression (min hour dom mon dow).
    pub cron_expression: String,
    /// `UTC`, an IANA name, or a fixed `±HH:MM` offset.
    pub timezone: String,
}

impl ScheduleSpec {
    pub fn new(
        name: impl Into<String>,
        cron_expression: impl Into<String>,
        timezone: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            cron_expression: cron_expression.into(),
            timezone: timezone.into(),
        }
    }
}

/// Outcome of one successful script execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionResult {
    pub success: bool,
    pub exit_code: i32,
    pub elapsed_ms: u64,
}

impl ExecutionResult {
    pub fn succeeded(elapsed_ms: u64) -> Self {
        Self {
            success: true,
            exit_code: 0,
            elapsed_ms,
        }
    }
}

/// What happened during one pipeline run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineResult {
    pub run_id: Uuid,
    pub pipeline: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    /// Tasks that succeeded, in execution order.
    pub completed_tasks: Vec<Task>,
    /// Present if and only if the run aborted early.
    pub failed_task: Option<Task>,
    /// Cause of the abort, for operators.
    pub error: Option<String>,
}

impl PipelineResult {
    pub fn is_success(&self) -> bool {
        self.failed_task.is_none()
    }

    /// Turn an aborted run into a `PipelineError::Aborted`.
    pub fn into_result(self) -> Result<Self, PipelineError> {
        match &self.failed_task {
            None => Ok(self),
            Some(task) => Err(PipelineError::Aborted {
                pipeline: self.pipeline.clone(),
                task: task.to_string(),
                completed: self.completed_tasks.len(),
                cause: self.error.clone().unwrap_or_else(|| "unknown error".to_string()),
            }),
        }
    }
}

/// Reference to a registered deployment, returned by `ScheduleRegistrar::register`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistrationHandle {
    pub deployment_id: Uuid,
    pub name: String,
}
