use async_trait::async_trait;

use crate::error::{ExecutionFailure, PipelineError};
use crate::types::{ExecutionResult, PipelineDefinition, RegistrationHandle, ScheduleSpec, Task};

/// Runs one external script to completion.
#[async_trait]
pub trait ScriptExecutor: Send + Sync {
    /// Execute the task, waiting for the process to exit.
    async fn execute(&self, task: &Task) -> Result<ExecutionResult, ExecutionFailure>;
}

/// The external scheduling system: persists a pipeline plus a cron schedule
/// so it is triggered periodically.
///
/// Registering the same schedule name twice must not produce two schedules.
#[async_trait]
pub trait ScheduleRegistrar: Send + Sync {
    async fn register(
        &self,
        pipeline: &PipelineDefinition,
        schedule: &ScheduleSpec,
    ) -> Result<RegistrationHandle, PipelineError>;

    /// Make a registered schedule live.
    async fn activate(&self, handle: &RegistrationHandle) -> Result<(), PipelineError>;
}
