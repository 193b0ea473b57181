pub mod error;
pub mod traits;
pub mod types;

pub use error::{ExecutionFailure, PipelineError};
pub use traits::{ScheduleRegistrar, ScriptExecutor};
pub use types::{
    ExecutionResult, PipelineDefinition, PipelineResult, RegistrationHandle, ScheduleSpec, Task,
};
