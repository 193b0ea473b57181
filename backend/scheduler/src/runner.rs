//! Sequential pipeline runner with fail-fast semantics.

use std::sync::Arc;

use chrono::Utc;
use tracing::{error, info, warn};
use uuid::Uuid;

use datapipe_core::{PipelineDefinition, PipelineResult, ScriptExecutor};

use crate::retry::{run_with_retry, RetryPolicy};

/// Runs a pipeline's tasks one at a time, in definition order.
///
/// The first task that exhausts its retries aborts the run; later tasks are
/// never started.
pub struct SequentialRunner {
    executor: Arc<dyn ScriptExecutor>,
    policy: RetryPolicy,
}

impl SequentialRunner {
    pub fn new(executor: Arc<dyn ScriptExecutor>, policy: RetryPolicy) -> Self {
        Self { executor, policy }
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    pub async fn run(&self, pipeline: &PipelineDefinition) -> PipelineResult {
        let run_id = Uuid::new_v4();
        let started_at = Utc::now();
        info!(
            run_id = %run_id,
            pipeline = %pipeline.name,
            tasks = pipeline.len(),
            retries = self.policy.retries,
            delay_secs = self.policy.delay_seconds,
            "Pipeline run started"
        );
        if pipeline.is_empty() {
            warn!(run_id = %run_id, pipeline = %pipeline.name, "Pipeline has no tasks");
        }

        let mut completed_tasks = Vec::with_capacity(pipeline.len());
        let mut failed_task = None;
        let mut failure = None;

        for task in pipeline.tasks() {
            match run_with_retry(self.executor.as_ref(), task, &self.policy).await {
                Ok(_) => completed_tasks.push(task.clone()),
                Err(e) => {
                    error!(
                        run_id = %run_id,
                        pipeline = %pipeline.name,
                        script = %task,
                        error = %e,
                        skipped = pipeline.len() - completed_tasks.len() - 1,
                        "Pipeline aborted"
                    );
                    failed_task = Some(task.clone());
                    failure = Some(e.to_string());
                    break;
                }
            }
        }

        if failed_task.is_none() {
            info!(
                run_id = %run_id,
                pipeline = %pipeline.name,
                completed = completed_tasks.len(),
                "Pipeline run completed"
            );
        }

        PipelineResult {
            run_id,
            pipeline: pipeline.name.clone(),
            started_at,
            finished_at: Utc::now(),
            completed_tasks,
            failed_task,
            error: failure,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::ScriptedExecutor;
    use datapipe_core::{PipelineError, Task};

    const STAGES: [&str; 5] = [
        "ingest.py",
        "clean.py",
        "analyze.py",
        "cashflow.py",
        "visualize.py",
    ];

    fn pipeline() -> PipelineDefinition {
        PipelineDefinition::from_paths("Daily Data Pipeline", STAGES).unwrap()
    }

    fn runner(executor: Arc<ScriptedExecutor>) -> SequentialRunner {
        SequentialRunner::new(executor, RetryPolicy::new(2, 0))
    }

    fn paths(tasks: &[Task]) -> Vec<String> {
        tasks.iter().map(Task::to_string).collect()
    }

    #[tokio::test]
    async fn all_tasks_succeed_in_definition_order() {
        let executor = Arc::new(ScriptedExecutor::new());
        let result = runner(executor.clone()).run(&pipeline()).await;

        assert!(result.is_success());
        assert!(result.failed_task.is_none());
        assert!(result.error.is_none());
        assert_eq!(paths(&result.completed_tasks), STAGES);
        assert_eq!(executor.calls(), STAGES);
    }

    #[tokio::test]
    async fn exhausted_task_aborts_the_rest() {
        let executor = Arc::new(ScriptedExecutor::new().always_fail("clean.py"));
        let result = runner(executor.clone()).run(&pipeline()).await;

        assert_eq!(paths(&result.completed_tasks), ["ingest.py"]);
        assert_eq!(result.failed_task, Some(Task::new("clean.py").unwrap()));
        assert_eq!(executor.attempts("clean.py"), 3);
        for never_run in ["analyze.py", "cashflow.py", "visualize.py"] {
            assert_eq!(executor.attempts(never_run), 0, "{never_run} ran");
        }
        assert_eq!(
            executor.calls(),
            ["ingest.py", "clean.py", "clean.py", "clean.py"]
        );
    }

    #[tokio::test]
    async fn failure_at_k_keeps_prefix() {
        for (k, failing) in STAGES.iter().enumerate() {
            let executor = Arc::new(ScriptedExecutor::new().always_fail(failing));
            let result = runner(executor).run(&pipeline()).await;
            assert_eq!(paths(&result.completed_tasks), &STAGES[..k]);
            assert_eq!(result.failed_task.as_ref().map(Task::to_string).as_deref(), Some(*failing));
        }
    }

    #[tokio::test]
    async fn flaky_task_does_not_fail_the_run() {
        let executor = Arc::new(ScriptedExecutor::new().succeed_after("analyze.py", 1));
        let result = runner(executor.clone()).run(&pipeline()).await;

        assert!(result.failed_task.is_none());
        assert_eq!(result.completed_tasks.len(), 5);
        assert_eq!(executor.attempts("analyze.py"), 2);
    }

    #[tokio::test]
    async fn aborted_run_surfaces_as_pipeline_error() {
        let executor = Arc::new(ScriptedExecutor::new().always_fail("cashflow.py"));
        let result = runner(executor).run(&pipeline()).await;
        let err = result.into_result().unwrap_err();
        match err {
            PipelineError::Aborted { task, completed, cause, .. } => {
                assert_eq!(task, "cashflow.py");
                assert_eq!(completed, 3);
                assert!(cause.contains("attempt 3 failed"), "{cause}");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn empty_pipeline_completes() {
        let executor = Arc::new(ScriptedExecutor::new());
        let result = runner(executor.clone())
            .run(&PipelineDefinition::new("empty"))
            .await;
        assert!(result.is_success());
        assert!(executor.calls().is_empty());
    }
}
