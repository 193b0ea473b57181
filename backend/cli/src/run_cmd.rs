//! `datapipe run`: execute the pipeline once and record it in the run log.

use std::sync::Arc;

use anyhow::{bail, Result};

use datapipe_config::DataPipeConfig;
use datapipe_core::{PipelineDefinition, PipelineError, PipelineResult, ScriptExecutor};
use datapipe_scheduler::{DeploymentStore, RetryPolicy, RunLog, SequentialRunner};

use crate::config::build_executor;

/// Run `pipeline` to completion or abort and record the outcome.
pub async fn run_pipeline(
    executor: Arc<dyn ScriptExecutor>,
    policy: RetryPolicy,
    pipeline: &PipelineDefinition,
    run_log: &RunLog,
) -> Result<PipelineResult> {
    let result = SequentialRunner::new(executor, policy).run(pipeline).await;
    run_log.record(&result)?;
    Ok(result)
}

/// The configured pipeline, or the one stored for an active deployment.
pub fn resolve_pipeline(
    cfg: &DataPipeConfig,
    store: &DeploymentStore,
    deployment: Option<&str>,
) -> Result<PipelineDefinition> {
    let Some(name) = deployment else {
        return Ok(cfg.pipeline_definition()?);
    };
    let Some(stored) = store.get(name)? else {
        return Err(PipelineError::UnknownDeployment(name.to_string()).into());
    };
    if !stored.active {
        bail!("Deployment '{name}' is not active; run 'datapipe deploy' first");
    }
    Ok(stored.pipeline)
}

pub async fn run(cfg: &DataPipeConfig, deployment: Option<&str>) -> Result<()> {
    let pipeline = match deployment {
        Some(_) => resolve_pipeline(cfg, &DeploymentStore::open(cfg.db_path())?, deployment)?,
        None => cfg.pipeline_definition()?,
    };

    let run_log = RunLog::open(cfg.db_path())?;
    let result = run_pipeline(
        Arc::new(build_executor(cfg)),
        cfg.retry_policy(),
        &pipeline,
        &run_log,
    )
    .await?;

    print_summary(&result);
    result.into_result()?;
    Ok(())
}

fn print_summary(result: &PipelineResult) {
    let elapsed = result.finished_at - result.started_at;
    let secs = elapsed.num_milliseconds() as f64 / 1000.0;
    for task in &result.completed_tasks {
        println!("  ✅ {task}");
    }
    match &result.failed_task {
        Some(task) => {
            println!("  ❌ {task}");
            println!(
                "\n❌ Pipeline '{}' aborted after {}/{} scripts ({secs:.1}s)",
                result.pipeline,
                result.completed_tasks.len(),
                result.completed_tasks.len() + 1
            );
        }
        None => println!(
            "\n✅ Pipeline '{}' completed {} scripts ({secs:.1}s)",
            result.pipeline,
            result.completed_tasks.len()
        ),
    }
}
