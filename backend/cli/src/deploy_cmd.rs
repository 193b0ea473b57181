//! `datapipe deploy`: register the pipeline under its schedule and activate it.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use tracing::{info, warn};

use datapipe_config::DataPipeConfig;
use datapipe_core::{
    PipelineDefinition, PipelineError, RegistrationHandle, ScheduleRegistrar, ScheduleSpec,
};
use datapipe_scheduler::cron_parser::next_fire;
use datapipe_scheduler::DeploymentStore;

/// Register then activate. Re-deploying the same schedule name updates the
/// existing deployment.
pub async fn deploy(
    registrar: &dyn ScheduleRegistrar,
    pipeline: &PipelineDefinition,
    schedule: &ScheduleSpec,
) -> Result<RegistrationHandle, PipelineError> {
    let handle = registrar.register(pipeline, schedule).await?;
    registrar.activate(&handle).await?;
    Ok(handle)
}

pub async fn run(cfg: &DataPipeConfig) -> Result<()> {
    let pipeline = cfg.pipeline_definition()?;
    let schedule = cfg.schedule_spec();
    let store = DeploymentStore::open(cfg.db_path())?;

    let handle = deploy(&store, &pipeline, &schedule)
        .await
        .with_context(|| format!("Failed to deploy '{}'", schedule.name))?;
    info!(deployment = %handle.name, id = %handle.deployment_id, "Deployment active");

    for line in deploy_summary(&handle, &pipeline, &schedule, Utc::now()) {
        println!("{line}");
    }
    Ok(())
}

/// Lines printed after a successful deploy. The next fire time is best-effort:
/// the deployment is already active when it is computed.
fn deploy_summary(
    handle: &RegistrationHandle,
    pipeline: &PipelineDefinition,
    schedule: &ScheduleSpec,
    now: DateTime<Utc>,
) -> Vec<String> {
    let mut lines = vec![format!(
        "✅ Deployment '{}' active: {} ({}), {} scripts",
        handle.name,
        schedule.cron_expression,
        schedule.timezone,
        pipeline.len()
    )];
    match next_fire(schedule, now) {
        Ok(Some(next)) => {
            lines.push(format!("   Next run: {}", next.format("%Y-%m-%d %H:%M UTC")));
        }
        Ok(None) => {}
        Err(e) => warn!(deployment = %handle.name, error = %e, "Could not compute next run"),
    }
    lines.push(format!(
        "Deployment created. To run it now: 'datapipe run --deployment \"{}\"'",
        handle.name
    ));
    lines.push("To view run history: 'datapipe runs'".to_string());
    lines
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use datapipe_config::schema::{ScheduleConfig, StorageConfig};
    use datapipe_scheduler::InMemoryRegistrar;

    #[tokio::test]
    async fn deploy_registers_and_activates() {
        let cfg = DataPipeConfig::default();
        let registrar = InMemoryRegistrar::new();
        let handle = deploy(&registrar, &cfg.pipeline_definition().unwrap(), &cfg.schedule_spec())
            .await
            .unwrap();

        let stored = registrar.get("Daily Data Pipeline").unwrap();
        assert!(stored.active);
        assert_eq!(stored.id, handle.deployment_id);
        assert_eq!(stored.pipeline.len(), 5);
    }

    #[tokio::test]
    async fn registration_failure_is_propagated() {
        let cfg = DataPipeConfig::default();
        let registrar = InMemoryRegistrar::new();
        let bad = ScheduleSpec::new("Daily Data Pipeline", "0 2 * * * *", "UTC");
        let err = deploy(&registrar, &cfg.pipeline_definition().unwrap(), &bad)
            .await
            .unwrap_err();
        assert!(matches!(err, PipelineError::Registration { .. }), "{err}");
        assert_eq!(registrar.active_count(), 0);
    }

    #[test]
    fn summary_lists_next_run_and_both_instructions() {
        let cfg = DataPipeConfig::default();
        let schedule = ScheduleSpec::new("Nightly", "0 2 * * 0-7", "UTC");
        let handle = RegistrationHandle {
            deployment_id: uuid::Uuid::new_v4(),
            name: "Nightly".into(),
        };
        let now = Utc.with_ymd_and_hms(2024, 3, 11, 12, 0, 0).unwrap();

        let lines = deploy_summary(&handle, &cfg.pipeline_definition().unwrap(), &schedule, now);
        assert_eq!(lines[0], "✅ Deployment 'Nightly' active: 0 2 * * 0-7 (UTC), 5 scripts");
        assert_eq!(lines[1], "   Next run: 2024-03-12 02:00 UTC");
        assert!(lines.contains(
            &"Deployment created. To run it now: 'datapipe run --deployment \"Nightly\"'"
                .to_string()
        ));
        assert_eq!(lines.last().unwrap(), "To view run history: 'datapipe runs'");
    }

    #[tokio::test]
    async fn deploy_command_activates_in_the_configured_store() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = DataPipeConfig {
            schedule: Some(ScheduleConfig {
                name: Some("Nightly".into()),
                cron: Some("0 2 * * 0-7".into()),
                timezone: Some("UTC".into()),
            }),
            storage: Some(StorageConfig {
                db_path: Some(dir.path().join("datapipe.db").display().to_string()),
            }),
            ..Default::default()
        };

        run(&cfg).await.unwrap();

        let store = DeploymentStore::open(cfg.db_path()).unwrap();
        let stored = store.get("Nightly").unwrap().unwrap();
        assert!(stored.active);
        assert_eq!(stored.schedule.cron_expression, "0 2 * * 0-7");
    }
}
