//! Deployment records and the in-memory `ScheduleRegistrar`.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use datapipe_core::{
    PipelineDefinition, PipelineError, RegistrationHandle, ScheduleRegistrar, ScheduleSpec,
};

use crate::cron_parser::validate_schedule;

/// A pipeline registered for periodic execution, keyed by schedule name.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Deployment {
    pub id: Uuid,
    pub name: String,
    pub pipeline: PipelineDefinition,
    pub schedule: ScheduleSpec,
    pub active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Deployment {
    pub fn new(pipeline: &PipelineDefinition, schedule: &ScheduleSpec) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            name: schedule.name.clone(),
            pipeline: pipeline.clone(),
            schedule: schedule.clone(),
            active: false,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn handle(&self) -> RegistrationHandle {
        RegistrationHandle {
            deployment_id: self.id,
            name: self.name.clone(),
        }
    }
}

/// Check a schedule before it is stored, mapping problems to a registration failure.
pub(crate) fn check_schedule(schedule: &ScheduleSpec) -> Result<(), PipelineError> {
    validate_schedule(schedule)
        .map_err(|e| PipelineError::registration(&schedule.name, format!("{e:#}")))
}

/// Process-local registrar. Nothing survives a restart.
#[derive(Default)]
pub struct InMemoryRegistrar {
    deployments: Mutex<HashMap<String, Deployment>>,
}

impl InMemoryRegistrar {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, name: &str) -> Option<Deployment> {
        self.lock().get(name).cloned()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    pub fn active_count(&self) -> usize {
        self.lock().values().filter(|d| d.active).count()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, Deployment>> {
        // A poisoned map is still structurally valid.
        self.deployments
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[async_trait]
impl ScheduleRegistrar for InMemoryRegistrar {
    async fn register(
        &self,
        pipeline: &PipelineDefinition,
        schedule: &ScheduleSpec,
    ) -> Result<RegistrationHandle, PipelineError> {
        check_schedule(schedule)?;
        let mut deployments = self.lock();
        let deployment = deployments
            .entry(schedule.name.clone())
            .and_modify(|existing| {
                existing.pipeline = pipeline.clone();
                existing.schedule = schedule.clone();
                existing.updated_at = Utc::now();
            })
            .or_insert_with(|| Deployment::new(pipeline, schedule));
        info!(
            deployment = %deployment.name,
            id = %deployment.id,
            cron = %schedule.cron_expression,
            timezone = %schedule.timezone,
            "Registered deployment"
        );
        Ok(deployment.handle())
    }

    async fn activate(&self, handle: &RegistrationHandle) -> Result<(), PipelineError> {
        let mut deployments = self.lock();
        match deployments.get_mut(&handle.name) {
            Some(d) if d.id == handle.deployment_id => {
                d.active = true;
                d.updated_at = Utc::now();
                info!(deployment = %d.name, "Activated deployment");
                Ok(())
            }
            _ => Err(PipelineError::UnknownDeployment(handle.name.clone())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pipeline(paths: &[&str]) -> PipelineDefinition {
        PipelineDefinition::from_paths("data_pipeline", paths.iter().copied()).unwrap()
    }

    fn daily() -> ScheduleSpec {
        ScheduleSpec::new("Daily Data Pipeline", "0 2 * * *", "UTC")
    }

    #[tokio::test]
    async fn re_registration_is_idempotent() {
        let registrar = InMemoryRegistrar::new();
        let first = registrar.register(&pipeline(&["a.py"]), &daily()).await.unwrap();
        registrar.activate(&first).await.unwrap();
        let second = registrar
            .register(&pipeline(&["a.py", "b.py"]), &daily())
            .await
            .unwrap();
        registrar.activate(&second).await.unwrap();

        assert_eq!(first, second);
        assert_eq!(registrar.len(), 1);
        assert_eq!(registrar.active_count(), 1);
        let stored = registrar.get("Daily Data Pipeline").unwrap();
        assert_eq!(stored.pipeline.len(), 2);
    }

    #[tokio::test]
    async fn registration_starts_inactive() {
        let registrar = InMemoryRegistrar::new();
        registrar.register(&pipeline(&["a.py"]), &daily()).await.unwrap();
        assert_eq!(registrar.active_count(), 0);
    }

    #[tokio::test]
    async fn invalid_cron_is_a_registration_failure() {
        let registrar = InMemoryRegistrar::new();
        let bad = ScheduleSpec::new("Daily Data Pipeline", "0 2 * *", "UTC");
        let err = registrar.register(&pipeline(&["a.py"]), &bad).await.unwrap_err();
        assert!(matches!(err, PipelineError::Registration { .. }), "{err:?}");
        assert!(registrar.is_empty());
    }

    #[tokio::test]
    async fn invalid_timezone_is_a_registration_failure() {
        let registrar = InMemoryRegistrar::new();
        let bad = ScheduleSpec::new("Daily Data Pipeline", "0 2 * * *", "Nowhere/Special");
        let err = registrar.register(&pipeline(&["a.py"]), &bad).await.unwrap_err();
        assert!(err.to_string().contains("Nowhere/Special"), "{err}");
    }

    #[tokio::test]
    async fn activating_unknown_handle_fails() {
        let registrar = InMemoryRegistrar::new();
        let handle = RegistrationHandle {
            deployment_id: Uuid::new_v4(),
            name: "ghost".into(),
        };
        assert!(matches!(
            registrar.activate(&handle).await,
            Err(PipelineError::UnknownDeployment(_))
        ));
    }
}
