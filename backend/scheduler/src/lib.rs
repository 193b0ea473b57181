//! Retry, sequential execution, and schedule registration for datapipe.

pub mod cron_parser;
pub mod cron_store;
pub mod registrar;
pub mod retry;
pub mod run_log;
pub mod runner;

#[cfg(test)]
mod testing;

pub use cron_store::DeploymentStore;
pub use registrar::{Deployment, InMemoryRegistrar};
pub use retry::{run_with_retry, RetryPolicy, RetryState};
pub use run_log::{RunLog, RunLogEntry};
pub use runner::SequentialRunner;
