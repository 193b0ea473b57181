//! Bounded retry with a fixed delay between attempts.

use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{error, info, warn};

use datapipe_core::{ExecutionFailure, ExecutionResult, ScriptExecutor, Task};

/// Default number of retries after the first attempt.
pub const DEFAULT_RETRIES: u32 = 2;

/// Default pause between attempts, in seconds.
pub const DEFAULT_DELAY_SECONDS: u64 = 10;

/// Retry policy configuration.
///
/// `retries = 2` means up to three executions in total.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RetryPolicy {
    pub retries: u32,
    pub delay_seconds: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            retries: DEFAULT_RETRIES,
            delay_seconds: DEFAULT_DELAY_SECONDS,
        }
    }
}

impl RetryPolicy {
    pub fn new(retries: u32, delay_seconds: u64) -> Self {
        Self {
            retries,
            delay_seconds,
        }
    }

    pub fn total_attempts(&self) -> u32 {
        self.retries.saturating_add(1)
    }

    pub fn delay(&self) -> Duration {
        Duration::from_secs(self.delay_seconds)
    }
}

/// Retry bookkeeping for one task invocation.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RetryState {
    pub attempts_made: u32,
    /// Total executions allowed (retries + 1).
    pub max_attempts: u32,
    pub delay_seconds: u64,
    pub last_error: Option<String>,
}

impl RetryState {
    pub fn new(policy: &RetryPolicy) -> Self {
        Self {
            attempts_made: 0,
            max_attempts: policy.total_attempts(),
            delay_seconds: policy.delay_seconds,
            last_error: None,
        }
    }

    pub fn record_failure(&mut self, error: &str) {
        self.attempts_made += 1;
        self.last_error = Some(error.to_string());
    }

    pub fn record_success(&mut self) {
        self.attempts_made += 1;
    }

    pub fn exhausted(&self) -> bool {
        self.attempts_made >= self.max_attempts
    }
}

/// Execute `task`, retrying failed attempts up to `policy.retries` times.
///
/// Returns on the first success. Once attempts are exhausted the last
/// failure is returned.
pub async fn run_with_retry(
    executor: &dyn ScriptExecutor,
    task: &Task,
    policy: &RetryPolicy,
) -> Result<ExecutionResult, ExecutionFailure> {
    let mut state = RetryState::new(policy);
    loop {
        let attempt = state.attempts_made + 1;
        info!(
            script = %task,
            attempt,
            max_attempts = state.max_attempts,
            "Running {}", task
        );

        match executor.execute(task).await {
            Ok(result) => {
                state.record_success();
                info!(script = %task, attempt, elapsed_ms = result.elapsed_ms, "Completed {}", task);
                return Ok(result);
            }
            Err(failure) => {
                state.record_failure(&failure.to_string());
                error!(script = %task, attempt, error = %failure, "Error running {}: {}", task, failure);

                if state.exhausted() {
                    warn!(
                        script = %task,
                        attempts = state.attempts_made,
                        "Retry policy exhausted"
                    );
                    return Err(failure);
                }

                warn!(
                    script = %task,
                    attempt,
                    delay_secs = state.delay_seconds,
                    "Script failed, will retry"
                );
                tokio::time::sleep(policy.delay()).await;
            }
        }
    }
}
