//! Scripted executor double for retry and runner tests.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Mutex;

use async_trait::async_trait;

use datapipe_core::{ExecutionFailure, ExecutionResult, ScriptExecutor, Task};

/// Number of failures before a script succeeds; `None` never succeeds.
type Script = Option<u32>;

/// Unscripted paths succeed on their first attempt.
#[derive(Default)]
pub struct ScriptedExecutor {
    scripts: HashMap<String, Script>,
    calls: Mutex<Vec<String>>,
}

impl ScriptedExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn succeed_after(mut self, path: &str, failures: u32) -> Self {
        self.scripts.insert(path.to_string(), Some(failures));
        self
    }

    pub fn always_fail(mut self, path: &str) -> Self {
        self.scripts.insert(path.to_string(), None);
        self
    }

    /// Every execution, in call order.
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn attempts(&self, path: &str) -> usize {
        self.calls().iter().filter(|p| p.as_str() == path).count()
    }
}

#[async_trait]
impl ScriptExecutor for ScriptedExecutor {
    async fn execute(&self, task: &Task) -> Result<ExecutionResult, ExecutionFailure> {
        let path = task.to_string();
        let attempt = {
            let mut calls = self.calls.lock().unwrap();
            calls.push(path.clone());
            calls.iter().filter(|p| **p == path).count() as u32
        };
        let succeeds = match self.scripts.get(&path) {
            None => true,
            Some(Some(failures)) => attempt > *failures,
            Some(None) => false,
        };
        if succeeds {
            Ok(ExecutionResult::succeeded(0))
        } else {
            Err(ExecutionFailure::NonZeroExit {
                path: PathBuf::from(path),
                exit_code: 1,
                stderr_tail: vec![format!("attempt {attempt} failed")],
            })
        }
    }
}
