use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// A script exited non-zero, could not be launched, or was stopped.
#[derive(Debug, Error)]
pub enum ExecutionFailure {
    #[error("failed to launch {}: {source}", path.display())]
    Launch {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{} exited with status {exit_code}{}", path.display(), format_tail(stderr_tail))]
    NonZeroExit {
        path: PathBuf,
        exit_code: i32,
        /// Last lines the script wrote to stderr.
        stderr_tail: Vec<String>,
    },

    #[error("{} was terminated by a signal", path.display())]
    Terminated { path: PathBuf },

    #[error("{} timed out after {timeout:?} and was killed", path.display())]
    TimedOut { path: PathBuf, timeout: Duration },
}

impl ExecutionFailure {
    /// Exit code reported by the process, if it ran to completion.
    pub fn exit_code(&self) -> Option<i32> {
        match self {
            Self::NonZeroExit { exit_code, .. } => Some(*exit_code),
            _ => None,
        }
    }
}

fn format_tail(tail: &[String]) -> String {
    match tail.last() {
        Some(line) => format!(": {line}"),
        None => String::new(),
    }
}

/// Top-level error type for pipeline runs and schedule registration.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("invalid task: {0}")]
    InvalidTask(String),

    #[error(transparent)]
    Execution(#[from] ExecutionFailure),

    #[error("pipeline '{pipeline}' aborted at {task} after {completed} completed task(s): {cause}")]
    Aborted {
        pipeline: String,
        task: String,
        completed: usize,
        cause: String,
    },

    #[error("schedule registration failed for '{name}': {message}")]
    Registration { name: String, message: String },

    #[error("no deployment registered under '{0}'")]
    UnknownDeployment(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl PipelineError {
    pub fn registration(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Registration {
            name: name.into(),
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn non_zero_exit_mentions_last_stderr_line() {
        let failure = ExecutionFailure::NonZeroExit {
            path: PathBuf::from("clean.py"),
            exit_code: 2,
            stderr_tail: vec!["Traceback".into(), "KeyError: 'amount'".into()],
        };
        assert_eq!(
            failure.to_string(),
            "clean.py exited with status 2: KeyError: 'amount'"
        );
        assert_eq!(failure.exit_code(), Some(2));
    }

    #[test]
    fn launch_failure_has_no_exit_code() {
        let failure = ExecutionFailure::Launch {
            path: PathBuf::from("ingest.py"),
            source: std::io::Error::from(std::io::ErrorKind::NotFound),
        };
        assert!(failure.exit_code().is_none());
        assert!(failure.to_string().starts_with("failed to launch ingest.py"));
    }
}
