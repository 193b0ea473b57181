use std::collections::{HashMap, VecDeque};
use std::path::PathBuf;
use std::process::{ExitStatus, Stdio};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::Command;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use datapipe_core::{ExecutionFailure, ExecutionResult, ScriptExecutor, Task};

/// Interpreter used when none is configured.
pub const DEFAULT_INTERPRETER: &str = "python3";

/// Number of trailing stderr lines kept for failure reports.
const STDERR_TAIL_LINES: usize = 5;

/// How long output readers may keep draining after the script has exited.
/// Background processes the script started can hold the pipes open forever.
const OUTPUT_GRACE: Duration = Duration::from_millis(500);

type Tail = Arc<Mutex<VecDeque<String>>>;

/// Runs each task as `<interpreter> <path>` in a child process.
#[derive(Debug, Clone)]
pub struct ProcessExecutor {
    interpreter: String,
    working_dir: Option<PathBuf>,
    env: HashMap<String, String>,
    timeout: Option<Duration>,
}

impl Default for ProcessExecutor {
    fn default() -> Self {
        Self::new(DEFAULT_INTERPRETER)
    }
}

impl ProcessExecutor {
    /// An empty interpreter runs the script path directly.
    pub fn new(interpreter: impl Into<String>) -> Self {
        Self {
            interpreter: interpreter.into(),
            working_dir: None,
            env: HashMap::new(),
            timeout: None,
        }
    }

    pub fn with_working_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_dir = Some(dir.into());
        self
    }

    pub fn with_env(mut self, env: HashMap<String, String>) -> Self {
        self.env = env;
        self
    }

    /// Kill scripts that run longer than `timeout`.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn interpreter(&self) -> &str {
        &self.interpreter
    }

    fn command(&self, task: &Task) -> Command {
        let mut cmd = if self.interpreter.trim().is_empty() {
            Command::new(task.path())
        } else {
            let mut cmd = Command::new(&self.interpreter);
            cmd.arg(task.path());
            cmd
        };
        cmd.envs(&self.env)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(dir) = &self.working_dir {
            cmd.current_dir(dir);
        }
        cmd
    }
}

#[async_trait]
impl ScriptExecutor for ProcessExecutor {
    async fn execute(&self, task: &Task) -> Result<ExecutionResult, ExecutionFailure> {
        let script = task.name();
        debug!(
            script = %script,
            interpreter = %self.interpreter,
            path = %task,
            "Spawning script"
        );

        let started = Instant::now();
        let mut child = self
            .command(task)
            .spawn()
            .map_err(|source| ExecutionFailure::Launch {
                path: task.path().to_path_buf(),
                source,
            })?;

        let stdout = spawn_forwarder(child.stdout.take(), &script, OutputStream::Stdout, None);
        let stderr_tail = Tail::default();
        let stderr = spawn_forwarder(
            child.stderr.take(),
            &script,
            OutputStream::Stderr,
            Some(stderr_tail.clone()),
        );

        let status = match self.timeout {
            None => child.wait().await.map(Some),
            Some(limit) => match tokio::time::timeout(limit, child.wait()).await {
                Ok(status) => status.map(Some),
                Err(_) => {
                    warn!(
                        script = %script,
                        timeout_ms = limit.as_millis() as u64,
                        "Script timed out, killing"
                    );
                    child.kill().await.map(|_| None)
                }
            },
        };

        for reader in [stdout, stderr].into_iter().flatten() {
            finish_forwarder(reader, &script).await;
        }

        let elapsed_ms = started.elapsed().as_millis() as u64;
        let status = status.map_err(|source| ExecutionFailure::Launch {
            path: task.path().to_path_buf(),
            source,
        })?;

        match status {
            Some(status) => {
                let tail = stderr_tail
                    .lock()
                    .map(|t| t.iter().cloned().collect())
                    .unwrap_or_default();
                interpret_status(task, status, tail, elapsed_ms)
            }
            None => Err(ExecutionFailure::TimedOut {
                path: task.path().to_path_buf(),
                timeout: self.timeout.unwrap_or_default(),
            }),
        }
    }
}

fn interpret_status(
    task: &Task,
    status: ExitStatus,
    stderr_tail: Vec<String>,
    elapsed_ms: u64,
) -> Result<ExecutionResult, ExecutionFailure> {
    if status.success() {
        info!(script = %task.name(), elapsed_ms, "Script exited cleanly");
        return Ok(ExecutionResult::succeeded(elapsed_ms));
    }
    match status.code() {
        Some(exit_code) => Err(ExecutionFailure::NonZeroExit {
            path: task.path().to_path_buf(),
            exit_code,
            stderr_tail,
        }),
        None => Err(ExecutionFailure::Terminated {
            path: task.path().to_path_buf(),
        }),
    }
}

#[derive(Debug, Clone, Copy)]
enum OutputStream {
    Stdout,
    Stderr,
}

fn spawn_forwarder<R>(
    reader: Option<R>,
    script: &str,
    stream: OutputStream,
    tail: Option<Tail>,
) -> Option<JoinHandle<()>>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    let reader = reader?;
    let script = script.to_string();
    Some(tokio::spawn(async move {
        forward_lines(reader, &script, stream, tail).await
    }))
}

/// Give a reader a short grace period to drain, then stop it.
async fn finish_forwarder(mut reader: JoinHandle<()>, script: &str) {
    if tokio::time::timeout(OUTPUT_GRACE, &mut reader).await.is_err() {
        debug!(script = %script, "Output still open after exit, detaching");
        reader.abort();
    }
}

/// Forward a child's output into the log line by line, keeping the last few
/// lines in `tail` when one is given.
async fn forward_lines<R>(reader: R, script: &str, stream: OutputStream, tail: Option<Tail>)
where
    R: AsyncRead + Unpin,
{
    let mut lines = BufReader::new(reader).lines();
    loop {
        match lines.next_line().await {
            Ok(Some(line)) => {
                match stream {
                    OutputStream::Stdout => info!(script = %script, "{}", line),
                    OutputStream::Stderr => warn!(script = %script, "{}", line),
                }
                if let Some(Ok(mut tail)) = tail.as_ref().map(|t| t.lock()) {
                    if tail.len() == STDERR_TAIL_LINES {
                        tail.pop_front();
                    }
                    tail.push_back(line);
                }
            }
            Ok(None) => break,
            Err(e) => {
                debug!(script = %script, error = %e, "Stopped reading script output");
                break;
            }
        }
    }
}
