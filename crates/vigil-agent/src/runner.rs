//! One-shot subprocess execution with a timeout.
//!
//! Agents drive their tools as short-lived processes: one invocation per
//! prompt, stdout captured as the response. The child is killed if the
//! timeout fires.

use std::path::PathBuf;
use std::process::Stdio;
use std::time::{Duration, Instant};

use tokio::process::Command;
use tokio::time::timeout;
use tracing::{debug, error};

use crate::error::{AgentError, Result};

/// A command to run.
#[derive(Debug, Clone)]
pub struct CommandSpec {
    pub program: PathBuf,
    pub args: Vec<String>,
    pub current_dir: Option<PathBuf>,
    pub timeout: Duration,
}

impl CommandSpec {
    pub fn new(program: impl Into<PathBuf>, timeout: Duration) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            current_dir: None,
            timeout,
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn current_dir(mut self, dir: Option<PathBuf>) -> Self {
        self.current_dir = dir;
        self
    }

    fn program_name(&self) -> String {
        self.program.display().to_string()
    }
}

/// Captured output of a successful run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandOutput {
    pub stdout: String,
    pub stderr: String,
    pub duration_ms: u64,
}

/// Run `spec` to completion.
///
/// A missing executable maps to [`AgentError::NotInstalled`], any other spawn
/// failure to [`AgentError::Spawn`], a non-zero exit to
/// [`AgentError::NonZeroExit`] and an expired timeout to
/// [`AgentError::Timeout`].
pub async fn run(spec: &CommandSpec) -> Result<CommandOutput> {
    let mut cmd = Command::new(&spec.program);
    cmd.args(&spec.args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    if let Some(dir) = &spec.current_dir {
        cmd.current_dir(dir);
    }

    debug!(program = %spec.program.display(), args = spec.args.len(), "running agent command");

    let start = Instant::now();
    let result = timeout(spec.timeout, cmd.output()).await;
    let duration_ms = start.elapsed().as_millis() as u64;

    match result {
        Ok(Ok(output)) => {
            let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
            let stderr = String::from_utf8_lossy(&output.stderr).into_owned();

            if !output.status.success() {
                error!(
                    "{} failed with status {}: stderr={}",
                    spec.program.display(),
                    output.status,
                    stderr.trim()
                );
                return Err(AgentError::NonZeroExit {
                    program: spec.program_name(),
                    code: output.status.code(),
                    stderr: stderr.trim().to_string(),
                });
            }

            debug!(duration_ms, bytes = stdout.len(), "agent command finished");
            Ok(CommandOutput {
                stdout,
                stderr,
                duration_ms,
            })
        }
        Ok(Err(e)) if e.kind() == std::io::ErrorKind::NotFound => Err(AgentError::NotInstalled {
            binary: spec.program_name(),
            message: e.to_string(),
        }),
        Ok(Err(e)) => Err(AgentError::Spawn {
            program: spec.program_name(),
            source: e,
        }),
        Err(_) => Err(AgentError::Timeout {
            program: spec.program_name(),
            timeout: spec.timeout,
        }),
    }
}
