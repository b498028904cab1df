//! Agent backed by the `goose` CLI in headless mode.
//!
//! Starting the session only checks that the binary is on PATH and answers
//! `--version`. Each batch is a stateless `goose run --file <path>... <prompt>`
//! invocation, so the prompt carries the full mission every time.

use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, info};
use vigil_core::{AgentRole, Batch, log_agent_event};

use crate::error::{AgentError, Result};
use crate::prompt;
use crate::runner::{self, CommandOutput, CommandSpec};
use crate::session::{AgentResponse, AgentSession, HistoryEntry, HistoryKind, SessionCore, SessionState};

const VERSION_CHECK_TIMEOUT: Duration = Duration::from_secs(10);

pub struct GooseAgent {
    core: SessionCore,
    binary: PathBuf,
    extra_args: Vec<String>,
    timeout: Duration,
    working_dir: Option<PathBuf>,
    version: Option<String>,
}

impl GooseAgent {
    pub fn new(core: SessionCore, binary: impl Into<PathBuf>, timeout: Duration) -> Self {
        Self {
            core,
            binary: binary.into(),
            extra_args: Vec::new(),
            timeout,
            working_dir: None,
            version: None,
        }
    }

    pub fn with_extra_args(mut self, args: Vec<String>) -> Self {
        self.extra_args = args;
        self
    }

    pub fn with_working_dir(mut self, dir: Option<PathBuf>) -> Self {
        self.working_dir = dir;
        self
    }

    /// Version string reported by the tool, once the session has started.
    pub fn version(&self) -> Option<&str> {
        self.version.as_deref()
    }

    async fn verify_installation(&self) -> Result<String> {
        let resolved = which::which(&self.binary).map_err(|e| AgentError::NotInstalled {
            binary: self.binary.display().to_string(),
            message: e.to_string(),
        })?;
        debug!(binary = %resolved.display(), "found goose");

        let spec = CommandSpec::new(resolved, VERSION_CHECK_TIMEOUT).arg("--version");
        match runner::run(&spec).await {
            Ok(output) => Ok(output.stdout.trim().to_string()),
            Err(e) => Err(AgentError::NotInstalled {
                binary: self.binary.display().to_string(),
                message: format!("version check failed: {e}"),
            }),
        }
    }

    fn command(&self, prompt: &str, files: &[PathBuf]) -> CommandSpec {
        let mut spec = CommandSpec::new(&self.binary, self.timeout)
            .arg("run")
            .args(self.extra_args.iter().cloned());
        for file in files {
            spec = spec.arg("--file").arg(file.display().to_string());
        }
        spec.arg(prompt).current_dir(self.working_dir.clone())
    }

    async fn send(&self, prompt: &str, files: &[PathBuf]) -> Result<CommandOutput> {
        let outcome = runner::run(&self.command(prompt, files)).await;
        self.core.record(prompt, &outcome).await;
        outcome
    }
}

#[async_trait]
impl AgentSession for GooseAgent {
    fn name(&self) -> &str {
        &self.core.name
    }

    fn role(&self) -> AgentRole {
        self.core.role
    }

    fn state(&self) -> SessionState {
        self.core.state
    }

    async fn start_session(&mut self) -> Result<()> {
        self.core.ensure_usable()?;
        if self.core.state == SessionState::Active {
            return Ok(());
        }

        let version = self.verify_installation().await?;
        info!(agent = %self.core.name, "goose version: {}", version);

        self.core.begin().await;
        let mission = prompt::mission_prompt(self.core.role, &self.core.prompts);
        self.core.push_history(HistoryKind::Mission, None, mission, version.clone());
        self.version = Some(version);
        self.core.state = SessionState::Active;
        log_agent_event!(self.core.name.as_str(), "session_started", tool = "goose");
        Ok(())
    }

    async fn process_batch(&mut self, batch: &Batch) -> Result<AgentResponse> {
        self.core.ensure_usable()?;
        if self.core.state == SessionState::Uninitialized {
            self.start_session().await?;
        }

        let files: Vec<PathBuf> = batch
            .iter()
            .filter(|c| c.kind.expects_file() && c.path.exists())
            .map(|c| c.path.clone())
            .collect();

        let changes = prompt::previews(batch).await;
        let prompt = format!(
            "{}\n\n{}",
            prompt::mission_prompt(self.core.role, &self.core.prompts),
            prompt::delta_prompt(self.core.role, &changes)
        );
        let output = self.send(&prompt, &files).await?;

        self.core
            .push_history(HistoryKind::Batch, Some(batch.sequence), prompt, output.stdout.clone());
        log_agent_event!(
            self.core.name.as_str(),
            "batch_processed",
            changes = batch.len(),
            files = files.len(),
            duration_ms = output.duration_ms
        );
        Ok(AgentResponse::new(output.stdout).with_duration(output.duration_ms))
    }

    async fn stop_session(&mut self) -> Result<()> {
        if self.core.state != SessionState::Stopped {
            self.core.state = SessionState::Stopped;
            log_agent_event!(self.core.name.as_str(), "session_stopped");
        }
        Ok(())
    }

    fn history(&self) -> &[HistoryEntry] {
        self.core.history()
    }
}
