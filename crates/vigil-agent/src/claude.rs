//! Agent backed by the `claude` CLI in print mode.
//!
//! Every prompt is a separate `claude --print --dangerously-skip-permissions
//! <prompt>` invocation. Starting the session sends the mission prompt.

use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use vigil_core::{AgentRole, Batch, log_agent_event};

use crate::error::Result;
use crate::prompt;
use crate::runner::{self, CommandOutput, CommandSpec};
use crate::session::{AgentResponse, AgentSession, HistoryEntry, HistoryKind, SessionCore, SessionState};

pub struct ClaudeAgent {
    core: SessionCore,
    binary: PathBuf,
    extra_args: Vec<String>,
    timeout: Duration,
    working_dir: Option<PathBuf>,
}

impl ClaudeAgent {
    pub fn new(core: SessionCore, binary: impl Into<PathBuf>, timeout: Duration) -> Self {
        Self {
            core,
            binary: binary.into(),
            extra_args: Vec::new(),
            timeout,
            working_dir: None,
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

    fn command(&self, prompt: &str) -> CommandSpec {
        CommandSpec::new(&self.binary, self.timeout)
            .args(["--print", "--dangerously-skip-permissions"])
            .args(self.extra_args.iter().cloned())
            .arg(prompt)
            .current_dir(self.working_dir.clone())
    }

    async fn send(&self, prompt: &str) -> Result<CommandOutput> {
        let outcome = runner::run(&self.command(prompt)).await;
        self.core.record(prompt, &outcome).await;
        outcome
    }
}

#[async_trait]
impl AgentSession for ClaudeAgent {
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

        self.core.begin().await;
        let mission = prompt::mission_prompt(self.core.role, &self.core.prompts);
        let output = self.send(&mission).await?;

        self.core.push_history(HistoryKind::Mission, None, mission, output.stdout);
        self.core.state = SessionState::Active;
        log_agent_event!(self.core.name.as_str(), "session_started", tool = "claude");
        Ok(())
    }

    async fn process_batch(&mut self, batch: &Batch) -> Result<AgentResponse> {
        self.core.ensure_usable()?;
        if self.core.state == SessionState::Uninitialized {
            self.start_session().await?;
        }

        let prompt = prompt::batch_prompt(self.core.role, &self.core.prompts, batch).await;
        let output = self.send(&prompt).await?;

        self.core
            .push_history(HistoryKind::Batch, Some(batch.sequence), prompt, output.stdout.clone());
        log_agent_event!(self.core.name.as_str(), "batch_processed", changes = batch.len(), duration_ms = output.duration_ms);
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
