//! The agent session contract.
//!
//! An [`AgentSession`] is a long-lived collaborator that the overseer starts
//! once and then hands every batch to. Lifecycle:
//!
//! ```text
//! Uninitialized --start_session--> Active --stop_session--> Stopped
//! ```
//!
//! `start_session` is idempotent while active. Processing a batch on an
//! uninitialized session starts it first. `Stopped` is terminal: a stopped
//! session refuses further work and a new one must be constructed.

use std::fmt;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::warn;
use vigil_core::{AgentRole, Batch};

use crate::error::{AgentError, Result};
use crate::interaction_log::{InteractionEntry, InteractionLog};
use crate::prompt::PromptContext;
use crate::runner::CommandOutput;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    Uninitialized,
    Active,
    Stopped,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Uninitialized => write!(f, "uninitialized"),
            Self::Active => write!(f, "active"),
            Self::Stopped => write!(f, "stopped"),
        }
    }
}

/// What an agent said about a batch. Opaque to the overseer beyond `success`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentResponse {
    pub text: String,
    pub success: bool,
    pub duration_ms: u64,
}

impl AgentResponse {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            success: true,
            duration_ms: 0,
        }
    }

    pub fn with_duration(mut self, duration_ms: u64) -> Self {
        self.duration_ms = duration_ms;
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HistoryKind {
    Mission,
    Batch,
}

/// One exchange in a session's conversation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub kind: HistoryKind,
    pub at: DateTime<Utc>,
    /// Batch sequence for [`HistoryKind::Batch`] entries
    pub sequence: Option<u64>,
    pub prompt: String,
    pub response: String,
}

/// A worker that receives every dispatched batch.
#[async_trait]
pub trait AgentSession: Send + Sync {
    /// Configured name, used in logs.
    fn name(&self) -> &str;

    fn role(&self) -> AgentRole;

    fn state(&self) -> SessionState;

    /// Bring the session up. A no-op while active.
    async fn start_session(&mut self) -> Result<()>;

    /// Hand one batch to the agent.
    async fn process_batch(&mut self, batch: &Batch) -> Result<AgentResponse>;

    /// Shut the session down. Idempotent.
    async fn stop_session(&mut self) -> Result<()>;

    /// Conversation so far, oldest first.
    fn history(&self) -> &[HistoryEntry];
}

/// Bookkeeping shared by the built-in agents.
#[derive(Debug)]
pub struct SessionCore {
    pub name: String,
    pub role: AgentRole,
    pub state: SessionState,
    pub prompts: PromptContext,
    history: Vec<HistoryEntry>,
    log: InteractionLog,
    session_id: String,
}

impl SessionCore {
    pub fn new(name: impl Into<String>, role: AgentRole, prompts: PromptContext, log: InteractionLog) -> Self {
        Self {
            name: name.into(),
            role,
            state: SessionState::Uninitialized,
            prompts,
            history: Vec::new(),
            log,
            session_id: String::new(),
        }
    }

    /// Fail if the session has been stopped.
    pub fn ensure_usable(&self) -> Result<()> {
        if self.state == SessionState::Stopped {
            return Err(AgentError::SessionStopped {
                agent: self.name.clone(),
            });
        }
        Ok(())
    }

    /// Allocate a session id and reset the interaction log.
    pub async fn begin(&mut self) {
        self.session_id = uuid::Uuid::new_v4().to_string();
        let marker = InteractionEntry::session_start(&self.name, self.role, &self.session_id, &self.prompts.mission);
        if let Err(e) = self.log.reset(&marker).await {
            warn!(agent = %self.name, "Failed to reset interaction log: {}", e);
        }
    }

    /// Append the outcome of one tool invocation to the interaction log.
    pub async fn record(&self, prompt: &str, outcome: &Result<CommandOutput>) {
        let entry = InteractionEntry::interaction(&self.name, self.role, &self.session_id, &self.prompts.mission, prompt);
        let entry = match outcome {
            Ok(output) => entry.with_response(&output.stdout).with_duration(output.duration_ms),
            Err(e) => entry.with_response("").with_error(e.to_string()),
        };
        if let Err(e) = self.log.append(&entry).await {
            warn!(agent = %self.name, "Failed to write interaction log: {}", e);
        }
    }

    pub fn push_history(&mut self, kind: HistoryKind, sequence: Option<u64>, prompt: String, response: String) {
        self.history.push(HistoryEntry {
            kind,
            at: Utc::now(),
            sequence,
            prompt,
            response,
        });
    }

    pub fn history(&self) -> &[HistoryEntry] {
        &self.history
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }
}
