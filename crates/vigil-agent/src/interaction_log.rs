//! Per-agent JSONL log of every tool interaction.
//!
//! Starting a session truncates the file and writes a `session_start`
//! marker. Each prompt sent to the tool then appends one `interaction`
//! entry, whether or not the tool succeeded.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::fs::OpenOptions;
use tokio::io::AsyncWriteExt;
use vigil_core::AgentRole;

use crate::error::{AgentError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InteractionEvent {
    SessionStart,
    Interaction,
}

/// Interaction log entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InteractionEntry {
    pub timestamp: DateTime<Utc>,
    pub event: InteractionEvent,
    pub agent: String,
    pub role: AgentRole,
    pub session_id: String,
    pub mission: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prompt: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub success: Option<bool>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<u64>,
}

impl InteractionEntry {
    /// Marker written when a session starts.
    pub fn session_start(agent: &str, role: AgentRole, session_id: &str, mission: &str) -> Self {
        Self {
            timestamp: Utc::now(),
            event: InteractionEvent::SessionStart,
            agent: agent.to_string(),
            role,
            session_id: session_id.to_string(),
            mission: mission.to_string(),
            prompt: None,
            response: None,
            success: None,
            error: None,
            duration_ms: None,
        }
    }

    /// A prompt sent to the tool. Marked successful until told otherwise.
    pub fn interaction(agent: &str, role: AgentRole, session_id: &str, mission: &str, prompt: &str) -> Self {
        Self {
            event: InteractionEvent::Interaction,
            prompt: Some(prompt.to_string()),
            success: Some(true),
            ..Self::session_start(agent, role, session_id, mission)
        }
    }

    pub fn with_response(mut self, response: impl Into<String>) -> Self {
        self.response = Some(response.into());
        self
    }

    pub fn with_duration(mut self, duration_ms: u64) -> Self {
        self.duration_ms = Some(duration_ms);
        self
    }

    pub fn with_error(mut self, error: impl Into<String>) -> Self {
        self.error = Some(error.into());
        self.success = Some(false);
        self
    }
}

/// Append-only interaction log. Disabled when no path is configured.
#[derive(Debug, Clone, Default)]
pub struct InteractionLog {
    path: Option<PathBuf>,
}

impl InteractionLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: Some(path.into()),
        }
    }

    pub fn disabled() -> Self {
        Self { path: None }
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn is_enabled(&self) -> bool {
        self.path.is_some()
    }

    /// Truncate the log and write `marker` as its first entry.
    pub async fn reset(&self, marker: &InteractionEntry) -> Result<()> {
        self.write(marker, true).await
    }

    pub async fn append(&self, entry: &InteractionEntry) -> Result<()> {
        self.write(entry, false).await
    }

    async fn write(&self, entry: &InteractionEntry, truncate: bool) -> Result<()> {
        let Some(path) = &self.path else {
            return Ok(());
        };

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| AgentError::io(format!("creating {}", parent.display()), e))?;
        }

        let mut options = OpenOptions::new();
        options.create(true);
        if truncate {
            options.write(true).truncate(true);
        } else {
            options.append(true);
        }

        let mut file = options
            .open(path)
            .await
            .map_err(|e| AgentError::io(format!("opening {}", path.display()), e))?;

        let line = format!("{}\n", serde_json::to_string(entry)?);
        file.write_all(line.as_bytes())
            .await
            .map_err(|e| AgentError::io(format!("writing {}", path.display()), e))?;
        file.flush()
            .await
            .map_err(|e| AgentError::io(format!("flushing {}", path.display()), e))?;
        Ok(())
    }

    /// Read every entry back. Missing file means no entries.
    pub async fn entries(&self) -> Result<Vec<InteractionEntry>> {
        let Some(path) = &self.path else {
            return Ok(Vec::new());
        };
        let content = match tokio::fs::read_to_string(path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(AgentError::io(format!("reading {}", path.display()), e)),
        };

        content
            .lines()
            .filter(|line| !line.trim().is_empty())
            .map(|line| serde_json::from_str(line).map_err(AgentError::from))
            .collect()
    }
}
