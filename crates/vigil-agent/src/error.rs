//! Error types for agent sessions.

use std::time::Duration;

use thiserror::Error;
use vigil_core::VigilError;

/// Result type alias using [`AgentError`].
pub type Result<T> = std::result::Result<T, AgentError>;

/// Agent session errors.
///
/// The overseer never propagates these; each one is logged and counted
/// against the agent that raised it.
#[derive(Debug, Error)]
pub enum AgentError {
    /// The agent executable could not be started
    #[error("Failed to spawn {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    /// The agent executable ran but exited unsuccessfully
    #[error("{program} exited with {}: {stderr}", .code.map(|c| format!("code {c}")).unwrap_or_else(|| "a signal".to_string()))]
    NonZeroExit {
        program: String,
        code: Option<i32>,
        stderr: String,
    },

    /// The agent executable did not finish in time and was killed
    #[error("{program} timed out after {}s", .timeout.as_secs_f64())]
    Timeout { program: String, timeout: Duration },

    /// The backing tool is missing or fails its version check
    #[error("{binary} is not installed or not accessible: {message}")]
    NotInstalled { binary: String, message: String },

    /// The session was stopped and cannot be reused
    #[error("Agent session '{agent}' is stopped")]
    SessionStopped { agent: String },

    /// I/O error with context
    #[error("I/O error {context}: {source}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },

    /// JSON serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Core error
    #[error("Core error: {0}")]
    Core(#[from] VigilError),
}

impl AgentError {
    pub fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }

    /// Check if a later batch could succeed where this one failed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Timeout { .. } | Self::NonZeroExit { .. } | Self::Io { .. })
    }
}
