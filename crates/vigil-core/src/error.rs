//! Error types for vigil operations.
//!
//! [`VigilError`] covers every failure the pipeline can produce. Only
//! configuration and working-set errors are fatal, and they occur before the
//! dispatch loop starts. Everything raised inside the loop is logged and
//! absorbed by the caller.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias using [`VigilError`].
pub type Result<T> = std::result::Result<T, VigilError>;

/// Error type for all vigil core operations.
#[derive(Debug, Error)]
pub enum VigilError {
    // =========================================================================
    // Configuration Errors
    // =========================================================================
    /// Configuration file not found
    #[error("Configuration not found at {path}")]
    ConfigNotFound {
        path: PathBuf,
        #[source]
        source: Option<std::io::Error>,
    },

    /// Configuration file could not be parsed
    #[error("Invalid configuration at {path}: {message}")]
    ConfigInvalid { path: PathBuf, message: String },

    /// Configuration validation failed
    #[error("Configuration validation failed: {message}")]
    ConfigValidation { message: String },

    // =========================================================================
    // I/O Errors
    // =========================================================================
    /// Generic I/O error with context
    #[error("I/O error {operation}: {path}")]
    Io {
        operation: String,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Directory creation failed
    #[error("Failed to create directory: {path}")]
    DirectoryCreation {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // =========================================================================
    // Watch Errors
    // =========================================================================
    /// Watch root does not exist (non-fatal for the overseer, the root is skipped)
    #[error("Watch root not found: {path}")]
    WatchRootNotFound { path: PathBuf },

    /// File watcher initialization failed
    #[error("Failed to initialize file watcher for {path}: {message}")]
    WatcherInit { path: PathBuf, message: String },

    // =========================================================================
    // Parsing Errors
    // =========================================================================
    /// Malformed line in the report file (skipped by the monitor)
    #[error("Malformed report in {path} at line {line_number}: {message}")]
    ReportParse {
        path: PathBuf,
        line_number: usize,
        message: String,
    },

    /// JSON parsing or encoding error
    #[error("JSON error in {context}: {message}")]
    Json {
        context: String,
        message: String,
        #[source]
        source: Option<serde_json::Error>,
    },

    // =========================================================================
    // Internal Errors
    // =========================================================================
    /// Internal invariant violation (bug in vigil)
    #[error("Internal error: {message}")]
    Internal { message: String },
}

impl VigilError {
    /// Create a ConfigNotFound error
    pub fn config_not_found(path: impl Into<PathBuf>) -> Self {
        Self::ConfigNotFound {
            path: path.into(),
            source: None,
        }
    }

    /// Create a ConfigValidation error
    pub fn config_validation(message: impl Into<String>) -> Self {
        Self::ConfigValidation {
            message: message.into(),
        }
    }

    /// Create an I/O error
    pub fn io(operation: impl Into<String>, path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            operation: operation.into(),
            path: path.into(),
            source,
        }
    }

    /// Create a JSON error
    pub fn json(context: impl Into<String>, source: serde_json::Error) -> Self {
        Self::Json {
            context: context.into(),
            message: source.to_string(),
            source: Some(source),
        }
    }

    /// Create an internal error
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Returns true if this is a configuration error
    pub fn is_config_error(&self) -> bool {
        matches!(
            self,
            Self::ConfigNotFound { .. } | Self::ConfigInvalid { .. } | Self::ConfigValidation { .. }
        )
    }

    /// Returns actionable guidance for the user
    pub fn guidance(&self) -> Option<&'static str> {
        match self {
            Self::ConfigNotFound { .. } => Some("Run 'vigil init' to create a configuration file"),
            Self::ConfigInvalid { .. } => Some("Check the file syntax, or run 'vigil validate'"),
            Self::WatchRootNotFound { .. } => Some("Create the directory or remove it from watch_dirs"),
            Self::DirectoryCreation { .. } => Some("Check permissions on the working set directory"),
            _ => None,
        }
    }
}
