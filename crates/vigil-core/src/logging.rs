//! Logging infrastructure for vigil.
//!
//! Structured logging on the `tracing` ecosystem. Every failure inside the
//! dispatch loop ends up here rather than propagating, so the file log is the
//! record of what the pipeline did.
//!
//! ## Outputs
//!
//! - JSON lines to `~/.vigil/logs/vigil.log` (rolled daily)
//! - Compact human-readable lines to stderr
//!
//! ## Example
//!
//! ```no_run
//! use vigil_core::logging;
//!
//! let _guard = logging::init_logging(None, false).expect("logging init");
//!
//! tracing::info!("vigil started");
//! tracing::debug!(agent = "verifier", "starting session");
//! ```

use std::path::PathBuf;

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{
    EnvFilter,
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
};

use crate::error::{Result, VigilError};

/// Crate targets covered by the default filter.
const TARGETS: &[&str] = &["vigil", "vigil_core", "vigil_agent", "vigil_overseer", "vigil_config"];

/// Guard that must be held to ensure log flushing on shutdown.
pub struct LogGuard {
    _file_guard: Option<WorkerGuard>,
}

/// Initialize the vigil logging system.
///
/// * `log_dir` - Optional custom log directory. Defaults to `~/.vigil/logs/`
/// * `verbose` - If true, sets log level to DEBUG. Otherwise uses INFO.
///
/// `RUST_LOG` takes precedence over both when set.
pub fn init_logging(log_dir: Option<PathBuf>, verbose: bool) -> Result<LogGuard> {
    let log_dir = match log_dir {
        Some(dir) => dir,
        None => default_log_dir()?,
    };

    std::fs::create_dir_all(&log_dir).map_err(|e| VigilError::DirectoryCreation {
        path: log_dir.clone(),
        source: e,
    })?;

    let file_appender = tracing_appender::rolling::daily(&log_dir, "vigil.log");
    let (non_blocking_file, file_guard) = tracing_appender::non_blocking(file_appender);

    let default_level = if verbose { "debug" } else { "info" };
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directives(default_level)));

    let file_layer = fmt::layer()
        .with_writer(non_blocking_file)
        .with_ansi(false)
        .json()
        .with_span_events(FmtSpan::CLOSE)
        .with_current_span(true)
        .with_span_list(true);

    let console_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_ansi(true)
        .with_target(verbose)
        .with_thread_ids(false)
        .with_thread_names(false)
        .with_file(verbose)
        .with_line_number(verbose)
        .compact();

    tracing_subscriber::registry()
        .with(env_filter)
        .with(file_layer)
        .with(console_layer)
        .try_init()
        .map_err(|e| VigilError::internal(format!("logging already initialized: {e}")))?;

    tracing::debug!(log_dir = %log_dir.display(), verbose, "logging initialized");

    Ok(LogGuard {
        _file_guard: Some(file_guard),
    })
}

/// Initialize minimal console-only logging for tests.
pub fn init_test_logging() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(default_directives("debug")))
        .with_test_writer()
        .try_init();
}

/// Filter directives enabling `level` for every vigil crate.
fn default_directives(level: &str) -> String {
    TARGETS
        .iter()
        .map(|target| format!("{target}={level}"))
        .collect::<Vec<_>>()
        .join(",")
}

/// Get the default log directory path (`~/.vigil/logs/`).
pub fn default_log_dir() -> Result<PathBuf> {
    let home = dirs::home_dir().ok_or_else(|| VigilError::internal("home directory could not be determined"))?;
    Ok(home.join(".vigil").join("logs"))
}

/// Log a batch lifecycle event on the `vigil::batch` target.
///
/// ```ignore
/// log_batch_event!(batch.sequence, "dispatched", changes = batch.len());
/// ```
#[macro_export]
macro_rules! log_batch_event {
    ($sequence:expr, $event:expr) => {
        $crate::__private::tracing::info!(
            target: "vigil::batch",
            sequence = $sequence,
            event = $event,
            "batch event"
        )
    };
    ($sequence:expr, $event:expr, $($field:tt)*) => {
        $crate::__private::tracing::info!(
            target: "vigil::batch",
            sequence = $sequence,
            event = $event,
            $($field)*,
            "batch event"
        )
    };
}

/// Log an agent session event on the `vigil::agent` target.
///
/// ```ignore
/// log_agent_event!("verifier", "started");
/// log_agent_event!("verifier", "failed", error = %e);
/// ```
#[macro_export]
macro_rules! log_agent_event {
    ($agent:expr, $event:expr) => {
        $crate::__private::tracing::info!(
            target: "vigil::agent",
            agent = $agent,
            event = $event,
            "agent event"
        )
    };
    ($agent:expr, $event:expr, $($field:tt)*) => {
        $crate::__private::tracing::info!(
            target: "vigil::agent",
            agent = $agent,
            event = $event,
            $($field)*,
            "agent event"
        )
    };
}
