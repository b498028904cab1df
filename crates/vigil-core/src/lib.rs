//! # vigil-core
//!
//! Core types, errors, and the change pipeline for vigil.
//!
//! This crate provides:
//! - [`VigilError`] - Error types for all core operations
//! - [`logging`] - Tracing setup
//! - [`types`] - Shared type definitions used across vigil crates
//! - [`watcher`] - Recursive source-tree watching
//! - [`gate`] - Filtering, deduplication and batching of changes
//! - [`report`] - The agent report file and its single consumer
//! - [`working_set`] - Scratch directory shared with agents
//!
//! ## Example
//!
//! ```no_run
//! use std::time::Duration;
//! use vigil_core::{ChangeKind, DeltaGate, GateConfig};
//!
//! fn main() -> vigil_core::Result<()> {
//!     let mut gate = DeltaGate::new(GateConfig::default())?.with_roots(["src"]);
//!     gate.add_change("src/app.py", ChangeKind::Modified);
//!
//!     std::thread::sleep(Duration::from_secs(2));
//!     if gate.should_flush() {
//!         let batch = gate.drain_batch();
//!         println!("{} changes", batch.len());
//!     }
//!     Ok(())
//! }
//! ```

pub mod error;
pub mod gate;
pub mod logging;
pub mod report;
pub mod types;
pub mod watcher;
pub mod working_set;

// Re-export main types for convenience
pub use error::{Result, VigilError};
pub use gate::{DEFAULT_IGNORE_PATTERNS, DeltaGate, GateConfig};
pub use logging::{LogGuard, init_logging};
pub use report::{ErrorReporter, ReportMonitor};
pub use types::{AgentRole, AgentTool, Batch, ChangeEvent, ChangeKind, ErrorReport, PendingChange, Severity};
pub use watcher::{DEFAULT_EXTENSIONS, SourceWatcher, WatcherConfig};
pub use working_set::WorkingSet;

#[doc(hidden)]
pub mod __private {
    pub use tracing;
}
