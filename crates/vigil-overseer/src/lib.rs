//! # vigil-overseer
//!
//! The dispatch loop tying the pipeline together.
//!
//! ```text
//! SourceWatcher ─┐
//! SourceWatcher ─┼─ mpsc ─> DeltaGate ─> Batch ─┬─> agent 1 ─┐
//! SourceWatcher ─┘                              └─> agent N ─┴─> report file ─> ReportMonitor ─> sinks
//! ```
//!
//! ## Example
//!
//! ```no_run
//! use vigil_agent::{AgentConfig, create_agent};
//! use vigil_core::{AgentRole, AgentTool};
//! use vigil_overseer::{Overseer, OverseerConfig};
//!
//! # async fn example() -> vigil_core::Result<()> {
//! let agent = create_agent(&AgentConfig::new("verifier", AgentRole::Verifier, AgentTool::Mock));
//! let mut overseer = Overseer::new(OverseerConfig::new(["src"])).with_agent(agent);
//!
//! let handle = overseer.handle();
//! tokio::spawn(async move {
//!     let _ = tokio::signal::ctrl_c().await;
//!     handle.stop();
//! });
//!
//! let stats = overseer.run().await?;
//! println!("{} batches dispatched", stats.batches_dispatched);
//! # Ok(())
//! # }
//! ```

pub mod handle;
pub mod overseer;
pub mod sink;
pub mod stats;

pub use handle::OverseerHandle;
pub use overseer::{Overseer, OverseerConfig, OverseerState};
pub use sink::{ChannelSink, LogSink, ReportSink};
pub use stats::OverseerStats;
