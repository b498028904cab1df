//! # vigil-agent
//!
//! Agent sessions that receive change batches from the overseer.
//!
//! ## Implementations
//!
//! - [`ClaudeAgent`] - `claude --print` per prompt (tokio::process)
//! - [`GooseAgent`] - `goose run --file ...` per batch
//! - [`MockAgent`] - In-process stubs and findings, no subprocess
//!
//! ## Example
//!
//! ```no_run
//! use vigil_agent::{AgentConfig, create_agent};
//! use vigil_core::{AgentRole, AgentTool, Batch};
//!
//! # async fn example() -> vigil_agent::Result<()> {
//! let config = AgentConfig::new("verifier", AgentRole::Verifier, AgentTool::Claude);
//! let mut agent = create_agent(&config);
//!
//! agent.start_session().await?;
//! let response = agent.process_batch(&Batch::empty()).await?;
//! println!("{}", response.text);
//! agent.stop_session().await?;
//! # Ok(())
//! # }
//! ```

pub mod claude;
pub mod error;
pub mod factory;
pub mod goose;
pub mod interaction_log;
pub mod mock;
pub mod prompt;
pub mod runner;
pub mod session;

pub use claude::ClaudeAgent;
pub use error::{AgentError, Result};
pub use factory::{AgentConfig, create_agent, create_agent_with_tool};
pub use goose::GooseAgent;
pub use interaction_log::{InteractionEntry, InteractionEvent, InteractionLog};
pub use mock::MockAgent;
pub use prompt::PromptContext;
pub use session::{AgentResponse, AgentSession, HistoryEntry, HistoryKind, SessionCore, SessionState};
