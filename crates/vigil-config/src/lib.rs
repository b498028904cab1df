//! # vigil-config
//!
//! Loading, validating and saving `vigil.yaml` (or `.json`), and turning it
//! into [`vigil_overseer::OverseerConfig`] and [`vigil_agent::AgentConfig`]s.
//!
//! ```no_run
//! use vigil_config::{ConfigOverrides, VigilConfig};
//!
//! # fn example() -> vigil_core::Result<()> {
//! let mut config = VigilConfig::load_or_default("vigil.yaml")?;
//! config.apply_overrides(&ConfigOverrides {
//!     mission: Some("Verify the parser".into()),
//!     ..Default::default()
//! });
//! config.validate()?;
//!
//! let overseer = config.overseer_config();
//! let agents = config.agent_configs();
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod resolve;

pub use config::{AgentEntry, ConfigFormat, DEFAULT_CONFIG_FILE, GateSection, VigilConfig};
pub use resolve::ConfigOverrides;
