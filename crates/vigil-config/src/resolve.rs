//! Command-line overrides and conversion into runtime settings.

use std::path::PathBuf;
use std::time::Duration;

use tracing::debug;
use vigil_agent::AgentConfig;
use vigil_overseer::OverseerConfig;

use crate::config::VigilConfig;

/// Values given on the command line, applied on top of the file.
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    /// Replaces `watch_dirs` when non-empty
    pub watch_dirs: Vec<PathBuf>,
    pub mission: Option<String>,
    pub log_dir: Option<PathBuf>,
}

impl ConfigOverrides {
    pub fn is_empty(&self) -> bool {
        self.watch_dirs.is_empty() && self.mission.is_none() && self.log_dir.is_none()
    }
}

impl VigilConfig {
    pub fn apply_overrides(&mut self, overrides: &ConfigOverrides) {
        if !overrides.watch_dirs.is_empty() {
            debug!(dirs = ?overrides.watch_dirs, "Overriding watch_dirs");
            self.watch_dirs = overrides.watch_dirs.clone();
        }
        if let Some(mission) = &overrides.mission {
            debug!("Overriding mission");
            self.mission = mission.clone();
        }
        if let Some(log_dir) = &overrides.log_dir {
            self.log_dir = Some(log_dir.clone());
        }
    }

    pub fn overseer_config(&self) -> OverseerConfig {
        OverseerConfig::new(&self.watch_dirs)
            .with_extensions(&self.watch_extensions)
            .with_gate(self.gate.to_gate_config())
            .with_working_set(&self.working_set_dir, &self.error_report_file)
            .with_poll_interval(Duration::from_millis(self.poll_interval_ms))
            .with_agent_stop_timeout(Duration::from_millis(self.agent_stop_timeout_ms))
    }

    /// One [`AgentConfig`] per configured agent, in file order.
    pub fn agent_configs(&self) -> Vec<AgentConfig> {
        self.agents
            .iter()
            .map(|entry| {
                let mut config = AgentConfig::new(&entry.name, entry.role, entry.tool)
                    .with_mission(entry.mission.as_deref().unwrap_or(&self.mission))
                    .with_working_set(&self.working_set_dir, &self.error_report_file)
                    .with_extra_args(entry.extra_args.clone())
                    .with_timeout(Duration::from_secs(entry.timeout_secs));
                if let Some(binary) = &entry.binary {
                    config = config.with_binary(binary);
                }
                if let Some(dir) = &entry.working_dir {
                    config = config.with_working_dir(dir);
                }
                let log_file = entry.log_file.clone().or_else(|| {
                    self.log_dir
                        .as_ref()
                        .map(|dir| dir.join(format!("{}_interactions.jsonl", entry.name)))
                });
                if let Some(log_file) = log_file {
                    config = config.with_log_file(log_file);
                }
                config
            })
            .collect()
    }
}
