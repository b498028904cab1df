//! The `vigil.yaml` configuration file.

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use vigil_core::{AgentRole, AgentTool, DEFAULT_EXTENSIONS, GateConfig, Result, VigilError};

/// File looked up in the current directory when no `--config` is given.
pub const DEFAULT_CONFIG_FILE: &str = "vigil.yaml";

const DEFAULT_MISSION: &str = "Verify that the code works correctly and report real bugs";

/// On-disk format, picked from the file extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFormat {
    Yaml,
    Json,
}

impl ConfigFormat {
    pub fn from_path(path: &Path) -> Result<Self> {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase());
        match ext.as_deref() {
            Some("yaml") | Some("yml") => Ok(Self::Yaml),
            Some("json") => Ok(Self::Json),
            other => Err(VigilError::ConfigInvalid {
                path: path.to_path_buf(),
                message: format!(
                    "unsupported config format '{}', expected .yaml, .yml or .json",
                    other.unwrap_or("")
                ),
            }),
        }
    }
}

/// Top-level configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VigilConfig {
    /// Source directories to watch
    pub watch_dirs: Vec<PathBuf>,

    /// Extensions (with leading dot) that are watched
    pub watch_extensions: Vec<String>,

    /// Scratch directory shared with the agents
    pub working_set_dir: PathBuf,

    /// JSONL file agents append their findings to
    pub error_report_file: PathBuf,

    /// Mission handed to every agent without its own
    pub mission: String,

    pub poll_interval_ms: u64,
    pub agent_stop_timeout_ms: u64,

    /// Log file directory. Defaults to `~/.vigil/logs`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub log_dir: Option<PathBuf>,

    pub gate: GateSection,
    pub agents: Vec<AgentEntry>,
}

impl Default for VigilConfig {
    fn default() -> Self {
        Self {
            watch_dirs: vec![PathBuf::from("src")],
            watch_extensions: DEFAULT_EXTENSIONS.iter().map(|e| e.to_string()).collect(),
            working_set_dir: PathBuf::from("tests/working_set"),
            error_report_file: PathBuf::from("tests/working_set/error_report.jsonl"),
            mission: DEFAULT_MISSION.to_string(),
            poll_interval_ms: 100,
            agent_stop_timeout_ms: 5000,
            log_dir: None,
            gate: GateSection::default(),
            agents: vec![
                AgentEntry::new("verifier", AgentRole::Verifier, AgentTool::Goose),
                AgentEntry::new("documentation", AgentRole::Documentation, AgentTool::Goose),
            ],
        }
    }
}

/// Gate thresholds in file form. Durations are milliseconds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GateSection {
    pub min_change_interval_ms: u64,
    pub batch_timeout_ms: u64,

    /// Added on top of the built-in ignore list
    pub ignore_patterns: Vec<String>,

    pub min_file_size: u64,
    pub max_file_size: u64,
}

impl Default for GateSection {
    fn default() -> Self {
        Self::from(&GateConfig::default())
    }
}

impl From<&GateConfig> for GateSection {
    fn from(config: &GateConfig) -> Self {
        Self {
            min_change_interval_ms: config.min_change_interval.as_millis() as u64,
            batch_timeout_ms: config.batch_timeout.as_millis() as u64,
            ignore_patterns: config.ignore_patterns.clone(),
            min_file_size: config.min_file_size,
            max_file_size: config.max_file_size,
        }
    }
}

impl GateSection {
    pub fn to_gate_config(&self) -> GateConfig {
        GateConfig::default()
            .with_min_change_interval(Duration::from_millis(self.min_change_interval_ms))
            .with_batch_timeout(Duration::from_millis(self.batch_timeout_ms))
            .with_ignore_patterns(&self.ignore_patterns)
            .with_size_range(self.min_file_size, self.max_file_size)
    }
}

/// One configured agent session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentEntry {
    pub name: String,

    #[serde(default)]
    pub role: AgentRole,

    #[serde(default)]
    pub tool: AgentTool,

    /// Executable override. Defaults to the tool's binary on PATH.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub binary: Option<PathBuf>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub extra_args: Vec<String>,

    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Interaction log. Defaults to `<log_dir>/<name>_interactions.jsonl` when a log dir is set.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub log_file: Option<PathBuf>,

    /// Overrides the top-level mission for this agent only
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mission: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub working_dir: Option<PathBuf>,
}

fn default_timeout_secs() -> u64 {
    300
}

impl AgentEntry {
    pub fn new(name: impl Into<String>, role: AgentRole, tool: AgentTool) -> Self {
        Self {
            name: name.into(),
            role,
            tool,
            binary: None,
            extra_args: Vec::new(),
            timeout_secs: default_timeout_secs(),
            log_file: None,
            mission: None,
            working_dir: None,
        }
    }
}

impl VigilConfig {
    /// Load and validate `path`. A missing file is [`VigilError::ConfigNotFound`].
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let format = ConfigFormat::from_path(path)?;
        let content = fs::read_to_string(path).map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => VigilError::ConfigNotFound {
                path: path.to_path_buf(),
                source: Some(e),
            },
            _ => VigilError::io("reading config", path, e),
        })?;

        let config = Self::parse(&content, format).map_err(|message| VigilError::ConfigInvalid {
            path: path.to_path_buf(),
            message,
        })?;
        config.validate()?;

        info!(path = %path.display(), agents = config.agents.len(), "Loaded configuration");
        Ok(config)
    }

    /// Like [`load`](Self::load), but a missing file yields the defaults.
    pub fn load_or_default(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            debug!(path = %path.display(), "Config file not found, using defaults");
            let config = Self::default();
            config.validate()?;
            return Ok(config);
        }
        Self::load(path)
    }

    fn parse(content: &str, format: ConfigFormat) -> std::result::Result<Self, String> {
        match format {
            ConfigFormat::Yaml => {
                // An empty YAML document means "all defaults"
                if content.trim().is_empty() {
                    return Ok(Self::default());
                }
                serde_yaml::from_str(content).map_err(|e| e.to_string())
            }
            ConfigFormat::Json => serde_json::from_str(content).map_err(|e| e.to_string()),
        }
    }

    /// Write the configuration to `path`, creating parent directories.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let content = match ConfigFormat::from_path(path)? {
            ConfigFormat::Yaml => serde_yaml::to_string(self).map_err(|e| VigilError::ConfigInvalid {
                path: path.to_path_buf(),
                message: e.to_string(),
            })?,
            ConfigFormat::Json => {
                let mut json = serde_json::to_string_pretty(self)
                    .map_err(|e| VigilError::json("serializing config", e))?;
                json.push('\n');
                json
            }
        };

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| VigilError::DirectoryCreation {
                path: parent.to_path_buf(),
                source: e,
            })?;
        }
        fs::write(path, content).map_err(|e| VigilError::io("writing config", path, e))?;
        info!(path = %path.display(), "Saved configuration");
        Ok(())
    }

    /// Check cross-field constraints.
    pub fn validate(&self) -> Result<()> {
        if self.watch_dirs.is_empty() {
            return Err(VigilError::config_validation("watch_dirs must not be empty"));
        }
        if self.watch_extensions.is_empty() {
            return Err(VigilError::config_validation("watch_extensions must not be empty"));
        }
        if let Some(ext) = self.watch_extensions.iter().find(|e| e.trim_start_matches('.').is_empty()) {
            return Err(VigilError::config_validation(format!("invalid watch extension '{}'", ext)));
        }
        if self.poll_interval_ms == 0 {
            return Err(VigilError::config_validation("poll_interval_ms must be greater than 0"));
        }
        if self.mission.trim().is_empty() {
            return Err(VigilError::config_validation("mission must not be empty"));
        }

        self.gate.to_gate_config().validate()?;

        if self.agents.is_empty() {
            return Err(VigilError::config_validation("at least one agent must be configured"));
        }
        let mut names = HashSet::new();
        for agent in &self.agents {
            if agent.name.trim().is_empty() {
                return Err(VigilError::config_validation("agent name must not be empty"));
            }
            if !names.insert(agent.name.as_str()) {
                return Err(VigilError::config_validation(format!(
                    "duplicate agent name '{}'",
                    agent.name
                )));
            }
            if agent.timeout_secs == 0 {
                return Err(VigilError::config_validation(format!(
                    "agent '{}': timeout_secs must be greater than 0",
                    agent.name
                )));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = VigilConfig::default();
        assert_eq!(config.watch_dirs, vec![PathBuf::from("src")]);
        assert_eq!(config.watch_extensions.len(), 11);
        assert_eq!(config.poll_interval_ms, 100);
        assert_eq!(config.agent_stop_timeout_ms, 5000);
        assert_eq!(config.gate.batch_timeout_ms, 2000);
        assert_eq!(config.gate.min_change_interval_ms, 500);
        assert_eq!(config.gate.max_file_size, 1024 * 1024);

        let roles: Vec<_> = config.agents.iter().map(|a| a.role).collect();
        assert_eq!(roles, vec![AgentRole::Verifier, AgentRole::Documentation]);
        assert!(config.agents.iter().all(|a| a.tool == AgentTool::Goose && a.timeout_secs == 300));
        config.validate().unwrap();
    }

    #[test]
    fn test_format_from_extension() {
        assert_eq!(ConfigFormat::from_path(Path::new("vigil.yaml")).unwrap(), ConfigFormat::Yaml);
        assert_eq!(ConfigFormat::from_path(Path::new("a/b.YML")).unwrap(), ConfigFormat::Yaml);
        assert_eq!(ConfigFormat::from_path(Path::new("vigil.json")).unwrap(), ConfigFormat::Json);
        assert!(matches!(
            ConfigFormat::from_path(Path::new("vigil.toml")),
            Err(VigilError::ConfigInvalid { .. })
        ));
        assert!(ConfigFormat::from_path(Path::new("vigil")).is_err());
    }

    #[test]
    fn test_partial_yaml_fills_defaults() {
        let yaml = r#"
watch_dirs: [app]
gate:
  batch_timeout_ms: 750
agents:
  - name: checker
    tool: mock
"#;
        let config = VigilConfig::parse(yaml, ConfigFormat::Yaml).unwrap();
        assert_eq!(config.watch_dirs, vec![PathBuf::from("app")]);
        assert_eq!(config.gate.batch_timeout_ms, 750);
        assert_eq!(config.gate.min_change_interval_ms, 500);
        assert_eq!(config.agents.len(), 1);
        assert_eq!(config.agents[0].role, AgentRole::Verifier);
        assert_eq!(config.agents[0].tool, AgentTool::Mock);
        assert_eq!(config.agents[0].timeout_secs, 300);
        assert_eq!(config.working_set_dir, PathBuf::from("tests/working_set"));
    }

    #[test]
    fn test_empty_yaml_is_default() {
        assert_eq!(VigilConfig::parse("\n", ConfigFormat::Yaml).unwrap(), VigilConfig::default());
    }

    #[test]
    fn test_unknown_role_rejected() {
        let yaml = "agents:\n  - name: x\n    role: reviewer\n";
        assert!(VigilConfig::parse(yaml, ConfigFormat::Yaml).is_err());
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let mut config = VigilConfig::default();
        config.agents.clear();
        assert!(config.validate().unwrap_err().to_string().contains("at least one agent"));

        let mut config = VigilConfig::default();
        config.agents[1].name = "verifier".into();
        assert!(config.validate().unwrap_err().to_string().contains("duplicate agent name"));

        let mut config = VigilConfig::default();
        config.gate.min_file_size = 10;
        config.gate.max_file_size = 5;
        assert!(matches!(config.validate(), Err(VigilError::ConfigValidation { .. })));

        let mut config = VigilConfig::default();
        config.watch_dirs.clear();
        assert!(config.validate().is_err());

        let mut config = VigilConfig::default();
        config.watch_extensions = vec![".".into()];
        assert!(config.validate().is_err());

        let mut config = VigilConfig::default();
        config.agents[0].timeout_secs = 0;
        assert!(config.validate().is_err());

        let mut config = VigilConfig::default();
        config.gate.ignore_patterns = vec!["[broken".into()];
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_gate_section_round_trips_gate_config() {
        let section = GateSection {
            min_change_interval_ms: 0,
            batch_timeout_ms: 250,
            ignore_patterns: vec!["generated".into()],
            min_file_size: 0,
            max_file_size: 4096,
        };
        let gate = section.to_gate_config();
        assert_eq!(gate.batch_timeout, Duration::from_millis(250));
        assert_eq!(gate.ignore_patterns, vec!["generated".to_string()]);
        assert_eq!(GateSection::from(&gate), section);
    }
}
