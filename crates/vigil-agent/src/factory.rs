//! Agent construction from configuration.

use std::path::PathBuf;
use std::time::Duration;

use tracing::{info, warn};
use vigil_core::{AgentRole, AgentTool};

use crate::claude::ClaudeAgent;
use crate::goose::GooseAgent;
use crate::interaction_log::InteractionLog;
use crate::mock::MockAgent;
use crate::prompt::PromptContext;
use crate::session::{AgentSession, SessionCore};

/// Environment variable that forces every agent onto one tool.
pub const TOOL_OVERRIDE_ENV: &str = "VIGIL_AGENT_TOOL";

/// Everything needed to build one agent session.
#[derive(Debug, Clone)]
pub struct AgentConfig {
    pub name: String,
    pub role: AgentRole,
    pub tool: AgentTool,

    /// Executable to run. Defaults to the tool's own binary name on PATH.
    pub binary: Option<PathBuf>,

    /// Extra arguments placed before the prompt
    pub extra_args: Vec<String>,

    /// Per-invocation timeout
    pub timeout: Duration,

    /// JSONL interaction log. Disabled when unset.
    pub log_file: Option<PathBuf>,

    /// Directory the tool runs in. Defaults to the current directory.
    pub working_dir: Option<PathBuf>,

    pub mission: String,
    pub working_set_dir: PathBuf,
    pub error_report_file: PathBuf,
}

impl AgentConfig {
    pub fn new(name: impl Into<String>, role: AgentRole, tool: AgentTool) -> Self {
        Self {
            name: name.into(),
            role,
            tool,
            binary: None,
            extra_args: Vec::new(),
            timeout: Duration::from_secs(300),
            log_file: None,
            working_dir: None,
            mission: "Verify that the code works correctly and report real bugs".to_string(),
            working_set_dir: PathBuf::from("tests/working_set"),
            error_report_file: PathBuf::from("tests/working_set/error_report.jsonl"),
        }
    }

    pub fn with_binary(mut self, binary: impl Into<PathBuf>) -> Self {
        self.binary = Some(binary.into());
        self
    }

    pub fn with_extra_args(mut self, args: Vec<String>) -> Self {
        self.extra_args = args;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_log_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.log_file = Some(path.into());
        self
    }

    pub fn with_working_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_dir = Some(dir.into());
        self
    }

    pub fn with_mission(mut self, mission: impl Into<String>) -> Self {
        self.mission = mission.into();
        self
    }

    pub fn with_working_set(mut self, working_set_dir: impl Into<PathBuf>, error_report_file: impl Into<PathBuf>) -> Self {
        self.working_set_dir = working_set_dir.into();
        self.error_report_file = error_report_file.into();
        self
    }

    fn prompt_context(&self) -> PromptContext {
        PromptContext {
            mission: self.mission.clone(),
            working_set_dir: self.working_set_dir.clone(),
            error_report_file: self.error_report_file.clone(),
        }
    }

    fn binary_or(&self, tool: AgentTool) -> PathBuf {
        self.binary
            .clone()
            .or_else(|| tool.default_binary().map(PathBuf::from))
            .unwrap_or_default()
    }
}

/// Build the session for `config`.
///
/// `VIGIL_AGENT_TOOL` (claude, goose or mock), when set, replaces the
/// configured tool for every agent.
pub fn create_agent(config: &AgentConfig) -> Box<dyn AgentSession> {
    let tool = match std::env::var(TOOL_OVERRIDE_ENV) {
        Ok(value) => match parse_tool(&value) {
            Some(tool) => {
                info!("Using {} environment variable: {}", TOOL_OVERRIDE_ENV, value);
                tool
            }
            None => {
                warn!("Ignoring unknown {} value '{}'", TOOL_OVERRIDE_ENV, value);
                config.tool
            }
        },
        Err(_) => config.tool,
    };
    create_agent_with_tool(config, tool)
}

/// Build the session for `config` using `tool`, ignoring the environment.
pub fn create_agent_with_tool(config: &AgentConfig, tool: AgentTool) -> Box<dyn AgentSession> {
    let log = config
        .log_file
        .as_ref()
        .map(InteractionLog::new)
        .unwrap_or_else(InteractionLog::disabled);
    let core = SessionCore::new(&config.name, config.role, config.prompt_context(), log);

    info!(agent = %config.name, role = %config.role, %tool, "Creating agent");
    match tool {
        AgentTool::Claude => Box::new(
            ClaudeAgent::new(core, config.binary_or(tool), config.timeout)
                .with_extra_args(config.extra_args.clone())
                .with_working_dir(config.working_dir.clone()),
        ),
        AgentTool::Goose => Box::new(
            GooseAgent::new(core, config.binary_or(tool), config.timeout)
                .with_extra_args(config.extra_args.clone())
                .with_working_dir(config.working_dir.clone()),
        ),
        AgentTool::Mock => Box::new(MockAgent::new(core)),
    }
}

fn parse_tool(value: &str) -> Option<AgentTool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "claude" => Some(AgentTool::Claude),
        "goose" => Some(AgentTool::Goose),
        "mock" => Some(AgentTool::Mock),
        _ => None,
    }
}
