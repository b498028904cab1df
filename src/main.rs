//! vigil - watch source trees and hand batched changes to agents
//!
//! ## Usage
//!
//! ```bash
//! # Write a default vigil.yaml
//! vigil init
//!
//! # Check a configuration file
//! vigil validate -c vigil.yaml
//!
//! # Watch src/ and lib/ with a one-off mission
//! vigil start -w src -w lib -m "Verify the parser" -v
//!
//! # Same loop with every agent replaced by the built-in mock
//! vigil demo -w src
//!
//! # Configuration, watch roots, agent binaries and working set contents
//! vigil status
//! ```

mod console;

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, bail};
use clap::{Args, Parser, Subcommand};
use ::console::style;
use tracing::{error, info};
use vigil_agent::{create_agent, create_agent_with_tool};
use vigil_config::{ConfigOverrides, DEFAULT_CONFIG_FILE, VigilConfig};
use vigil_core::{AgentTool, ErrorReporter, LogGuard, VigilError, WorkingSet, init_logging};
use vigil_overseer::{Overseer, OverseerStats};

use crate::console::ConsoleSink;

/// Watch source directories and dispatch batched changes to agents
#[derive(Parser, Debug)]
#[command(name = "vigil")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Directory for log files (defaults to ~/.vigil/logs/)
    #[arg(long, global = true)]
    log_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Args, Debug)]
struct RunArgs {
    /// Configuration file (defaults to ./vigil.yaml if present)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Directory to watch, replaces the configured list (repeatable)
    #[arg(short = 'w', long = "watch-dir")]
    watch_dirs: Vec<PathBuf>,

    /// Mission for every agent
    #[arg(short, long)]
    mission: Option<String>,
}

impl RunArgs {
    fn overrides(&self, log_dir: Option<PathBuf>) -> ConfigOverrides {
        ConfigOverrides {
            watch_dirs: self.watch_dirs.clone(),
            mission: self.mission.clone(),
            log_dir,
        }
    }
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Watch and dispatch until interrupted
    Start(RunArgs),

    /// Like start, but every agent runs as the mock agent
    Demo(RunArgs),

    /// Write a default configuration file
    Init {
        #[arg(short, long, default_value = DEFAULT_CONFIG_FILE)]
        output: PathBuf,

        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },

    /// Load and validate a configuration file
    Validate {
        #[arg(short, long, default_value = DEFAULT_CONFIG_FILE)]
        config: PathBuf,
    },

    /// Show configuration, agent availability and working set contents
    Status {
        #[arg(short, long, default_value = DEFAULT_CONFIG_FILE)]
        config: PathBuf,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let verbose = cli.verbose > 0;
    let result = match &cli.command {
        Command::Start(args) => {
            let overrides = args.overrides(cli.log_dir.clone());
            start(args.config.as_deref(), &overrides, verbose, None).await
        }
        Command::Demo(args) => {
            println!("{} every agent runs as the mock agent", style("Demo mode:").bold());
            let overrides = args.overrides(cli.log_dir.clone());
            start(args.config.as_deref(), &overrides, verbose, Some(AgentTool::Mock)).await
        }
        Command::Init { output, force } => init(output, *force),
        Command::Validate { config } => validate(config),
        Command::Status { config } => status(config),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => report_failure(&e),
    }
}

fn report_failure(err: &anyhow::Error) -> ExitCode {
    eprintln!("{} {:#}", style("Error:").red().bold(), err);
    match err.downcast_ref::<VigilError>() {
        Some(vigil_err) => {
            if let Some(hint) = vigil_err.guidance() {
                eprintln!("  {}", style(hint).dim());
            }
            if vigil_err.is_config_error() {
                ExitCode::from(2)
            } else {
                ExitCode::from(1)
            }
        }
        None => ExitCode::from(1),
    }
}

fn load_config(path: Option<&Path>) -> anyhow::Result<VigilConfig> {
    let config = match path {
        Some(path) => VigilConfig::load(path)?,
        None => VigilConfig::load_or_default(DEFAULT_CONFIG_FILE)?,
    };
    Ok(config)
}

fn setup_logging(config: &VigilConfig, verbose: bool) -> anyhow::Result<LogGuard> {
    let guard = init_logging(config.log_dir.clone(), verbose)?;
    Ok(guard)
}

/// Run the overseer until Ctrl-C. `tool` replaces every agent's configured tool.
async fn start(
    config_path: Option<&Path>,
    overrides: &ConfigOverrides,
    verbose: bool,
    tool: Option<AgentTool>,
) -> anyhow::Result<()> {
    let mut config = load_config(config_path)?;
    if !overrides.is_empty() {
        config.apply_overrides(overrides);
        config.validate()?;
    }

    let _guard = setup_logging(&config, verbose)?;
    info!(
        watch_dirs = ?config.watch_dirs,
        agents = config.agents.len(),
        tool_override = ?tool,
        "Starting vigil"
    );

    let agents = config
        .agent_configs()
        .iter()
        .map(|agent| match tool {
            Some(tool) => create_agent_with_tool(agent, tool),
            None => create_agent(agent),
        })
        .collect::<Vec<_>>();
    let mut overseer = Overseer::new(config.overseer_config())
        .with_agents(agents)
        .with_sink(Arc::new(ConsoleSink));

    let handle = overseer.handle();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("Interrupt received, shutting down");
                handle.stop();
            }
            Err(e) => error!("Failed to listen for interrupt: {}", e),
        }
    });

    let stats = overseer.run().await?;
    print_summary(&stats);
    Ok(())
}

fn print_summary(stats: &OverseerStats) {
    println!(
        "{} {} batches, {} changes, {} reports, {} agent failures",
        style("vigil stopped:").bold(),
        stats.batches_dispatched,
        stats.changes_dispatched,
        stats.reports_surfaced,
        stats.agent_failures
    );
}

fn init(output: &Path, force: bool) -> anyhow::Result<()> {
    if output.exists() && !force {
        bail!("{} already exists (use --force to overwrite)", output.display());
    }
    VigilConfig::default()
        .save(output)
        .with_context(|| format!("failed to write {}", output.display()))?;
    println!("{} Wrote {}", style("✓").green(), output.display());
    Ok(())
}

fn validate(path: &Path) -> anyhow::Result<()> {
    let config = VigilConfig::load(path)?;
    println!("{} {} is valid", style("✓").green(), path.display());

    for dir in &config.watch_dirs {
        if dir.is_dir() {
            println!("  watch  {}", dir.display());
        } else {
            println!("  watch  {} {}", dir.display(), style("(missing, will be skipped)").yellow());
        }
    }
    for agent in &config.agents {
        println!("  agent  {} ({}, {})", agent.name, agent.role, agent.tool);
    }
    Ok(())
}

/// What is on disk in the working set right now.
#[derive(Debug, PartialEq)]
struct WorkingSetSummary {
    exists: bool,
    test_files: usize,
    files: usize,
    pending_reports: usize,
    last_batch: Option<String>,
}

impl WorkingSetSummary {
    fn collect(config: &VigilConfig) -> anyhow::Result<Self> {
        let working_set = WorkingSet::new(&config.working_set_dir);
        let metadata = working_set.read_metadata()?;
        Ok(Self {
            exists: working_set.root().is_dir(),
            test_files: working_set.list_test_files()?.len(),
            files: working_set.file_count()?,
            pending_reports: ErrorReporter::new(&config.error_report_file).pending_reports()?.len(),
            last_batch: metadata.get("last_batch").map(|batch| batch.to_string()),
        })
    }
}

fn status(path: &Path) -> anyhow::Result<()> {
    let config = VigilConfig::load_or_default(path)?;
    if path.exists() {
        println!("{} {}", style("Configuration:").bold(), path.display());
    } else {
        println!("{} defaults ({} not found)", style("Configuration:").bold(), path.display());
    }
    println!("  mission  {}", config.mission.lines().next().unwrap_or_default());

    println!("{}", style("Watch directories:").bold());
    for dir in &config.watch_dirs {
        if dir.is_dir() {
            println!("  {} {}", style("✓").green(), dir.display());
        } else {
            println!("  {} {} (not found)", style("✗").red(), dir.display());
        }
    }

    println!("{}", style("Agents:").bold());
    for agent in &config.agents {
        let binary = agent
            .binary
            .clone()
            .or_else(|| agent.tool.default_binary().map(PathBuf::from));
        let availability = match binary {
            None => style("built in".to_string()).dim(),
            Some(binary) => match which::which(&binary) {
                Ok(resolved) => style(resolved.display().to_string()).green(),
                Err(_) => style(format!("{} not on PATH", binary.display())).red(),
            },
        };
        println!("  {} ({}, {}) {}", agent.name, agent.role, agent.tool, availability);
    }

    let summary = WorkingSetSummary::collect(&config)?;
    println!("{} {}", style("Working set:").bold(), config.working_set_dir.display());
    if !summary.exists {
        println!("  {}", style("not created yet").dim());
        return Ok(());
    }
    println!("  test files       {}", summary.test_files);
    println!("  files            {}", summary.files);
    println!("  pending reports  {}", summary.pending_reports);
    if let Some(batch) = &summary.last_batch {
        println!("  last batch       {}", batch);
    }
    Ok(())
}
