//! The dispatch loop.
//!
//! One task owns the gate. Watchers push raw events over an unbounded channel,
//! the loop feeds them to the gate, and every `poll_interval` it checks for a
//! ready batch and for new entries in the report file. A ready batch goes to
//! every agent at once and the loop waits for all of them before moving on,
//! so at most one batch is ever in flight.

use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use futures_util::future::join_all;
use serde_json::json;
use tokio::sync::{mpsc, watch};
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use vigil_agent::AgentSession;
use vigil_core::{
    Batch, ChangeEvent, ChangeKind, DEFAULT_EXTENSIONS, DeltaGate, GateConfig, ReportMonitor, Result, SourceWatcher,
    VigilError, WatcherConfig, WorkingSet, log_agent_event, log_batch_event,
};

use crate::handle::OverseerHandle;
use crate::sink::{LogSink, ReportSink};
use crate::stats::{OverseerStats, StatsCounters};

/// Lifecycle of an [`Overseer`]. Ordered, so "at least Running" is `>=`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum OverseerState {
    Idle,
    Running,
    Stopping,
    Stopped,
}

impl fmt::Display for OverseerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            OverseerState::Idle => "idle",
            OverseerState::Running => "running",
            OverseerState::Stopping => "stopping",
            OverseerState::Stopped => "stopped",
        };
        write!(f, "{}", s)
    }
}

/// Settings for one overseer run.
#[derive(Debug, Clone)]
pub struct OverseerConfig {
    /// Roots to watch. Missing roots are skipped at start.
    pub watch_dirs: Vec<PathBuf>,

    /// Extension allow-set handed to every watcher
    pub extensions: Vec<String>,

    pub gate: GateConfig,

    pub working_set_dir: PathBuf,
    pub error_report_file: PathBuf,

    /// How often the loop checks the gate and the report file
    pub poll_interval: Duration,

    /// Upper bound on each agent's `stop_session` during shutdown
    pub agent_stop_timeout: Duration,
}

impl Default for OverseerConfig {
    fn default() -> Self {
        Self {
            watch_dirs: vec![PathBuf::from("src")],
            extensions: DEFAULT_EXTENSIONS.iter().map(|e| e.to_string()).collect(),
            gate: GateConfig::default(),
            working_set_dir: PathBuf::from("tests/working_set"),
            error_report_file: PathBuf::from("tests/working_set/error_report.jsonl"),
            poll_interval: Duration::from_millis(100),
            agent_stop_timeout: Duration::from_secs(5),
        }
    }
}

impl OverseerConfig {
    pub fn new<I, P>(watch_dirs: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        Self {
            watch_dirs: watch_dirs.into_iter().map(Into::into).collect(),
            ..Self::default()
        }
    }

    pub fn with_extensions<I, S>(mut self, extensions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.extensions = extensions.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_gate(mut self, gate: GateConfig) -> Self {
        self.gate = gate;
        self
    }

    pub fn with_working_set(mut self, working_set_dir: impl Into<PathBuf>, error_report_file: impl Into<PathBuf>) -> Self {
        self.working_set_dir = working_set_dir.into();
        self.error_report_file = error_report_file.into();
        self
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn with_agent_stop_timeout(mut self, timeout: Duration) -> Self {
        self.agent_stop_timeout = timeout;
        self
    }

    /// Checks the loop settings and the gate settings.
    pub fn validate(&self) -> Result<()> {
        if self.poll_interval.is_zero() {
            return Err(VigilError::config_validation("poll_interval must be greater than zero"));
        }
        self.gate.validate()
    }
}

/// Owns the watchers, the gate and the agent sessions for one run.
pub struct Overseer {
    config: OverseerConfig,
    agents: Vec<Box<dyn AgentSession>>,
    sinks: Vec<Arc<dyn ReportSink>>,
    state: watch::Sender<OverseerState>,
    cancel: CancellationToken,
    stats: Arc<StatsCounters>,
}

impl Overseer {
    pub fn new(config: OverseerConfig) -> Self {
        let (state, _) = watch::channel(OverseerState::Idle);
        Self {
            config,
            agents: Vec::new(),
            sinks: Vec::new(),
            state,
            cancel: CancellationToken::new(),
            stats: Arc::new(StatsCounters::default()),
        }
    }

    pub fn with_agent(mut self, agent: Box<dyn AgentSession>) -> Self {
        self.agents.push(agent);
        self
    }

    pub fn with_agents(mut self, agents: impl IntoIterator<Item = Box<dyn AgentSession>>) -> Self {
        self.agents.extend(agents);
        self
    }

    /// Add a destination for surfaced reports. Without any, reports go to [`LogSink`].
    pub fn with_sink(mut self, sink: Arc<dyn ReportSink>) -> Self {
        self.sinks.push(sink);
        self
    }

    pub fn config(&self) -> &OverseerConfig {
        &self.config
    }

    pub fn agents(&self) -> &[Box<dyn AgentSession>] {
        &self.agents
    }

    pub fn state(&self) -> OverseerState {
        *self.state.borrow()
    }

    pub fn stats(&self) -> OverseerStats {
        self.stats.snapshot()
    }

    /// A cloneable handle for stopping and observing this overseer from other tasks.
    pub fn handle(&self) -> OverseerHandle {
        OverseerHandle::new(self.cancel.clone(), self.state.subscribe(), Arc::clone(&self.stats))
    }

    /// Start everything and run the loop until [`OverseerHandle::stop`] is called.
    ///
    /// Only an invalid configuration or an unusable working set fails this
    /// call, and both fail before anything is started. Once the loop is
    /// running, agent and watcher failures are logged and counted. A second
    /// call on the same overseer logs a warning and returns the current stats.
    pub async fn run(&mut self) -> Result<OverseerStats> {
        let current = self.state();
        if current != OverseerState::Idle {
            warn!(state = %current, "Overseer already started, ignoring start request");
            return Ok(self.stats.snapshot());
        }

        self.config.validate()?;
        let mut gate = DeltaGate::new(self.config.gate.clone())?;
        let roots = self.existing_roots();
        for root in &roots {
            gate.add_root(root);
        }

        let working_set = WorkingSet::new(&self.config.working_set_dir);
        working_set.ensure_layout()?;
        let mut monitor = ReportMonitor::new(&self.config.error_report_file);

        if self.sinks.is_empty() {
            self.sinks.push(Arc::new(LogSink));
        }

        let (tx, mut rx) = mpsc::unbounded_channel::<ChangeEvent>();
        let mut watchers = self.start_watchers(roots, tx);

        let cancel = self.cancel.clone();
        let started = tokio::select! {
            biased;
            _ = cancel.cancelled() => false,
            _ = self.start_agents() => true,
        };

        if started {
            self.state.send_replace(OverseerState::Running);
            info!(
                watchers = watchers.len(),
                agents = self.agents.len(),
                poll_interval_ms = self.config.poll_interval.as_millis() as u64,
                "Overseer running"
            );

            let mut ticker = tokio::time::interval(self.config.poll_interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            let mut events_open = true;

            loop {
                tokio::select! {
                    biased;
                    _ = cancel.cancelled() => break,
                    event = rx.recv(), if events_open => match event {
                        Some(event) => {
                            let accepted = gate.add_event(&event);
                            self.stats.record_event(accepted);
                        }
                        None => {
                            debug!("All watchers closed their channels");
                            events_open = false;
                        }
                    },
                    _ = ticker.tick() => {
                        if gate.should_flush() {
                            let batch = gate.drain_batch();
                            if !batch.is_empty() {
                                self.dispatch(&batch, &working_set).await;
                            }
                        }
                        self.surface_reports(&mut monitor);
                    }
                }
            }
        }

        self.state.send_replace(OverseerState::Stopping);
        info!(pending = gate.pending_count(), "Overseer stopping");

        for watcher in &mut watchers {
            watcher.stop();
        }
        drop(watchers);
        self.stop_agents().await;

        // Reports written by the final batch
        self.surface_reports(&mut monitor);

        self.state.send_replace(OverseerState::Stopped);
        let stats = self.stats.snapshot();
        info!(
            batches = stats.batches_dispatched,
            changes = stats.changes_dispatched,
            agent_failures = stats.agent_failures,
            reports = stats.reports_surfaced,
            "Overseer stopped"
        );
        Ok(stats)
    }

    fn existing_roots(&self) -> Vec<PathBuf> {
        self.config
            .watch_dirs
            .iter()
            .filter(|root| {
                let exists = root.is_dir();
                if !exists {
                    warn!(root = %root.display(), "Watch directory does not exist, skipping");
                }
                exists
            })
            .cloned()
            .collect()
    }

    fn start_watchers(&self, roots: Vec<PathBuf>, tx: mpsc::UnboundedSender<ChangeEvent>) -> Vec<SourceWatcher> {
        let mut watchers = Vec::with_capacity(roots.len());
        for root in roots {
            let config = WatcherConfig::new(&root).with_extensions(&self.config.extensions);
            let mut watcher = SourceWatcher::new(config);
            let tx = tx.clone();
            match watcher.start(move |event| {
                // Closed receiver means the loop is shutting down
                let _ = tx.send(event);
            }) {
                Ok(()) => watchers.push(watcher),
                Err(e) => warn!(root = %root.display(), "Failed to start watcher, skipping: {}", e),
            }
        }
        if watchers.is_empty() {
            warn!("No directories are being watched");
        }
        watchers
    }

    async fn start_agents(&mut self) {
        let results = join_all(self.agents.iter_mut().map(|agent| agent.start_session())).await;
        for (agent, result) in self.agents.iter().zip(results) {
            if let Err(e) = result {
                // Left uninitialized, so the first batch retries the start
                error!(agent = agent.name(), "Failed to start agent session: {}", e);
            }
        }
    }

    /// Runs one batch through every agent. Not interrupted by a stop request;
    /// each agent's own timeout bounds how long this takes.
    async fn dispatch(&mut self, batch: &Batch, working_set: &WorkingSet) {
        log_batch_event!(
            batch.sequence,
            "dispatching",
            changes = batch.len(),
            created = batch.count_kind(ChangeKind::Created),
            modified = batch.count_kind(ChangeKind::Modified),
            deleted = batch.count_kind(ChangeKind::Deleted),
            agents = self.agents.len()
        );

        let results = join_all(self.agents.iter_mut().map(|agent| agent.process_batch(batch))).await;
        if self.cancel.is_cancelled() {
            info!(sequence = batch.sequence, "Stop requested, finished in-flight batch");
        }

        self.stats.record_batch(batch.len());
        let mut failures = 0usize;
        for (agent, result) in self.agents.iter().zip(results) {
            match result {
                Ok(response) => {
                    log_agent_event!(agent.name(), "batch_done", sequence = batch.sequence, duration_ms = response.duration_ms);
                }
                Err(e) => {
                    failures += 1;
                    self.stats.record_agent_failure();
                    error!(
                        agent = agent.name(),
                        sequence = batch.sequence,
                        retryable = e.is_retryable(),
                        "Agent failed to process batch: {}",
                        e
                    );
                }
            }
        }
        log_batch_event!(batch.sequence, "dispatched", changes = batch.len(), failures);

        let summary = json!({
            "sequence": batch.sequence,
            "changes": batch.len(),
            "flushed_at": batch.flushed_at.to_rfc3339(),
            "agent_failures": failures,
        });
        if let Err(e) = working_set.set_metadata("last_batch", summary) {
            warn!("Failed to record batch metadata: {}", e);
        }
    }

    fn surface_reports(&self, monitor: &mut ReportMonitor) {
        let reports = monitor.poll();
        if reports.is_empty() {
            return;
        }
        self.stats.record_reports(reports.len());
        for report in &reports {
            for sink in &self.sinks {
                sink.deliver(report);
            }
        }
    }

    async fn stop_agents(&mut self) {
        let timeout = self.config.agent_stop_timeout;
        let results = join_all(
            self.agents
                .iter_mut()
                .map(|agent| tokio::time::timeout(timeout, agent.stop_session())),
        )
        .await;
        for (agent, result) in self.agents.iter().zip(results) {
            match result {
                Ok(Ok(())) => {}
                Ok(Err(e)) => warn!(agent = agent.name(), "Error stopping agent session: {}", e),
                Err(_) => warn!(agent = agent.name(), "Agent session did not stop within {:?}", timeout),
            }
        }
    }
}
