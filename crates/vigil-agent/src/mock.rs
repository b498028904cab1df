//! In-process agent for demos and tests.
//!
//! No subprocess is involved. For each created or modified file the mock
//! writes a generated stub into the working set (a test for verifiers, a
//! markdown page for documentation agents). Verifiers also scan modified
//! files for leftover TODO/FIXME markers and debug prints and append those
//! as findings to the report file.

use std::path::Path;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tracing::{debug, warn};
use vigil_core::{AgentRole, Batch, ChangeKind, ErrorReporter, Severity, WorkingSet, log_agent_event};

use crate::error::{AgentError, Result};
use crate::session::{AgentResponse, AgentSession, HistoryEntry, HistoryKind, SessionCore, SessionState};

/// A finding produced by the mock scanner.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Finding {
    pub line: u32,
    pub severity: Severity,
    pub description: String,
    pub suggested_fix: String,
}

pub struct MockAgent {
    core: SessionCore,
    working_set: WorkingSet,
    reporter: ErrorReporter,
    delay: Duration,
}

impl MockAgent {
    pub fn new(core: SessionCore) -> Self {
        let working_set = WorkingSet::new(&core.prompts.working_set_dir);
        let reporter = ErrorReporter::new(&core.prompts.error_report_file);
        Self {
            core,
            working_set,
            reporter,
            delay: Duration::ZERO,
        }
    }

    /// Sleep this long before answering each batch.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    fn write_stub(&self, path: &Path, kind: ChangeKind) -> Result<()> {
        let stem = file_stem(path);
        match self.core.role {
            AgentRole::Verifier => {
                let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("txt");
                let name = format!("test_{stem}_{kind}.{ext}");
                let written = self.working_set.write_test_file(&name, &test_stub(path, kind))?;
                debug!(test = %written.display(), "generated test stub");
            }
            AgentRole::Documentation => {
                let docs = self.core.prompts.docs_dir();
                std::fs::create_dir_all(&docs).map_err(|e| AgentError::io("creating docs dir", e))?;
                let page = docs.join(format!("{stem}.md"));
                std::fs::write(&page, doc_stub(path, kind))
                    .map_err(|e| AgentError::io(format!("writing {}", page.display()), e))?;
                debug!(page = %page.display(), "generated doc stub");
            }
        }
        Ok(())
    }

    fn report_findings(&self, path: &Path) -> Result<usize> {
        let content = match std::fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) => {
                warn!(path = %path.display(), "Cannot scan file: {}", e);
                return Ok(0);
            }
        };

        let findings = scan(&content);
        for finding in &findings {
            self.reporter.report_error(
                path.display().to_string(),
                Some(finding.line),
                finding.severity,
                finding.description.clone(),
                Some(finding.suggested_fix.clone()),
            )?;
        }
        Ok(findings.len())
    }
}

/// Flag TODO/FIXME markers (low) and debug prints (medium), one finding per rule per line.
pub fn scan(content: &str) -> Vec<Finding> {
    let mut findings = Vec::new();
    for (index, line) in content.lines().enumerate() {
        let line_number = (index + 1) as u32;
        let trimmed = line.trim();

        if line.contains("TODO") || line.contains("FIXME") {
            findings.push(Finding {
                line: line_number,
                severity: Severity::Low,
                description: format!("TODO or FIXME comment found: {trimmed}"),
                suggested_fix: "Complete the TODO item".into(),
            });
        }
        if line.contains("print(") && line.to_lowercase().contains("debug") {
            findings.push(Finding {
                line: line_number,
                severity: Severity::Medium,
                description: format!("Debug print statement found: {trimmed}"),
                suggested_fix: "Remove debug print statement".into(),
            });
        }
    }
    findings
}

fn file_stem(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "unnamed".to_string())
}

fn test_stub(path: &Path, kind: ChangeKind) -> String {
    let stem = file_stem(path);
    let is_python = path.extension().is_some_and(|e| e == "py");
    if is_python {
        format!(
            "import unittest
from pathlib import Path


class Test{class}(unittest.TestCase):
    '''Generated test for {path} ({kind})'''

    def test_file_exists(self):
        self.assertTrue(Path('{path}').exists())


if __name__ == '__main__':
    unittest.main()
",
            class = title_case(&stem),
            path = path.display(),
        )
    } else {
        format!("// Generated check for {} ({kind})\n// Verify the file still builds and behaves as before.\n", path.display())
    }
}

fn doc_stub(path: &Path, kind: ChangeKind) -> String {
    format!(
        "# {}\n\nSource: `{}` ({kind})\n\nDescribe the public API of this file here.\n",
        file_stem(path),
        path.display()
    )
}

fn title_case(s: &str) -> String {
    s.split(['_', '-'])
        .filter(|part| !part.is_empty())
        .map(|part| {
            let mut chars = part.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                None => String::new(),
            }
        })
        .collect()
}

#[async_trait]
impl AgentSession for MockAgent {
    fn name(&self) -> &str {
        &self.core.name
    }

    fn role(&self) -> AgentRole {
        self.core.role
    }

    fn state(&self) -> SessionState {
        self.core.state
    }

    async fn start_session(&mut self) -> Result<()> {
        self.core.ensure_usable()?;
        if self.core.state == SessionState::Active {
            return Ok(());
        }

        self.core.begin().await;
        self.working_set.ensure_layout()?;
        let mission = format!("Mock agent started with mission: {}", self.core.prompts.mission);
        self.core
            .push_history(HistoryKind::Mission, None, mission, "Mock session started successfully".into());
        self.core.state = SessionState::Active;
        log_agent_event!(self.core.name.as_str(), "session_started", tool = "mock");
        Ok(())
    }

    async fn process_batch(&mut self, batch: &Batch) -> Result<AgentResponse> {
        self.core.ensure_usable()?;
        if self.core.state == SessionState::Uninitialized {
            self.start_session().await?;
        }

        let start = Instant::now();
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }

        let mut stubs = 0;
        let mut findings = 0;
        for change in batch {
            if !change.kind.expects_file() {
                continue;
            }
            self.write_stub(&change.path, change.kind)?;
            stubs += 1;

            if self.core.role == AgentRole::Verifier && change.kind == ChangeKind::Modified && change.path.exists() {
                findings += self.report_findings(&change.path)?;
            }
        }

        let text = format!(
            "Processed {} changes: {} stubs generated, {} findings reported",
            batch.len(),
            stubs,
            findings
        );
        self.core.push_history(
            HistoryKind::Batch,
            Some(batch.sequence),
            format!("Processed {} changes", batch.len()),
            text.clone(),
        );
        let duration_ms = start.elapsed().as_millis() as u64;
        log_agent_event!(self.core.name.as_str(), "batch_processed", changes = batch.len(), findings);
        Ok(AgentResponse::new(text).with_duration(duration_ms))
    }

    async fn stop_session(&mut self) -> Result<()> {
        if self.core.state != SessionState::Stopped {
            self.core.state = SessionState::Stopped;
            log_agent_event!(self.core.name.as_str(), "session_stopped");
        }
        Ok(())
    }

    fn history(&self) -> &[HistoryEntry] {
        self.core.history()
    }
}
