//! The report file: an append-only JSON-Lines mailbox from agents to the overseer.
//!
//! Agents append [`ErrorReport`] lines through an [`ErrorReporter`]. A single
//! [`ReportMonitor`] per file tails it and pops reports off the front, so each
//! report is surfaced once. Popping rewrites the remainder of the file and
//! deletes the file when nothing is left.
//!
//! Popping is not safe with more than one drainer. Appenders are tolerated:
//! bytes appended while a pop is rewriting the file are carried over, and
//! anything that still slips through is picked up on the next cycle.

use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use tracing::{debug, warn};

use crate::error::{Result, VigilError};
use crate::types::{ErrorReport, Severity};

/// Appends to and pops from a report file.
#[derive(Debug, Clone)]
pub struct ErrorReporter {
    path: PathBuf,
}

impl ErrorReporter {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Build a report stamped now and append it.
    pub fn report_error(
        &self,
        file: impl Into<String>,
        line: Option<u32>,
        severity: Severity,
        description: impl Into<String>,
        suggested_fix: Option<String>,
    ) -> Result<ErrorReport> {
        let mut report = ErrorReport::new(file, severity, description);
        report.line = line;
        report.suggested_fix = suggested_fix;
        self.append(&report)?;
        Ok(report)
    }

    /// Append one report as a single JSON line.
    pub fn append(&self, report: &ErrorReport) -> Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| VigilError::DirectoryCreation {
                path: parent.to_path_buf(),
                source: e,
            })?;
        }

        let mut line = serde_json::to_string(report).map_err(|e| VigilError::json("encoding report", e))?;
        line.push('\n');

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(|e| VigilError::io("opening report file", &self.path, e))?;
        file.write_all(line.as_bytes())
            .map_err(|e| VigilError::io("appending report", &self.path, e))?;

        debug!(file = %report.file, severity = %report.severity, "report appended");
        Ok(())
    }

    /// All well-formed reports currently in the file, without consuming them.
    pub fn pending_reports(&self) -> Result<Vec<ErrorReport>> {
        let Some(content) = self.read()? else {
            return Ok(Vec::new());
        };

        Ok(complete_lines(&content)
            .enumerate()
            .filter(|(_, line)| !line.trim_ascii().is_empty())
            .filter_map(|(index, line)| match self.parse_line(index + 1, line) {
                Ok(report) => Some(report),
                Err(e) => {
                    warn!("{}", e);
                    None
                }
            })
            .collect())
    }

    /// Remove and return the first well-formed report.
    ///
    /// Malformed lines in front of it are discarded with a warning. A last
    /// line without its newline is still being written and is left in place.
    /// The file is deleted once nothing but whitespace remains. A missing
    /// file yields `None`.
    pub fn pop_report(&self) -> Result<Option<ErrorReport>> {
        let Some(content) = self.read()? else {
            return Ok(None);
        };

        let mut consumed = 0;
        let mut popped = None;
        for (index, line) in complete_lines(&content).enumerate() {
            consumed += line.len();
            if line.trim_ascii().is_empty() {
                continue;
            }
            match self.parse_line(index + 1, line) {
                Ok(report) => {
                    popped = Some(report);
                    break;
                }
                Err(e) => warn!("Skipping malformed report: {}", e),
            }
        }

        if consumed == 0 && !content.is_empty() {
            return Ok(None);
        }
        self.rewrite(content.len(), &content[consumed..])?;
        Ok(popped)
    }

    /// Delete the report file.
    pub fn clear(&self) -> Result<()> {
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(VigilError::io("removing report file", &self.path, e)),
        }
    }

    /// Raw file contents, or `None` if absent.
    fn read(&self) -> Result<Option<Vec<u8>>> {
        match fs::read(&self.path) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(VigilError::io("reading report file", &self.path, e)),
        }
    }

    /// Replace the file with `remainder` plus whatever was appended after the
    /// first `read_len` bytes were read.
    fn rewrite(&self, read_len: usize, remainder: &[u8]) -> Result<()> {
        let mut contents = remainder.to_vec();
        match fs::read(&self.path) {
            Ok(current) if current.len() > read_len => contents.extend_from_slice(&current[read_len..]),
            Ok(_) => {}
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => return Err(VigilError::io("reading report file", &self.path, e)),
        }

        if contents.iter().all(u8::is_ascii_whitespace) {
            return self.clear();
        }
        fs::write(&self.path, contents).map_err(|e| VigilError::io("rewriting report file", &self.path, e))
    }

    /// Lines are decoded one at a time so a bad byte only costs its own line.
    fn parse_line(&self, line_number: usize, line: &[u8]) -> Result<ErrorReport> {
        serde_json::from_slice(line.trim_ascii()).map_err(|e| VigilError::ReportParse {
            path: self.path.clone(),
            line_number,
            message: e.to_string(),
        })
    }
}

/// Newline-terminated lines, each including its `\n`.
fn complete_lines(content: &[u8]) -> impl Iterator<Item = &[u8]> {
    content
        .split_inclusive(|b| *b == b'\n')
        .take_while(|line| line.ends_with(b"\n"))
}

/// Single consumer of a report file.
#[derive(Debug)]
pub struct ReportMonitor {
    reporter: ErrorReporter,
    last_modified: Option<SystemTime>,
}

impl ReportMonitor {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            reporter: ErrorReporter::new(path),
            last_modified: None,
        }
    }

    pub fn path(&self) -> &Path {
        self.reporter.path()
    }

    /// Returns true if the file's modification time differs from the last one
    /// this monitor observed. Any write trips it, including our own rewrites.
    pub fn has_new_reports(&mut self) -> bool {
        match fs::metadata(self.reporter.path()).and_then(|m| m.modified()) {
            Ok(modified) => {
                if self.last_modified == Some(modified) {
                    return false;
                }
                self.last_modified = Some(modified);
                true
            }
            Err(_) => {
                self.last_modified = None;
                false
            }
        }
    }

    /// Pop every report in the file, in append order.
    ///
    /// I/O failures stop the drain and are logged; reports popped before the
    /// failure are still returned.
    pub fn drain_all(&mut self) -> Vec<ErrorReport> {
        let mut reports = Vec::new();
        loop {
            match self.reporter.pop_report() {
                Ok(Some(report)) => reports.push(report),
                Ok(None) => break,
                Err(e) => {
                    warn!(path = %self.path().display(), "Failed to drain reports: {}", e);
                    break;
                }
            }
        }
        // A recreated file may reuse the old mtime on coarse filesystems
        self.last_modified = None;
        reports
    }

    /// Drain only if the file changed since the last look.
    pub fn poll(&mut self) -> Vec<ErrorReport> {
        if self.has_new_reports() {
            self.drain_all()
        } else {
            Vec::new()
        }
    }
}
