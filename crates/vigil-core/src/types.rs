//! Shared type definitions used across vigil crates.

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Kind of filesystem change observed for a path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeKind {
    Created,
    Modified,
    Deleted,
}

impl ChangeKind {
    /// Returns true for kinds where the file is expected to exist on disk.
    pub fn expects_file(&self) -> bool {
        !matches!(self, Self::Deleted)
    }
}

impl fmt::Display for ChangeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Created => write!(f, "created"),
            Self::Modified => write!(f, "modified"),
            Self::Deleted => write!(f, "deleted"),
        }
    }
}

/// A single filesystem change as emitted by a watcher.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeEvent {
    pub path: PathBuf,
    pub kind: ChangeKind,
    pub observed_at: DateTime<Utc>,
    /// Size on disk at observation time. Never populated for deletions.
    pub size_bytes: Option<u64>,
}

impl ChangeEvent {
    /// Create an event stamped with the current time and no size.
    pub fn new(path: impl Into<PathBuf>, kind: ChangeKind) -> Self {
        Self {
            path: path.into(),
            kind,
            observed_at: Utc::now(),
            size_bytes: None,
        }
    }

    /// Attach a size. Ignored for deletions.
    pub fn with_size(mut self, size_bytes: u64) -> Self {
        if self.kind.expects_file() {
            self.size_bytes = Some(size_bytes);
        }
        self
    }
}

/// The gate's per-path record of an unflushed change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingChange {
    pub path: PathBuf,
    pub kind: ChangeKind,
    pub first_seen_at: DateTime<Utc>,
    pub last_seen_at: DateTime<Utc>,
}

/// A deduplicated set of changes flushed from the gate in one go.
///
/// Changes are sorted by path so that dispatch is reproducible.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Batch {
    /// Monotonic flush counter, starting at 1 for the first non-empty batch.
    pub sequence: u64,
    pub flushed_at: DateTime<Utc>,
    pub changes: Vec<PendingChange>,
}

impl Batch {
    /// A batch with no changes.
    pub fn empty() -> Self {
        Self {
            sequence: 0,
            flushed_at: Utc::now(),
            changes: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.changes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, PendingChange> {
        self.changes.iter()
    }

    /// Paths in batch order.
    pub fn paths(&self) -> impl Iterator<Item = &Path> {
        self.changes.iter().map(|c| c.path.as_path())
    }

    /// Number of changes of the given kind.
    pub fn count_kind(&self, kind: ChangeKind) -> usize {
        self.changes.iter().filter(|c| c.kind == kind).count()
    }
}

impl<'a> IntoIterator for &'a Batch {
    type Item = &'a PendingChange;
    type IntoIter = std::slice::Iter<'a, PendingChange>;

    fn into_iter(self) -> Self::IntoIter {
        self.changes.iter()
    }
}

/// Severity of an agent finding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Severity {
    Low,
    Medium,
    High,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Severity {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "low" => Ok(Self::Low),
            "medium" => Ok(Self::Medium),
            "high" => Ok(Self::High),
            other => Err(format!("unknown severity '{other}'")),
        }
    }
}

impl Serialize for Severity {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for Severity {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

/// A finding written by an agent to the report file, one JSON object per line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorReport {
    #[serde(with = "report_timestamp")]
    pub timestamp: DateTime<Utc>,
    pub file: String,
    #[serde(default)]
    pub line: Option<u32>,
    pub severity: Severity,
    pub description: String,
    #[serde(default)]
    pub suggested_fix: Option<String>,
}

impl ErrorReport {
    /// Create a report stamped with the current time.
    pub fn new(file: impl Into<String>, severity: Severity, description: impl Into<String>) -> Self {
        Self {
            timestamp: Utc::now(),
            file: file.into(),
            line: None,
            severity,
            description: description.into(),
            suggested_fix: None,
        }
    }

    pub fn with_line(mut self, line: u32) -> Self {
        self.line = Some(line);
        self
    }

    pub fn with_suggested_fix(mut self, fix: impl Into<String>) -> Self {
        self.suggested_fix = Some(fix.into());
        self
    }
}

/// ISO-8601 timestamps. Agents are external and do not always emit an offset,
/// so naive timestamps are accepted and read as UTC.
mod report_timestamp {
    use super::*;

    pub fn serialize<S: Serializer>(ts: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&ts.to_rfc3339())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<DateTime<Utc>, D::Error> {
        let raw = String::deserialize(deserializer)?;
        if let Ok(ts) = DateTime::parse_from_rfc3339(&raw) {
            return Ok(ts.with_timezone(&Utc));
        }
        NaiveDateTime::parse_from_str(&raw, "%Y-%m-%dT%H:%M:%S%.f")
            .map(|naive| naive.and_utc())
            .map_err(|e| serde::de::Error::custom(format!("invalid timestamp '{raw}': {e}")))
    }
}

/// What an agent is asked to do with each batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum AgentRole {
    /// Generate and run tests, report real bugs to the report file
    #[default]
    Verifier,
    /// Generate and update documentation for changed code
    Documentation,
}

impl fmt::Display for AgentRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Verifier => write!(f, "verifier"),
            Self::Documentation => write!(f, "documentation"),
        }
    }
}

/// External tool backing an agent session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum AgentTool {
    Claude,
    #[default]
    Goose,
    Mock,
}

impl AgentTool {
    /// Executable name looked up on PATH when no binary is configured.
    pub fn default_binary(&self) -> Option<&'static str> {
        match self {
            Self::Claude => Some("claude"),
            Self::Goose => Some("goose"),
            Self::Mock => None,
        }
    }
}

impl fmt::Display for AgentTool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Claude => write!(f, "claude"),
            Self::Goose => write!(f, "goose"),
            Self::Mock => write!(f, "mock"),
        }
    }
}
