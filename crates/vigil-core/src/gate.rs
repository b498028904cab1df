//! Change gate: filtering, deduplication and timeout-based batching.
//!
//! The [`DeltaGate`] sits between the watchers and the agents. It drops
//! paths nobody should react to (build artifacts, VCS internals, hidden
//! files, files outside the size window), keeps at most one pending change
//! per path with last-write-wins semantics, and decides when the
//! accumulated set is ready to flush as a single [`Batch`].
//!
//! Two clocks drive flushing:
//!
//! - `batch_timeout` is measured from the first change after the previous
//!   flush. A burst of any size inside that window lands in one batch, and a
//!   lone change still flushes once the window elapses.
//! - `min_change_interval` rate-limits consecutive drains even when a batch
//!   is otherwise ready.
//!
//! The gate is a plain single-owner state machine. The overseer loop owns it
//! and feeds it from the watcher channel, so no locking is involved.
//!
//! Every time-dependent operation has an `*_at(Instant)` variant; the plain
//! versions call it with `Instant::now()`.

use std::borrow::Cow;
use std::collections::HashMap;
use std::path::{Component, Path, PathBuf};
use std::time::{Duration, Instant};

use chrono::Utc;
use globset::{Glob, GlobMatcher};
use tracing::{debug, trace};

use crate::error::{Result, VigilError};
use crate::types::{Batch, ChangeEvent, ChangeKind, PendingChange};

/// Patterns that are always ignored, in addition to any configured ones.
pub const DEFAULT_IGNORE_PATTERNS: &[&str] = &[
    "*.pyc",
    "*.pyo",
    "__pycache__",
    ".git",
    ".svn",
    ".hg",
    "node_modules",
    ".DS_Store",
    "*.log",
    "*.tmp",
    "*.swp",
];

const GLOB_CHARS: &[char] = &['*', '?', '[', ']', '{', '}'];

/// Gate thresholds.
#[derive(Debug, Clone, PartialEq)]
pub struct GateConfig {
    /// Minimum time between two consecutive drains
    pub min_change_interval: Duration,

    /// Time from the first pending change until the batch is ready
    pub batch_timeout: Duration,

    /// Extra ignore patterns, applied on top of [`DEFAULT_IGNORE_PATTERNS`]
    pub ignore_patterns: Vec<String>,

    /// Smallest accepted file size in bytes (inclusive)
    pub min_file_size: u64,

    /// Largest accepted file size in bytes (inclusive)
    pub max_file_size: u64,
}

impl Default for GateConfig {
    fn default() -> Self {
        Self {
            min_change_interval: Duration::from_millis(500),
            batch_timeout: Duration::from_secs(2),
            ignore_patterns: Vec::new(),
            min_file_size: 1,
            max_file_size: 1024 * 1024,
        }
    }
}

impl GateConfig {
    pub fn with_min_change_interval(mut self, interval: Duration) -> Self {
        self.min_change_interval = interval;
        self
    }

    pub fn with_batch_timeout(mut self, timeout: Duration) -> Self {
        self.batch_timeout = timeout;
        self
    }

    pub fn with_ignore_patterns<I, S>(mut self, patterns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.ignore_patterns = patterns.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_size_range(mut self, min: u64, max: u64) -> Self {
        self.min_file_size = min;
        self.max_file_size = max;
        self
    }

    /// Check thresholds and that every ignore pattern compiles.
    pub fn validate(&self) -> Result<()> {
        if self.min_file_size > self.max_file_size {
            return Err(VigilError::config_validation(format!(
                "min_file_size ({}) exceeds max_file_size ({})",
                self.min_file_size, self.max_file_size
            )));
        }
        if self.batch_timeout.is_zero() {
            return Err(VigilError::config_validation("batch_timeout must be greater than zero"));
        }
        self.compile_rules().map(|_| ())
    }

    fn compile_rules(&self) -> Result<Vec<IgnoreRule>> {
        let mut seen = Vec::new();
        let mut rules = Vec::new();
        let patterns = DEFAULT_IGNORE_PATTERNS
            .iter()
            .map(|p| p.to_string())
            .chain(self.ignore_patterns.iter().map(|p| p.trim().to_string()));

        for pattern in patterns {
            if pattern.is_empty() || seen.contains(&pattern) {
                continue;
            }
            rules.push(IgnoreRule::compile(&pattern)?);
            seen.push(pattern);
        }
        Ok(rules)
    }
}

/// One compiled ignore pattern.
#[derive(Debug, Clone)]
enum IgnoreRule {
    /// `*.ext`: file name suffix
    Suffix(String),
    /// Anything else with glob syntax, matched against every path tail
    Glob(GlobMatcher),
    /// Bare name: equal to some path segment
    Segment(String),
    /// Bare pattern containing `/`: substring of the path
    Substring(String),
}

impl IgnoreRule {
    fn compile(pattern: &str) -> Result<Self> {
        if let Some(suffix) = pattern.strip_prefix('*') {
            if suffix.starts_with('.') && !suffix.contains(GLOB_CHARS) && !suffix.contains('/') {
                return Ok(Self::Suffix(suffix.to_string()));
            }
        }

        if pattern.contains(GLOB_CHARS) {
            let glob = Glob::new(pattern).map_err(|e| {
                VigilError::config_validation(format!("invalid ignore pattern '{pattern}': {e}"))
            })?;
            return Ok(Self::Glob(glob.compile_matcher()));
        }

        if pattern.contains('/') {
            Ok(Self::Substring(pattern.trim_matches('/').to_string()))
        } else {
            Ok(Self::Segment(pattern.to_string()))
        }
    }

    fn matches(&self, relative: &Path, segments: &[&str]) -> bool {
        match self {
            Self::Suffix(suffix) => segments.last().is_some_and(|name| name.ends_with(suffix.as_str())),
            Self::Segment(name) => segments.iter().any(|s| *s == name.as_str()),
            Self::Substring(needle) => segments.join("/").contains(needle.as_str()),
            Self::Glob(matcher) => {
                (0..segments.len()).any(|start| matcher.is_match(segments[start..].join("/")))
                    || matcher.is_match(relative)
            }
        }
    }
}

/// Why a change was turned away. Only used for logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Rejection {
    Ignored,
    Hidden,
    Missing,
    Directory,
    Size(u64),
}

/// Filters, deduplicates and batches change events.
#[derive(Debug)]
pub struct DeltaGate {
    config: GateConfig,
    rules: Vec<IgnoreRule>,
    roots: Vec<PathBuf>,
    pending: HashMap<PathBuf, PendingChange>,
    batch_started_at: Option<Instant>,
    last_flush_at: Option<Instant>,
    sequence: u64,
}

impl DeltaGate {
    /// Create a gate. Fails if an ignore pattern is not a valid glob.
    pub fn new(config: GateConfig) -> Result<Self> {
        let rules = config.compile_rules()?;
        Ok(Self {
            config,
            rules,
            roots: Vec::new(),
            pending: HashMap::new(),
            batch_started_at: None,
            last_flush_at: None,
            sequence: 0,
        })
    }

    /// Register watch roots so ignore and hidden rules only look at the part
    /// of a path below its root.
    pub fn with_roots<I, P>(mut self, roots: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: AsRef<Path>,
    {
        for root in roots {
            self.add_root(root);
        }
        self
    }

    /// Register one watch root. Both the given and the canonical form are kept.
    pub fn add_root(&mut self, root: impl AsRef<Path>) {
        let root = root.as_ref().to_path_buf();
        if let Ok(canonical) = root.canonicalize() {
            if canonical != root && !self.roots.contains(&canonical) {
                self.roots.push(canonical);
            }
        }
        if !self.roots.contains(&root) {
            self.roots.push(root);
        }
        // Longest first so nested roots win
        self.roots.sort_by_key(|r| std::cmp::Reverse(r.components().count()));
    }

    pub fn config(&self) -> &GateConfig {
        &self.config
    }

    /// Record a change. Returns false, leaving the gate untouched, if the
    /// path is ignored, hidden, or (for non-deletions) missing or outside the
    /// size window.
    pub fn add_change(&mut self, path: impl AsRef<Path>, kind: ChangeKind) -> bool {
        self.add_change_at(path, kind, Instant::now())
    }

    /// Record a watcher event.
    pub fn add_event(&mut self, event: &ChangeEvent) -> bool {
        self.add_change(&event.path, event.kind)
    }

    /// [`add_change`](Self::add_change) with an explicit clock reading.
    pub fn add_change_at(&mut self, path: impl AsRef<Path>, kind: ChangeKind, now: Instant) -> bool {
        let path = path.as_ref();

        if let Err(reason) = self.check(path, kind) {
            debug!(path = %path.display(), %kind, ?reason, "change rejected");
            return false;
        }

        let seen_at = Utc::now();
        self.pending
            .entry(path.to_path_buf())
            .and_modify(|pending| {
                pending.kind = kind;
                pending.last_seen_at = seen_at;
            })
            .or_insert_with(|| PendingChange {
                path: path.to_path_buf(),
                kind,
                first_seen_at: seen_at,
                last_seen_at: seen_at,
            });

        if self.batch_started_at.is_none() {
            self.batch_started_at = Some(now);
        }

        trace!(path = %path.display(), %kind, pending = self.pending.len(), "change accepted");
        true
    }

    /// Returns true if a non-empty batch is ready and draining is not rate limited.
    pub fn should_flush(&self) -> bool {
        self.should_flush_at(Instant::now())
    }

    /// [`should_flush`](Self::should_flush) with an explicit clock reading.
    pub fn should_flush_at(&self, now: Instant) -> bool {
        if self.pending.is_empty() {
            return false;
        }

        if let Some(last_flush) = self.last_flush_at {
            if now.saturating_duration_since(last_flush) < self.config.min_change_interval {
                return false;
            }
        }

        self.batch_started_at
            .is_some_and(|started| now.saturating_duration_since(started) >= self.config.batch_timeout)
    }

    /// Empty the pending set into a batch sorted by path.
    ///
    /// With nothing pending this returns an empty batch and changes nothing.
    pub fn drain_batch(&mut self) -> Batch {
        self.drain_batch_at(Instant::now())
    }

    /// [`drain_batch`](Self::drain_batch) with an explicit clock reading.
    pub fn drain_batch_at(&mut self, now: Instant) -> Batch {
        if self.pending.is_empty() {
            return Batch::empty();
        }

        let mut changes: Vec<PendingChange> = self.pending.drain().map(|(_, change)| change).collect();
        changes.sort_by(|a, b| a.path.cmp(&b.path));

        self.sequence += 1;
        self.last_flush_at = Some(now);
        self.batch_started_at = None;

        Batch {
            sequence: self.sequence,
            flushed_at: Utc::now(),
            changes,
        }
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    /// Pending record for `path`, if any.
    pub fn pending_change(&self, path: impl AsRef<Path>) -> Option<&PendingChange> {
        self.pending.get(path.as_ref())
    }

    /// Drop all pending changes. The rate-limit clock is kept.
    pub fn clear(&mut self) {
        self.pending.clear();
        self.batch_started_at = None;
    }

    /// Returns true if `path` matches an ignore pattern or has a hidden segment.
    /// Size is not considered.
    pub fn is_ignored(&self, path: impl AsRef<Path>) -> bool {
        self.check_patterns(path.as_ref()).is_err()
    }

    fn check(&self, path: &Path, kind: ChangeKind) -> std::result::Result<(), Rejection> {
        self.check_patterns(path)?;

        if kind.expects_file() {
            let meta = std::fs::metadata(path).map_err(|_| Rejection::Missing)?;
            if meta.is_dir() {
                return Err(Rejection::Directory);
            }
            let size = meta.len();
            if size < self.config.min_file_size || size > self.config.max_file_size {
                return Err(Rejection::Size(size));
            }
        }
        Ok(())
    }

    fn check_patterns(&self, path: &Path) -> std::result::Result<(), Rejection> {
        let relative = self.relative(path);
        let owned: Vec<Cow<'_, str>> = relative
            .components()
            .filter_map(|c| match c {
                Component::Normal(s) => Some(s.to_string_lossy()),
                _ => None,
            })
            .collect();
        let segments: Vec<&str> = owned.iter().map(AsRef::as_ref).collect();

        if segments.iter().any(|s| s.starts_with('.')) {
            return Err(Rejection::Hidden);
        }
        if self.rules.iter().any(|rule| rule.matches(relative, &segments)) {
            return Err(Rejection::Ignored);
        }
        Ok(())
    }

    fn relative<'a>(&self, path: &'a Path) -> &'a Path {
        self.roots
            .iter()
            .find_map(|root| path.strip_prefix(root).ok())
            .unwrap_or(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    struct Fixture {
        tmp: TempDir,
        gate: DeltaGate,
        t0: Instant,
    }

    impl Fixture {
        fn new(config: GateConfig) -> Self {
            let tmp = TempDir::new().unwrap();
            let gate = DeltaGate::new(config).unwrap().with_roots([tmp.path()]);
            Self {
                tmp,
                gate,
                t0: Instant::now(),
            }
        }

        fn file(&self, rel: &str, size: usize) -> PathBuf {
            let path = self.tmp.path().join(rel);
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent).unwrap();
            }
            fs::write(&path, "x".repeat(size)).unwrap();
            path
        }

        fn at(&self, ms: u64) -> Instant {
            self.t0 + Duration::from_millis(ms)
        }
    }

    fn fast() -> GateConfig {
        GateConfig::default()
            .with_batch_timeout(Duration::from_millis(200))
            .with_min_change_interval(Duration::from_millis(100))
    }

    #[test]
    fn test_default_config() {
        let config = GateConfig::default();
        assert_eq!(config.min_change_interval, Duration::from_millis(500));
        assert_eq!(config.batch_timeout, Duration::from_secs(2));
        assert_eq!(config.min_file_size, 1);
        assert_eq!(config.max_file_size, 1024 * 1024);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_inverted_size_range() {
        let config = GateConfig::default().with_size_range(100, 10);
        assert!(matches!(config.validate(), Err(VigilError::ConfigValidation { .. })));
    }

    #[test]
    fn test_invalid_glob_fails_construction() {
        let config = GateConfig::default().with_ignore_patterns(["src/[broken"]);
        assert!(DeltaGate::new(config).is_err());
    }

    #[test]
    fn test_add_change_accepts_source_file() {
        let mut fx = Fixture::new(fast());
        let path = fx.file("main.py", 10);
        let t = fx.at(0);

        assert!(fx.gate.add_change_at(&path, ChangeKind::Created, t));
        assert_eq!(fx.gate.pending_count(), 1);
        assert_eq!(fx.gate.pending_change(&path).unwrap().kind, ChangeKind::Created);
    }

    #[test]
    fn test_same_path_keeps_latest_kind() {
        let mut fx = Fixture::new(fast());
        let path = fx.file("calc.py", 10);
        let t = fx.at(0);

        assert!(fx.gate.add_change_at(&path, ChangeKind::Created, t));
        let first_seen = fx.gate.pending_change(&path).unwrap().first_seen_at;
        assert!(fx.gate.add_change_at(&path, ChangeKind::Modified, fx.at(50)));
        assert!(fx.gate.add_change_at(&path, ChangeKind::Modified, fx.at(100)));

        assert_eq!(fx.gate.pending_count(), 1);
        let pending = fx.gate.pending_change(&path).unwrap();
        assert_eq!(pending.kind, ChangeKind::Modified);
        assert_eq!(pending.first_seen_at, first_seen);
        assert!(pending.last_seen_at >= first_seen);

        // Deletion wins too; the file no longer needs to exist
        fs::remove_file(&path).unwrap();
        assert!(fx.gate.add_change_at(&path, ChangeKind::Deleted, fx.at(150)));
        assert_eq!(fx.gate.pending_change(&path).unwrap().kind, ChangeKind::Deleted);
    }

    #[test]
    fn test_ignored_paths_never_batched() {
        let mut fx = Fixture::new(fast());
        let ignored = [
            fx.file("foo.pyc", 10),
            fx.file(".git/config", 10),
            fx.file("__pycache__/x.py", 10),
            fx.file(".hidden", 10),
            fx.file("pkg/.cache/mod.py", 10),
            fx.file("node_modules/lib/index.js", 10),
            fx.file("build.log", 10),
            fx.file("edit.swp", 10),
        ];

        for path in &ignored {
            assert!(!fx.gate.add_change_at(path, ChangeKind::Created, fx.at(0)), "{}", path.display());
            assert!(fx.gate.is_ignored(path));
        }
        assert_eq!(fx.gate.pending_count(), 0);
        assert!(!fx.gate.should_flush_at(fx.at(10_000)));
        assert!(fx.gate.drain_batch_at(fx.at(10_000)).is_empty());
    }

    #[test]
    fn test_defaults_apply_with_custom_patterns() {
        let mut fx = Fixture::new(fast().with_ignore_patterns(["generated"]));
        let pyc = fx.file("foo.pyc", 10);
        let generated = fx.file("generated/api.py", 10);
        let kept = fx.file("api.py", 10);

        assert!(!fx.gate.add_change_at(&pyc, ChangeKind::Created, fx.at(0)));
        assert!(!fx.gate.add_change_at(&generated, ChangeKind::Created, fx.at(0)));
        assert!(fx.gate.add_change_at(&kept, ChangeKind::Created, fx.at(0)));
    }

    #[test]
    fn test_glob_and_substring_patterns() {
        let config = fast().with_ignore_patterns(["build/**", "vendor/third_party", "*_pb2.py"]);
        let mut fx = Fixture::new(config);

        let build = fx.file("build/out/gen.js", 10);
        let nested_build = fx.file("web/build/bundle.js", 10);
        let vendored = fx.file("vendor/third_party/lib.c", 10);
        let proto = fx.file("api/msg_pb2.py", 10);
        let kept = fx.file("vendor/own/lib.c", 10);

        assert!(fx.gate.is_ignored(&build));
        assert!(fx.gate.is_ignored(&nested_build));
        assert!(fx.gate.is_ignored(&vendored));
        assert!(fx.gate.is_ignored(&proto));
        assert!(!fx.gate.is_ignored(&kept));
        assert!(fx.gate.add_change_at(&kept, ChangeKind::Created, fx.at(0)));
    }

    #[test]
    fn test_bare_pattern_matches_whole_segment_only() {
        let fx = Fixture::new(fast().with_ignore_patterns(["tmp"]));
        assert!(fx.gate.is_ignored(fx.tmp.path().join("tmp/a.py")));
        assert!(!fx.gate.is_ignored(fx.tmp.path().join("tmpl/a.py")));
        assert!(!fx.gate.is_ignored(fx.tmp.path().join("attempt.py")));
    }

    #[test]
    fn test_hidden_check_only_below_root() {
        let fx = Fixture::new(fast());
        // The tempdir itself lives under a hidden-looking name
        let inside = fx.tmp.path().join("src/app.py");
        assert!(!fx.gate.is_ignored(&inside));

        let outside = DeltaGate::new(fast()).unwrap();
        assert!(outside.is_ignored("/home/dev/.config/app.py"));
        assert!(!outside.is_ignored("/home/dev/project/app.py"));
    }

    #[cfg(unix)]
    #[test]
    fn test_non_utf8_hidden_segment_rejected() {
        use std::ffi::OsStr;
        use std::os::unix::ffi::OsStrExt;

        let fx = Fixture::new(fast());
        let hidden = fx.tmp.path().join(OsStr::from_bytes(b".cache\xff")).join("mod.py");
        let visible = fx.tmp.path().join(OsStr::from_bytes(b"pkg\xff")).join("mod.py");
        assert!(fx.gate.is_ignored(&hidden));
        assert!(!fx.gate.is_ignored(&visible));
    }

    #[test]
    fn test_size_window() {
        let mut fx = Fixture::new(fast().with_size_range(5, 20));
        let empty = fx.file("empty.py", 0);
        let small = fx.file("small.py", 4);
        let lower = fx.file("lower.py", 5);
        let upper = fx.file("upper.py", 20);
        let large = fx.file("large.py", 21);

        assert!(!fx.gate.add_change_at(&empty, ChangeKind::Created, fx.at(0)));
        assert!(!fx.gate.add_change_at(&small, ChangeKind::Modified, fx.at(0)));
        assert!(fx.gate.add_change_at(&lower, ChangeKind::Created, fx.at(0)));
        assert!(fx.gate.add_change_at(&upper, ChangeKind::Created, fx.at(0)));
        assert!(!fx.gate.add_change_at(&large, ChangeKind::Created, fx.at(0)));
        assert_eq!(fx.gate.pending_count(), 2);
    }

    #[test]
    fn test_missing_file_rejected_unless_deleted() {
        let mut fx = Fixture::new(fast());
        let ghost = fx.tmp.path().join("ghost.py");

        assert!(!fx.gate.add_change_at(&ghost, ChangeKind::Created, fx.at(0)));
        assert!(!fx.gate.add_change_at(&ghost, ChangeKind::Modified, fx.at(0)));
        assert!(fx.gate.add_change_at(&ghost, ChangeKind::Deleted, fx.at(0)));
    }

    #[test]
    fn test_directory_rejected() {
        let mut fx = Fixture::new(fast());
        let dir = fx.tmp.path().join("pkg.py");
        fs::create_dir(&dir).unwrap();
        assert!(!fx.gate.add_change_at(&dir, ChangeKind::Created, fx.at(0)));
    }

    #[test]
    fn test_should_flush_after_batch_timeout() {
        let mut fx = Fixture::new(fast());
        let path = fx.file("a.py", 10);

        assert!(!fx.gate.should_flush_at(fx.at(0)));
        fx.gate.add_change_at(&path, ChangeKind::Created, fx.at(0));

        assert!(!fx.gate.should_flush_at(fx.at(0)));
        assert!(!fx.gate.should_flush_at(fx.at(199)));
        assert!(fx.gate.should_flush_at(fx.at(200)));
        assert!(fx.gate.should_flush_at(fx.at(5_000)));
    }

    #[test]
    fn test_burst_lands_in_one_batch() {
        let mut fx = Fixture::new(fast());
        let paths: Vec<_> = (0..50).map(|i| fx.file(&format!("m{i:02}.py"), 10)).collect();

        for (i, path) in paths.iter().enumerate() {
            let t = fx.at(i as u64 * 3);
            fx.gate.add_change_at(path, ChangeKind::Modified, t);
        }
        // Timeout runs from the first change, not the last
        assert!(fx.gate.should_flush_at(fx.at(200)));

        let batch = fx.gate.drain_batch_at(fx.at(200));
        assert_eq!(batch.len(), 50);
        assert_eq!(batch.sequence, 1);
    }

    #[test]
    fn test_should_flush_false_after_drain_until_new_timeout() {
        let mut fx = Fixture::new(fast());
        let a = fx.file("a.py", 10);
        let b = fx.file("b.py", 10);

        fx.gate.add_change_at(&a, ChangeKind::Created, fx.at(0));
        let batch = fx.gate.drain_batch_at(fx.at(200));
        assert_eq!(batch.len(), 1);

        assert!(!fx.gate.should_flush_at(fx.at(200)));
        assert!(!fx.gate.should_flush_at(fx.at(10_000)));

        fx.gate.add_change_at(&b, ChangeKind::Created, fx.at(1_000));
        assert!(!fx.gate.should_flush_at(fx.at(1_199)));
        assert!(fx.gate.should_flush_at(fx.at(1_200)));
    }

    #[test]
    fn test_min_change_interval_rate_limits_drains() {
        let config = fast().with_min_change_interval(Duration::from_millis(1_000));
        let mut fx = Fixture::new(config);
        let a = fx.file("a.py", 10);

        fx.gate.add_change_at(&a, ChangeKind::Created, fx.at(0));
        fx.gate.drain_batch_at(fx.at(200));

        fx.gate.add_change_at(&a, ChangeKind::Modified, fx.at(300));
        // Batch timeout elapsed at 500 but the last drain was too recent
        assert!(!fx.gate.should_flush_at(fx.at(600)));
        assert!(!fx.gate.should_flush_at(fx.at(1_199)));
        assert!(fx.gate.should_flush_at(fx.at(1_200)));
    }

    #[test]
    fn test_drain_empty_gate_is_noop() {
        let mut fx = Fixture::new(fast());
        let a = fx.file("a.py", 10);

        let first = fx.gate.drain_batch_at(fx.at(0));
        let second = fx.gate.drain_batch_at(fx.at(1));
        assert!(first.is_empty());
        assert!(second.is_empty());

        // An empty drain must not start the rate-limit clock
        fx.gate.add_change_at(&a, ChangeKind::Created, fx.at(10));
        assert!(fx.gate.should_flush_at(fx.at(210)));
        assert_eq!(fx.gate.drain_batch_at(fx.at(210)).sequence, 1);
    }

    #[test]
    fn test_batch_sorted_by_path() {
        let mut fx = Fixture::new(fast());
        let c = fx.file("c.py", 10);
        let a = fx.file("a.py", 10);
        let b = fx.file("sub/b.py", 10);

        for path in [&c, &b, &a] {
            fx.gate.add_change_at(path, ChangeKind::Created, fx.at(0));
        }

        let batch = fx.gate.drain_batch_at(fx.at(200));
        let paths: Vec<_> = batch.paths().map(Path::to_path_buf).collect();
        assert_eq!(paths, vec![a, c, b]);
        assert_eq!(fx.gate.pending_count(), 0);
    }

    #[test]
    fn test_clear_resets_pending() {
        let mut fx = Fixture::new(fast());
        let a = fx.file("a.py", 10);

        fx.gate.add_change_at(&a, ChangeKind::Created, fx.at(0));
        fx.gate.clear();
        assert_eq!(fx.gate.pending_count(), 0);
        assert!(!fx.gate.should_flush_at(fx.at(10_000)));
    }

    #[test]
    fn test_add_event_uses_path_and_kind() {
        let mut fx = Fixture::new(fast());
        let a = fx.file("a.rs", 10);
        let event = ChangeEvent::new(&a, ChangeKind::Modified).with_size(10);

        assert!(fx.gate.add_event(&event));
        assert_eq!(fx.gate.pending_change(&a).unwrap().kind, ChangeKind::Modified);
    }

    #[test]
    fn test_scenario_pyc_filtered_from_burst() {
        let config = GateConfig::default()
            .with_batch_timeout(Duration::from_millis(200))
            .with_min_change_interval(Duration::ZERO);
        let mut fx = Fixture::new(config);
        let src = fx.tmp.path().join("proj/src");
        fs::create_dir_all(&src).unwrap();
        fx.gate.add_root(&src);

        let a = fx.file("proj/src/a.py", 10);
        let b = fx.file("proj/src/b.pyc", 10);
        fx.gate.add_change_at(&a, ChangeKind::Created, fx.at(0));
        fx.gate.add_change_at(&b, ChangeKind::Created, fx.at(50));

        assert!(fx.gate.should_flush_at(fx.at(250)));
        let batch = fx.gate.drain_batch_at(fx.at(250));
        assert_eq!(batch.len(), 1);
        assert!(batch.changes[0].path.ends_with("a.py"));
        assert_eq!(batch.changes[0].kind, ChangeKind::Created);
    }
}
