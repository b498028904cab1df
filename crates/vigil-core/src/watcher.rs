//! Recursive source-tree watching.
//!
//! A [`SourceWatcher`] observes one root directory through the platform's
//! native notification API (`notify`'s recommended backend) and invokes a
//! callback with a [`ChangeEvent`] for every file event whose extension is in
//! the allow-set. Directory events never reach the callback. The watcher does
//! no deduplication or batching; that is the gate's job.
//!
//! ## Example
//!
//! ```no_run
//! use std::sync::mpsc;
//! use vigil_core::watcher::{SourceWatcher, WatcherConfig};
//!
//! # fn main() -> vigil_core::Result<()> {
//! let (tx, rx) = mpsc::channel();
//! let mut watcher = SourceWatcher::new(WatcherConfig::new("src"));
//! watcher.start(move |event| {
//!     let _ = tx.send(event);
//! })?;
//!
//! if let Ok(event) = rx.recv() {
//!     println!("{} {}", event.kind, event.path.display());
//! }
//! watcher.stop();
//! # Ok(())
//! # }
//! ```

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};

use notify::event::{CreateKind, ModifyKind, RemoveKind, RenameMode};
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tracing::{debug, info, trace, warn};

use crate::error::{Result, VigilError};
use crate::types::{ChangeEvent, ChangeKind};

/// Extensions watched when none are configured.
pub const DEFAULT_EXTENSIONS: &[&str] = &[
    ".py", ".js", ".ts", ".jsx", ".tsx", ".go", ".rs", ".java", ".cpp", ".c", ".h",
];

/// Callback invoked from the watcher's notification thread.
pub type ChangeCallback = Box<dyn Fn(ChangeEvent) + Send + 'static>;

type CallbackSlot = Arc<Mutex<Option<ChangeCallback>>>;

/// Configuration for a single watch root.
#[derive(Debug, Clone)]
pub struct WatcherConfig {
    /// Directory observed recursively
    pub root: PathBuf,

    /// Lower-cased extensions including the leading dot
    pub extensions: HashSet<String>,
}

impl WatcherConfig {
    /// Create a config for `root` with the default extension allow-set.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            extensions: DEFAULT_EXTENSIONS.iter().map(|e| e.to_string()).collect(),
        }
    }

    /// Replace the extension allow-set. Entries are normalized to `.ext`.
    pub fn with_extensions<I, S>(mut self, extensions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.extensions = extensions
            .into_iter()
            .map(|e| normalize_extension(e.as_ref()))
            .filter(|e| e.len() > 1)
            .collect();
        self
    }

    /// Returns true if `path`'s extension is in the allow-set (case-insensitive).
    pub fn matches_extension(&self, path: &Path) -> bool {
        extension_allowed(&self.extensions, path)
    }
}

fn normalize_extension(ext: &str) -> String {
    let ext = ext.trim().to_ascii_lowercase();
    if ext.starts_with('.') { ext } else { format!(".{ext}") }
}

fn extension_allowed(extensions: &HashSet<String>, path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| extensions.contains(&format!(".{}", e.to_ascii_lowercase())))
        .unwrap_or(false)
}

/// Watches one root directory recursively and feeds a callback.
pub struct SourceWatcher {
    config: WatcherConfig,
    inner: Option<RecommendedWatcher>,
    callback: CallbackSlot,
}

impl SourceWatcher {
    /// Create a watcher. Nothing is observed until [`start`](Self::start).
    pub fn new(config: WatcherConfig) -> Self {
        Self {
            config,
            inner: None,
            callback: Arc::new(Mutex::new(None)),
        }
    }

    /// Root directory being watched.
    pub fn root(&self) -> &Path {
        &self.config.root
    }

    /// Begin observing in the background and return immediately.
    ///
    /// Fails with [`VigilError::WatchRootNotFound`] if the root does not exist.
    /// Calling `start` on a running watcher is a no-op.
    pub fn start<F>(&mut self, callback: F) -> Result<()>
    where
        F: Fn(ChangeEvent) + Send + 'static,
    {
        if self.inner.is_some() {
            warn!(root = %self.config.root.display(), "watcher already running");
            return Ok(());
        }

        let root = self.config.root.clone();
        if !root.exists() {
            return Err(VigilError::WatchRootNotFound { path: root });
        }
        if !root.is_dir() {
            return Err(VigilError::WatcherInit {
                path: root,
                message: "watch root is not a directory".into(),
            });
        }

        *lock_slot(&self.callback) = Some(Box::new(callback));

        let slot = Arc::clone(&self.callback);
        let extensions = self.config.extensions.clone();
        let handler_root = root.clone();

        let watcher = RecommendedWatcher::new(
            move |result: notify::Result<Event>| match result {
                Ok(event) => {
                    for change in translate_event(&event, &extensions) {
                        trace!(path = %change.path.display(), kind = %change.kind, "file event");
                        if let Some(callback) = lock_slot(&slot).as_ref() {
                            callback(change);
                        }
                    }
                }
                Err(e) => {
                    // A root removed mid-session lands here; keep running.
                    warn!(root = %handler_root.display(), "file watcher error: {}", e);
                }
            },
            notify::Config::default(),
        );

        let mut watcher = match watcher {
            Ok(watcher) => watcher,
            Err(e) => {
                lock_slot(&self.callback).take();
                return Err(VigilError::WatcherInit {
                    path: root,
                    message: e.to_string(),
                });
            }
        };

        if let Err(e) = watcher.watch(&root, RecursiveMode::Recursive) {
            lock_slot(&self.callback).take();
            return Err(VigilError::WatcherInit {
                path: root,
                message: e.to_string(),
            });
        }

        info!(root = %root.display(), "started watching");
        self.inner = Some(watcher);
        Ok(())
    }

    /// Stop observing. Idempotent.
    ///
    /// Once this returns the callback is never invoked again: clearing the
    /// callback slot waits for any in-flight invocation to finish.
    pub fn stop(&mut self) {
        lock_slot(&self.callback).take();
        if let Some(watcher) = self.inner.take() {
            drop(watcher);
            info!(root = %self.config.root.display(), "stopped watching");
        }
    }

    /// Returns true between a successful `start` and `stop`.
    pub fn is_alive(&self) -> bool {
        self.inner.is_some()
    }
}

impl Drop for SourceWatcher {
    fn drop(&mut self) {
        self.stop();
    }
}

fn lock_slot(slot: &CallbackSlot) -> MutexGuard<'_, Option<ChangeCallback>> {
    match slot.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

/// Map a raw notify event onto zero or more change events.
fn translate_event(event: &Event, extensions: &HashSet<String>) -> Vec<ChangeEvent> {
    let mut candidates: Vec<(&PathBuf, ChangeKind)> = Vec::new();

    match event.kind {
        EventKind::Create(CreateKind::Folder) | EventKind::Remove(RemoveKind::Folder) => {}
        EventKind::Create(_) => {
            candidates.extend(event.paths.iter().map(|p| (p, ChangeKind::Created)));
        }
        EventKind::Modify(ModifyKind::Name(mode)) => match mode {
            RenameMode::From => {
                candidates.extend(event.paths.iter().map(|p| (p, ChangeKind::Deleted)));
            }
            RenameMode::To => {
                candidates.extend(event.paths.iter().map(|p| (p, ChangeKind::Created)));
            }
            RenameMode::Both => {
                if let [from, to] = event.paths.as_slice() {
                    candidates.push((from, ChangeKind::Deleted));
                    candidates.push((to, ChangeKind::Created));
                }
            }
            _ => {
                for path in &event.paths {
                    let kind = if path.exists() {
                        ChangeKind::Created
                    } else {
                        ChangeKind::Deleted
                    };
                    candidates.push((path, kind));
                }
            }
        },
        EventKind::Modify(_) => {
            candidates.extend(event.paths.iter().map(|p| (p, ChangeKind::Modified)));
        }
        EventKind::Remove(_) => {
            candidates.extend(event.paths.iter().map(|p| (p, ChangeKind::Deleted)));
        }
        _ => {
            debug!("Ignoring event kind {:?}", event.kind);
        }
    }

    let mut changes = Vec::with_capacity(candidates.len());
    for (path, kind) in candidates {
        if !extension_allowed(extensions, path) {
            continue;
        }

        let mut change = ChangeEvent::new(path.clone(), kind);
        if kind.expects_file() {
            match std::fs::metadata(path) {
                Ok(meta) if meta.is_dir() => continue,
                Ok(meta) => change = change.with_size(meta.len()),
                // Gone again before we could stat it; the gate decides.
                Err(_) => {}
            }
        }
        changes.push(change);
    }
    changes
}
