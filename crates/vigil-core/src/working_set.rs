//! Scratch directory shared with agents.
//!
//! Layout:
//!
//! ```text
//! <root>/
//!   tests/          generated tests (test_*.py, test_*.rs, ...)
//!   artifacts/      anything else agents produce
//!   reports/        agent-written reports
//!   metadata.json   free-form key/value bookkeeping
//! ```

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use serde_json::{Map, Value};
use tracing::{debug, info};

use crate::error::{Result, VigilError};

const SUBDIRS: &[&str] = &["tests", "artifacts", "reports"];
const METADATA_FILE: &str = "metadata.json";

#[derive(Debug, Clone)]
pub struct WorkingSet {
    root: PathBuf,
}

impl WorkingSet {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn tests_dir(&self) -> PathBuf {
        self.root.join("tests")
    }

    pub fn artifacts_dir(&self) -> PathBuf {
        self.root.join("artifacts")
    }

    pub fn reports_dir(&self) -> PathBuf {
        self.root.join("reports")
    }

    pub fn metadata_path(&self) -> PathBuf {
        self.root.join(METADATA_FILE)
    }

    /// Create the root and its subdirectories if missing.
    pub fn ensure_layout(&self) -> Result<()> {
        for dir in std::iter::once(self.root.clone()).chain(SUBDIRS.iter().map(|d| self.root.join(d))) {
            fs::create_dir_all(&dir).map_err(|e| VigilError::DirectoryCreation { path: dir.clone(), source: e })?;
        }
        debug!(root = %self.root.display(), "working set layout ready");
        Ok(())
    }

    /// Write a file into `tests/`. Only the final component of `name` is used.
    pub fn write_test_file(&self, name: &str, content: &str) -> Result<PathBuf> {
        self.ensure_layout()?;
        let file_name = Path::new(name)
            .file_name()
            .ok_or_else(|| VigilError::internal(format!("invalid test file name '{name}'")))?;
        let path = self.tests_dir().join(file_name);
        fs::write(&path, content).map_err(|e| VigilError::io("writing test file", &path, e))?;
        Ok(path)
    }

    /// Files in `tests/` whose name starts with `test_`, sorted.
    pub fn list_test_files(&self) -> Result<Vec<PathBuf>> {
        let dir = self.tests_dir();
        let entries = match fs::read_dir(&dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(VigilError::io("listing test files", &dir, e)),
        };

        let mut files = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| VigilError::io("listing test files", &dir, e))?;
            let path = entry.path();
            let is_test = path
                .file_name()
                .and_then(|n| n.to_str())
                .is_some_and(|n| n.starts_with("test_"));
            if is_test && path.is_file() {
                files.push(path);
            }
        }
        files.sort();
        Ok(files)
    }

    /// Remove a file from `tests/`. Returns false if it did not exist.
    pub fn remove_test_file(&self, name: &str) -> Result<bool> {
        let Some(file_name) = Path::new(name).file_name() else {
            return Ok(false);
        };
        let path = self.tests_dir().join(file_name);
        match fs::remove_file(&path) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(VigilError::io("removing test file", &path, e)),
        }
    }

    /// Delete everything and recreate the empty layout.
    pub fn clean(&self) -> Result<()> {
        match fs::remove_dir_all(&self.root) {
            Ok(()) => {}
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => return Err(VigilError::io("cleaning working set", &self.root, e)),
        }
        info!(root = %self.root.display(), "working set cleaned");
        self.ensure_layout()
    }

    /// Number of regular files anywhere under the root.
    pub fn file_count(&self) -> Result<usize> {
        count_files(&self.root)
    }

    pub fn write_metadata(&self, metadata: &Map<String, Value>) -> Result<()> {
        self.ensure_layout()?;
        let path = self.metadata_path();
        let json = serde_json::to_string_pretty(metadata).map_err(|e| VigilError::json("encoding metadata", e))?;
        fs::write(&path, json).map_err(|e| VigilError::io("writing metadata", &path, e))
    }

    /// Stored metadata, or an empty map if none has been written.
    pub fn read_metadata(&self) -> Result<Map<String, Value>> {
        let path = self.metadata_path();
        let content = match fs::read_to_string(&path) {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Map::new()),
            Err(e) => return Err(VigilError::io("reading metadata", &path, e)),
        };
        serde_json::from_str(&content).map_err(|e| VigilError::json(path.display().to_string(), e))
    }

    /// Set one metadata key, keeping the others.
    pub fn set_metadata(&self, key: impl Into<String>, value: Value) -> Result<()> {
        let mut metadata = self.read_metadata()?;
        metadata.insert(key.into(), value);
        self.write_metadata(&metadata)
    }
}

fn count_files(dir: &Path) -> Result<usize> {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(0),
        Err(e) => return Err(VigilError::io("counting files", dir, e)),
    };

    let mut count = 0;
    for entry in entries {
        let entry = entry.map_err(|e| VigilError::io("counting files", dir, e))?;
        let file_type = entry.file_type().map_err(|e| VigilError::io("counting files", entry.path(), e))?;
        if file_type.is_dir() {
            count += count_files(&entry.path())?;
        } else if file_type.is_file() {
            count += 1;
        }
    }
    Ok(count)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    fn working_set(tmp: &TempDir) -> WorkingSet {
        WorkingSet::new(tmp.path().join("working_set"))
    }

    #[test]
    fn test_ensure_layout_creates_subdirs() {
        let tmp = TempDir::new().unwrap();
        let ws = working_set(&tmp);
        ws.ensure_layout().unwrap();
        ws.ensure_layout().unwrap();

        assert!(ws.tests_dir().is_dir());
        assert!(ws.artifacts_dir().is_dir());
        assert!(ws.reports_dir().is_dir());
        assert_eq!(ws.file_count().unwrap(), 0);
    }

    #[test]
    fn test_write_and_list_test_files() {
        let tmp = TempDir::new().unwrap();
        let ws = working_set(&tmp);

        ws.write_test_file("test_calc.py", "def test_add(): pass\n").unwrap();
        ws.write_test_file("test_api.py", "def test_get(): pass\n").unwrap();
        ws.write_test_file("conftest.py", "").unwrap();
        // Directory parts are dropped
        let nested = ws.write_test_file("../../escape/test_x.py", "").unwrap();
        assert_eq!(nested.parent().unwrap(), ws.tests_dir());

        let names: Vec<_> = ws
            .list_test_files()
            .unwrap()
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["test_api.py", "test_calc.py", "test_x.py"]);
        assert_eq!(ws.file_count().unwrap(), 4);
    }

    #[test]
    fn test_remove_test_file() {
        let tmp = TempDir::new().unwrap();
        let ws = working_set(&tmp);
        ws.write_test_file("test_a.py", "").unwrap();

        assert!(ws.remove_test_file("test_a.py").unwrap());
        assert!(!ws.remove_test_file("test_a.py").unwrap());
        assert!(ws.list_test_files().unwrap().is_empty());
    }

    #[test]
    fn test_clean_recreates_layout() {
        let tmp = TempDir::new().unwrap();
        let ws = working_set(&tmp);
        ws.write_test_file("test_a.py", "").unwrap();
        fs::write(ws.artifacts_dir().join("out.txt"), "x").unwrap();

        ws.clean().unwrap();
        assert_eq!(ws.file_count().unwrap(), 0);
        assert!(ws.tests_dir().is_dir());
    }

    #[test]
    fn test_metadata_round_trip() {
        let tmp = TempDir::new().unwrap();
        let ws = working_set(&tmp);
        assert!(ws.read_metadata().unwrap().is_empty());

        ws.set_metadata("last_batch", json!(3)).unwrap();
        ws.set_metadata("mission", json!("keep tests green")).unwrap();

        let metadata = ws.read_metadata().unwrap();
        assert_eq!(metadata["last_batch"], json!(3));
        assert_eq!(metadata["mission"], json!("keep tests green"));
        assert!(ws.metadata_path().starts_with(ws.root()));
    }
}
