//! Session lifecycle tests for the built-in agents.
//!
//! Tool-backed agents are pointed at `echo` or small shell scripts standing in
//! for the real CLIs, so these only run on unix.

#![cfg(unix)]

use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::Utc;
use tempfile::TempDir;
use vigil_agent::{
    AgentConfig, AgentError, HistoryKind, InteractionEvent, InteractionLog, SessionState, create_agent_with_tool,
};
use vigil_core::{AgentRole, AgentTool, Batch, ChangeKind, ErrorReporter, PendingChange, Severity};

// ============================================================
// Helpers
// ============================================================

fn batch(sequence: u64, changes: &[(&Path, ChangeKind)]) -> Batch {
    let now = Utc::now();
    Batch {
        sequence,
        flushed_at: now,
        changes: changes
            .iter()
            .map(|(path, kind)| PendingChange {
                path: path.to_path_buf(),
                kind: *kind,
                first_seen_at: now,
                last_seen_at: now,
            })
            .collect(),
    }
}

fn script(dir: &Path, name: &str, body: &str) -> PathBuf {
    let path = dir.join(name);
    fs::write(&path, format!("#!/bin/sh\n{body}\n")).unwrap();
    fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).unwrap();
    path
}

fn config(tmp: &TempDir, role: AgentRole, tool: AgentTool) -> AgentConfig {
    let working_set = tmp.path().join("working_set");
    AgentConfig::new(format!("{role}-{tool}"), role, tool)
        .with_mission("Keep calc.py correct")
        .with_working_set(&working_set, working_set.join("error_report.jsonl"))
        .with_log_file(tmp.path().join("logs").join(format!("{role}.jsonl")))
        .with_timeout(Duration::from_secs(10))
}

// ============================================================
// Claude
// ============================================================

#[tokio::test]
async fn test_claude_session_sends_mission_then_batches() {
    let tmp = TempDir::new().unwrap();
    let source = tmp.path().join("calc.py");
    fs::write(&source, "def add(a, b):\n    return a + b\n").unwrap();

    let config = config(&tmp, AgentRole::Verifier, AgentTool::Claude).with_binary("echo");
    let mut agent = create_agent_with_tool(&config, AgentTool::Claude);

    agent.start_session().await.unwrap();
    assert_eq!(agent.state(), SessionState::Active);
    // Idempotent while active
    agent.start_session().await.unwrap();
    assert_eq!(agent.history().len(), 1);

    let mission = &agent.history()[0];
    assert_eq!(mission.kind, HistoryKind::Mission);
    assert!(mission.response.starts_with("--print --dangerously-skip-permissions You are a verifier agent"));

    let response = agent
        .process_batch(&batch(1, &[(&source, ChangeKind::Created)]))
        .await
        .unwrap();
    assert!(response.success);
    assert!(response.text.contains("MISSION REMINDER: Keep calc.py correct"));
    assert!(response.text.contains("Content preview: def add(a, b):"));

    let last = agent.history().last().unwrap();
    assert_eq!(last.kind, HistoryKind::Batch);
    assert_eq!(last.sequence, Some(1));

    let entries = InteractionLog::new(config.log_file.clone().unwrap()).entries().await.unwrap();
    assert_eq!(entries.len(), 3);
    assert_eq!(entries[0].event, InteractionEvent::SessionStart);
    assert!(entries[1..].iter().all(|e| e.success == Some(true)));
}

#[tokio::test]
async fn test_claude_process_autostarts_session() {
    let tmp = TempDir::new().unwrap();
    let config = config(&tmp, AgentRole::Documentation, AgentTool::Claude).with_binary("echo");
    let mut agent = create_agent_with_tool(&config, AgentTool::Claude);

    let gone = tmp.path().join("gone.py");
    agent.process_batch(&batch(1, &[(&gone, ChangeKind::Deleted)])).await.unwrap();

    assert_eq!(agent.state(), SessionState::Active);
    let kinds: Vec<_> = agent.history().iter().map(|h| h.kind).collect();
    assert_eq!(kinds, vec![HistoryKind::Mission, HistoryKind::Batch]);
}

#[tokio::test]
async fn test_claude_failure_leaves_session_uninitialized() {
    let tmp = TempDir::new().unwrap();
    let failing = script(tmp.path(), "claude", "echo 'not logged in' >&2\nexit 1");
    let config = config(&tmp, AgentRole::Verifier, AgentTool::Claude).with_binary(&failing);
    let mut agent = create_agent_with_tool(&config, AgentTool::Claude);

    let err = agent.start_session().await.unwrap_err();
    assert!(matches!(err, AgentError::NonZeroExit { code: Some(1), .. }));
    assert_eq!(agent.state(), SessionState::Uninitialized);
    assert!(agent.history().is_empty());

    let entries = InteractionLog::new(config.log_file.clone().unwrap()).entries().await.unwrap();
    let failed = entries.last().unwrap();
    assert_eq!(failed.success, Some(false));
    assert!(failed.error.as_deref().unwrap().contains("not logged in"));
}

#[tokio::test]
async fn test_claude_timeout() {
    let tmp = TempDir::new().unwrap();
    let slow = script(tmp.path(), "claude", "sleep 10");
    let config = config(&tmp, AgentRole::Verifier, AgentTool::Claude)
        .with_binary(&slow)
        .with_timeout(Duration::from_millis(200));
    let mut agent = create_agent_with_tool(&config, AgentTool::Claude);

    let err = agent.start_session().await.unwrap_err();
    assert!(err.is_timeout());
}

#[tokio::test]
async fn test_stopped_session_refuses_work() {
    let tmp = TempDir::new().unwrap();
    let config = config(&tmp, AgentRole::Verifier, AgentTool::Claude).with_binary("echo");
    let mut agent = create_agent_with_tool(&config, AgentTool::Claude);

    agent.start_session().await.unwrap();
    agent.stop_session().await.unwrap();
    agent.stop_session().await.unwrap();
    assert_eq!(agent.state(), SessionState::Stopped);

    let err = agent.process_batch(&batch(1, &[])).await.unwrap_err();
    assert!(matches!(err, AgentError::SessionStopped { .. }));
    assert!(matches!(agent.start_session().await, Err(AgentError::SessionStopped { .. })));
}

// ============================================================
// Goose
// ============================================================

const FAKE_GOOSE: &str = r#"if [ "$1" = "--version" ]; then
  echo "goose 1.0.0"
  exit 0
fi
printf '%s\n' "$@""#;

#[tokio::test]
async fn test_goose_passes_existing_files() {
    let tmp = TempDir::new().unwrap();
    let goose = script(tmp.path(), "goose", FAKE_GOOSE);
    let kept = tmp.path().join("api.py");
    fs::write(&kept, "def get():\n    pass\n").unwrap();
    let deleted = tmp.path().join("old.py");

    let config = config(&tmp, AgentRole::Verifier, AgentTool::Goose).with_binary(&goose);
    let mut agent = create_agent_with_tool(&config, AgentTool::Goose);

    agent.start_session().await.unwrap();
    assert_eq!(agent.history()[0].response, "goose 1.0.0");

    let response = agent
        .process_batch(&batch(4, &[(&kept, ChangeKind::Modified), (&deleted, ChangeKind::Deleted)]))
        .await
        .unwrap();

    let args: Vec<&str> = response.text.lines().collect();
    assert_eq!(args[0], "run");
    assert_eq!(args[1], "--file");
    assert_eq!(args[2], kept.display().to_string());
    assert_eq!(args.iter().filter(|a| **a == "--file").count(), 1);
    assert!(response.text.contains("You are a verifier agent"));
    assert!(response.text.contains(&format!("- deleted: {}", deleted.display())));
}

#[tokio::test]
async fn test_goose_missing_binary() {
    let tmp = TempDir::new().unwrap();
    let config = config(&tmp, AgentRole::Verifier, AgentTool::Goose).with_binary(tmp.path().join("no-goose"));
    let mut agent = create_agent_with_tool(&config, AgentTool::Goose);

    assert!(matches!(agent.start_session().await, Err(AgentError::NotInstalled { .. })));
    assert_eq!(agent.state(), SessionState::Uninitialized);
}

#[tokio::test]
async fn test_goose_failed_version_check() {
    let tmp = TempDir::new().unwrap();
    let broken = script(tmp.path(), "goose", "exit 2");
    let config = config(&tmp, AgentRole::Verifier, AgentTool::Goose).with_binary(&broken);
    let mut agent = create_agent_with_tool(&config, AgentTool::Goose);

    let err = agent.start_session().await.unwrap_err();
    assert!(err.to_string().contains("version check failed"));
}

// ============================================================
// Mock
// ============================================================

#[tokio::test]
async fn test_mock_verifier_writes_tests_and_findings() {
    let tmp = TempDir::new().unwrap();
    let created = tmp.path().join("fresh.py");
    let modified = tmp.path().join("calc.py");
    fs::write(&created, "# TODO not scanned on create\n").unwrap();
    fs::write(&modified, "def div(a, b):\n    # FIXME zero\n    print('debug', b)\n    return a / b\n").unwrap();

    let config = config(&tmp, AgentRole::Verifier, AgentTool::Mock);
    let mut agent = create_agent_with_tool(&config, AgentTool::Mock);

    let response = agent
        .process_batch(&batch(1, &[(&created, ChangeKind::Created), (&modified, ChangeKind::Modified)]))
        .await
        .unwrap();
    assert!(response.text.contains("2 stubs generated, 2 findings reported"));

    let tests_dir = config.working_set_dir.join("tests");
    assert!(tests_dir.join("test_fresh_created.py").exists());
    assert!(tests_dir.join("test_calc_modified.py").exists());

    let reports = ErrorReporter::new(&config.error_report_file).pending_reports().unwrap();
    assert_eq!(reports.len(), 2);
    assert!(reports.iter().all(|r| r.file.ends_with("calc.py")));
    assert_eq!(reports[0].severity, Severity::Low);
    assert_eq!(reports[0].line, Some(2));
    assert_eq!(reports[1].severity, Severity::Medium);
    assert_eq!(reports[1].line, Some(3));
}

#[tokio::test]
async fn test_mock_documentation_writes_pages() {
    let tmp = TempDir::new().unwrap();
    let source = tmp.path().join("router.rs");
    fs::write(&source, "pub fn route() {}\n// TODO ignored for docs\n").unwrap();

    let config = config(&tmp, AgentRole::Documentation, AgentTool::Mock);
    let mut agent = create_agent_with_tool(&config, AgentTool::Mock);
    agent.process_batch(&batch(1, &[(&source, ChangeKind::Modified)])).await.unwrap();

    let page = config.working_set_dir.join("artifacts").join("docs").join("router.md");
    assert!(fs::read_to_string(page).unwrap().starts_with("# router"));
    assert!(!config.error_report_file.exists());
}
