//! Loading and saving configuration files on disk.

use std::fs;
use std::path::PathBuf;

use tempfile::TempDir;
use vigil_config::{AgentEntry, VigilConfig};
use vigil_core::{AgentRole, AgentTool, VigilError};

#[test]
fn test_save_then_load_yaml() {
    let tmp = TempDir::new().unwrap();
    let path = tmp.path().join("nested").join("vigil.yaml");

    let mut config = VigilConfig::default();
    config.mission = "Keep the tokenizer honest".into();
    config.gate.ignore_patterns = vec!["generated".into()];
    let mut agent = AgentEntry::new("claude-docs", AgentRole::Documentation, AgentTool::Claude);
    agent.extra_args = vec!["--model".into(), "sonnet".into()];
    config.agents.push(agent);

    config.save(&path).unwrap();
    let text = fs::read_to_string(&path).unwrap();
    assert!(text.contains("mission: Keep the tokenizer honest"));
    assert!(text.contains("tool: claude"));
    // Unset optionals stay out of the file
    assert!(!text.contains("log_dir"));

    assert_eq!(VigilConfig::load(&path).unwrap(), config);
}

#[test]
fn test_save_then_load_json() {
    let tmp = TempDir::new().unwrap();
    let path = tmp.path().join("vigil.json");

    let mut config = VigilConfig::default();
    config.log_dir = Some(PathBuf::from("/tmp/vigil-logs"));
    config.save(&path).unwrap();

    let value: serde_json::Value = serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
    assert_eq!(value["gate"]["batch_timeout_ms"], 2000);
    assert_eq!(value["agents"][0]["role"], "verifier");

    assert_eq!(VigilConfig::load(&path).unwrap(), config);
}

#[test]
fn test_load_missing_file() {
    let tmp = TempDir::new().unwrap();
    let path = tmp.path().join("vigil.yaml");

    let err = VigilConfig::load(&path).unwrap_err();
    assert!(matches!(err, VigilError::ConfigNotFound { .. }));
    assert!(err.is_config_error());

    assert_eq!(VigilConfig::load_or_default(&path).unwrap(), VigilConfig::default());
}

#[test]
fn test_load_malformed_yaml() {
    let tmp = TempDir::new().unwrap();
    let path = tmp.path().join("vigil.yml");
    fs::write(&path, "watch_dirs: [src\nagents: {").unwrap();

    let err = VigilConfig::load(&path).unwrap_err();
    match err {
        VigilError::ConfigInvalid { path: reported, .. } => assert_eq!(reported, path),
        other => panic!("expected ConfigInvalid, got {other:?}"),
    }
}

#[test]
fn test_load_runs_validation() {
    let tmp = TempDir::new().unwrap();
    let path = tmp.path().join("vigil.yaml");
    fs::write(&path, "agents: []\n").unwrap();

    assert!(matches!(
        VigilConfig::load(&path),
        Err(VigilError::ConfigValidation { .. })
    ));
    assert!(VigilConfig::load_or_default(&path).is_err());
}

#[test]
fn test_unsupported_extension() {
    let tmp = TempDir::new().unwrap();
    let path = tmp.path().join("vigil.toml");
    fs::write(&path, "watch_dirs = ['src']\n").unwrap();

    assert!(matches!(VigilConfig::load(&path), Err(VigilError::ConfigInvalid { .. })));
    assert!(matches!(
        VigilConfig::default().save(&path),
        Err(VigilError::ConfigInvalid { .. })
    ));
}
