//! Prompt construction for tool-backed agents.
//!
//! A session opens with a role-specific mission prompt. Every batch after
//! that is sent as a short mission reminder followed by the list of changes,
//! with a content preview for files that still exist.

use std::path::{Path, PathBuf};

use vigil_core::{AgentRole, Batch, ChangeKind};

/// Characters of file content included per change.
pub const PREVIEW_CHARS: usize = 200;

/// Values substituted into prompts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptContext {
    pub mission: String,
    pub working_set_dir: PathBuf,
    pub error_report_file: PathBuf,
}

impl PromptContext {
    /// Where documentation agents write their output.
    pub fn docs_dir(&self) -> PathBuf {
        self.working_set_dir.join("artifacts").join("docs")
    }
}

/// One change as presented to an agent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangePreview {
    pub path: PathBuf,
    pub kind: ChangeKind,
    pub preview: Option<String>,
}

pub fn mission_prompt(role: AgentRole, ctx: &PromptContext) -> String {
    match role {
        AgentRole::Verifier => format!(
            "You are a verifier agent running in background mode. Your mission is: {mission}

IMPORTANT INSTRUCTIONS:
- You are monitoring source code changes and automatically generating tests
- Write tests in the working set directory: {working_set}
- Run tests automatically after generating them
- If you find actual bugs (not just test issues), report them to: {report_file}
- Keep your session active and process file changes as they come
- Re-read your mission whenever new changes arrive

ERROR REPORT FORMAT:
Append one JSON object per line to the report file:
{{\"timestamp\": \"ISO_TIMESTAMP\", \"file\": \"path/to/file\", \"line\": 123, \"severity\": \"high|medium|low\", \"description\": \"Bug description\", \"suggested_fix\": \"Optional fix suggestion\"}}

CURRENT MISSION: {mission}",
            mission = ctx.mission,
            working_set = ctx.working_set_dir.display(),
            report_file = ctx.error_report_file.display(),
        ),
        AgentRole::Documentation => format!(
            "You are a documentation agent running in background mode. Your mission is to generate and update documentation for code changes.

IMPORTANT INSTRUCTIONS:
- You are monitoring source code changes and automatically generating documentation
- Write documentation files in: {docs}
- Cover API documentation for new functions and types, usage examples, and explanations of non-obvious logic
- Keep documentation in sync with the code as it changes
- Re-read your mission whenever new changes arrive

DOCUMENTATION STANDARDS:
- Use markdown for all documentation
- Document parameters, return values and error conditions
- Include code examples where they help

CURRENT MISSION: {mission}",
            docs = ctx.docs_dir().display(),
            mission = ctx.mission,
        ),
    }
}

pub fn mission_reminder(ctx: &PromptContext) -> String {
    format!("MISSION REMINDER: {}", ctx.mission)
}

/// Render the change list and role-specific instructions.
pub fn delta_prompt(role: AgentRole, changes: &[ChangePreview]) -> String {
    let mut lines = Vec::with_capacity(changes.len() * 2);
    for change in changes {
        lines.push(format!("- {}: {}", change.kind, change.path.display()));
        if let Some(preview) = &change.preview {
            lines.push(format!("  Content preview: {preview}..."));
        }
    }

    let instructions = match role {
        AgentRole::Verifier => {
            "Please analyze these changes and:
1. Generate appropriate tests for the changes
2. Run the tests to verify they work
3. If you find bugs, report them to the error report file
4. Continue monitoring for more changes"
        }
        AgentRole::Documentation => {
            "Please analyze these changes and:
1. Generate or update documentation for the changes
2. Include API documentation, usage examples, and explanations
3. Write documentation files to the docs directory
4. Continue monitoring for more changes"
        }
    };

    format!("FILE CHANGES DETECTED:\n{}\n\n{}", lines.join("\n"), instructions)
}

/// Full prompt for one batch: mission reminder, then the change list.
pub fn render_batch_prompt(role: AgentRole, ctx: &PromptContext, changes: &[ChangePreview]) -> String {
    format!("{}\n\n{}", mission_reminder(ctx), delta_prompt(role, changes))
}

/// Read previews for every change in `batch` and render the batch prompt.
pub async fn batch_prompt(role: AgentRole, ctx: &PromptContext, batch: &Batch) -> String {
    let changes = previews(batch).await;
    render_batch_prompt(role, ctx, &changes)
}

/// Previews for created and modified files. Deleted or unreadable files get none.
pub async fn previews(batch: &Batch) -> Vec<ChangePreview> {
    let mut changes = Vec::with_capacity(batch.len());
    for change in batch {
        let preview = if change.kind.expects_file() {
            read_preview(&change.path).await
        } else {
            None
        };
        changes.push(ChangePreview {
            path: change.path.clone(),
            kind: change.kind,
            preview,
        });
    }
    changes
}

async fn read_preview(path: &Path) -> Option<String> {
    match tokio::fs::read_to_string(path).await {
        Ok(content) => Some(content.chars().take(PREVIEW_CHARS).collect()),
        Err(e) => Some(format!("<unreadable: {e}>")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use vigil_core::PendingChange;

    fn ctx() -> PromptContext {
        PromptContext {
            mission: "Keep calc.py correct".into(),
            working_set_dir: "tests/working_set".into(),
            error_report_file: "tests/working_set/error_report.jsonl".into(),
        }
    }

    #[test]
    fn test_verifier_mission_mentions_paths() {
        let prompt = mission_prompt(AgentRole::Verifier, &ctx());
        assert!(prompt.starts_with("You are a verifier agent"));
        assert!(prompt.contains("tests/working_set/error_report.jsonl"));
        assert!(prompt.contains("\"severity\": \"high|medium|low\""));
        assert!(prompt.ends_with("CURRENT MISSION: Keep calc.py correct"));
    }

    #[test]
    fn test_documentation_mission_uses_docs_dir() {
        let prompt = mission_prompt(AgentRole::Documentation, &ctx());
        assert!(prompt.contains("tests/working_set/artifacts/docs"));
        assert!(!prompt.contains("error_report.jsonl"));
    }

    #[test]
    fn test_batch_prompt_layout() {
        let changes = vec![
            ChangePreview {
                path: "src/a.py".into(),
                kind: ChangeKind::Created,
                preview: Some("def add(a, b):".into()),
            },
            ChangePreview {
                path: "src/old.py".into(),
                kind: ChangeKind::Deleted,
                preview: None,
            },
        ];
        let prompt = render_batch_prompt(AgentRole::Verifier, &ctx(), &changes);

        assert!(prompt.starts_with("MISSION REMINDER: Keep calc.py correct\n\nFILE CHANGES DETECTED:\n"));
        assert!(prompt.contains("- created: src/a.py\n  Content preview: def add(a, b):..."));
        assert!(prompt.contains("- deleted: src/old.py\n\n"));
        assert!(prompt.contains("1. Generate appropriate tests"));
    }

    #[tokio::test]
    async fn test_previews_truncate_and_skip_deleted() {
        let tmp = tempfile::TempDir::new().unwrap();
        let long = tmp.path().join("long.py");
        std::fs::write(&long, "é".repeat(500)).unwrap();

        let now = Utc::now();
        let batch = Batch {
            sequence: 1,
            flushed_at: now,
            changes: vec![
                PendingChange {
                    path: long.clone(),
                    kind: ChangeKind::Modified,
                    first_seen_at: now,
                    last_seen_at: now,
                },
                PendingChange {
                    path: tmp.path().join("gone.py"),
                    kind: ChangeKind::Deleted,
                    first_seen_at: now,
                    last_seen_at: now,
                },
            ],
        };

        let previews = previews(&batch).await;
        assert_eq!(previews[0].preview.as_ref().unwrap().chars().count(), PREVIEW_CHARS);
        assert_eq!(previews[1].preview, None);
    }
}
