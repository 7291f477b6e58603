use std::fs;

use async_trait::async_trait;
use tracing::{debug, instrument};

use crate::finding::{Finding, Severity};
use crate::stages::Stage;
use crate::state::{ReviewState, StateDelta};

/// Code-smell heuristics: stale work markers and deeply indented blocks.
pub struct PatternAnalysisStage;

const MARKERS: &[&str] = &["TODO", "FIXME", "XXX", "HACK"];
const MAX_INDENT_LEVELS: usize = 6;

#[async_trait]
impl Stage for PatternAnalysisStage {
    #[instrument(skip(self, state), fields(files = state.target_files.len()))]
    async fn run(&self, state: &ReviewState) -> anyhow::Result<StateDelta> {
        let mut findings = vec![];

        for path in &state.target_files {
            let file = path.display().to_string();
            let Ok(contents) = fs::read_to_string(path) else {
                // static analysis already reports unreadable files
                continue;
            };

            for (idx, line) in contents.lines().enumerate() {
                let lineno = idx + 1;
                if let Some(marker) = MARKERS.iter().find(|m| line.contains(*m)) {
                    findings.push(Finding {
                        description: format!("stale `{marker}` marker left in code"),
                        recommendation: "resolve the marker or track it in the issue tracker"
                            .to_string(),
                        auto_fixable: true,
                        ..Finding::new(&file, lineno, Severity::Low, "pattern", "Work marker")
                    });
                }

                let indent = line.chars().take_while(|c| *c == ' ').count() / 4
                    + line.chars().take_while(|c| *c == '\t').count();
                if indent > MAX_INDENT_LEVELS && !line.trim().is_empty() {
                    findings.push(Finding {
                        description: format!("block nested {indent} levels deep"),
                        recommendation: "extract a function to flatten the nesting".to_string(),
                        ..Finding::new(&file, lineno, Severity::Medium, "pattern", "Deep nesting")
                    });
                }
            }
        }

        debug!(findings = findings.len(), "pattern analysis complete");

        Ok(StateDelta {
            pattern_findings: findings,
            current_stage: Some("pattern_analysis_complete".to_string()),
            ..Default::default()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn flags_work_markers_as_auto_fixable() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("util.py");
        std::fs::write(&path, "# TODO clean this up\nx = 1\n").unwrap();

        let state = ReviewState {
            target_files: vec![path],
            ..Default::default()
        };
        let delta = PatternAnalysisStage.run(&state).await.unwrap();

        assert_eq!(delta.pattern_findings.len(), 1);
        assert_eq!(delta.pattern_findings[0].title, "Work marker");
        assert!(delta.pattern_findings[0].auto_fixable);
        assert_eq!(delta.pattern_findings[0].line, 1);
    }

    #[tokio::test]
    async fn flags_deep_nesting() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("deep.rs");
        let line = format!("{}call();\n", " ".repeat(4 * 7));
        std::fs::write(&path, line).unwrap();

        let state = ReviewState {
            target_files: vec![path],
            ..Default::default()
        };
        let delta = PatternAnalysisStage.run(&state).await.unwrap();

        assert_eq!(delta.pattern_findings.len(), 1);
        assert_eq!(delta.pattern_findings[0].title, "Deep nesting");
        assert_eq!(delta.pattern_findings[0].severity, Severity::Medium);
    }
}
