use std::fs;
use std::path::Path;

use async_trait::async_trait;
use tracing::{debug, instrument};

use crate::finding::{Finding, Severity};
use crate::stages::Stage;
use crate::state::{ReviewState, StateDelta};

/// Flags a review where no test files could be found among the targets.
pub struct TestingStage;

fn is_test_file(path: &Path) -> bool {
    let name = path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or_default();
    if name.starts_with("test_") || name.contains(".test.") || name.contains("_test.") {
        return true;
    }
    if path.components().any(|c| c.as_os_str() == "tests") {
        return true;
    }
    // Rust convention: unit tests live next to the code
    if path.extension().is_some_and(|e| e == "rs") {
        if let Ok(contents) = fs::read_to_string(path) {
            return contents.contains("#[cfg(test)]") || contents.contains("#[test]");
        }
    }
    false
}

#[async_trait]
impl Stage for TestingStage {
    #[instrument(skip(self, state), fields(files = state.target_files.len()))]
    async fn run(&self, state: &ReviewState) -> anyhow::Result<StateDelta> {
        let test_files = state.target_files.iter().filter(|p| is_test_file(p)).count();
        debug!(test_files, "testing assessment complete");

        let mut findings = vec![];
        if test_files == 0 && !state.target_files.is_empty() {
            findings.push(Finding {
                description: format!(
                    "none of the {} analyzed files contain or constitute tests",
                    state.target_files.len()
                ),
                impact: "regressions in reviewed code will go unnoticed".to_string(),
                recommendation: "add a test suite covering the main code paths".to_string(),
                ..Finding::new(
                    state.repository_path.display().to_string(),
                    1,
                    Severity::Medium,
                    "testing",
                    "No tests detected",
                )
            });
        }

        Ok(StateDelta {
            testing_findings: findings,
            messages: vec![format!("testing assessment: {test_files} test file(s) found")],
            current_stage: Some("testing_assessment_complete".to_string()),
            ..Default::default()
        })
    }
}
