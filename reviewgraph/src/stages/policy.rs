use std::fs;

use async_trait::async_trait;
use tracing::{debug, instrument};

use crate::config::ReviewConfig;
use crate::finding::{Finding, Severity};
use crate::stages::Stage;
use crate::state::{ReviewState, StateDelta};

/// Checks repository policy limits; currently the maximum file length.
pub struct PolicyStage {
    max_file_lines: usize,
}

impl PolicyStage {
    pub fn new(config: &ReviewConfig) -> Self {
        Self {
            max_file_lines: config.max_file_lines,
        }
    }
}

#[async_trait]
impl Stage for PolicyStage {
    #[instrument(skip(self, state), fields(files = state.target_files.len()))]
    async fn run(&self, state: &ReviewState) -> anyhow::Result<StateDelta> {
        let mut findings = vec![];

        for path in &state.target_files {
            let Ok(contents) = fs::read_to_string(path) else {
                continue;
            };
            let lines = contents.lines().count();
            if lines > self.max_file_lines {
                findings.push(Finding {
                    description: format!(
                        "file has {lines} lines, policy limit is {}",
                        self.max_file_lines
                    ),
                    recommendation: "split the file along module boundaries".to_string(),
                    ..Finding::new(
                        path.display().to_string(),
                        1,
                        Severity::Info,
                        "policy",
                        "File exceeds policy length",
                    )
                });
            }
        }

        debug!(findings = findings.len(), "policy verification complete");

        Ok(StateDelta {
            policy_findings: findings,
            current_stage: Some("policy_verification_complete".to_string()),
            ..Default::default()
        })
    }
}
