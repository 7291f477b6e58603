use std::fs;

use async_trait::async_trait;
use tracing::{debug, instrument};

use crate::config::ReviewConfig;
use crate::finding::{Finding, Severity};
use crate::stages::Stage;
use crate::state::{ReviewState, StageError, StateDelta};

/// Line-based lint over the target files: overlong lines and trailing
/// whitespace. Unreadable files are recorded as stage errors without
/// aborting the pass.
pub struct StaticAnalysisStage {
    max_line_length: usize,
}

impl StaticAnalysisStage {
    pub fn new(config: &ReviewConfig) -> Self {
        Self {
            max_line_length: config.max_line_length,
        }
    }
}

#[async_trait]
impl Stage for StaticAnalysisStage {
    #[instrument(skip(self, state), fields(files = state.target_files.len()))]
    async fn run(&self, state: &ReviewState) -> anyhow::Result<StateDelta> {
        let mut findings = vec![];
        let mut errors = vec![];

        for path in &state.target_files {
            let file = path.display().to_string();
            let contents = match fs::read_to_string(path) {
                Ok(contents) => contents,
                Err(e) => {
                    errors.push(StageError {
                        stage: "static_analysis".to_string(),
                        message: format!("cannot read {file}: {e}"),
                    });
                    continue;
                }
            };

            for (idx, line) in contents.lines().enumerate() {
                let lineno = idx + 1;
                if line.chars().count() > self.max_line_length {
                    findings.push(Finding {
                        description: format!(
                            "line is {} characters, limit is {}",
                            line.chars().count(),
                            self.max_line_length
                        ),
                        recommendation: "break the line or extract a variable".to_string(),
                        ..Finding::new(&file, lineno, Severity::Low, "style", "Line too long")
                    });
                }
                if line != line.trim_end() && !line.trim_end().is_empty() {
                    findings.push(Finding {
                        description: "line ends with whitespace".to_string(),
                        auto_fixable: true,
                        ..Finding::new(&file, lineno, Severity::Info, "style", "Trailing whitespace")
                    });
                }
            }
        }

        debug!(findings = findings.len(), "static analysis complete");

        Ok(StateDelta {
            static_findings: findings,
            errors,
            files_analyzed: Some(state.files_analyzed + state.target_files.len()),
            current_stage: Some("static_analysis_complete".to_string()),
            ..Default::default()
        })
    }
}
