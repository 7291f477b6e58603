use std::fs;

use async_trait::async_trait;
use tracing::{debug, instrument};

use crate::config::ReviewConfig;
use crate::finding::{Finding, Severity};
use crate::stages::Stage;
use crate::state::{ReviewState, StateDelta};

/// Complexity heuristic: flags function bodies longer than the configured
/// limit. A crude stand-in for cyclomatic complexity, but deterministic
/// and language-agnostic.
pub struct PerformanceStage {
    max_function_lines: usize,
}

impl PerformanceStage {
    pub fn new(config: &ReviewConfig) -> Self {
        Self {
            max_function_lines: config.max_function_lines,
        }
    }
}

fn is_function_decl(line: &str) -> bool {
    let trimmed = line.trim_start();
    trimmed.starts_with("fn ")
        || trimmed.starts_with("pub fn ")
        || trimmed.starts_with("async fn ")
        || trimmed.starts_with("pub async fn ")
        || trimmed.starts_with("def ")
        || trimmed.starts_with("async def ")
        || trimmed.starts_with("function ")
}

fn function_name(line: &str) -> String {
    line.trim_start()
        .trim_start_matches("pub ")
        .trim_start_matches("async ")
        .trim_start_matches("fn ")
        .trim_start_matches("def ")
        .trim_start_matches("function ")
        .split(['(', ' ', ':'])
        .next()
        .unwrap_or("<anonymous>")
        .to_string()
}

#[async_trait]
impl Stage for PerformanceStage {
    #[instrument(skip(self, state), fields(files = state.target_files.len()))]
    async fn run(&self, state: &ReviewState) -> anyhow::Result<StateDelta> {
        let mut findings = vec![];

        for path in &state.target_files {
            let file = path.display().to_string();
            let Ok(contents) = fs::read_to_string(path) else {
                continue;
            };
            let lines: Vec<&str> = contents.lines().collect();

            let mut open: Option<(usize, String)> = None;
            for (idx, line) in lines.iter().enumerate() {
                if is_function_decl(line) {
                    if let Some((start, name)) = open.take() {
                        let length = idx - start;
                        if length > self.max_function_lines {
                            findings.push(long_function(&file, start + 1, &name, length));
                        }
                    }
                    open = Some((idx, function_name(line)));
                }
            }
            if let Some((start, name)) = open {
                let length = lines.len() - start;
                if length > self.max_function_lines {
                    findings.push(long_function(&file, start + 1, &name, length));
                }
            }
        }

        debug!(findings = findings.len(), "performance analysis complete");

        Ok(StateDelta {
            performance_findings: findings,
            current_stage: Some("performance_analysis_complete".to_string()),
            ..Default::default()
        })
    }
}

fn long_function(file: &str, line: usize, name: &str, length: usize) -> Finding {
    Finding {
        description: format!("function `{name}` spans {length} lines"),
        impact: "long functions resist optimization and review".to_string(),
        recommendation: "split the function into smaller units".to_string(),
        ..Finding::new(file, line, Severity::High, "performance", "Long function")
    }
}
