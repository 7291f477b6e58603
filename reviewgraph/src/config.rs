use std::fs;
use std::path::Path;

use anyhow::Context;
use serde::{Deserialize, Serialize};

use crate::finding::Severity;

/// Name of the optional per-repository config file.
pub const CONFIG_FILE: &str = ".reviewgraph.yml";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ReviewConfig {
    /// Findings below this severity are omitted from the rendered report
    /// (they still appear in the state and JSON output).
    pub severity_threshold: Severity,
    pub auto_fix: AutoFixConfig,
    /// Style limit enforced by static analysis.
    pub max_line_length: usize,
    /// Policy limit on file size.
    pub max_file_lines: usize,
    /// Performance heuristic: a function body longer than this is flagged.
    pub max_function_lines: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AutoFixConfig {
    pub enabled: bool,
}

impl Default for ReviewConfig {
    fn default() -> Self {
        Self {
            severity_threshold: Severity::Info,
            auto_fix: AutoFixConfig { enabled: true },
            max_line_length: 120,
            max_file_lines: 1000,
            max_function_lines: 100,
        }
    }
}

impl Default for AutoFixConfig {
    fn default() -> Self {
        Self { enabled: true }
    }
}

/// Load `.reviewgraph.yml` from the repository root. An absent file yields
/// the defaults; a malformed file is an error.
pub fn load_config(repo_root: &Path) -> anyhow::Result<ReviewConfig> {
    let path = repo_root.join(CONFIG_FILE);
    if !path.exists() {
        return Ok(ReviewConfig::default());
    }
    let raw = fs::read_to_string(&path).with_context(|| format!("reading {}", path.display()))?;
    serde_yaml::from_str(&raw).with_context(|| format!("parsing {}", path.display()))
}
