use std::path::{Path, PathBuf};

use anyhow::bail;
use async_trait::async_trait;
use tracing::{debug, instrument};
use walkdir::WalkDir;

use crate::stages::Stage;
use crate::state::{ReviewScope, ReviewState, StateDelta};

const SOURCE_EXTENSIONS: &[&str] = &[
    "rs", "py", "js", "jsx", "ts", "tsx", "java", "go", "rb", "c", "h", "cc", "cpp", "hpp",
];

fn is_skipped_dir(name: &str) -> bool {
    name.starts_with('.') || matches!(name, "target" | "node_modules" | "__pycache__" | "venv")
}

/// All source files under `root`, in a deterministic (sorted) order,
/// skipping VCS metadata and build output.
pub(crate) fn source_files(root: &Path) -> Vec<PathBuf> {
    WalkDir::new(root)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|entry| {
            entry.depth() == 0
                || entry
                    .file_name()
                    .to_str()
                    .is_none_or(|name| !(entry.file_type().is_dir() && is_skipped_dir(name)))
        })
        .filter_map(Result::ok)
        .filter(|entry| entry.file_type().is_file())
        .map(|entry| entry.into_path())
        .filter(|path| {
            path.extension()
                .and_then(|e| e.to_str())
                .is_some_and(|ext| SOURCE_EXTENSIONS.contains(&ext))
        })
        .collect()
}

/// Enumerate the files the review will analyze, honoring the requested
/// scope.
pub struct ScopeStage;

#[async_trait]
impl Stage for ScopeStage {
    #[instrument(skip(self, state), fields(scope = ?state.review_scope))]
    async fn run(&self, state: &ReviewState) -> anyhow::Result<StateDelta> {
        let target_files = match state.review_scope {
            ReviewScope::Full => source_files(&state.repository_path),
            ReviewScope::Files => {
                if state.target_files.is_empty() {
                    bail!("missing field: target_files (required for `files` scope)");
                }
                for file in &state.target_files {
                    if !file.is_file() {
                        bail!("target file not found: {}", file.display());
                    }
                }
                state.target_files.clone()
            }
        };

        let total = target_files.len();
        debug!(total, "scope defined");

        Ok(StateDelta {
            target_files: Some(target_files),
            total_files: Some(total),
            messages: vec![format!("scope defined: {total} file(s)")],
            current_stage: Some("scope_defined".to_string()),
            ..Default::default()
        })
    }
}
