use std::collections::HashMap;
use std::path::Path;

use anyhow::bail;
use async_trait::async_trait;
use tracing::{debug, instrument};

use crate::stages::Stage;
use crate::stages::scope::source_files;
use crate::state::{ReviewState, StateDelta};

/// Verify the repository path and detect primary languages and project
/// type from the files and manifests present.
pub struct InitStage;

fn language_for(ext: &str) -> Option<&'static str> {
    match ext {
        "rs" => Some("rust"),
        "py" => Some("python"),
        "js" | "jsx" => Some("javascript"),
        "ts" | "tsx" => Some("typescript"),
        "java" => Some("java"),
        "go" => Some("go"),
        "rb" => Some("ruby"),
        "c" | "h" => Some("c"),
        "cc" | "cpp" | "hpp" => Some("c++"),
        _ => None,
    }
}

fn detect_project_type(root: &Path) -> &'static str {
    if root.join("Cargo.toml").exists() {
        if root.join("src/main.rs").exists() {
            "binary"
        } else {
            "library"
        }
    } else if root.join("package.json").exists() {
        "node"
    } else if root.join("pyproject.toml").exists() || root.join("setup.py").exists() {
        "python-package"
    } else if root.join("go.mod").exists() {
        "go-module"
    } else {
        "unknown"
    }
}

#[async_trait]
impl Stage for InitStage {
    #[instrument(skip(self, state), fields(path = %state.repository_path.display()))]
    async fn run(&self, state: &ReviewState) -> anyhow::Result<StateDelta> {
        let root = &state.repository_path;
        if root.as_os_str().is_empty() {
            bail!("missing field: repository_path");
        }
        if !root.is_dir() {
            bail!("repository path not found: {}", root.display());
        }

        let mut counts: HashMap<&'static str, usize> = HashMap::new();
        for file in source_files(root) {
            if let Some(lang) = file
                .extension()
                .and_then(|e| e.to_str())
                .and_then(language_for)
            {
                *counts.entry(lang).or_default() += 1;
            }
        }

        let mut ranked: Vec<(&str, usize)> = counts.into_iter().collect();
        ranked.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(b.0)));
        let primary_languages: Vec<String> =
            ranked.iter().take(3).map(|(lang, _)| lang.to_string()).collect();

        let project_type = detect_project_type(root);
        debug!(languages = ?primary_languages, project_type, "repository initialized");

        Ok(StateDelta {
            primary_languages: Some(primary_languages),
            project_type: Some(project_type.to_string()),
            messages: vec![format!("repository initialized at {}", root.display())],
            current_stage: Some("repository_initialized".to_string()),
            ..Default::default()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn detects_rust_library() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("Cargo.toml"), "[package]\n").unwrap();
        std::fs::create_dir(dir.path().join("src")).unwrap();
        std::fs::write(dir.path().join("src/lib.rs"), "pub fn x() {}\n").unwrap();

        let state = ReviewState {
            repository_path: dir.path().to_path_buf(),
            ..Default::default()
        };
        let delta = InitStage.run(&state).await.unwrap();

        assert_eq!(delta.primary_languages.unwrap(), vec!["rust"]);
        assert_eq!(delta.project_type.as_deref(), Some("library"));
    }

    #[tokio::test]
    async fn empty_repository_path_is_a_missing_field_error() {
        let err = InitStage.run(&ReviewState::default()).await.unwrap_err();
        assert!(err.to_string().contains("missing field: repository_path"));
    }

    #[tokio::test]
    async fn nonexistent_path_fails() {
        let state = ReviewState {
            repository_path: "/definitely/not/here".into(),
            ..Default::default()
        };
        assert!(InitStage.run(&state).await.is_err());
    }
}
