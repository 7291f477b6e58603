use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use anyhow::{Context, bail};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::state::ReviewState;

/// Durable snapshot of a run: the stage the run will execute next and the
/// state as of the last completed stage. One checkpoint per run id; saves
/// overwrite, history is not retained.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Checkpoint {
    pub run_id: String,
    pub stage: String,
    pub state: ReviewState,
    /// True when the checkpoint was written at an interrupt point, before
    /// executing `stage`. Resuming such a checkpoint is the approval
    /// signal: the engine executes `stage` without pausing again.
    pub interrupted: bool,
    pub saved_at: DateTime<Utc>,
}

impl Checkpoint {
    pub fn new(run_id: &str, stage: &str, state: &ReviewState, interrupted: bool) -> Self {
        Self {
            run_id: run_id.to_string(),
            stage: stage.to_string(),
            state: state.clone(),
            interrupted,
            saved_at: Utc::now(),
        }
    }
}

/// Keyed checkpoint persistence. A `save` that returns `Ok` must be
/// observable by a later `load`, even across a process restart for the
/// durable implementations. Stores must tolerate concurrent access for
/// distinct run ids.
pub trait CheckpointStore: Send + Sync {
    fn save(&self, checkpoint: &Checkpoint) -> anyhow::Result<()>;
    fn load(&self, run_id: &str) -> anyhow::Result<Option<Checkpoint>>;
    fn clear(&self, run_id: &str) -> anyhow::Result<()>;
}

/// In-memory store for tests and single-process embedding.
#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<HashMap<String, Checkpoint>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl CheckpointStore for MemoryStore {
    fn save(&self, checkpoint: &Checkpoint) -> anyhow::Result<()> {
        self.inner
            .lock()
            .expect("checkpoint map poisoned")
            .insert(checkpoint.run_id.clone(), checkpoint.clone());
        Ok(())
    }

    fn load(&self, run_id: &str) -> anyhow::Result<Option<Checkpoint>> {
        Ok(self
            .inner
            .lock()
            .expect("checkpoint map poisoned")
            .get(run_id)
            .cloned())
    }

    fn clear(&self, run_id: &str) -> anyhow::Result<()> {
        self.inner
            .lock()
            .expect("checkpoint map poisoned")
            .remove(run_id);
        Ok(())
    }
}

/// One JSON file per run id under a root directory. Writes go through a
/// temp file and an atomic rename so a crash mid-save leaves the previous
/// checkpoint intact.
pub struct FileStore {
    root: PathBuf,
}

impl FileStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn path_for(&self, run_id: &str) -> anyhow::Result<PathBuf> {
        validate_run_id(run_id)?;
        Ok(self.root.join(format!("{run_id}.json")))
    }
}

fn validate_run_id(run_id: &str) -> anyhow::Result<()> {
    if run_id.is_empty() {
        bail!("run id must not be empty");
    }
    if !run_id
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
    {
        bail!("run id `{run_id}` contains characters outside [A-Za-z0-9._-]");
    }
    Ok(())
}

impl CheckpointStore for FileStore {
    fn save(&self, checkpoint: &Checkpoint) -> anyhow::Result<()> {
        let path = self.path_for(&checkpoint.run_id)?;
        fs::create_dir_all(&self.root)
            .with_context(|| format!("creating checkpoint dir {}", self.root.display()))?;

        let json = serde_json::to_vec_pretty(checkpoint).context("serializing checkpoint")?;
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, &json).with_context(|| format!("writing {}", tmp.display()))?;
        fs::rename(&tmp, &path)
            .with_context(|| format!("committing checkpoint {}", path.display()))?;

        debug!(run_id = %checkpoint.run_id, stage = %checkpoint.stage, path = %path.display(), "checkpoint saved");
        Ok(())
    }

    fn load(&self, run_id: &str) -> anyhow::Result<Option<Checkpoint>> {
        let path = self.path_for(run_id)?;
        let bytes = match fs::read(&path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(e).with_context(|| format!("reading checkpoint {}", path.display()));
            }
        };
        let checkpoint = serde_json::from_slice(&bytes)
            .with_context(|| format!("parsing checkpoint {}", path.display()))?;
        Ok(Some(checkpoint))
    }

    fn clear(&self, run_id: &str) -> anyhow::Result<()> {
        let path = self.path_for(run_id)?;
        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e).with_context(|| format!("removing checkpoint {}", path.display())),
        }
    }
}

/// List the run ids with a checkpoint under `root`. Used by the CLI to
/// show resumable runs; tolerates a missing directory.
pub fn list_runs(root: &Path) -> anyhow::Result<Vec<String>> {
    let entries = match fs::read_dir(root) {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(vec![]),
        Err(e) => return Err(e).with_context(|| format!("reading {}", root.display())),
    };

    let mut runs = vec![];
    for entry in entries {
        let path = entry?.path();
        if path.extension().is_some_and(|ext| ext == "json") {
            if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                runs.push(stem.to_string());
            }
        }
    }
    runs.sort();
    Ok(runs)
}
