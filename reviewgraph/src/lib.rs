//! Staged code-review pipeline engine.
//!
//! A review runs as a directed graph of stages sharing one
//! [`ReviewState`]. Each stage body returns a [`StateDelta`]; the engine
//! merges deltas in execution order (accumulators concatenate, scalars
//! overwrite), checkpoints after every stage, and can pause cooperatively
//! before designated stages pending external approval. A paused run is
//! resumed by calling [`Engine::run`] again with the same run id.

pub mod checkpoint;
pub mod config;
pub mod engine;
pub mod error;
pub mod finding;
pub mod graph;
pub mod report;
pub mod review;
pub mod stages;
pub mod state;
pub mod synthesis;

pub use checkpoint::{Checkpoint, CheckpointStore, FileStore, MemoryStore};
pub use config::{ReviewConfig, load_config};
pub use engine::{Engine, RunResult, RunStatus};
pub use error::{EngineError, GraphDefinitionError};
pub use finding::{Finding, GeneratedFix, Severity};
pub use graph::{END, GraphBuilder, Router, StageGraph};
pub use review::{FIX_GENERATION, build_review_graph, initial_state};
pub use stages::Stage;
pub use state::{ReviewScope, ReviewState, StageError, StateDelta};
pub use synthesis::{FixRouter, SynthesisStage, aggregate};
