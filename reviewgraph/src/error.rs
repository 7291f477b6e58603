use thiserror::Error;

/// A malformed graph definition. Raised while building or finalizing a
/// [`StageGraph`](crate::graph::StageGraph), before any execution; there is
/// no run to fail, so these are always fatal.
#[derive(Debug, Error)]
pub enum GraphDefinitionError {
    #[error("stage `{0}` is already declared")]
    DuplicateStage(String),

    #[error("edge references undeclared stage `{0}`")]
    UndeclaredStage(String),

    #[error("stage `{0}` already has an outgoing edge set")]
    DuplicateEdgeSet(String),

    #[error("stage `{0}` has no outgoing edge")]
    MissingEdge(String),

    #[error("no entry stage set")]
    MissingEntry,

    #[error("cycle detected through stage `{0}`")]
    Cycle(String),
}

/// A fatal runtime failure. Stage-body errors are *not* represented here:
/// they are absorbed into the state's `errors` accumulator and the run
/// continues. Routing and checkpoint failures end the run because
/// continuing would either execute an undeclared branch or silently lose
/// the durability guarantee.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("router for stage `{stage}` returned undeclared label `{label}`")]
    Routing { stage: String, label: String },

    #[error("checkpoint for run `{run_id}` names unknown stage `{stage}`")]
    UnknownStage { run_id: String, stage: String },

    #[error("checkpoint store failed for run `{run_id}`: {source}")]
    CheckpointIo {
        run_id: String,
        #[source]
        source: anyhow::Error,
    },
}
