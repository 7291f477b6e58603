use std::collections::HashSet;
use std::sync::Arc;

use tracing::{debug, info, instrument, warn};

use crate::checkpoint::{Checkpoint, CheckpointStore};
use crate::error::EngineError;
use crate::graph::{END, StageGraph};
use crate::state::ReviewState;

/// How a call to [`Engine::run`] ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    /// The terminal marker was reached; the checkpoint has been cleared.
    Completed,
    /// The run stopped at an interrupt point before executing the named
    /// stage. A checkpoint is persisted; calling `run` again with the same
    /// run id is the approval signal that continues past it.
    Paused,
}

/// Outcome of a run, carrying the state as of the last completed stage.
#[derive(Debug)]
pub struct RunResult {
    pub status: RunStatus,
    pub state: ReviewState,
    pub paused_at: Option<String>,
}

/// Walks a finalized [`StageGraph`] one stage at a time, merging each
/// stage's delta into the shared state, checkpointing after every stage,
/// and pausing cooperatively at interrupt points.
///
/// Stage-body failures are absorbed into the state's `errors` accumulator
/// and the run continues; routing and checkpoint failures are fatal. A
/// single run is strictly sequential, but distinct run ids may execute
/// concurrently against the same store.
pub struct Engine {
    graph: StageGraph,
    store: Arc<dyn CheckpointStore>,
}

impl Engine {
    pub fn new(graph: StageGraph, store: Arc<dyn CheckpointStore>) -> Self {
        Self { graph, store }
    }

    pub fn store(&self) -> &Arc<dyn CheckpointStore> {
        &self.store
    }

    /// Execute the run identified by `run_id` until completion, an
    /// interrupt point, or a fatal error.
    ///
    /// If the store holds a checkpoint for `run_id` the run resumes from
    /// it and `initial` is ignored; otherwise the run starts at the
    /// graph's entry stage with `initial`. Callers may edit the stored
    /// checkpoint between a paused result and the resuming call, e.g. to
    /// withdraw an approval flag.
    #[instrument(skip(self, initial, interrupt_before))]
    pub async fn run(
        &self,
        initial: ReviewState,
        run_id: &str,
        interrupt_before: &HashSet<String>,
    ) -> Result<RunResult, EngineError> {
        let (mut current, mut state, mut interrupt_satisfied) = match self.load(run_id)? {
            Some(cp) => {
                info!(stage = %cp.stage, interrupted = cp.interrupted, "resuming from checkpoint");
                (cp.stage, cp.state, cp.interrupted)
            }
            None => (self.graph.entry().to_string(), initial, false),
        };

        loop {
            if current == END {
                self.clear(run_id)?;
                info!("run completed");
                return Ok(RunResult {
                    status: RunStatus::Completed,
                    state,
                    paused_at: None,
                });
            }

            if interrupt_before.contains(&current) && !interrupt_satisfied {
                self.save(Checkpoint::new(run_id, &current, &state, true))?;
                info!(stage = %current, "run paused awaiting approval");
                return Ok(RunResult {
                    status: RunStatus::Paused,
                    paused_at: Some(current),
                    state,
                });
            }
            // The satisfied flag covers exactly the stage the checkpoint
            // paused at; later interrupt points pause normally.
            interrupt_satisfied = false;

            let stage = self.graph.stage(&current).ok_or_else(|| EngineError::UnknownStage {
                run_id: run_id.to_string(),
                stage: current.clone(),
            })?;

            match stage.run(&state).await {
                Ok(delta) => {
                    state.apply(delta);
                    debug!(stage = %current, "stage complete");
                }
                Err(e) => {
                    // Absorbed, not retried: the run continues and the
                    // error is visible in the state.
                    warn!(stage = %current, error = %e, "stage failed");
                    state.record_error(&current, &e);
                }
            }

            let next = self.graph.next_stage(&current, &state)?;
            // Checkpoint names the *next* stage, so resume-after-crash
            // re-enters the loop there and loses at most this one stage.
            self.save(Checkpoint::new(run_id, &next, &state, false))?;
            current = next;
        }
    }

    fn load(&self, run_id: &str) -> Result<Option<Checkpoint>, EngineError> {
        self.store.load(run_id).map_err(|source| EngineError::CheckpointIo {
            run_id: run_id.to_string(),
            source,
        })
    }

    fn save(&self, checkpoint: Checkpoint) -> Result<(), EngineError> {
        let run_id = checkpoint.run_id.clone();
        self.store
            .save(&checkpoint)
            .map_err(|source| EngineError::CheckpointIo { run_id, source })
    }

    fn clear(&self, run_id: &str) -> Result<(), EngineError> {
        self.store.clear(run_id).map_err(|source| EngineError::CheckpointIo {
            run_id: run_id.to_string(),
            source,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    use anyhow::anyhow;
    use async_trait::async_trait;

    use crate::checkpoint::MemoryStore;
    use crate::graph::GraphBuilder;
    use crate::stages::Stage;
    use crate::state::StateDelta;

    type Log = Arc<Mutex<Vec<String>>>;

    struct TrackingStage {
        name: &'static str,
        log: Log,
    }

    #[async_trait]
    impl Stage for TrackingStage {
        async fn run(&self, _state: &ReviewState) -> anyhow::Result<StateDelta> {
            self.log.lock().unwrap().push(self.name.to_string());
            Ok(StateDelta {
                messages: vec![self.name.to_string()],
                current_stage: Some(self.name.to_string()),
                ..Default::default()
            })
        }
    }

    struct FailingStage;

    #[async_trait]
    impl Stage for FailingStage {
        async fn run(&self, _state: &ReviewState) -> anyhow::Result<StateDelta> {
            Err(anyhow!("boom"))
        }
    }

    struct EnableFlagStage;

    #[async_trait]
    impl Stage for EnableFlagStage {
        async fn run(&self, _state: &ReviewState) -> anyhow::Result<StateDelta> {
            Ok(StateDelta {
                auto_fix_enabled: Some(true),
                ..Default::default()
            })
        }
    }

    fn no_interrupts() -> HashSet<String> {
        HashSet::new()
    }

    fn linear_graph(log: &Log) -> StageGraph {
        GraphBuilder::new()
            .add_stage("first", TrackingStage { name: "first", log: log.clone() })
            .unwrap()
            .add_stage("second", TrackingStage { name: "second", log: log.clone() })
            .unwrap()
            .add_stage("third", TrackingStage { name: "third", log: log.clone() })
            .unwrap()
            .add_edge("first", "second")
            .unwrap()
            .add_edge("second", "third")
            .unwrap()
            .add_edge("third", END)
            .unwrap()
            .set_entry("first")
            .unwrap()
            .finalize()
            .unwrap()
    }

    #[tokio::test]
    async fn runs_stages_in_graph_order() {
        let log: Log = Arc::new(Mutex::new(vec![]));
        let engine = Engine::new(linear_graph(&log), Arc::new(MemoryStore::new()));

        let result = engine
            .run(ReviewState::default(), "run-1", &no_interrupts())
            .await
            .unwrap();

        assert_eq!(result.status, RunStatus::Completed);
        assert_eq!(*log.lock().unwrap(), vec!["first", "second", "third"]);
        assert_eq!(result.state.messages, vec!["first", "second", "third"]);
        assert_eq!(result.state.current_stage.as_deref(), Some("third"));
    }

    #[tokio::test]
    async fn completed_run_clears_its_checkpoint() {
        let log: Log = Arc::new(Mutex::new(vec![]));
        let store = Arc::new(MemoryStore::new());
        let engine = Engine::new(linear_graph(&log), store.clone());

        engine
            .run(ReviewState::default(), "run-1", &no_interrupts())
            .await
            .unwrap();

        assert!(store.load("run-1").unwrap().is_none());
    }

    #[tokio::test]
    async fn stage_failure_is_recorded_and_run_continues() {
        let log: Log = Arc::new(Mutex::new(vec![]));
        let graph = GraphBuilder::new()
            .add_stage("before", TrackingStage { name: "before", log: log.clone() })
            .unwrap()
            .add_stage("bad", FailingStage)
            .unwrap()
            .add_stage("after", TrackingStage { name: "after", log: log.clone() })
            .unwrap()
            .add_edge("before", "bad")
            .unwrap()
            .add_edge("bad", "after")
            .unwrap()
            .add_edge("after", END)
            .unwrap()
            .set_entry("before")
            .unwrap()
            .finalize()
            .unwrap();
        let engine = Engine::new(graph, Arc::new(MemoryStore::new()));

        let result = engine
            .run(ReviewState::default(), "run-1", &no_interrupts())
            .await
            .unwrap();

        assert_eq!(result.status, RunStatus::Completed);
        assert_eq!(*log.lock().unwrap(), vec!["before", "after"]);
        assert_eq!(result.state.errors.len(), 1);
        assert_eq!(result.state.errors[0].stage, "bad");
        assert_eq!(result.state.errors[0].message, "boom");
    }

    #[tokio::test]
    async fn undeclared_router_label_fails_the_run() {
        let log: Log = Arc::new(Mutex::new(vec![]));
        let graph = GraphBuilder::new()
            .add_stage("a", TrackingStage { name: "a", log: log.clone() })
            .unwrap()
            .add_stage("b", TrackingStage { name: "b", log: log.clone() })
            .unwrap()
            .add_conditional_edge("a", |_: &ReviewState| "nowhere".to_string(), &[("ok", "b")])
            .unwrap()
            .add_edge("b", END)
            .unwrap()
            .set_entry("a")
            .unwrap()
            .finalize()
            .unwrap();
        let engine = Engine::new(graph, Arc::new(MemoryStore::new()));

        let err = engine
            .run(ReviewState::default(), "run-1", &no_interrupts())
            .await
            .unwrap_err();

        assert!(matches!(err, EngineError::Routing { stage, label } if stage == "a" && label == "nowhere"));
    }

    #[tokio::test]
    async fn interrupt_pauses_before_stage_and_resume_completes() {
        let log: Log = Arc::new(Mutex::new(vec![]));
        let store = Arc::new(MemoryStore::new());
        let engine = Engine::new(linear_graph(&log), store.clone());
        let interrupts: HashSet<String> = ["second".to_string()].into();

        let paused = engine
            .run(ReviewState::default(), "run-1", &interrupts)
            .await
            .unwrap();

        assert_eq!(paused.status, RunStatus::Paused);
        assert_eq!(paused.paused_at.as_deref(), Some("second"));
        // the interrupted stage did not execute
        assert_eq!(*log.lock().unwrap(), vec!["first"]);
        let cp = store.load("run-1").unwrap().unwrap();
        assert_eq!(cp.stage, "second");
        assert!(cp.interrupted);

        // second call with the same run id is the approval
        let done = engine
            .run(ReviewState::default(), "run-1", &interrupts)
            .await
            .unwrap();

        assert_eq!(done.status, RunStatus::Completed);
        assert_eq!(*log.lock().unwrap(), vec!["first", "second", "third"]);
    }

    #[tokio::test]
    async fn resumed_run_matches_uninterrupted_run() {
        let interrupted_log: Log = Arc::new(Mutex::new(vec![]));
        let straight_log: Log = Arc::new(Mutex::new(vec![]));
        let interrupts: HashSet<String> = ["third".to_string()].into();

        let engine = Engine::new(linear_graph(&interrupted_log), Arc::new(MemoryStore::new()));
        let paused = engine
            .run(ReviewState::default(), "run-1", &interrupts)
            .await
            .unwrap();
        assert_eq!(paused.status, RunStatus::Paused);
        let resumed = engine
            .run(ReviewState::default(), "run-1", &interrupts)
            .await
            .unwrap();

        let straight_engine =
            Engine::new(linear_graph(&straight_log), Arc::new(MemoryStore::new()));
        let straight = straight_engine
            .run(ReviewState::default(), "run-2", &no_interrupts())
            .await
            .unwrap();

        assert_eq!(resumed.state, straight.state);
        assert_eq!(*interrupted_log.lock().unwrap(), *straight_log.lock().unwrap());
    }

    #[tokio::test]
    async fn caller_may_mutate_checkpoint_before_resuming() {
        let log: Log = Arc::new(Mutex::new(vec![]));
        let store = Arc::new(MemoryStore::new());
        let engine = Engine::new(linear_graph(&log), store.clone());
        let interrupts: HashSet<String> = ["second".to_string()].into();

        engine
            .run(ReviewState::default(), "run-1", &interrupts)
            .await
            .unwrap();

        let mut cp = store.load("run-1").unwrap().unwrap();
        cp.state.auto_fix_enabled = true;
        store.save(&cp).unwrap();

        let done = engine
            .run(ReviewState::default(), "run-1", &interrupts)
            .await
            .unwrap();
        assert_eq!(done.status, RunStatus::Completed);
        assert!(done.state.auto_fix_enabled);
    }

    #[tokio::test]
    async fn crash_checkpoint_resumes_at_next_stage() {
        // Run half the graph, then pretend the process died by building a
        // fresh engine over the same store.
        let log: Log = Arc::new(Mutex::new(vec![]));
        let store = Arc::new(MemoryStore::new());
        let engine = Engine::new(linear_graph(&log), store.clone());
        let interrupts: HashSet<String> = ["third".to_string()].into();

        engine
            .run(ReviewState::default(), "run-1", &interrupts)
            .await
            .unwrap();
        assert_eq!(*log.lock().unwrap(), vec!["first", "second"]);

        let log2: Log = Arc::new(Mutex::new(vec![]));
        let engine2 = Engine::new(linear_graph(&log2), store.clone());
        let done = engine2
            .run(ReviewState::default(), "run-1", &no_interrupts())
            .await
            .unwrap();

        assert_eq!(done.status, RunStatus::Completed);
        // only the remaining stage executes on resume
        assert_eq!(*log2.lock().unwrap(), vec!["third"]);
        assert_eq!(done.state.messages, vec!["first", "second", "third"]);
    }

    #[tokio::test]
    async fn conditional_route_follows_state_written_earlier_in_run() {
        let log: Log = Arc::new(Mutex::new(vec![]));
        let graph = GraphBuilder::new()
            .add_stage("toggle", EnableFlagStage)
            .unwrap()
            .add_stage("fixes", TrackingStage { name: "fixes", log: log.clone() })
            .unwrap()
            .add_stage("report", TrackingStage { name: "report", log: log.clone() })
            .unwrap()
            .add_conditional_edge(
                "toggle",
                |state: &ReviewState| {
                    if state.auto_fix_enabled { "yes" } else { "no" }.to_string()
                },
                &[("yes", "fixes"), ("no", "report")],
            )
            .unwrap()
            .add_edge("fixes", "report")
            .unwrap()
            .add_edge("report", END)
            .unwrap()
            .set_entry("toggle")
            .unwrap()
            .finalize()
            .unwrap();
        let engine = Engine::new(graph, Arc::new(MemoryStore::new()));

        let result = engine
            .run(ReviewState::default(), "run-1", &no_interrupts())
            .await
            .unwrap();

        assert_eq!(result.status, RunStatus::Completed);
        assert_eq!(*log.lock().unwrap(), vec!["fixes", "report"]);
    }
}
