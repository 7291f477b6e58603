use std::collections::{HashMap, HashSet};

use crate::error::{EngineError, GraphDefinitionError};
use crate::stages::Stage;
use crate::state::ReviewState;

/// Sentinel terminal marker. Edges may target `END`; it has no body and no
/// outgoing edges, and reaching it completes the run.
pub const END: &str = "__end__";

/// Routing predicate for a conditional edge: maps the current state to one
/// of the edge's declared labels.
pub trait Router: Send + Sync {
    fn route(&self, state: &ReviewState) -> String;
}

impl<F> Router for F
where
    F: Fn(&ReviewState) -> String + Send + Sync,
{
    fn route(&self, state: &ReviewState) -> String {
        self(state)
    }
}

enum EdgeSet {
    /// Single unconditional successor.
    Fixed(String),
    /// Router output is looked up in `targets`; an undeclared label fails
    /// the run with [`EngineError::Routing`].
    Conditional {
        router: Box<dyn Router>,
        targets: HashMap<String, String>,
    },
}

/// Immutable, validated stage graph. Built through [`GraphBuilder`]; the
/// engine only accepts finalized graphs.
pub struct StageGraph {
    stages: HashMap<String, Box<dyn Stage>>,
    edges: HashMap<String, EdgeSet>,
    entry: String,
}

impl std::fmt::Debug for StageGraph {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StageGraph")
            .field("stages", &self.stages.keys().collect::<Vec<_>>())
            .field("entry", &self.entry)
            .finish_non_exhaustive()
    }
}

impl StageGraph {
    pub fn builder() -> GraphBuilder {
        GraphBuilder::new()
    }

    pub fn entry(&self) -> &str {
        &self.entry
    }

    pub fn stage_count(&self) -> usize {
        self.stages.len()
    }

    pub fn has_stage(&self, name: &str) -> bool {
        self.stages.contains_key(name)
    }

    pub(crate) fn stage(&self, name: &str) -> Option<&dyn Stage> {
        self.stages.get(name).map(|s| s.as_ref())
    }

    /// Resolve the successor of `current` against the finalized edge set.
    pub(crate) fn next_stage(&self, current: &str, state: &ReviewState) -> Result<String, EngineError> {
        match self.edges.get(current) {
            Some(EdgeSet::Fixed(target)) => Ok(target.clone()),
            Some(EdgeSet::Conditional { router, targets }) => {
                let label = router.route(state);
                match targets.get(&label) {
                    Some(target) => Ok(target.clone()),
                    None => Err(EngineError::Routing {
                        stage: current.to_string(),
                        label,
                    }),
                }
            }
            // finalize() guarantees every stage has an edge set
            None => unreachable!("finalized graph has no edge for stage `{current}`"),
        }
    }
}

/// Builder for a [`StageGraph`]. Stages must be declared before edges that
/// reference them; validation failures surface as [`GraphDefinitionError`]
/// at the offending call, never at run time.
pub struct GraphBuilder {
    stages: HashMap<String, Box<dyn Stage>>,
    edges: HashMap<String, EdgeSet>,
    entry: Option<String>,
}

impl std::fmt::Debug for GraphBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GraphBuilder")
            .field("stages", &self.stages.keys().collect::<Vec<_>>())
            .field("entry", &self.entry)
            .finish_non_exhaustive()
    }
}

impl GraphBuilder {
    pub fn new() -> Self {
        Self {
            stages: HashMap::new(),
            edges: HashMap::new(),
            entry: None,
        }
    }

    pub fn add_stage(
        mut self,
        name: &str,
        body: impl Stage + 'static,
    ) -> Result<Self, GraphDefinitionError> {
        if name == END {
            return Err(GraphDefinitionError::DuplicateStage(name.to_string()));
        }
        if self.stages.insert(name.to_string(), Box::new(body)).is_some() {
            return Err(GraphDefinitionError::DuplicateStage(name.to_string()));
        }
        Ok(self)
    }

    pub fn add_edge(mut self, from: &str, to: &str) -> Result<Self, GraphDefinitionError> {
        self.check_declared(from)?;
        self.check_target(to)?;
        self.check_no_edge(from)?;
        self.edges.insert(from.to_string(), EdgeSet::Fixed(to.to_string()));
        Ok(self)
    }

    /// Declare a conditional edge out of `from`. `targets` maps each label
    /// the router may return to the successor stage it selects.
    pub fn add_conditional_edge(
        mut self,
        from: &str,
        router: impl Router + 'static,
        targets: &[(&str, &str)],
    ) -> Result<Self, GraphDefinitionError> {
        self.check_declared(from)?;
        for (_, to) in targets {
            self.check_target(to)?;
        }
        self.check_no_edge(from)?;
        self.edges.insert(
            from.to_string(),
            EdgeSet::Conditional {
                router: Box::new(router),
                targets: targets
                    .iter()
                    .map(|(label, to)| (label.to_string(), to.to_string()))
                    .collect(),
            },
        );
        Ok(self)
    }

    pub fn set_entry(mut self, name: &str) -> Result<Self, GraphDefinitionError> {
        self.check_declared(name)?;
        self.entry = Some(name.to_string());
        Ok(self)
    }

    /// Validate the whole graph and freeze it. Every stage must have
    /// exactly one outgoing edge set, an entry must be set, and the graph
    /// must be acyclic.
    pub fn finalize(self) -> Result<StageGraph, GraphDefinitionError> {
        let entry = self.entry.clone().ok_or(GraphDefinitionError::MissingEntry)?;

        for name in self.stages.keys() {
            if !self.edges.contains_key(name) {
                return Err(GraphDefinitionError::MissingEdge(name.clone()));
            }
        }

        self.check_acyclic()?;

        Ok(StageGraph {
            stages: self.stages,
            edges: self.edges,
            entry,
        })
    }

    fn check_declared(&self, name: &str) -> Result<(), GraphDefinitionError> {
        if self.stages.contains_key(name) {
            Ok(())
        } else {
            Err(GraphDefinitionError::UndeclaredStage(name.to_string()))
        }
    }

    fn check_target(&self, name: &str) -> Result<(), GraphDefinitionError> {
        if name == END {
            Ok(())
        } else {
            self.check_declared(name)
        }
    }

    fn check_no_edge(&self, from: &str) -> Result<(), GraphDefinitionError> {
        if self.edges.contains_key(from) {
            Err(GraphDefinitionError::DuplicateEdgeSet(from.to_string()))
        } else {
            Ok(())
        }
    }

    /// DFS over all declared successors, both fixed and conditional.
    fn check_acyclic(&self) -> Result<(), GraphDefinitionError> {
        let mut finished: HashSet<&str> = HashSet::new();
        let mut in_path: Vec<&str> = Vec::new();

        fn visit<'a>(
            node: &'a str,
            edges: &'a HashMap<String, EdgeSet>,
            finished: &mut HashSet<&'a str>,
            in_path: &mut Vec<&'a str>,
        ) -> Result<(), GraphDefinitionError> {
            if node == END || finished.contains(node) {
                return Ok(());
            }
            if in_path.contains(&node) {
                return Err(GraphDefinitionError::Cycle(node.to_string()));
            }
            in_path.push(node);
            let successors: Vec<&str> = match edges.get(node) {
                Some(EdgeSet::Fixed(target)) => vec![target.as_str()],
                Some(EdgeSet::Conditional { targets, .. }) => {
                    targets.values().map(String::as_str).collect()
                }
                None => vec![],
            };
            for next in successors {
                visit(next, edges, finished, in_path)?;
            }
            in_path.pop();
            finished.insert(node);
            Ok(())
        }

        for node in self.stages.keys() {
            visit(node, &self.edges, &mut finished, &mut in_path)?;
        }
        Ok(())
    }
}

impl Default for GraphBuilder {
    fn default() -> Self {
        Self::new()
    }
}
