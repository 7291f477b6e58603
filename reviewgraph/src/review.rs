use std::path::PathBuf;

use crate::config::ReviewConfig;
use crate::error::GraphDefinitionError;
use crate::graph::{END, GraphBuilder, StageGraph};
use crate::stages::{
    FixStage, InitStage, LogicStage, PatternAnalysisStage, PerformanceStage, PolicyStage,
    ReportStage, ScopeStage, SecurityStage, StaticAnalysisStage, TestingStage,
};
use crate::state::{ReviewScope, ReviewState};
use crate::synthesis::{FixRouter, GENERATE_FIXES, SKIP_FIXES, SynthesisStage};

/// Stage the CLI pauses before when fix generation needs approval.
pub const FIX_GENERATION: &str = "fix_generation";

/// Assemble the standard code-review graph: a linear chain of analyses
/// feeding synthesis, then a conditional hop into fix generation, with
/// both branches converging on reporting.
pub fn build_review_graph(config: &ReviewConfig) -> Result<StageGraph, GraphDefinitionError> {
    GraphBuilder::new()
        .add_stage("initialization", InitStage)?
        .add_stage("scope_definition", ScopeStage)?
        .add_stage("static_analysis", StaticAnalysisStage::new(config))?
        .add_stage("pattern_analysis", PatternAnalysisStage)?
        .add_stage("security_audit", SecurityStage)?
        .add_stage("performance_analysis", PerformanceStage::new(config))?
        .add_stage("testing_assessment", TestingStage)?
        .add_stage("logic_verification", LogicStage)?
        .add_stage("policy_verification", PolicyStage::new(config))?
        .add_stage("synthesis", SynthesisStage)?
        .add_stage(FIX_GENERATION, FixStage)?
        .add_stage("reporting", ReportStage::new(config))?
        .set_entry("initialization")?
        .add_edge("initialization", "scope_definition")?
        .add_edge("scope_definition", "static_analysis")?
        .add_edge("static_analysis", "pattern_analysis")?
        .add_edge("pattern_analysis", "security_audit")?
        .add_edge("security_audit", "performance_analysis")?
        .add_edge("performance_analysis", "testing_assessment")?
        .add_edge("testing_assessment", "logic_verification")?
        .add_edge("logic_verification", "policy_verification")?
        .add_edge("policy_verification", "synthesis")?
        .add_conditional_edge(
            "synthesis",
            FixRouter,
            &[(GENERATE_FIXES, FIX_GENERATION), (SKIP_FIXES, "reporting")],
        )?
        .add_edge(FIX_GENERATION, "reporting")?
        .add_edge("reporting", END)?
        .finalize()
}

/// Initial state for a review run.
pub fn initial_state(
    repository_path: PathBuf,
    scope: ReviewScope,
    target_files: Vec<PathBuf>,
    config: &ReviewConfig,
) -> ReviewState {
    ReviewState {
        repository_path,
        review_scope: scope,
        target_files,
        auto_fix_enabled: config.auto_fix.enabled,
        severity_threshold: config.severity_threshold,
        current_stage: Some("started".to_string()),
        ..Default::default()
    }
}
