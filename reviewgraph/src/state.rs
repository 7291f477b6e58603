use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::finding::{Finding, GeneratedFix, Severity};

/// Which part of the repository a review covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReviewScope {
    #[default]
    Full,
    Files,
}

/// An error recorded while a stage body was executing. Stage failures are
/// absorbed into the run's `errors` accumulator so one faulty analysis
/// stage does not abort the whole review.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageError {
    pub stage: String,
    pub message: String,
}

/// The single state record threaded through every stage of a review run.
///
/// Fields come in two kinds: scalar fields, where the last writer wins, and
/// accumulator fields (the per-category finding lists, `messages` and
/// `errors`), which only ever grow by ordered concatenation. The engine
/// applies stage output through [`ReviewState::apply`] and never truncates
/// or reorders an accumulator.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReviewState {
    // Input parameters
    pub repository_path: PathBuf,
    pub review_scope: ReviewScope,
    pub target_files: Vec<PathBuf>,

    // Repository metadata
    pub primary_languages: Vec<String>,
    pub project_type: Option<String>,

    // Configuration
    pub auto_fix_enabled: bool,
    pub severity_threshold: Severity,

    // Analysis results, accumulated across stages
    pub static_findings: Vec<Finding>,
    pub pattern_findings: Vec<Finding>,
    pub security_findings: Vec<Finding>,
    pub performance_findings: Vec<Finding>,
    pub testing_findings: Vec<Finding>,
    pub logic_findings: Vec<Finding>,
    pub policy_findings: Vec<Finding>,

    // Synthesized results
    pub all_findings: Vec<Finding>,
    pub prioritized_issues: Vec<Finding>,
    pub quick_wins: Vec<Finding>,

    // Fix generation
    pub generated_fixes: Vec<GeneratedFix>,

    // Reporting
    pub markdown_report: Option<String>,

    // Progress tracking
    pub files_analyzed: usize,
    pub total_files: usize,
    pub current_stage: Option<String>,

    // Run log
    pub messages: Vec<String>,
    pub errors: Vec<StageError>,
}

/// A partial update produced by one stage body.
///
/// Scalar fields are `Option`al: `None` leaves the current value untouched.
/// Accumulator fields are plain vectors whose contents are appended, in
/// order, onto the corresponding state field; an empty vector is a no-op.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StateDelta {
    pub repository_path: Option<PathBuf>,
    pub review_scope: Option<ReviewScope>,
    pub target_files: Option<Vec<PathBuf>>,

    pub primary_languages: Option<Vec<String>>,
    pub project_type: Option<String>,

    pub auto_fix_enabled: Option<bool>,
    pub severity_threshold: Option<Severity>,

    pub static_findings: Vec<Finding>,
    pub pattern_findings: Vec<Finding>,
    pub security_findings: Vec<Finding>,
    pub performance_findings: Vec<Finding>,
    pub testing_findings: Vec<Finding>,
    pub logic_findings: Vec<Finding>,
    pub policy_findings: Vec<Finding>,

    pub all_findings: Option<Vec<Finding>>,
    pub prioritized_issues: Option<Vec<Finding>>,
    pub quick_wins: Option<Vec<Finding>>,

    pub generated_fixes: Option<Vec<GeneratedFix>>,

    pub markdown_report: Option<String>,

    pub files_analyzed: Option<usize>,
    pub total_files: Option<usize>,
    pub current_stage: Option<String>,

    pub messages: Vec<String>,
    pub errors: Vec<StageError>,
}

impl ReviewState {
    /// Merge a stage's partial output into the state.
    ///
    /// Accumulators extend, preserving the delta's internal order; scalars
    /// overwrite when the delta carries a value. The merge is associative
    /// and left-to-right deterministic: applying the same deltas in the
    /// same order always yields the same state, which is what makes
    /// resume-after-crash indistinguishable from uninterrupted execution.
    pub fn apply(&mut self, delta: StateDelta) {
        // Exhaustive destructure: adding a field to StateDelta without
        // handling it here is a compile error.
        let StateDelta {
            repository_path,
            review_scope,
            target_files,
            primary_languages,
            project_type,
            auto_fix_enabled,
            severity_threshold,
            static_findings,
            pattern_findings,
            security_findings,
            performance_findings,
            testing_findings,
            logic_findings,
            policy_findings,
            all_findings,
            prioritized_issues,
            quick_wins,
            generated_fixes,
            markdown_report,
            files_analyzed,
            total_files,
            current_stage,
            messages,
            errors,
        } = delta;

        if let Some(v) = repository_path {
            self.repository_path = v;
        }
        if let Some(v) = review_scope {
            self.review_scope = v;
        }
        if let Some(v) = target_files {
            self.target_files = v;
        }
        if let Some(v) = primary_languages {
            self.primary_languages = v;
        }
        if let Some(v) = project_type {
            self.project_type = Some(v);
        }
        if let Some(v) = auto_fix_enabled {
            self.auto_fix_enabled = v;
        }
        if let Some(v) = severity_threshold {
            self.severity_threshold = v;
        }

        self.static_findings.extend(static_findings);
        self.pattern_findings.extend(pattern_findings);
        self.security_findings.extend(security_findings);
        self.performance_findings.extend(performance_findings);
        self.testing_findings.extend(testing_findings);
        self.logic_findings.extend(logic_findings);
        self.policy_findings.extend(policy_findings);

        if let Some(v) = all_findings {
            self.all_findings = v;
        }
        if let Some(v) = prioritized_issues {
            self.prioritized_issues = v;
        }
        if let Some(v) = quick_wins {
            self.quick_wins = v;
        }
        if let Some(v) = generated_fixes {
            self.generated_fixes = v;
        }
        if let Some(v) = markdown_report {
            self.markdown_report = Some(v);
        }
        if let Some(v) = files_analyzed {
            self.files_analyzed = v;
        }
        if let Some(v) = total_files {
            self.total_files = v;
        }
        if let Some(v) = current_stage {
            self.current_stage = Some(v);
        }

        self.messages.extend(messages);
        self.errors.extend(errors);
    }

    pub fn record_error(&mut self, stage: &str, error: &anyhow::Error) {
        self.errors.push(StageError {
            stage: stage.to_string(),
            message: error.to_string(),
        });
    }
}
