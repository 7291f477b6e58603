use async_trait::async_trait;
use tracing::debug;

use crate::finding::{Finding, Severity};
use crate::graph::Router;
use crate::stages::Stage;
use crate::state::{ReviewState, StateDelta};

pub const GENERATE_FIXES: &str = "generate_fixes";
pub const SKIP_FIXES: &str = "skip_fixes";

/// Merge per-category finding lists into one ranked list.
///
/// `all` is the concatenation of the inputs in the order given (callers
/// pass the fixed category order: static, pattern, security, performance,
/// testing, logic, policy). `prioritized` is `all` stable-sorted by
/// severity rank, so ties keep their input order and repeated runs on
/// identical input produce byte-identical ordering.
///
/// Findings are copied, never mutated, and duplicates with the same
/// `(file, line, title)` are all retained; deduplication is a known
/// limitation of this version.
pub fn aggregate(category_lists: &[&[Finding]]) -> (Vec<Finding>, Vec<Finding>) {
    let all: Vec<Finding> = category_lists
        .iter()
        .flat_map(|list| list.iter().cloned())
        .collect();

    let mut prioritized = all.clone();
    // Vec::sort_by_key is stable; no secondary key on purpose.
    prioritized.sort_by_key(|f| f.severity.rank());

    (all, prioritized)
}

/// Stage body consolidating the seven per-category accumulators into
/// `all_findings`, `prioritized_issues` and `quick_wins`.
pub struct SynthesisStage;

#[async_trait]
impl Stage for SynthesisStage {
    async fn run(&self, state: &ReviewState) -> anyhow::Result<StateDelta> {
        let (all, prioritized) = aggregate(&[
            &state.static_findings,
            &state.pattern_findings,
            &state.security_findings,
            &state.performance_findings,
            &state.testing_findings,
            &state.logic_findings,
            &state.policy_findings,
        ]);

        // Low-risk fixes: auto-fixable and no worse than medium.
        let quick_wins: Vec<Finding> = prioritized
            .iter()
            .filter(|f| f.auto_fixable && !f.severity.is_at_least(Severity::High))
            .cloned()
            .collect();

        debug!(
            total = all.len(),
            quick_wins = quick_wins.len(),
            "findings synthesized"
        );

        Ok(StateDelta {
            all_findings: Some(all),
            prioritized_issues: Some(prioritized),
            quick_wins: Some(quick_wins),
            current_stage: Some("synthesis_complete".to_string()),
            ..Default::default()
        })
    }
}

/// Routing predicate for the conditional edge after synthesis: generate
/// fixes only when auto-fix is enabled and at least one prioritized issue
/// is both severe (critical or high) and auto-fixable. Both branches
/// converge on the reporting stage.
pub struct FixRouter;

impl Router for FixRouter {
    fn route(&self, state: &ReviewState) -> String {
        let wants_fixes = state.auto_fix_enabled
            && state.prioritized_issues.iter().any(|f| {
                f.auto_fixable && matches!(f.severity, Severity::Critical | Severity::High)
            });
        if wants_fixes { GENERATE_FIXES } else { SKIP_FIXES }.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn finding(title: &str, severity: Severity) -> Finding {
        Finding::new("src/lib.rs", 1, severity, "test", title)
    }

    fn fixable(title: &str, severity: Severity) -> Finding {
        Finding {
            auto_fixable: true,
            ..finding(title, severity)
        }
    }

    #[test]
    fn all_concatenates_in_category_order() {
        let static_list = vec![finding("s1", Severity::Low)];
        let security_list = vec![finding("sec1", Severity::Critical)];
        let (all, _) = aggregate(&[&static_list, &[], &security_list]);

        let titles: Vec<&str> = all.iter().map(|f| f.title.as_str()).collect();
        assert_eq!(titles, vec!["s1", "sec1"]);
    }

    #[test]
    fn prioritized_starts_with_most_severe() {
        let low = vec![finding("low", Severity::Low)];
        let critical = vec![finding("critical", Severity::Critical)];
        let medium = vec![finding("medium", Severity::Medium)];
        let (_, prioritized) = aggregate(&[&low, &critical, &medium]);

        let titles: Vec<&str> = prioritized.iter().map(|f| f.title.as_str()).collect();
        assert_eq!(titles, vec!["critical", "medium", "low"]);
    }

    #[test]
    fn ties_keep_input_order() {
        let first = vec![finding("a", Severity::High), finding("b", Severity::High)];
        let second = vec![finding("c", Severity::High)];
        let (_, prioritized) = aggregate(&[&first, &second]);

        let titles: Vec<&str> = prioritized.iter().map(|f| f.title.as_str()).collect();
        assert_eq!(titles, vec!["a", "b", "c"]);
    }

    #[test]
    fn sorting_an_already_prioritized_list_is_idempotent() {
        let input = vec![
            finding("a", Severity::Medium),
            finding("b", Severity::Critical),
            finding("c", Severity::Info),
            finding("d", Severity::Critical),
        ];
        let (_, once) = aggregate(&[&input]);
        let (_, twice) = aggregate(&[&once]);
        assert_eq!(once, twice);
    }

    #[test]
    fn duplicates_are_retained() {
        let a = vec![finding("dup", Severity::Low)];
        let b = vec![finding("dup", Severity::Low)];
        let (all, prioritized) = aggregate(&[&a, &b]);
        assert_eq!(all.len(), 2);
        assert_eq!(prioritized.len(), 2);
    }

    #[test]
    fn router_skips_when_auto_fix_disabled() {
        let state = ReviewState {
            auto_fix_enabled: false,
            prioritized_issues: vec![fixable("bad", Severity::Critical)],
            ..Default::default()
        };
        assert_eq!(FixRouter.route(&state), SKIP_FIXES);
    }

    #[test]
    fn router_skips_when_severe_issues_are_not_fixable() {
        let state = ReviewState {
            auto_fix_enabled: true,
            prioritized_issues: vec![
                finding("severe but manual", Severity::Critical),
                fixable("fixable but mild", Severity::Low),
            ],
            ..Default::default()
        };
        assert_eq!(FixRouter.route(&state), SKIP_FIXES);
    }

    #[test]
    fn router_generates_for_fixable_high_severity() {
        let state = ReviewState {
            auto_fix_enabled: true,
            prioritized_issues: vec![fixable("leak", Severity::High)],
            ..Default::default()
        };
        assert_eq!(FixRouter.route(&state), GENERATE_FIXES);
    }

    #[tokio::test]
    async fn synthesis_stage_fills_synthesized_fields() {
        let state = ReviewState {
            static_findings: vec![fixable("style", Severity::Low)],
            security_findings: vec![finding("leak", Severity::Critical)],
            ..Default::default()
        };

        let delta = SynthesisStage.run(&state).await.unwrap();
        let all = delta.all_findings.unwrap();
        let prioritized = delta.prioritized_issues.unwrap();
        let quick_wins = delta.quick_wins.unwrap();

        assert_eq!(all.len(), 2);
        assert_eq!(prioritized[0].title, "leak");
        assert_eq!(quick_wins.len(), 1);
        assert_eq!(quick_wins[0].title, "style");
    }
}
