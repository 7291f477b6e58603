use async_trait::async_trait;
use tracing::{info, instrument};

use crate::finding::GeneratedFix;
use crate::stages::Stage;
use crate::state::{ReviewState, StateDelta};

/// Proposes fixes for auto-fixable prioritized issues.
///
/// Honors `auto_fix_enabled` at execution time: an approver who rejected
/// the pause toggles the flag off in the checkpointed state, and the stage
/// then declines instead of generating.
pub struct FixStage;

#[async_trait]
impl Stage for FixStage {
    #[instrument(skip(self, state))]
    async fn run(&self, state: &ReviewState) -> anyhow::Result<StateDelta> {
        if !state.auto_fix_enabled {
            info!("fix generation declined");
            return Ok(StateDelta {
                generated_fixes: Some(vec![]),
                messages: vec!["fix generation declined by reviewer".to_string()],
                current_stage: Some("fix_generation_complete".to_string()),
                ..Default::default()
            });
        }

        let fixes: Vec<GeneratedFix> = state
            .prioritized_issues
            .iter()
            .filter(|f| f.auto_fixable)
            .map(|f| GeneratedFix {
                finding_id: f.id,
                fix_code: format!(
                    "// fix({}): {}\n// at {}:{}\n{}",
                    f.category,
                    f.title,
                    f.file,
                    f.line,
                    if f.recommendation.is_empty() {
                        "// apply the recommended change"
                    } else {
                        f.recommendation.as_str()
                    }
                ),
                status: "proposed".to_string(),
            })
            .collect();

        info!(fixes = fixes.len(), "fixes generated");

        Ok(StateDelta {
            messages: vec![format!("generated {} fix proposal(s)", fixes.len())],
            generated_fixes: Some(fixes),
            current_stage: Some("fix_generation_complete".to_string()),
            ..Default::default()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::finding::{Finding, Severity};

    fn fixable(title: &str) -> Finding {
        Finding {
            auto_fixable: true,
            recommendation: "do the thing".to_string(),
            ..Finding::new("src/lib.rs", 3, Severity::High, "security", title)
        }
    }

    #[tokio::test]
    async fn generates_fixes_for_auto_fixable_issues() {
        let state = ReviewState {
            auto_fix_enabled: true,
            prioritized_issues: vec![
                fixable("leak"),
                Finding::new("src/lib.rs", 9, Severity::High, "logic", "manual"),
            ],
            ..Default::default()
        };
        let delta = FixStage.run(&state).await.unwrap();
        let fixes = delta.generated_fixes.unwrap();

        assert_eq!(fixes.len(), 1);
        assert_eq!(fixes[0].finding_id, state.prioritized_issues[0].id);
        assert_eq!(fixes[0].status, "proposed");
        assert!(fixes[0].fix_code.contains("leak"));
    }

    #[tokio::test]
    async fn declines_when_auto_fix_disabled() {
        let state = ReviewState {
            auto_fix_enabled: false,
            prioritized_issues: vec![fixable("leak")],
            ..Default::default()
        };
        let delta = FixStage.run(&state).await.unwrap();

        assert!(delta.generated_fixes.unwrap().is_empty());
        assert_eq!(delta.messages, vec!["fix generation declined by reviewer"]);
    }
}
