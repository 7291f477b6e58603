use async_trait::async_trait;

use crate::stages::Stage;
use crate::state::{ReviewState, StateDelta};

/// Logic verification needs a semantic model of the reviewed language,
/// which this version does not carry; the stage records that the step ran
/// and contributes no findings.
pub struct LogicStage;

#[async_trait]
impl Stage for LogicStage {
    async fn run(&self, state: &ReviewState) -> anyhow::Result<StateDelta> {
        let languages = if state.primary_languages.is_empty() {
            "unknown".to_string()
        } else {
            state.primary_languages.join(", ")
        };

        Ok(StateDelta {
            messages: vec![format!(
                "logic verification skipped: no semantic model for {languages}"
            )],
            current_stage: Some("logic_verification_complete".to_string()),
            ..Default::default()
        })
    }
}
