use async_trait::async_trait;
use tracing::instrument;

use crate::config::ReviewConfig;
use crate::finding::Severity;
use crate::report::render_markdown;
use crate::stages::Stage;
use crate::state::{ReviewState, StateDelta};

/// Renders the Markdown report into the state so it survives in the
/// checkpoint and the final result alike.
pub struct ReportStage {
    threshold: Severity,
}

impl ReportStage {
    pub fn new(config: &ReviewConfig) -> Self {
        Self {
            threshold: config.severity_threshold,
        }
    }
}

#[async_trait]
impl Stage for ReportStage {
    #[instrument(skip(self, state))]
    async fn run(&self, state: &ReviewState) -> anyhow::Result<StateDelta> {
        Ok(StateDelta {
            markdown_report: Some(render_markdown(state, self.threshold)),
            current_stage: Some("reporting_complete".to_string()),
            ..Default::default()
        })
    }
}
