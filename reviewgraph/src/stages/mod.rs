pub mod fixes;
pub mod init;
pub mod logic;
pub mod pattern;
pub mod performance;
pub mod policy;
pub mod report_stage;
pub mod scope;
pub mod security;
pub mod static_analysis;
pub mod testing;

use async_trait::async_trait;

use crate::state::{ReviewState, StateDelta};

/// One unit of work in the stage graph.
///
/// A body reads the fields it needs from the shared state and returns only
/// the fields it produces as a [`StateDelta`]; it must not retain the state
/// reference past the call. The engine owns the merge, so accumulator
/// contributions land in execution order regardless of which stage
/// produced them.
#[async_trait]
pub trait Stage: Send + Sync {
    async fn run(&self, state: &ReviewState) -> anyhow::Result<StateDelta>;
}

pub use fixes::FixStage;
pub use init::InitStage;
pub use logic::LogicStage;
pub use pattern::PatternAnalysisStage;
pub use performance::PerformanceStage;
pub use policy::PolicyStage;
pub use report_stage::ReportStage;
pub use scope::ScopeStage;
pub use security::SecurityStage;
pub use static_analysis::StaticAnalysisStage;
pub use testing::TestingStage;
