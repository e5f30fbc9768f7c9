use crate::runner::state::{ScenarioReport, SessionSummary};
use serde::{Deserialize, Serialize};

/// Session results for report generation.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestResults {
    pub session_id: String,
    pub scenarios: Vec<ScenarioReport>,
    pub summary: SessionSummary,
    pub generated_at: String,
}
