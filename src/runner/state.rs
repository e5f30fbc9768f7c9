use serde::{Deserialize, Serialize};
use std::time::Instant;

use crate::parser::ScenarioStep;

/// Step execution status.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum StepStatus {
    Pending,
    Running,
    Passed,
    Failed { error: String },
    Skipped { reason: String },
}

impl StepStatus {
    pub fn is_failed(&self) -> bool {
        matches!(self, StepStatus::Failed { .. })
    }
}

/// The outcome of one step attempt. Produced once, never mutated.
#[derive(Debug, Clone)]
pub struct StepResult {
    pub step: ScenarioStep,
    pub status: StepStatus,
    /// Informational message for passed steps (e.g. "already visible"); the
    /// compiler derives scroll hints from it.
    pub message: Option<String>,
    pub duration_ms: u64,
    /// Failure screenshot path, when one was captured.
    pub screenshot_path: Option<String>,
}

/// State for a single step within a running scenario.
#[derive(Debug, Clone)]
pub struct StepState {
    pub index: usize,
    pub display: String,
    pub kind: String,
    pub status: StepStatus,
    pub started_at: Option<Instant>,
    pub duration_ms: Option<u64>,
    pub message: Option<String>,
    pub screenshot_path: Option<String>,
}

impl StepState {
    pub fn new(index: usize, step: &ScenarioStep) -> Self {
        Self {
            index,
            display: step.display_name(),
            kind: step.kind().to_string(),
            status: StepStatus::Pending,
            started_at: None,
            duration_ms: None,
            message: None,
            screenshot_path: None,
        }
    }

    pub fn start(&mut self) {
        self.status = StepStatus::Running;
        self.started_at = Some(Instant::now());
    }

    pub fn record(&mut self, result: &StepResult) {
        self.status = result.status.clone();
        self.duration_ms = Some(result.duration_ms);
        self.message = result.message.clone();
        self.screenshot_path = result.screenshot_path.clone();
    }

    pub fn skip(&mut self, reason: &str) {
        self.status = StepStatus::Skipped {
            reason: reason.to_string(),
        };
    }

    pub fn to_report(&self) -> StepReport {
        StepReport {
            index: self.index,
            display: self.display.clone(),
            kind: self.kind.clone(),
            status: self.status.clone(),
            duration_ms: self.duration_ms,
            message: self.message.clone(),
            screenshot_path: self.screenshot_path.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StepReport {
    pub index: usize,
    pub display: String,
    pub kind: String,
    pub status: StepStatus,
    pub duration_ms: Option<u64>,
    pub message: Option<String>,
    pub screenshot_path: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ScenarioStatus {
    Pending,
    Running,
    Passed,
    Failed,
}

/// State for one scenario execution.
#[derive(Debug, Clone)]
pub struct ScenarioState {
    pub name: String,
    pub path: String,
    pub status: ScenarioStatus,
    pub steps: Vec<StepState>,
    pub started_at: Option<Instant>,
    pub total_duration_ms: Option<u64>,
    pub error: Option<String>,
    /// True when this run replayed a compiled artifact.
    pub replayed: bool,
}

impl ScenarioState {
    pub fn new(name: &str, path: &str, steps: Vec<StepState>) -> Self {
        Self {
            name: name.to_string(),
            path: path.to_string(),
            status: ScenarioStatus::Pending,
            steps,
            started_at: None,
            total_duration_ms: None,
            error: None,
            replayed: false,
        }
    }

    /// A scenario that failed before any step ran (parse error, stale
    /// artifact).
    pub fn aborted(name: &str, path: &str, error: String) -> Self {
        let mut state = Self::new(name, path, Vec::new());
        state.status = ScenarioStatus::Failed;
        state.error = Some(error);
        state
    }

    pub fn start(&mut self) {
        self.status = ScenarioStatus::Running;
        self.started_at = Some(Instant::now());
    }

    /// Mark all still-pending steps skipped. Used after a first failure:
    /// remaining steps are never attempted.
    pub fn skip_remaining(&mut self, reason: &str) {
        for step in &mut self.steps {
            if matches!(step.status, StepStatus::Pending) {
                step.skip(reason);
            }
        }
    }

    pub fn finish(&mut self) {
        if let Some(start) = self.started_at {
            self.total_duration_ms = Some(start.elapsed().as_millis() as u64);
        }
        let any_failed = self.steps.iter().any(|s| s.status.is_failed());
        self.status = if any_failed || self.error.is_some() {
            ScenarioStatus::Failed
        } else {
            ScenarioStatus::Passed
        };
    }

    pub fn to_report(&self) -> ScenarioReport {
        ScenarioReport {
            name: self.name.clone(),
            path: self.path.clone(),
            status: self.status.clone(),
            steps: self.steps.iter().map(|s| s.to_report()).collect(),
            total_duration_ms: self.total_duration_ms,
            error: self.error.clone(),
            replayed: self.replayed,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScenarioReport {
    pub name: String,
    pub path: String,
    pub status: ScenarioStatus,
    pub steps: Vec<StepReport>,
    pub total_duration_ms: Option<u64>,
    pub error: Option<String>,
    pub replayed: bool,
}

/// Aggregate state across a batch of scenario files.
#[derive(Debug, Clone)]
pub struct SessionState {
    pub session_id: String,
    pub scenarios: Vec<ScenarioState>,
    pub started_at: Option<Instant>,
    pub finished_at: Option<Instant>,
}

impl SessionState {
    pub fn new(session_id: &str) -> Self {
        Self {
            session_id: session_id.to_string(),
            scenarios: Vec::new(),
            started_at: None,
            finished_at: None,
        }
    }

    pub fn start(&mut self) {
        self.started_at = Some(Instant::now());
    }

    pub fn add_scenario(&mut self, scenario: ScenarioState) {
        self.scenarios.push(scenario);
    }

    pub fn finish(&mut self) {
        self.finished_at = Some(Instant::now());
    }

    pub fn summary(&self) -> SessionSummary {
        let mut total_steps = 0u32;
        let mut passed = 0u32;
        let mut failed = 0u32;
        let mut skipped = 0u32;

        for scenario in &self.scenarios {
            for step in &scenario.steps {
                total_steps += 1;
                match step.status {
                    StepStatus::Passed => passed += 1,
                    StepStatus::Failed { .. } => failed += 1,
                    StepStatus::Skipped { .. } => skipped += 1,
                    _ => {}
                }
            }
        }

        let failed_scenarios = self
            .scenarios
            .iter()
            .filter(|s| s.status == ScenarioStatus::Failed)
            .count() as u32;

        let total_duration_ms = self.started_at.map(|start| {
            self.finished_at
                .unwrap_or_else(Instant::now)
                .duration_since(start)
                .as_millis() as u64
        });

        SessionSummary {
            session_id: self.session_id.clone(),
            total_scenarios: self.scenarios.len() as u32,
            failed_scenarios,
            total_steps,
            passed,
            failed,
            skipped,
            total_duration_ms,
        }
    }

    pub fn to_report(&self) -> SessionReport {
        SessionReport {
            session_id: self.session_id.clone(),
            scenarios: self.scenarios.iter().map(|s| s.to_report()).collect(),
            summary: self.summary(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSummary {
    pub session_id: String,
    pub total_scenarios: u32,
    pub failed_scenarios: u32,
    pub total_steps: u32,
    pub passed: u32,
    pub failed: u32,
    pub skipped: u32,
    pub total_duration_ms: Option<u64>,
}

impl SessionSummary {
    /// Exit-code contract: success iff no step failed and no scenario was
    /// aborted before its steps ran.
    pub fn is_success(&self) -> bool {
        self.failed == 0 && self.failed_scenarios == 0
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionReport {
    pub session_id: String,
    pub scenarios: Vec<ScenarioReport>,
    pub summary: SessionSummary,
}
