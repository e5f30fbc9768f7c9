//! Scenario compilation: one instrumented live run that bakes what it
//! observed into a replayable artifact.

pub mod artifact;

use anyhow::{anyhow, Result};
use once_cell::sync::Lazy;
use regex::Regex;

use crate::bridge::traits::SwipeDirection;
use crate::bridge::Capabilities;
use crate::parser::{ScenarioDefinition, ScenarioStep};
use crate::runner::context::RunContext;
use crate::runner::executor::StepExecutor;
use crate::runner::state::{StepResult, StepStatus};

use artifact::{
    source_hash, CompiledScenario, CompiledStep, DeviceGeometry, StepHint, ARTIFACT_VERSION,
};

static SCROLL_COUNT: Lazy<Regex> = Lazy::new(|| Regex::new(r"(\d+) scrolls?\b").unwrap());

/// Runs a scenario live and derives a hint per step from what the run
/// observed. A failing step aborts compilation for the whole file: an
/// artifact is only ever written for a fully passing run.
pub struct ScenarioCompiler {
    executor: StepExecutor,
}

#[derive(Debug)]
pub struct CompileOutcome {
    pub artifact: CompiledScenario,
    pub results: Vec<StepResult>,
}

impl ScenarioCompiler {
    pub fn new(capabilities: Capabilities, context: RunContext) -> Self {
        Self {
            executor: StepExecutor::new(capabilities, context),
        }
    }

    pub async fn compile(
        &mut self,
        definition: &ScenarioDefinition,
        source_text: &str,
    ) -> Result<CompileOutcome> {
        let device = self.device_geometry().await?;

        let mut results = Vec::with_capacity(definition.steps.len());
        let mut steps = Vec::with_capacity(definition.steps.len());

        for (index, step) in definition.steps.iter().enumerate() {
            let result = self
                .executor
                .execute_step(&definition.name, index, step)
                .await;

            if let StepStatus::Failed { error } = &result.status {
                return Err(anyhow!(
                    "step {} ({}) failed during compilation: {}",
                    index,
                    step.display_name(),
                    error
                ));
            }

            steps.push(CompiledStep {
                index,
                kind: step.kind().to_string(),
                label: step.label().map(str::to_string),
                hint: self.derive_hint(step, &result),
            });
            results.push(result);
        }

        Ok(CompileOutcome {
            artifact: CompiledScenario {
                version: ARTIFACT_VERSION,
                scenario_name: definition.name.clone(),
                source_hash: source_hash(source_text),
                compiled_at: chrono::Utc::now().to_rfc3339(),
                device,
                steps,
            },
            results,
        })
    }

    fn derive_hint(&self, step: &ScenarioStep, result: &StepResult) -> Option<StepHint> {
        match step {
            // An OCR-resolved tap bakes the exact point it hit. Coordinate
            // taps never ran OCR and gain nothing from a hint.
            ScenarioStep::Tap(_) => Some(match self.executor.last_tap() {
                Some(obs) => StepHint::Tap {
                    x: obs.x,
                    y: obs.y,
                    confidence: obs.confidence,
                    strategy: obs.strategy,
                },
                None => StepHint::Passthrough,
            }),

            // OCR waits and checks replay as the delay actually observed;
            // the replay path adds its own safety buffer on top.
            ScenarioStep::WaitFor(_)
            | ScenarioStep::AssertVisible(_)
            | ScenarioStep::AssertNotVisible(_) => Some(StepHint::Sleep {
                delay_ms: result.duration_ms,
            }),

            ScenarioStep::ScrollTo(_) => Some(StepHint::Scroll {
                direction: SwipeDirection::Up,
                count: scroll_count(result.message.as_deref()),
            }),

            // Never executed, nothing to cache.
            ScenarioStep::Skipped { .. } => None,

            // Everything else is already OCR-free.
            _ => Some(StepHint::Passthrough),
        }
    }

    async fn device_geometry(&self) -> Result<DeviceGeometry> {
        let info = self
            .executor
            .window_info()
            .await?
            .ok_or_else(|| anyhow!("mirror window is not available"))?;
        Ok(DeviceGeometry {
            width: info.width,
            height: info.height,
            orientation: artifact::Orientation::of(info.width, info.height),
        })
    }
}

/// Scroll count from the live scroll_to pass message. "already visible"
/// carries no count and compiles to zero swipes.
fn scroll_count(message: Option<&str>) -> u32 {
    let Some(message) = message else { return 0 };
    SCROLL_COUNT
        .captures(message)
        .and_then(|c| c[1].parse().ok())
        .unwrap_or(0)
}
