//! Compiled replay: hint-driven step dispatch with live fallback.

use std::time::Instant;

use crate::compiler::artifact::StepHint;
use crate::parser::ScenarioStep;

use super::executor::StepExecutor;
use super::state::{StepResult, StepStatus};

/// Executes steps from a validated artifact. Hinted steps skip the adaptive
/// machinery (no OCR, no polling); anything without a usable hint runs on
/// the wrapped live executor, step by step.
pub struct ReplayExecutor {
    live: StepExecutor,
}

impl ReplayExecutor {
    pub fn new(live: StepExecutor) -> Self {
        Self { live }
    }

    pub async fn execute_step(
        &mut self,
        scenario: &str,
        index: usize,
        step: &ScenarioStep,
        hint: Option<&StepHint>,
    ) -> StepResult {
        // Absent and passthrough hints take the live path, as do skipped
        // steps (the live executor short-circuits those). Kind/hint
        // mismatches cannot get past artifact validation, but a live run is
        // always a correct answer for them too.
        let usable = matches!(
            (step, hint),
            (ScenarioStep::Tap(_), Some(StepHint::Tap { .. }))
                | (_, Some(StepHint::Sleep { .. }))
                | (_, Some(StepHint::Scroll { .. }))
        ) && !matches!(step, ScenarioStep::Skipped { .. });

        let Some(hint) = hint.filter(|_| usable) else {
            return self.live.execute_step(scenario, index, step).await;
        };

        let started = Instant::now();
        let acted = self.apply_hint(hint).await;
        let duration_ms = started.elapsed().as_millis() as u64;

        match acted {
            Ok(message) => {
                self.live.settle().await;
                StepResult {
                    step: step.clone(),
                    status: StepStatus::Passed,
                    message,
                    duration_ms,
                    screenshot_path: None,
                }
            }
            Err(e) => {
                let screenshot_path = self.live.failure_screenshot(scenario, index).await;
                StepResult {
                    step: step.clone(),
                    status: StepStatus::Failed {
                        error: format!("{:#}", e),
                    },
                    message: None,
                    duration_ms,
                    screenshot_path,
                }
            }
        }
    }

    async fn apply_hint(&mut self, hint: &StepHint) -> anyhow::Result<Option<String>> {
        match hint {
            StepHint::Tap { x, y, strategy, .. } => {
                self.live.tap_point(*x, *y).await?;
                Ok(Some(format!(
                    "replayed tap at ({:.0}, {:.0}) [{} match]",
                    x, y, strategy
                )))
            }
            StepHint::Sleep { delay_ms } => {
                let delay = std::time::Duration::from_millis(*delay_ms)
                    + self.live.context().sleep_safety_buffer;
                tokio::time::sleep(delay).await;
                Ok(Some(format!("slept {}ms", delay.as_millis())))
            }
            StepHint::Scroll { direction, count } => {
                for _ in 0..*count {
                    self.live.swipe_direction(*direction).await?;
                }
                Ok(Some(format!("replayed {} scrolls", count)))
            }
            StepHint::Passthrough => unreachable!("passthrough dispatches to the live path"),
        }
    }
}
