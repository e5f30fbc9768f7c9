//! Live-mode step executor: capture state, act, verify, settle.

use anyhow::{anyhow, Context, Result};
use base64::Engine;
use std::sync::Arc;
use std::time::Instant;

use crate::bridge::matcher::{self, MatchStrategy};
use crate::bridge::traits::{
    InputProvider, ScreenCapturer, ScreenDescriber, SwipeDirection, WindowBridge, WindowInfo,
};
use crate::bridge::Capabilities;
use crate::parser::types::{parse_direction, parse_point};
use crate::parser::ScenarioStep;

use super::context::RunContext;
use super::state::{StepResult, StepStatus};

/// What a tap actually hit, kept for the compiler to bake into hints.
#[derive(Debug, Clone)]
pub struct TapObservation {
    pub x: f64,
    pub y: f64,
    pub confidence: f32,
    pub strategy: MatchStrategy,
}

pub struct StepExecutor {
    bridge: Arc<dyn WindowBridge>,
    input: Arc<dyn InputProvider>,
    describer: Arc<dyn ScreenDescriber>,
    capturer: Arc<dyn ScreenCapturer>,
    context: RunContext,
    last_tap: Option<TapObservation>,
}

impl StepExecutor {
    pub fn new(capabilities: Capabilities, context: RunContext) -> Self {
        Self {
            bridge: capabilities.bridge,
            input: capabilities.input,
            describer: capabilities.describer,
            capturer: capabilities.capturer,
            context,
            last_tap: None,
        }
    }

    pub fn context(&self) -> &RunContext {
        &self.context
    }

    /// The OCR observation of the most recent tap step, if it went through
    /// element matching (coordinate taps leave this unset).
    pub fn last_tap(&self) -> Option<&TapObservation> {
        self.last_tap.as_ref()
    }

    /// Execute one step. Never returns an error: failures are data, and a
    /// failure stops the scenario at the orchestration layer.
    pub async fn execute_step(
        &mut self,
        scenario: &str,
        index: usize,
        step: &ScenarioStep,
    ) -> StepResult {
        if let ScenarioStep::Skipped { reason, .. } = step {
            return StepResult {
                step: step.clone(),
                status: StepStatus::Skipped {
                    reason: reason.clone(),
                },
                message: None,
                duration_ms: 0,
                screenshot_path: None,
            };
        }

        self.last_tap = None;
        let started = Instant::now();
        let acted = self.act(scenario, step).await;
        // Duration covers act + verify only; the settling delay is a fixed
        // constant the compiler must not bake into sleep hints.
        let duration_ms = started.elapsed().as_millis() as u64;

        match acted {
            Ok(message) => {
                self.settle().await;
                StepResult {
                    step: step.clone(),
                    status: StepStatus::Passed,
                    message,
                    duration_ms,
                    screenshot_path: None,
                }
            }
            Err(e) => {
                let screenshot_path = self.failure_screenshot(scenario, index).await;
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

    async fn act(&mut self, scenario: &str, step: &ScenarioStep) -> Result<Option<String>> {
        match step {
            ScenarioStep::Launch(app) => {
                self.input.launch_app(app).await?;
                Ok(Some(format!("launched {}", app)))
            }
            ScenarioStep::OpenUrl(url) => {
                self.input.open_url(url).await?;
                Ok(None)
            }
            ScenarioStep::Shake => {
                self.input.shake().await?;
                Ok(None)
            }
            ScenarioStep::Home => {
                self.input.press_key("home", &[]).await?;
                Ok(None)
            }
            ScenarioStep::PressKey(spec) => {
                let (key, modifiers) = split_key_spec(spec);
                self.input.press_key(key, &modifiers).await?;
                Ok(None)
            }
            ScenarioStep::Type(text) => {
                let outcome = self.input.type_text(text).await?;
                if let Some(error) = outcome.error {
                    return Err(anyhow!("text injection failed: {}", error));
                }
                if !outcome.success {
                    return Err(anyhow!("text injection reported failure"));
                }
                Ok(outcome.warning.map(|w| format!("warning: {}", w)))
            }
            ScenarioStep::Tap(label) => self.do_tap(label).await,
            ScenarioStep::WaitFor(label) => self.do_wait_for(label).await,
            ScenarioStep::AssertVisible(label) => {
                let description = self.describer.describe().await?;
                match matcher::best_match(label, &description.elements) {
                    Some(_) => Ok(Some(format!("\"{}\" is visible", label))),
                    None => Err(anyhow!(
                        "{}",
                        matcher::not_found_message(label, &description.elements)
                    )),
                }
            }
            ScenarioStep::AssertNotVisible(label) => {
                let description = self.describer.describe().await?;
                match matcher::best_match(label, &description.elements) {
                    Some((el, _)) => Err(anyhow!(
                        "\"{}\" is still visible (matched \"{}\")",
                        label,
                        el.text
                    )),
                    None => Ok(Some(format!("\"{}\" is not visible", label))),
                }
            }
            ScenarioStep::Swipe(direction) => {
                let direction = parse_direction(direction)
                    .ok_or_else(|| anyhow!("unknown swipe direction: {:?}", direction))?;
                self.swipe_direction(direction).await?;
                Ok(None)
            }
            ScenarioStep::ScrollTo(label) => self.do_scroll_to(label).await,
            ScenarioStep::Screenshot(label) => {
                let path = self.context.screenshot_path(scenario, label);
                self.persist_screenshot(&path).await?;
                Ok(Some(format!("saved {}", path.display())))
            }
            ScenarioStep::Skipped { .. } => unreachable!("skipped steps short-circuit earlier"),
        }
    }

    async fn do_tap(&mut self, label: &str) -> Result<Option<String>> {
        // Literal "x,y" labels tap a recorded point without OCR.
        if let Some((x, y)) = parse_point(label) {
            self.input.tap(x, y).await?;
            return Ok(Some(format!("tapped point ({:.0}, {:.0})", x, y)));
        }

        let description = self.describer.describe().await?;
        let (element, strategy) = matcher::best_match(label, &description.elements)
            .ok_or_else(|| anyhow!("{}", matcher::not_found_message(label, &description.elements)))?;

        self.input.tap(element.x, element.y).await?;
        self.last_tap = Some(TapObservation {
            x: element.x,
            y: element.y,
            confidence: element.confidence,
            strategy,
        });
        Ok(Some(format!(
            "tapped \"{}\" at ({:.0}, {:.0}) [{} match]",
            element.text, element.x, element.y, strategy
        )))
    }

    /// Poll until the label is detected. Passes as soon as it shows up, not
    /// only after the full timeout elapses.
    async fn do_wait_for(&self, label: &str) -> Result<Option<String>> {
        let started = Instant::now();
        loop {
            let description = self.describer.describe().await?;
            if matcher::best_match(label, &description.elements).is_some() {
                return Ok(Some(format!(
                    "appeared after {}ms",
                    started.elapsed().as_millis()
                )));
            }
            if started.elapsed() >= self.context.wait_timeout {
                return Err(anyhow!(
                    "\"{}\" did not appear within {}ms. {}",
                    label,
                    self.context.wait_timeout.as_millis(),
                    matcher::not_found_message(label, &description.elements)
                ));
            }
            tokio::time::sleep(self.context.poll_interval).await;
        }
    }

    /// Swipe until the label is visible. The pass message carries the scroll
    /// count for the compiler ("already visible" means zero).
    async fn do_scroll_to(&mut self, label: &str) -> Result<Option<String>> {
        let description = self.describer.describe().await?;
        if matcher::best_match(label, &description.elements).is_some() {
            return Ok(Some("already visible".to_string()));
        }

        let mut last_elements = description.elements;
        for attempt in 1..=self.context.scroll_max {
            self.swipe_direction(SwipeDirection::Up).await?;
            tokio::time::sleep(self.context.poll_interval).await;

            let description = self.describer.describe().await?;
            if matcher::best_match(label, &description.elements).is_some() {
                return Ok(Some(format!("found \"{}\" after {} scrolls", label, attempt)));
            }
            last_elements = description.elements;
        }

        Err(anyhow!(
            "\"{}\" not found after {} scrolls. {}",
            label,
            self.context.scroll_max,
            matcher::not_found_message(label, &last_elements)
        ))
    }

    /// Direction swipe from the window center; vector length is 30% of the
    /// window height regardless of axis.
    pub(crate) async fn swipe_direction(&self, direction: SwipeDirection) -> Result<()> {
        let info = self
            .bridge
            .window_info()
            .await?
            .ok_or_else(|| anyhow!("mirror window is not available"))?;
        let (x1, y1, x2, y2) = swipe_vector(&info, direction);
        self.input.swipe(x1, y1, x2, y2, 250).await
    }

    pub(crate) async fn tap_point(&self, x: f64, y: f64) -> Result<()> {
        self.input.tap(x, y).await
    }

    pub(crate) async fn window_info(&self) -> Result<Option<WindowInfo>> {
        self.bridge.window_info().await
    }

    pub(crate) async fn settle(&self) {
        tokio::time::sleep(self.context.settle_delay).await;
    }

    async fn persist_screenshot(&self, path: &std::path::Path) -> Result<()> {
        let b64 = self.capturer.capture_base64().await?;
        let bytes = base64::engine::general_purpose::STANDARD
            .decode(b64.trim())
            .context("screenshot is not valid base64")?;
        let img = image::load_from_memory(&bytes).context("screenshot is not a decodable image")?;
        img.save(path)
            .with_context(|| format!("failed to write screenshot to {}", path.display()))?;
        Ok(())
    }

    /// Best-effort diagnostic capture on failure; its own failure is logged
    /// and otherwise swallowed.
    pub(crate) async fn failure_screenshot(
        &self,
        scenario: &str,
        step_index: usize,
    ) -> Option<String> {
        let path = self.context.failure_screenshot_path(scenario, step_index);
        match self.persist_screenshot(&path).await {
            Ok(()) => Some(path.display().to_string()),
            Err(e) => {
                log::warn!("failure screenshot failed: {:#}", e);
                None
            }
        }
    }
}

pub(crate) fn swipe_vector(
    info: &WindowInfo,
    direction: SwipeDirection,
) -> (f64, f64, f64, f64) {
    let (cx, cy) = info.center();
    let half = info.height * 0.3 / 2.0;
    match direction {
        SwipeDirection::Up => (cx, cy + half, cx, cy - half),
        SwipeDirection::Down => (cx, cy - half, cx, cy + half),
        SwipeDirection::Left => (cx + half, cy, cx - half, cy),
        SwipeDirection::Right => (cx - half, cy, cx + half, cy),
    }
}

fn split_key_spec(spec: &str) -> (&str, Vec<String>) {
    match spec.rsplit_once('+') {
        Some((mods, key)) if !key.is_empty() => (
            key,
            mods.split('+').map(|m| m.trim().to_string()).collect(),
        ),
        _ => (spec, Vec::new()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bridge::testkit::*;
    use crate::runner::state::StepStatus;

    fn executor(
        frames: Vec<Vec<crate::bridge::traits::DetectedElement>>,
        dir: &std::path::Path,
    ) -> (StepExecutor, Arc<RecordingInput>, Arc<ScriptedDescriber>) {
        let input = Arc::new(RecordingInput::default());
        let describer = Arc::new(ScriptedDescriber::new(frames));
        let caps = Capabilities {
            bridge: Arc::new(StaticBridge::default()),
            input: input.clone(),
            describer: describer.clone(),
            capturer: Arc::new(TinyCapturer),
        };
        let exec = StepExecutor::new(caps, RunContext::fast_for_tests(dir));
        (exec, input, describer)
    }

    #[tokio::test]
    async fn launch_tap_assert_fails_exactly_at_third_step() {
        let dir = tempfile::tempdir().unwrap();
        // Frame for the tap has Wi-Fi; the frame after the tap does not.
        let (mut exec, _input, _) = executor(
            vec![
                vec![element("Wi-Fi", 200.0, 300.0), element("General", 200.0, 360.0)],
                vec![element("General", 200.0, 360.0)],
            ],
            dir.path(),
        );

        let steps = [
            crate::parser::ScenarioStep::Launch("Settings".to_string()),
            crate::parser::ScenarioStep::Tap("Wi-Fi".to_string()),
            crate::parser::ScenarioStep::AssertVisible("Wi-Fi".to_string()),
        ];

        let mut results = Vec::new();
        for (i, step) in steps.iter().enumerate() {
            results.push(exec.execute_step("settings", i, step).await);
        }

        assert_eq!(results[0].status, StepStatus::Passed);
        assert_eq!(results[1].status, StepStatus::Passed);
        match &results[2].status {
            StepStatus::Failed { error } => {
                // Diagnosable without re-running: everything visible is named.
                assert!(error.contains("\"General\""), "error was: {}", error);
            }
            other => panic!("expected failure, got {:?}", other),
        }
        // Failure screenshot captured alongside.
        assert!(results[2].screenshot_path.is_some());
    }

    #[tokio::test]
    async fn tap_miss_enumerates_visible_elements() {
        let dir = tempfile::tempdir().unwrap();
        let (mut exec, input, _) = executor(
            vec![vec![element("Bluetooth", 10.0, 10.0), element("General", 10.0, 40.0)]],
            dir.path(),
        );

        let result = exec
            .execute_step("s", 0, &crate::parser::ScenarioStep::Tap("Wi-Fi".to_string()))
            .await;
        match result.status {
            StepStatus::Failed { error } => {
                assert!(error.contains("\"Bluetooth\""));
                assert!(error.contains("\"General\""));
            }
            other => panic!("expected failure, got {:?}", other),
        }
        assert_eq!(input.count_of("tap"), 0);
    }

    #[tokio::test]
    async fn tap_records_observation_for_the_compiler() {
        let dir = tempfile::tempdir().unwrap();
        let (mut exec, input, _) = executor(vec![vec![element("Wi-Fi", 200.0, 300.0)]], dir.path());

        let result = exec
            .execute_step("s", 0, &crate::parser::ScenarioStep::Tap("wi-fi".to_string()))
            .await;
        assert_eq!(result.status, StepStatus::Passed);
        assert_eq!(input.calls(), vec!["tap 200 300"]);

        let obs = exec.last_tap().unwrap();
        assert_eq!((obs.x, obs.y), (200.0, 300.0));
        assert_eq!(obs.strategy, MatchStrategy::CaseInsensitive);
    }

    #[tokio::test]
    async fn coordinate_tap_skips_ocr() {
        let dir = tempfile::tempdir().unwrap();
        let (mut exec, input, describer) = executor(vec![], dir.path());

        let result = exec
            .execute_step("s", 0, &crate::parser::ScenarioStep::Tap("120,240".to_string()))
            .await;
        assert_eq!(result.status, StepStatus::Passed);
        assert_eq!(describer.pass_count(), 0);
        assert_eq!(input.calls(), vec!["tap 120 240"]);
        assert!(exec.last_tap().is_none());
    }

    #[tokio::test]
    async fn wait_for_passes_as_soon_as_detected() {
        let dir = tempfile::tempdir().unwrap();
        let (mut exec, _, describer) = executor(
            vec![vec![], vec![], vec![element("Done", 10.0, 10.0)]],
            dir.path(),
        );

        let result = exec
            .execute_step("s", 0, &crate::parser::ScenarioStep::WaitFor("Done".to_string()))
            .await;
        assert_eq!(result.status, StepStatus::Passed);
        assert!(result.message.unwrap().contains("appeared after"));
        assert_eq!(describer.pass_count(), 3);
    }

    #[tokio::test]
    async fn wait_for_times_out() {
        let dir = tempfile::tempdir().unwrap();
        let (mut exec, _, _) = executor(vec![vec![]], dir.path());

        let result = exec
            .execute_step("s", 0, &crate::parser::ScenarioStep::WaitFor("Never".to_string()))
            .await;
        match result.status {
            StepStatus::Failed { error } => assert!(error.contains("did not appear")),
            other => panic!("expected failure, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn unknown_swipe_direction_fails() {
        let dir = tempfile::tempdir().unwrap();
        let (mut exec, input, _) = executor(vec![], dir.path());

        let result = exec
            .execute_step("s", 0, &crate::parser::ScenarioStep::Swipe("sideways".to_string()))
            .await;
        assert!(result.status.is_failed());
        assert_eq!(input.count_of("swipe"), 0);
    }

    #[tokio::test]
    async fn swipe_vector_is_30_percent_of_window_height() {
        // 800-high window: vector length 240 around the center.
        let info = WindowInfo {
            x: 0.0,
            y: 0.0,
            width: 400.0,
            height: 800.0,
        };
        let (x1, y1, x2, y2) = swipe_vector(&info, SwipeDirection::Up);
        assert_eq!((x1, x2), (200.0, 200.0));
        assert_eq!(y1 - y2, 240.0);
    }

    #[tokio::test]
    async fn scroll_to_already_visible_issues_no_swipes() {
        let dir = tempfile::tempdir().unwrap();
        let (mut exec, input, _) =
            executor(vec![vec![element("Advanced", 10.0, 700.0)]], dir.path());

        let result = exec
            .execute_step("s", 0, &crate::parser::ScenarioStep::ScrollTo("Advanced".to_string()))
            .await;
        assert_eq!(result.status, StepStatus::Passed);
        assert_eq!(result.message.as_deref(), Some("already visible"));
        assert_eq!(input.count_of("swipe"), 0);
    }

    #[tokio::test]
    async fn scroll_to_counts_swipes_in_its_message() {
        let dir = tempfile::tempdir().unwrap();
        let (mut exec, input, _) = executor(
            vec![vec![], vec![], vec![element("Advanced", 10.0, 700.0)]],
            dir.path(),
        );

        let result = exec
            .execute_step("s", 0, &crate::parser::ScenarioStep::ScrollTo("Advanced".to_string()))
            .await;
        assert_eq!(result.status, StepStatus::Passed);
        assert_eq!(
            result.message.as_deref(),
            Some("found \"Advanced\" after 2 scrolls")
        );
        assert_eq!(input.count_of("swipe"), 2);
    }

    #[tokio::test]
    async fn skipped_steps_never_touch_the_device() {
        let dir = tempfile::tempdir().unwrap();
        let (mut exec, input, describer) = executor(vec![], dir.path());

        let step = crate::parser::ScenarioStep::Skipped {
            key: "remember".to_string(),
            reason: "requires the AI interpreter".to_string(),
        };
        let result = exec.execute_step("s", 0, &step).await;
        assert!(matches!(result.status, StepStatus::Skipped { .. }));
        assert!(input.calls().is_empty());
        assert_eq!(describer.pass_count(), 0);
    }

    #[tokio::test]
    async fn screenshot_persists_a_png() {
        let dir = tempfile::tempdir().unwrap();
        let (mut exec, _, _) = executor(vec![], dir.path());

        let result = exec
            .execute_step(
                "wifi check",
                0,
                &crate::parser::ScenarioStep::Screenshot("after-login".to_string()),
            )
            .await;
        assert_eq!(result.status, StepStatus::Passed);
        let path = dir.path().join("screenshots").join("wifi_check_after_login.png");
        assert!(path.exists());
    }

    #[test]
    fn key_spec_splits_modifiers() {
        assert_eq!(split_key_spec("return"), ("return", vec![]));
        let (key, mods) = split_key_spec("cmd+shift+tab");
        assert_eq!(key, "tab");
        assert_eq!(mods, vec!["cmd".to_string(), "shift".to_string()]);
    }
}
