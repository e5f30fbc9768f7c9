use std::path::{Path, PathBuf};
use std::time::Duration;

/// Runtime knobs for scenario execution. Constructed once at process start
/// and passed by reference; nothing here mutates mid-run.
#[derive(Debug, Clone)]
pub struct RunContext {
    /// Output directory for screenshots and reports.
    pub output_dir: PathBuf,
    /// Fixed pause after every non-skipped step, letting UI transitions and
    /// animations finish before the next step observes state.
    pub settle_delay: Duration,
    /// Interval between OCR polls inside wait_for and scroll_to.
    pub poll_interval: Duration,
    /// Overall wait_for deadline.
    pub wait_timeout: Duration,
    /// Maximum swipes a scroll_to will issue before giving up.
    pub scroll_max: u32,
    /// Added to every replayed sleep hint to absorb device speed variance.
    pub sleep_safety_buffer: Duration,
}

impl RunContext {
    pub fn new(output_dir: &Path) -> Self {
        let _ = std::fs::create_dir_all(output_dir);
        Self {
            output_dir: output_dir.to_path_buf(),
            settle_delay: Duration::from_millis(700),
            poll_interval: Duration::from_millis(500),
            wait_timeout: Duration::from_secs(10),
            scroll_max: 8,
            sleep_safety_buffer: Duration::from_millis(300),
        }
    }

    /// Screenshot path for a labeled step, derived from scenario name +
    /// label.
    pub fn screenshot_path(&self, scenario: &str, label: &str) -> PathBuf {
        let dir = self.output_dir.join("screenshots");
        let _ = std::fs::create_dir_all(&dir);
        dir.join(format!("{}_{}.png", sanitize(scenario), sanitize(label)))
    }

    /// Best-effort failure screenshot path.
    pub fn failure_screenshot_path(&self, scenario: &str, step_index: usize) -> PathBuf {
        let dir = self.output_dir.join("failures");
        let _ = std::fs::create_dir_all(&dir);
        dir.join(format!("{}_step{}.png", sanitize(scenario), step_index))
    }

    #[cfg(test)]
    pub fn fast_for_tests(output_dir: &Path) -> Self {
        Self {
            settle_delay: Duration::from_millis(0),
            poll_interval: Duration::from_millis(5),
            wait_timeout: Duration::from_millis(50),
            scroll_max: 4,
            sleep_safety_buffer: Duration::from_millis(0),
            ..Self::new(output_dir)
        }
    }
}

fn sanitize(name: &str) -> String {
    name.chars()
        .map(|c| if c.is_alphanumeric() { c } else { '_' })
        .collect()
}
