use std::path::PathBuf;

use crate::bridge::traits::SwipeDirection;

/// A parsed scenario file. Immutable once parsed; step order is append-only
/// and stable across parse, compile and replay.
#[derive(Debug, Clone, PartialEq)]
pub struct ScenarioDefinition {
    pub name: String,
    pub description: String,
    pub source_path: PathBuf,
    pub steps: Vec<ScenarioStep>,
}

/// The closed step grammar of the deterministic executor.
///
/// Keys the grammar does not understand (including the AI-oriented dialect:
/// `remember`, `condition`, `repeat`, `verify`, ...) parse into `Skipped`,
/// never into a parse error, so human- and AI-authored files share a format.
#[derive(Debug, Clone, PartialEq)]
pub enum ScenarioStep {
    /// Launch an app on the mirrored device.
    Launch(String),
    /// Tap the element matching a label, or a literal `"x,y"` point.
    Tap(String),
    /// Type text at the current focus.
    Type(String),
    /// Press a named key, optionally with `+`-joined modifiers.
    PressKey(String),
    /// Swipe in a cardinal direction.
    Swipe(String),
    /// Swipe repeatedly until a label becomes visible.
    ScrollTo(String),
    /// Poll until a label becomes visible, up to the context timeout.
    WaitFor(String),
    /// Single-pass visibility assertion against current state.
    AssertVisible(String),
    /// Single-pass absence assertion against current state.
    AssertNotVisible(String),
    /// Persist a screenshot under a label.
    Screenshot(String),
    /// Press the device home button.
    Home,
    /// Open a URL on the device.
    OpenUrl(String),
    /// Shake gesture.
    Shake,
    /// A step this executor does not run. Always short-circuits.
    Skipped { key: String, reason: String },
}

impl ScenarioStep {
    /// Stable step-type key, used for artifact validation and reporting.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Launch(_) => "launch",
            Self::Tap(_) => "tap",
            Self::Type(_) => "type",
            Self::PressKey(_) => "press_key",
            Self::Swipe(_) => "swipe",
            Self::ScrollTo(_) => "scroll_to",
            Self::WaitFor(_) => "wait_for",
            Self::AssertVisible(_) => "assert_visible",
            Self::AssertNotVisible(_) => "assert_not_visible",
            Self::Screenshot(_) => "screenshot",
            Self::Home => "home",
            Self::OpenUrl(_) => "open_url",
            Self::Shake => "shake",
            Self::Skipped { .. } => "skipped",
        }
    }

    pub fn label(&self) -> Option<&str> {
        match self {
            Self::Launch(v)
            | Self::Tap(v)
            | Self::Type(v)
            | Self::PressKey(v)
            | Self::Swipe(v)
            | Self::ScrollTo(v)
            | Self::WaitFor(v)
            | Self::AssertVisible(v)
            | Self::AssertNotVisible(v)
            | Self::Screenshot(v)
            | Self::OpenUrl(v) => Some(v),
            Self::Home | Self::Shake => None,
            Self::Skipped { key, .. } => Some(key),
        }
    }

    /// Console display form, e.g. `tap "Wi-Fi"`.
    pub fn display_name(&self) -> String {
        match self.label() {
            Some(label) => format!("{} \"{}\"", self.kind(), label),
            None => self.kind().to_string(),
        }
    }
}

/// Parse a `"x,y"` coordinate label. Recorder output for taps that hit no
/// detected element.
pub fn parse_point(label: &str) -> Option<(f64, f64)> {
    let (x, y) = label.split_once(',')?;
    Some((x.trim().parse().ok()?, y.trim().parse().ok()?))
}

/// Parse a swipe direction keyword.
pub fn parse_direction(value: &str) -> Option<SwipeDirection> {
    SwipeDirection::parse(value)
}
