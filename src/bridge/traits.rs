use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Position and size of the mirror window on the desktop, in screen points.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WindowInfo {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl WindowInfo {
    pub fn contains(&self, global_x: f64, global_y: f64) -> bool {
        global_x >= self.x
            && global_x < self.x + self.width
            && global_y >= self.y
            && global_y < self.y + self.height
    }

    /// Convert a global screen coordinate to a window-relative one.
    pub fn to_window(&self, global_x: f64, global_y: f64) -> (f64, f64) {
        (global_x - self.x, global_y - self.y)
    }

    pub fn center(&self) -> (f64, f64) {
        (self.width / 2.0, self.height / 2.0)
    }
}

/// Connection state of the mirroring session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MirrorState {
    Connected,
    Paused,
    NoWindow,
    NotRunning,
}

impl MirrorState {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim() {
            "connected" => Some(Self::Connected),
            "paused" => Some(Self::Paused),
            "no-window" => Some(Self::NoWindow),
            "not-running" => Some(Self::NotRunning),
            _ => None,
        }
    }
}

/// Cardinal swipe direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SwipeDirection {
    Up,
    Down,
    Left,
    Right,
}

impl SwipeDirection {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "up" => Some(Self::Up),
            "down" => Some(Self::Down),
            "left" => Some(Self::Left),
            "right" => Some(Self::Right),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Up => "up",
            Self::Down => "down",
            Self::Left => "left",
            Self::Right => "right",
        }
    }
}

impl std::fmt::Display for SwipeDirection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One piece of text found by an OCR pass, with its tap point.
///
/// Ephemeral: regenerated on every pass, window-relative coordinates.
#[derive(Debug, Clone, PartialEq)]
pub struct DetectedElement {
    pub text: String,
    pub x: f64,
    pub y: f64,
    /// Recognition confidence in [0, 1].
    pub confidence: f32,
}

/// Result of a single text-recognition pass over the current frame.
#[derive(Debug, Clone, Default)]
pub struct ScreenDescription {
    pub elements: Vec<DetectedElement>,
    /// Base64-encoded PNG of the frame the elements were detected on.
    pub screenshot: Option<String>,
}

/// Result of a text-injection call.
#[derive(Debug, Clone, Default)]
pub struct TypeOutcome {
    pub success: bool,
    pub warning: Option<String>,
    pub error: Option<String>,
}

/// Window discovery and activation for the mirroring host app.
#[async_trait]
pub trait WindowBridge: Send + Sync {
    /// Current mirror window geometry, or None when no window is up.
    async fn window_info(&self) -> Result<Option<WindowInfo>>;

    async fn state(&self) -> Result<MirrorState>;

    /// Trigger a menu action in the host app. Returns false when the item
    /// does not exist or is disabled.
    async fn trigger_menu_action(&self, menu: &str, item: &str) -> Result<bool>;

    /// Bring the mirror window to the foreground, resuming if paused.
    async fn activate(&self) -> Result<()>;
}

/// Privileged input injection into the mirrored device.
///
/// All coordinates are window-relative points.
#[async_trait]
pub trait InputProvider: Send + Sync {
    async fn tap(&self, x: f64, y: f64) -> Result<()>;

    async fn double_tap(&self, x: f64, y: f64) -> Result<()>;

    async fn long_press(&self, x: f64, y: f64, duration_ms: u64) -> Result<()>;

    async fn swipe(&self, x1: f64, y1: f64, x2: f64, y2: f64, duration_ms: u64) -> Result<()>;

    async fn drag(&self, x1: f64, y1: f64, x2: f64, y2: f64) -> Result<()>;

    async fn type_text(&self, text: &str) -> Result<TypeOutcome>;

    /// Press a named key, e.g. "return", "escape", with optional modifiers
    /// such as "cmd" or "shift".
    async fn press_key(&self, name: &str, modifiers: &[String]) -> Result<()>;

    async fn launch_app(&self, name: &str) -> Result<()>;

    async fn open_url(&self, url: &str) -> Result<()>;

    async fn shake(&self) -> Result<()>;
}

/// Text recognition over the current frame. One OCR pass per call, no
/// internal caching.
#[async_trait]
pub trait ScreenDescriber: Send + Sync {
    async fn describe(&self) -> Result<ScreenDescription>;
}

/// Raw frame capture.
#[async_trait]
pub trait ScreenCapturer: Send + Sync {
    /// Capture the mirror window as a base64-encoded PNG.
    async fn capture_base64(&self) -> Result<String>;
}
