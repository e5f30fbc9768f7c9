//! Live-authoring event recorder.
//!
//! Listens passively to the global pointer/keyboard stream (delivered through
//! the registry), labels taps against a cached OCR pass, and produces the
//! ordered recorded-event log that scenario text is generated from.

use anyhow::Result;
use colored::Colorize;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Mutex;

use crate::bridge::traits::{
    DetectedElement, ScreenDescriber, SwipeDirection, WindowBridge, WindowInfo,
};

use super::classifier::{
    classify_gesture, has_non_shift_modifier, is_special_key, Gesture, KeyBuffer, Thresholds,
};

/// Maximum distance between a tap and a detected element for the element's
/// text to label the tap.
pub const LABEL_RADIUS_PX: f64 = 48.0;

#[derive(Debug, Clone, PartialEq)]
pub enum RecordedEventKind {
    Tap {
        x: f64,
        y: f64,
        label: Option<String>,
    },
    LongPress {
        x: f64,
        y: f64,
        label: Option<String>,
    },
    Swipe {
        direction: SwipeDirection,
    },
    Type {
        text: String,
    },
    PressKey {
        key: String,
    },
}

/// One recorded interaction. Exists only during recording; the sole input to
/// scenario-text generation.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedEvent {
    /// Milliseconds since recording started.
    pub at_ms: u64,
    pub kind: RecordedEventKind,
}

struct PendingDown {
    /// Window-relative down position.
    x: f64,
    y: f64,
    at: Instant,
}

/// Captures user interactions on the mirror window.
///
/// The geometry cache is refreshed on every event because the source window
/// may move or resize mid-recording. The OCR-element cache is refreshed only
/// on pointer-down, so the pointer-up labeling never re-runs OCR.
pub struct EventRecorder {
    bridge: Arc<dyn WindowBridge>,
    describer: Arc<dyn ScreenDescriber>,
    started: Instant,
    thresholds: Thresholds,
    window: Mutex<Option<WindowInfo>>,
    elements: Mutex<Vec<DetectedElement>>,
    pending_down: Mutex<Option<PendingDown>>,
    keys: Mutex<KeyBuffer>,
    events: Mutex<Vec<RecordedEvent>>,
}

impl EventRecorder {
    pub fn new(bridge: Arc<dyn WindowBridge>, describer: Arc<dyn ScreenDescriber>) -> Self {
        Self {
            bridge,
            describer,
            started: Instant::now(),
            thresholds: Thresholds::default(),
            window: Mutex::new(None),
            elements: Mutex::new(Vec::new()),
            pending_down: Mutex::new(None),
            keys: Mutex::new(KeyBuffer::default()),
            events: Mutex::new(Vec::new()),
        }
    }

    /// Pointer went down at a global screen position.
    pub async fn on_pointer_down(&self, global_x: f64, global_y: f64) {
        let window = self.refresh_window().await;

        let Some(win) = window else {
            *self.pending_down.lock().await = None;
            return;
        };
        if !win.contains(global_x, global_y) {
            // Interaction with some other app; the tap is listen-only and
            // must not interfere, so we just drop it.
            *self.pending_down.lock().await = None;
            return;
        }

        // One OCR pass per gesture, taken at down time so the up handler can
        // label without re-running recognition.
        match self.describer.describe().await {
            Ok(description) => *self.elements.lock().await = description.elements,
            Err(e) => log::warn!("OCR pass failed during recording: {}", e),
        }

        let (x, y) = win.to_window(global_x, global_y);
        *self.pending_down.lock().await = Some(PendingDown {
            x,
            y,
            at: Instant::now(),
        });
    }

    /// Pointer came up; classify and record the gesture.
    pub async fn on_pointer_up(&self, global_x: f64, global_y: f64) {
        let window = self.refresh_window().await;

        let Some(down) = self.pending_down.lock().await.take() else {
            return;
        };
        let Some(win) = window else { return };
        let (x, y) = win.to_window(global_x, global_y);

        let gesture = classify_gesture((down.x, down.y), (x, y), down.at.elapsed(), &self.thresholds);

        // Preserve event order: any typed text buffered before this gesture
        // belongs before it in the log.
        self.flush_typed().await;

        match gesture {
            Gesture::Tap => {
                let label = self.nearest_label(down.x, down.y).await;
                self.echo(&match &label {
                    Some(l) => format!("tap \"{}\"", l),
                    None => format!("tap at ({:.0}, {:.0})", down.x, down.y),
                });
                self.push(RecordedEventKind::Tap {
                    x: down.x,
                    y: down.y,
                    label,
                })
                .await;
            }
            Gesture::LongPress => {
                let label = self.nearest_label(down.x, down.y).await;
                self.echo(&match &label {
                    Some(l) => format!("long press \"{}\"", l),
                    None => format!("long press at ({:.0}, {:.0})", down.x, down.y),
                });
                self.push(RecordedEventKind::LongPress {
                    x: down.x,
                    y: down.y,
                    label,
                })
                .await;
            }
            Gesture::Swipe(direction) => {
                self.echo(&format!("swipe {}", direction));
                self.push(RecordedEventKind::Swipe { direction }).await;
            }
            Gesture::Ignored => {}
        }
    }

    /// A key event arrived. Printable characters coalesce into the typing
    /// buffer; special keys and modified keystrokes flush it and surface as
    /// discrete `press_key` events.
    pub async fn on_key(&self, name: &str, character: Option<char>, modifiers: &[String]) {
        self.refresh_window().await;

        if has_non_shift_modifier(modifiers) || is_special_key(name) {
            self.flush_typed().await;
            let key = if has_non_shift_modifier(modifiers) {
                let mut mods: Vec<&str> = modifiers
                    .iter()
                    .map(|m| m.as_str())
                    .filter(|m| *m != "shift")
                    .collect();
                mods.push(name);
                mods.join("+")
            } else {
                name.to_string()
            };
            self.echo(&format!("press_key \"{}\"", key));
            self.push(RecordedEventKind::PressKey { key }).await;
            return;
        }

        if let Some(c) = character {
            self.keys.lock().await.push(c);
        }
    }

    /// Stop recording. Flushes any pending typed text first, so trailing
    /// keystrokes are never lost, and returns the ordered log. Also the
    /// cancellation path: a Ctrl-C mid-recording returns the partial log.
    pub async fn stop(&self) -> Vec<RecordedEvent> {
        self.flush_typed().await;
        self.events.lock().await.clone()
    }

    async fn refresh_window(&self) -> Option<WindowInfo> {
        match self.bridge.window_info().await {
            Ok(info) => {
                *self.window.lock().await = info;
                info
            }
            Err(e) => {
                log::warn!("window geometry refresh failed: {}", e);
                *self.window.lock().await
            }
        }
    }

    async fn flush_typed(&self) {
        let flushed = self.keys.lock().await.flush();
        if let Some(text) = flushed {
            self.echo(&format!("type \"{}\"", mask_sensitive(&text)));
            self.push(RecordedEventKind::Type { text }).await;
        }
    }

    /// Euclidean nearest neighbor over the cached elements, within the label
    /// radius. Beyond the radius the tap stays coordinates-only.
    async fn nearest_label(&self, x: f64, y: f64) -> Option<String> {
        let elements = self.elements.lock().await;
        elements
            .iter()
            .map(|e| {
                let dx = e.x - x;
                let dy = e.y - y;
                (e, (dx * dx + dy * dy).sqrt())
            })
            .filter(|(_, d)| *d <= LABEL_RADIUS_PX)
            .min_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(std::cmp::Ordering::Equal))
            .map(|(e, _)| e.text.clone())
    }

    async fn push(&self, kind: RecordedEventKind) {
        self.events.lock().await.push(RecordedEvent {
            at_ms: self.started.elapsed().as_millis() as u64,
            kind,
        });
    }

    fn echo(&self, line: &str) {
        println!("  {} {}", "●".red(), line);
    }
}

/// Mask values that look like passwords or PINs in console echo. The written
/// scenario keeps the real text; only the live echo is masked.
fn mask_sensitive(text: &str) -> String {
    if text.len() > 2
        && (text.to_lowercase().contains("pass") || text.chars().all(|c| c.is_ascii_digit()))
    {
        "********".to_string()
    } else {
        text.to_string()
    }
}
