//! Pure gesture and keystroke classification.
//!
//! No I/O, no state beyond the keyboard coalescing buffer: the recorder feeds
//! raw positions and hold durations in, semantic gestures come out.

use std::time::Duration;

use crate::bridge::traits::SwipeDirection;

/// Classification thresholds, in window points.
#[derive(Debug, Clone, Copy)]
pub struct Thresholds {
    /// Below this displacement a gesture is a tap or long press.
    pub tap_px: f64,
    /// At or above this displacement a gesture is a swipe.
    pub swipe_px: f64,
    /// Hold at least this long (with little movement) for a long press.
    pub long_press: Duration,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            tap_px: 10.0,
            swipe_px: 100.0,
            long_press: Duration::from_millis(500),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Gesture {
    Tap,
    LongPress,
    Swipe(SwipeDirection),
    Ignored,
}

/// Classify one pointer gesture from its down/up positions and hold time.
///
/// Displacements between the tap and swipe thresholds are treated as an
/// imprecise tap: pointing jitter must not turn a deliberate tap into a
/// dropped event, and a gesture is never ignored on distance alone.
pub fn classify_gesture(
    down: (f64, f64),
    up: (f64, f64),
    hold: Duration,
    t: &Thresholds,
) -> Gesture {
    let dx = up.0 - down.0;
    let dy = up.1 - down.1;
    let d = (dx * dx + dy * dy).sqrt();

    if d < t.tap_px {
        if hold >= t.long_press {
            return Gesture::LongPress;
        }
        return Gesture::Tap;
    }

    if d >= t.swipe_px {
        // Direction is the axis of the larger displacement; the sign picks
        // the cardinal (screen y grows downward).
        let direction = if dx.abs() >= dy.abs() {
            if dx > 0.0 {
                SwipeDirection::Right
            } else {
                SwipeDirection::Left
            }
        } else if dy > 0.0 {
            SwipeDirection::Down
        } else {
            SwipeDirection::Up
        };
        return Gesture::Swipe(direction);
    }

    Gesture::Tap
}

/// Keys that always flush the typing buffer and surface as a discrete
/// `press_key` event.
const SPECIAL_KEYS: &[&str] = &[
    "return", "escape", "tab", "delete", "space", "up", "down", "left", "right",
];

pub fn is_special_key(name: &str) -> bool {
    SPECIAL_KEYS.contains(&name)
}

/// True when any modifier other than shift is held. A modified keystroke can
/// never be silently merged into adjacent typed text.
pub fn has_non_shift_modifier(modifiers: &[String]) -> bool {
    modifiers.iter().any(|m| m != "shift")
}

/// Coalesces printable keystrokes into a single typed-text event.
#[derive(Debug, Default)]
pub struct KeyBuffer {
    text: String,
}

impl KeyBuffer {
    pub fn push(&mut self, c: char) {
        self.text.push(c);
    }

    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }

    /// Take the buffered text, if any.
    pub fn flush(&mut self) -> Option<String> {
        if self.text.is_empty() {
            None
        } else {
            Some(std::mem::take(&mut self.text))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn t() -> Thresholds {
        Thresholds::default()
    }

    #[test]
    fn still_short_hold_is_a_tap() {
        let g = classify_gesture((50.0, 50.0), (50.0, 50.0), Duration::from_millis(100), &t());
        assert_eq!(g, Gesture::Tap);
    }

    #[test]
    fn still_long_hold_is_a_long_press() {
        let g = classify_gesture((50.0, 50.0), (50.0, 50.0), Duration::from_millis(1000), &t());
        assert_eq!(g, Gesture::LongPress);
    }

    #[test]
    fn horizontal_displacement_is_swipe_right() {
        let g = classify_gesture((0.0, 0.0), (200.0, 0.0), Duration::from_millis(50), &t());
        assert_eq!(g, Gesture::Swipe(SwipeDirection::Right));
    }

    #[test]
    fn upward_displacement_is_swipe_up() {
        let g = classify_gesture((0.0, 200.0), (0.0, 0.0), Duration::from_millis(50), &t());
        assert_eq!(g, Gesture::Swipe(SwipeDirection::Up));
    }

    #[test]
    fn jitter_between_thresholds_is_an_imprecise_tap() {
        let g = classify_gesture((0.0, 0.0), (40.0, 0.0), Duration::from_millis(50), &t());
        assert_eq!(g, Gesture::Tap);
    }

    #[test]
    fn long_hold_with_swipe_distance_is_still_a_swipe() {
        let g = classify_gesture((0.0, 0.0), (0.0, 300.0), Duration::from_millis(900), &t());
        assert_eq!(g, Gesture::Swipe(SwipeDirection::Down));
    }

    #[test]
    fn key_buffer_coalesces_and_flushes_once() {
        let mut buf = KeyBuffer::default();
        buf.push('h');
        buf.push('i');
        assert_eq!(buf.flush(), Some("hi".to_string()));
        assert_eq!(buf.flush(), None);
    }

    #[test]
    fn special_key_table() {
        assert!(is_special_key("return"));
        assert!(is_special_key("left"));
        assert!(!is_special_key("a"));
    }

    #[test]
    fn shift_alone_is_not_a_flushing_modifier() {
        assert!(!has_non_shift_modifier(&["shift".to_string()]));
        assert!(has_non_shift_modifier(&[
            "shift".to_string(),
            "cmd".to_string()
        ]));
    }
}
