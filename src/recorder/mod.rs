//! Live scenario authoring.
//!
//! This module provides:
//! - pure gesture/keystroke classification
//! - the event recorder that labels gestures against a cached OCR pass
//! - the registry the OS event tap dispatches through
//! - scenario-text generation from the recorded log

pub mod classifier;
pub mod event_recorder;
pub mod registry;
pub mod scenario_writer;

pub use event_recorder::{EventRecorder, RecordedEvent, RecordedEventKind};
pub use scenario_writer::ScenarioWriter;
