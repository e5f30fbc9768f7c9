//! Recorded-event log → scenario text.

use anyhow::{Context, Result};
use std::path::Path;

use super::event_recorder::{RecordedEvent, RecordedEventKind};

pub struct ScenarioWriter {
    pub name: String,
    pub description: String,
}

impl ScenarioWriter {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            description: format!(
                "Recorded on {}",
                chrono::Local::now().format("%Y-%m-%d %H:%M")
            ),
        }
    }

    pub fn render(&self, events: &[RecordedEvent]) -> String {
        let mut out = String::new();
        out.push_str(&format!("name: {}\n", self.name));
        out.push_str(&format!("description: {}\n", self.description));
        out.push_str("steps:\n");

        for event in events {
            match &event.kind {
                RecordedEventKind::Tap { x, y, label } => match label {
                    Some(l) => out.push_str(&format!("  - tap: \"{}\"\n", escape(l))),
                    None => out.push_str(&format!("  - tap: \"{:.0},{:.0}\"\n", x, y)),
                },
                RecordedEventKind::LongPress { x, y, label } => {
                    // The deterministic grammar has no long-press step; keep
                    // the gesture visible as a tap with a note.
                    out.push_str("  # recorded as a long press\n");
                    match label {
                        Some(l) => out.push_str(&format!("  - tap: \"{}\"\n", escape(l))),
                        None => out.push_str(&format!("  - tap: \"{:.0},{:.0}\"\n", x, y)),
                    }
                }
                RecordedEventKind::Swipe { direction } => {
                    out.push_str(&format!("  - swipe: \"{}\"\n", direction));
                }
                RecordedEventKind::Type { text } => {
                    out.push_str(&format!("  - type: \"{}\"\n", escape(text)));
                }
                RecordedEventKind::PressKey { key } => {
                    out.push_str(&format!("  - press_key: \"{}\"\n", key));
                }
            }
        }

        out
    }

    pub fn save(&self, events: &[RecordedEvent], path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).ok();
        }
        std::fs::write(path, self.render(events))
            .with_context(|| format!("failed to write scenario to {}", path.display()))
    }
}

fn escape(s: &str) -> String {
    s.replace('"', "\\\"")
}
