//! Fuzzy text matching over detected on-screen elements.

use serde::{Deserialize, Serialize};

use super::traits::DetectedElement;

/// How a label was matched against a candidate element. Recorded in compiled
/// artifacts so replay can report which strategy originally hit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MatchStrategy {
    Exact,
    CaseInsensitive,
    Substring,
    ReverseSubstring,
}

impl MatchStrategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Exact => "exact",
            Self::CaseInsensitive => "case-insensitive",
            Self::Substring => "substring",
            Self::ReverseSubstring => "reverse-substring",
        }
    }
}

impl std::fmt::Display for MatchStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Find the best element for a label. Priority, stopping at the first hit:
/// exact equality, case-insensitive equality, label contained in candidate
/// text, candidate text contained in label. Deterministic given a stable
/// input ordering.
pub fn best_match<'a>(
    label: &str,
    elements: &'a [DetectedElement],
) -> Option<(&'a DetectedElement, MatchStrategy)> {
    let label_lower = label.to_lowercase();

    if let Some(el) = elements.iter().find(|e| e.text == label) {
        return Some((el, MatchStrategy::Exact));
    }
    if let Some(el) = elements.iter().find(|e| e.text.to_lowercase() == label_lower) {
        return Some((el, MatchStrategy::CaseInsensitive));
    }
    if let Some(el) = elements
        .iter()
        .find(|e| e.text.to_lowercase().contains(&label_lower))
    {
        return Some((el, MatchStrategy::Substring));
    }
    if let Some(el) = elements.iter().find(|e| {
        let text_lower = e.text.to_lowercase();
        !text_lower.is_empty() && label_lower.contains(&text_lower)
    }) {
        return Some((el, MatchStrategy::ReverseSubstring));
    }

    None
}

/// Diagnostic message for a miss. Enumerates everything that was actually
/// visible so the failure can be understood without re-running.
pub fn not_found_message(label: &str, elements: &[DetectedElement]) -> String {
    if elements.is_empty() {
        return format!("\"{}\" not found: no text detected on screen", label);
    }
    let visible: Vec<String> = elements
        .iter()
        .map(|e| format!("\"{}\"", e.text))
        .collect();
    format!(
        "\"{}\" not found. Visible elements: [{}]",
        label,
        visible.join(", ")
    )
}
