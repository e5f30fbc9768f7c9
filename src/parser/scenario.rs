//! Line-oriented scenario parser.
//!
//! ```text
//! name: Wi-Fi toggle
//! description: Open settings and check Wi-Fi
//! steps:
//!   - launch: "Settings"
//!   - tap: "Wi-Fi"
//!   - assert_visible: "Wi-Fi"
//!   - home
//! ```
//!
//! `${VAR}` / `${VAR:-default}` placeholders are substituted from the process
//! environment before any line is inspected.

use once_cell::sync::Lazy;
use regex::Regex;
use std::path::Path;

use crate::error::EngineError;

use super::types::{ScenarioDefinition, ScenarioStep};

/// Keys belonging to the AI/operator dialect. The deterministic grammar
/// never lowers these; they parse as skipped steps.
const AI_ONLY_KEYS: &[&str] = &["remember", "condition", "repeat", "verify", "measure"];

static VAR_PATTERN: Lazy<Regex> = Lazy::new(|| {
    // ${NAME} or ${NAME:-default}
    Regex::new(r"\$\{([A-Za-z_][A-Za-z0-9_]*)(?::-([^}]*))?\}").unwrap()
});

/// Substitute `${VAR}` / `${VAR:-default}` from the environment. Unset
/// variables without a default are left as-is so the miss is visible in the
/// parsed output.
pub fn substitute_env(text: &str) -> String {
    VAR_PATTERN
        .replace_all(text, |caps: &regex::Captures| {
            match std::env::var(&caps[1]) {
                Ok(val) => val,
                Err(_) => match caps.get(2) {
                    Some(default) => default.as_str().to_string(),
                    None => caps[0].to_string(),
                },
            }
        })
        .to_string()
}

pub fn parse_scenario_file(path: &Path) -> Result<ScenarioDefinition, EngineError> {
    let raw = std::fs::read_to_string(path).map_err(|e| EngineError::Parse {
        path: path.to_path_buf(),
        line: 0,
        message: format!("cannot read file: {}", e),
    })?;
    parse_scenario_text(&raw, path)
}

pub fn parse_scenario_text(raw: &str, path: &Path) -> Result<ScenarioDefinition, EngineError> {
    let text = substitute_env(raw);

    let mut name = String::new();
    let mut description = String::new();
    let mut steps: Vec<ScenarioStep> = Vec::new();
    let mut in_steps = false;

    let err = |line: usize, message: String| EngineError::Parse {
        path: path.to_path_buf(),
        line,
        message,
    };

    for (idx, raw_line) in text.lines().enumerate() {
        let line_no = idx + 1;
        let line = raw_line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        if !in_steps {
            if line == "steps:" {
                in_steps = true;
            } else if let Some(rest) = line.strip_prefix("name:") {
                name = strip_quotes(rest.trim()).to_string();
            } else if let Some(rest) = line.strip_prefix("description:") {
                description = strip_quotes(rest.trim()).to_string();
            } else {
                return Err(err(
                    line_no,
                    format!("unexpected line before steps: {:?}", line),
                ));
            }
            continue;
        }

        let entry = line.strip_prefix("- ").unwrap_or(line).trim();
        steps.push(parse_step(entry, line_no, &err)?);
    }

    if !in_steps {
        return Err(err(0, "missing steps: section".to_string()));
    }
    if steps.is_empty() {
        return Err(err(0, "scenario has no steps".to_string()));
    }

    if name.is_empty() {
        name = path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("unnamed")
            .to_string();
    }

    Ok(ScenarioDefinition {
        name,
        description,
        source_path: path.to_path_buf(),
        steps,
    })
}

fn parse_step(
    entry: &str,
    line_no: usize,
    err: &impl Fn(usize, String) -> EngineError,
) -> Result<ScenarioStep, EngineError> {
    // Bare keywords first.
    match entry {
        "home" => return Ok(ScenarioStep::Home),
        "shake" => return Ok(ScenarioStep::Shake),
        _ => {}
    }

    let Some((key, raw_value)) = entry.split_once(':') else {
        if entry.is_empty() {
            return Err(err(line_no, "empty step line".to_string()));
        }
        // Bare keywords outside the grammar are skipped, never fatal.
        let reason = if AI_ONLY_KEYS.contains(&entry) {
            "requires the AI interpreter"
        } else {
            "unsupported step key"
        };
        return Ok(ScenarioStep::Skipped {
            key: entry.to_string(),
            reason: reason.to_string(),
        });
    };
    let key = key.trim();
    let value = strip_quotes(raw_value.trim()).to_string();

    let requires_value = |v: &str| -> Result<(), EngineError> {
        if v.is_empty() {
            Err(err(line_no, format!("step `{}` requires a value", key)))
        } else {
            Ok(())
        }
    };

    let step = match key {
        "launch" => {
            requires_value(&value)?;
            ScenarioStep::Launch(value)
        }
        "tap" => {
            requires_value(&value)?;
            ScenarioStep::Tap(value)
        }
        "type" => {
            requires_value(&value)?;
            ScenarioStep::Type(value)
        }
        "press_key" => {
            requires_value(&value)?;
            ScenarioStep::PressKey(value)
        }
        "swipe" => {
            requires_value(&value)?;
            ScenarioStep::Swipe(value)
        }
        "scroll_to" => {
            requires_value(&value)?;
            ScenarioStep::ScrollTo(value)
        }
        "wait_for" => {
            requires_value(&value)?;
            ScenarioStep::WaitFor(value)
        }
        "assert_visible" => {
            requires_value(&value)?;
            ScenarioStep::AssertVisible(value)
        }
        "assert_not_visible" => {
            requires_value(&value)?;
            ScenarioStep::AssertNotVisible(value)
        }
        "screenshot" => {
            requires_value(&value)?;
            ScenarioStep::Screenshot(value)
        }
        "open_url" => {
            requires_value(&value)?;
            ScenarioStep::OpenUrl(value)
        }
        _ if AI_ONLY_KEYS.contains(&key) => ScenarioStep::Skipped {
            key: key.to_string(),
            reason: "requires the AI interpreter".to_string(),
        },
        _ => ScenarioStep::Skipped {
            key: key.to_string(),
            reason: "unsupported step key".to_string(),
        },
    };

    Ok(step)
}

fn strip_quotes(s: &str) -> &str {
    let s = s.trim();
    if s.len() >= 2 {
        let bytes = s.as_bytes();
        if (bytes[0] == b'"' && bytes[s.len() - 1] == b'"')
            || (bytes[0] == b'\'' && bytes[s.len() - 1] == b'\'')
        {
            return &s[1..s.len() - 1];
        }
    }
    s
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn parse(text: &str) -> Result<ScenarioDefinition, EngineError> {
        parse_scenario_text(text, &PathBuf::from("test.scenario"))
    }

    const SIMPLE: &str = r#"
name: Wi-Fi check
description: Open settings
steps:
  - launch: "Settings"
  - tap: "Wi-Fi"
  - assert_visible: "Wi-Fi"
  - home
"#;

    #[test]
    fn parses_simple_scenario() {
        let def = parse(SIMPLE).unwrap();
        assert_eq!(def.name, "Wi-Fi check");
        assert_eq!(def.description, "Open settings");
        assert_eq!(def.steps.len(), 4);
        assert_eq!(def.steps[0], ScenarioStep::Launch("Settings".to_string()));
        assert_eq!(def.steps[3], ScenarioStep::Home);
    }

    #[test]
    fn parse_is_idempotent() {
        let a = parse(SIMPLE).unwrap();
        let b = parse(SIMPLE).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn unknown_and_ai_keys_become_skipped() {
        let def = parse(
            "steps:\n  - tap: \"OK\"\n  - remember: \"the balance\"\n  - frobnicate: \"x\"\n",
        )
        .unwrap();
        assert_eq!(def.steps.len(), 3);
        match &def.steps[1] {
            ScenarioStep::Skipped { key, reason } => {
                assert_eq!(key, "remember");
                assert!(reason.contains("AI"));
            }
            other => panic!("expected skipped, got {:?}", other),
        }
        assert!(matches!(def.steps[2], ScenarioStep::Skipped { .. }));
    }

    #[test]
    fn bare_unknown_keyword_becomes_skipped() {
        let def = parse("steps:\n  - tap: \"OK\"\n  - frobnicate\n").unwrap();
        assert_eq!(def.steps.len(), 2);
        match &def.steps[1] {
            ScenarioStep::Skipped { key, reason } => {
                assert_eq!(key, "frobnicate");
                assert!(reason.contains("unsupported"));
            }
            other => panic!("expected skipped, got {:?}", other),
        }
    }

    #[test]
    fn missing_value_is_a_parse_error() {
        let e = parse("steps:\n  - tap:\n").unwrap_err();
        match e {
            EngineError::Parse { line, message, .. } => {
                assert_eq!(line, 2);
                assert!(message.contains("requires a value"));
            }
            other => panic!("expected parse error, got {:?}", other),
        }
    }

    #[test]
    fn missing_steps_section_is_a_parse_error() {
        assert!(parse("name: x\n").is_err());
    }

    #[test]
    fn env_substitution_with_default() {
        std::env::set_var("MIRA_TEST_APP", "Settings");
        let text = "steps:\n  - launch: \"${MIRA_TEST_APP}\"\n  - tap: \"${MIRA_TEST_UNSET:-Wi-Fi}\"\n";
        let def = parse(text).unwrap();
        assert_eq!(def.steps[0], ScenarioStep::Launch("Settings".to_string()));
        assert_eq!(def.steps[1], ScenarioStep::Tap("Wi-Fi".to_string()));
    }

    #[test]
    fn unset_var_without_default_is_kept_verbatim() {
        let text = "steps:\n  - tap: \"${MIRA_TEST_NEVER_SET}\"\n";
        let def = parse(text).unwrap();
        assert_eq!(
            def.steps[0],
            ScenarioStep::Tap("${MIRA_TEST_NEVER_SET}".to_string())
        );
    }

    #[test]
    fn name_falls_back_to_file_stem() {
        let def = parse("steps:\n  - home\n").unwrap();
        assert_eq!(def.name, "test");
    }
}
