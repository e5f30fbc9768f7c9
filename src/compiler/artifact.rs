//! On-disk format for compiled scenarios.
//!
//! A compiled artifact is a JSON sidecar next to its scenario file
//! (`login.scenario` -> `login.compiled.json`) holding one hint per step.
//! Hints are an optimization layer only: replay falls back to the live path
//! for any step whose hint is `Passthrough`, so a compiled run can never do
//! something a live run could not.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};

use crate::bridge::matcher::MatchStrategy;
use crate::bridge::traits::SwipeDirection;
use crate::error::EngineError;
use crate::parser::ScenarioDefinition;

/// Bumped whenever the artifact schema changes shape. Artifacts with any
/// other version are stale, never migrated.
pub const ARTIFACT_VERSION: u32 = 1;

/// Mirror window geometry at compile time. Replay on a differently sized
/// window would land baked coordinates on the wrong elements.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceGeometry {
    pub width: f64,
    pub height: f64,
    pub orientation: Orientation,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Orientation {
    Portrait,
    Landscape,
}

impl Orientation {
    pub fn of(width: f64, height: f64) -> Self {
        if width > height {
            Self::Landscape
        } else {
            Self::Portrait
        }
    }
}

/// Pre-resolved execution data for one step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum StepHint {
    /// Tap this exact window-relative point, skipping OCR.
    Tap {
        x: f64,
        y: f64,
        confidence: f32,
        strategy: MatchStrategy,
    },
    /// Replace an adaptive wait with the delay observed at compile time.
    Sleep { delay_ms: u64 },
    /// Issue exactly this many swipes without re-checking visibility.
    Scroll {
        direction: SwipeDirection,
        count: u32,
    },
    /// No usable hint; replay runs the live path for this step.
    Passthrough,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompiledStep {
    pub index: usize,
    /// Step-type key, validated against the re-parsed source before replay.
    pub kind: String,
    pub label: Option<String>,
    /// Absent exactly for steps the engine does not run (skipped ones).
    pub hint: Option<StepHint>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompiledScenario {
    pub version: u32,
    pub scenario_name: String,
    /// SHA-256 of the raw scenario text the hints were derived from.
    pub source_hash: String,
    pub compiled_at: String,
    pub device: DeviceGeometry,
    pub steps: Vec<CompiledStep>,
}

impl CompiledScenario {
    pub fn save(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)
            .with_context(|| format!("failed to write artifact to {}", path.display()))?;
        Ok(())
    }

    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read artifact at {}", path.display()))?;
        let artifact: Self = serde_json::from_str(&text)
            .with_context(|| format!("malformed artifact at {}", path.display()))?;
        Ok(artifact)
    }

    /// Reject the artifact unless it matches the scenario source exactly:
    /// same schema version, same source bytes, same step-kind sequence.
    pub fn validate(
        &self,
        path: &Path,
        definition: &ScenarioDefinition,
        source_text: &str,
    ) -> Result<(), EngineError> {
        let stale = |reason: String| EngineError::StaleArtifact {
            path: path.to_path_buf(),
            reason,
        };

        if self.version != ARTIFACT_VERSION {
            return Err(stale(format!(
                "artifact version {} does not match engine version {}",
                self.version, ARTIFACT_VERSION
            )));
        }

        let current_hash = source_hash(source_text);
        if self.source_hash != current_hash {
            return Err(stale(
                "scenario text changed since compilation; recompile".to_string(),
            ));
        }

        if self.steps.len() != definition.steps.len() {
            return Err(stale(format!(
                "artifact has {} steps but scenario has {}",
                self.steps.len(),
                definition.steps.len()
            )));
        }
        for (compiled, step) in self.steps.iter().zip(&definition.steps) {
            if compiled.kind != step.kind() {
                return Err(stale(format!(
                    "step {} is {} in the artifact but {} in the scenario",
                    compiled.index,
                    compiled.kind,
                    step.kind()
                )));
            }
        }

        Ok(())
    }
}

/// Hex SHA-256 of the scenario source.
pub fn source_hash(text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Artifact path for a scenario file: `login.scenario` ->
/// `login.compiled.json`, in the same directory.
pub fn sidecar_path(scenario_path: &Path) -> PathBuf {
    scenario_path.with_extension("compiled.json")
}
