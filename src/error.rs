use std::path::PathBuf;
use thiserror::Error;

/// Engine-level failures.
///
/// Step failures are not errors: they are data (`StepStatus::Failed`) so that a
/// failing step stops its own scenario without unwinding the batch. Everything
/// here aborts a larger unit: a parse error aborts its file, a transport error
/// aborts the step that issued the call, a stale artifact aborts replay before
/// the first step runs.
#[derive(Debug, Error)]
pub enum EngineError {
    /// Malformed scenario text. Aborts that file before any step runs.
    #[error("parse error in {path} (line {line}): {message}")]
    Parse {
        path: PathBuf,
        line: usize,
        message: String,
    },

    /// The input/capture backend is unreachable or timed out. Surfaces as a
    /// step failure with this message; never auto-retried within a step.
    #[error("transport failure: {0}")]
    Transport(String),

    /// Compiled hints no longer match the scenario source.
    #[error("stale compiled artifact {path}: {reason}")]
    StaleArtifact { path: PathBuf, reason: String },
}
