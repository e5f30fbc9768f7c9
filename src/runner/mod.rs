//! Scenario orchestration: discovery, live/replay execution, reporting.

pub mod context;
pub mod events;
pub mod executor;
pub mod replay;
pub mod state;

use anyhow::Result;
use colored::Colorize;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use crate::bridge::{self, Capabilities};
use crate::compiler::artifact::{sidecar_path, CompiledScenario};
use crate::compiler::ScenarioCompiler;
use crate::error::EngineError;
use crate::parser;
use crate::report;

use context::RunContext;
use events::{ConsoleEventListener, EventEmitter, RunEvent};
use executor::StepExecutor;
use replay::ReplayExecutor;
use state::{ScenarioState, SessionState, SessionSummary, StepState, StepStatus};

pub struct RunOptions {
    pub output_dir: PathBuf,
    /// Replay compiled artifacts instead of running the adaptive path.
    pub compiled: bool,
    /// Keep executing a scenario's remaining steps after a failure instead
    /// of skipping them.
    pub continue_on_failure: bool,
    /// Write results.json and junit.xml at session end.
    pub report: bool,
}

/// Run every scenario under `path` against the connected mirror session.
///
/// One scenario failing never stops the batch; within a scenario, the first
/// failing step skips the rest of that file.
pub async fn run_scenarios(path: &Path, options: &RunOptions) -> Result<SessionSummary> {
    let session = bridge::connect().await?;
    let files = discover_scenarios(path)?;
    let run_context = RunContext::new(&options.output_dir);

    let (emitter, receiver) = EventEmitter::new();
    let listener = tokio::spawn(ConsoleEventListener::listen(receiver));

    let state = run_batch(&session.capabilities, &run_context, &emitter, &files, options).await;

    let summary = state.summary();
    emitter.emit(RunEvent::SessionFinished {
        summary: summary.clone(),
    });
    // Dropping the emitter closes the channel; the listener drains and exits.
    drop(emitter);
    let _ = listener.await;

    if options.report {
        write_reports(&state, &options.output_dir)?;
    }
    Ok(summary)
}

/// Compile every scenario under `path`, writing one artifact sidecar per
/// fully passing file. Returns the number of files that failed to compile.
pub async fn compile_scenarios(path: &Path, output_dir: &Path) -> Result<u32> {
    let session = bridge::connect().await?;
    let files = discover_scenarios(path)?;
    let run_context = RunContext::new(output_dir);

    let mut failures = 0u32;
    for file in &files {
        println!("\n{} Compiling {}", "→".blue(), file.display().to_string().bold());

        let parsed = std::fs::read_to_string(file)
            .map_err(anyhow::Error::from)
            .and_then(|raw| {
                let definition = parser::parse_scenario_text(&raw, file)?;
                Ok((raw, definition))
            });
        let (raw, definition) = match parsed {
            Ok(p) => p,
            Err(e) => {
                println!("  {} {:#}", "✗".red(), e);
                failures += 1;
                continue;
            }
        };

        let mut compiler =
            ScenarioCompiler::new(session.capabilities.clone(), run_context.clone());
        match compiler.compile(&definition, &raw).await {
            Ok(outcome) => {
                let sidecar = sidecar_path(file);
                outcome.artifact.save(&sidecar)?;
                println!(
                    "  {} {} steps compiled -> {}",
                    "✓".green(),
                    outcome.artifact.steps.len(),
                    sidecar.display()
                );
            }
            Err(e) => {
                println!("  {} {:#}", "✗".red(), e);
                failures += 1;
            }
        }
    }
    Ok(failures)
}

/// All `.scenario` files under a path, sorted for a stable run order.
pub fn discover_scenarios(path: &Path) -> Result<Vec<PathBuf>> {
    if path.is_file() {
        return Ok(vec![path.to_path_buf()]);
    }

    let mut files: Vec<PathBuf> = WalkDir::new(path)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .map(|e| e.into_path())
        .filter(|p| p.extension().map_or(false, |ext| ext == "scenario"))
        .collect();
    files.sort();

    if files.is_empty() {
        anyhow::bail!("no .scenario files under {}", path.display());
    }
    Ok(files)
}

async fn run_batch(
    capabilities: &Capabilities,
    run_context: &RunContext,
    emitter: &EventEmitter,
    files: &[PathBuf],
    options: &RunOptions,
) -> SessionState {
    let session_id = uuid::Uuid::new_v4().to_string();
    let mut state = SessionState::new(&session_id);
    state.start();
    emitter.emit(RunEvent::SessionStarted {
        session_id: session_id.clone(),
    });

    for file in files {
        let scenario = run_one(capabilities, run_context, emitter, file, options).await;
        state.add_scenario(scenario);
    }

    state.finish();
    state
}

async fn run_one(
    capabilities: &Capabilities,
    run_context: &RunContext,
    emitter: &EventEmitter,
    file: &Path,
    options: &RunOptions,
) -> ScenarioState {
    let display_path = file.display().to_string();
    let fallback_name = file
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("unnamed")
        .to_string();

    // A file that cannot be read or parsed aborts with no steps run; the
    // batch moves on to the next file.
    let parsed = std::fs::read_to_string(file)
        .map_err(|e| EngineError::Parse {
            path: file.to_path_buf(),
            line: 0,
            message: format!("cannot read file: {}", e),
        })
        .and_then(|raw| {
            let definition = parser::parse_scenario_text(&raw, file)?;
            Ok((raw, definition))
        });
    let (raw, definition) = match parsed {
        Ok(p) => p,
        Err(e) => {
            emitter.emit(RunEvent::Log {
                message: format!("{}", e.to_string().red()),
            });
            return ScenarioState::aborted(&fallback_name, &display_path, e.to_string());
        }
    };

    let artifact = if options.compiled {
        match load_artifact(file, &definition, &raw) {
            Ok(a) => Some(a),
            Err(e) => {
                emitter.emit(RunEvent::Log {
                    message: format!("{}", format!("{:#}", e).red()),
                });
                return ScenarioState::aborted(
                    &definition.name,
                    &display_path,
                    format!("{:#}", e),
                );
            }
        }
    } else {
        None
    };

    let steps = definition
        .steps
        .iter()
        .enumerate()
        .map(|(i, s)| StepState::new(i, s))
        .collect();
    let mut scenario = ScenarioState::new(&definition.name, &display_path, steps);
    scenario.replayed = artifact.is_some();

    emitter.emit(RunEvent::ScenarioStarted {
        name: definition.name.clone(),
        path: display_path,
        step_count: definition.steps.len(),
    });
    scenario.start();

    let live = StepExecutor::new(capabilities.clone(), run_context.clone());
    let mut runner = match artifact {
        Some(a) => Runner::Replay(ReplayExecutor::new(live), a),
        None => Runner::Live(live),
    };

    for (index, step) in definition.steps.iter().enumerate() {
        scenario.steps[index].start();
        emitter.emit(RunEvent::StepStarted {
            index,
            display: step.display_name(),
        });

        let result = match &mut runner {
            Runner::Live(exec) => exec.execute_step(&definition.name, index, step).await,
            Runner::Replay(exec, artifact) => {
                // Validation already pinned artifact steps to scenario steps
                // one to one.
                let hint = artifact.steps[index].hint.as_ref();
                exec.execute_step(&definition.name, index, step, hint).await
            }
        };
        scenario.steps[index].record(&result);

        match &result.status {
            StepStatus::Passed => emitter.emit(RunEvent::StepPassed {
                index,
                duration_ms: result.duration_ms,
                message: result.message.clone(),
            }),
            StepStatus::Skipped { reason } => emitter.emit(RunEvent::StepSkipped {
                index,
                reason: reason.clone(),
            }),
            StepStatus::Failed { error } => {
                emitter.emit(RunEvent::StepFailed {
                    index,
                    error: error.clone(),
                    duration_ms: result.duration_ms,
                });
                if !options.continue_on_failure {
                    scenario.skip_remaining("previous step failed");
                    break;
                }
            }
            _ => {}
        }
    }

    scenario.finish();
    emitter.emit(RunEvent::ScenarioFinished {
        name: scenario.name.clone(),
        status: scenario.status.clone(),
        duration_ms: scenario.total_duration_ms,
    });
    scenario
}

enum Runner {
    Live(StepExecutor),
    Replay(ReplayExecutor, CompiledScenario),
}

fn load_artifact(
    file: &Path,
    definition: &parser::ScenarioDefinition,
    raw: &str,
) -> Result<CompiledScenario> {
    let sidecar = sidecar_path(file);
    if !sidecar.exists() {
        return Err(EngineError::StaleArtifact {
            path: sidecar,
            reason: "no compiled artifact found; compile the scenario first".to_string(),
        }
        .into());
    }
    let artifact = CompiledScenario::load(&sidecar)?;
    artifact.validate(&sidecar, definition, raw)?;
    Ok(artifact)
}

fn write_reports(state: &SessionState, output_dir: &Path) -> Result<()> {
    let session_report = state.to_report();
    let results = report::types::TestResults {
        session_id: session_report.session_id,
        scenarios: session_report.scenarios,
        summary: session_report.summary,
        generated_at: chrono::Local::now().format("%Y-%m-%d %H:%M:%S").to_string(),
    };

    let json_path = output_dir.join("results.json");
    std::fs::write(&json_path, serde_json::to_string_pretty(&results)?)?;
    println!("    Results saved to: {}", json_path.display());

    report::junit::write_report(&results, output_dir)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bridge::testkit::*;
    use std::sync::Arc;

    fn caps(frames: Vec<Vec<crate::bridge::traits::DetectedElement>>) -> Capabilities {
        Capabilities {
            bridge: Arc::new(StaticBridge::default()),
            input: Arc::new(RecordingInput::default()),
            describer: Arc::new(ScriptedDescriber::new(frames)),
            capturer: Arc::new(TinyCapturer),
        }
    }

    fn write_scenario(dir: &Path, name: &str, body: &str) -> PathBuf {
        let path = dir.join(name);
        std::fs::write(&path, body).unwrap();
        path
    }

    fn options(dir: &Path, compiled: bool) -> RunOptions {
        RunOptions {
            output_dir: dir.to_path_buf(),
            compiled,
            continue_on_failure: false,
            report: false,
        }
    }

    #[test]
    fn discovery_is_sorted_and_filtered() {
        let dir = tempfile::tempdir().unwrap();
        write_scenario(dir.path(), "b.scenario", "steps:\n  - home\n");
        write_scenario(dir.path(), "a.scenario", "steps:\n  - home\n");
        write_scenario(dir.path(), "notes.txt", "not a scenario");

        let files = discover_scenarios(dir.path()).unwrap();
        let names: Vec<_> = files
            .iter()
            .map(|p| p.file_name().unwrap().to_str().unwrap())
            .collect();
        assert_eq!(names, vec!["a.scenario", "b.scenario"]);
    }

    #[test]
    fn discovery_of_an_empty_directory_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(discover_scenarios(dir.path()).is_err());
    }

    #[tokio::test]
    async fn parse_error_aborts_one_file_not_the_batch() {
        let dir = tempfile::tempdir().unwrap();
        let bad = write_scenario(dir.path(), "a.scenario", "name: broken\n");
        let good = write_scenario(dir.path(), "b.scenario", "steps:\n  - home\n");

        let run_context = RunContext::fast_for_tests(dir.path());
        let emitter = EventEmitter::default();
        let state = run_batch(
            &caps(vec![]),
            &run_context,
            &emitter,
            &[bad, good],
            &options(dir.path(), false),
        )
        .await;

        assert_eq!(state.scenarios.len(), 2);
        assert_eq!(state.scenarios[0].status, state::ScenarioStatus::Failed);
        assert!(state.scenarios[0].error.as_ref().unwrap().contains("steps"));
        assert_eq!(state.scenarios[1].status, state::ScenarioStatus::Passed);
        assert!(!state.summary().is_success());
    }

    #[tokio::test]
    async fn first_failure_skips_the_rest_of_the_file() {
        let dir = tempfile::tempdir().unwrap();
        let file = write_scenario(
            dir.path(),
            "a.scenario",
            "steps:\n  - home\n  - assert_visible: Nope\n  - home\n  - home\n",
        );

        let run_context = RunContext::fast_for_tests(dir.path());
        let emitter = EventEmitter::default();
        let state = run_batch(
            &caps(vec![vec![]]),
            &run_context,
            &emitter,
            &[file],
            &options(dir.path(), false),
        )
        .await;

        let steps = &state.scenarios[0].steps;
        assert_eq!(steps[0].status, StepStatus::Passed);
        assert!(steps[1].status.is_failed());
        assert!(matches!(steps[2].status, StepStatus::Skipped { .. }));
        assert!(matches!(steps[3].status, StepStatus::Skipped { .. }));

        let summary = state.summary();
        assert_eq!(summary.passed, 1);
        assert_eq!(summary.failed, 1);
        assert_eq!(summary.skipped, 2);
    }

    #[tokio::test]
    async fn continue_on_failure_runs_the_remaining_steps() {
        let dir = tempfile::tempdir().unwrap();
        let file = write_scenario(
            dir.path(),
            "a.scenario",
            "steps:\n  - assert_visible: Nope\n  - home\n",
        );

        let run_context = RunContext::fast_for_tests(dir.path());
        let emitter = EventEmitter::default();
        let mut opts = options(dir.path(), false);
        opts.continue_on_failure = true;
        let state = run_batch(&caps(vec![vec![]]), &run_context, &emitter, &[file], &opts).await;

        let steps = &state.scenarios[0].steps;
        assert!(steps[0].status.is_failed());
        assert_eq!(steps[1].status, StepStatus::Passed);
        assert_eq!(state.scenarios[0].status, state::ScenarioStatus::Failed);
    }

    #[tokio::test]
    async fn compiled_mode_without_an_artifact_aborts_the_file() {
        let dir = tempfile::tempdir().unwrap();
        let file = write_scenario(dir.path(), "a.scenario", "steps:\n  - home\n");

        let run_context = RunContext::fast_for_tests(dir.path());
        let emitter = EventEmitter::default();
        let state = run_batch(
            &caps(vec![]),
            &run_context,
            &emitter,
            &[file],
            &options(dir.path(), true),
        )
        .await;

        assert_eq!(state.scenarios[0].status, state::ScenarioStatus::Failed);
        assert!(state.scenarios[0]
            .error
            .as_ref()
            .unwrap()
            .contains("no compiled artifact"));
    }

    #[tokio::test]
    async fn compiled_mode_replays_a_valid_artifact() {
        let dir = tempfile::tempdir().unwrap();
        let body = "steps:\n  - tap: Wi-Fi\n";
        let file = write_scenario(dir.path(), "a.scenario", body);

        // Compile against a screen that has the element.
        let run_context = RunContext::fast_for_tests(dir.path());
        let definition = parser::parse_scenario_text(body, &file).unwrap();
        let mut compiler = ScenarioCompiler::new(
            caps(vec![vec![element("Wi-Fi", 200.0, 300.0)]]),
            run_context.clone(),
        );
        let outcome = compiler.compile(&definition, body).await.unwrap();
        outcome.artifact.save(&sidecar_path(&file)).unwrap();

        // Replay against a blank screen: the baked tap must still pass.
        let emitter = EventEmitter::default();
        let state = run_batch(
            &caps(vec![]),
            &run_context,
            &emitter,
            &[file],
            &options(dir.path(), true),
        )
        .await;

        assert_eq!(state.scenarios[0].status, state::ScenarioStatus::Passed);
        assert!(state.scenarios[0].replayed);
    }
}
