use tokio::sync::broadcast;

use super::state::{ScenarioStatus, SessionSummary};

/// Execution events for real-time console output.
#[derive(Debug, Clone)]
pub enum RunEvent {
    SessionStarted {
        session_id: String,
    },
    SessionFinished {
        summary: SessionSummary,
    },
    ScenarioStarted {
        name: String,
        path: String,
        step_count: usize,
    },
    ScenarioFinished {
        name: String,
        status: ScenarioStatus,
        duration_ms: Option<u64>,
    },
    StepStarted {
        index: usize,
        display: String,
    },
    StepPassed {
        index: usize,
        duration_ms: u64,
        message: Option<String>,
    },
    StepFailed {
        index: usize,
        error: String,
        duration_ms: u64,
    },
    StepSkipped {
        index: usize,
        reason: String,
    },
    Log {
        message: String,
    },
}

/// Broadcast emitter; the console listener runs in the background.
pub struct EventEmitter {
    sender: broadcast::Sender<RunEvent>,
}

impl EventEmitter {
    pub fn new() -> (Self, broadcast::Receiver<RunEvent>) {
        let (sender, receiver) = broadcast::channel(100);
        (Self { sender }, receiver)
    }

    pub fn emit(&self, event: RunEvent) {
        let _ = self.sender.send(event);
    }
}

impl Default for EventEmitter {
    fn default() -> Self {
        let (sender, _) = broadcast::channel(100);
        Self { sender }
    }
}

/// Prints live progress with a spinner per running step.
pub struct ConsoleEventListener;

impl ConsoleEventListener {
    pub async fn listen(mut receiver: broadcast::Receiver<RunEvent>) {
        use colored::Colorize;
        use indicatif::{ProgressBar, ProgressStyle};
        use std::io::IsTerminal;

        let interactive = std::io::stdout().is_terminal();
        let mut spinner: Option<ProgressBar> = None;
        let mut current: String = String::new();

        while let Ok(event) = receiver.recv().await {
            match event {
                RunEvent::SessionStarted { session_id } => {
                    println!(
                        "\n{} Session started: {}",
                        "▶".green().bold(),
                        session_id.cyan()
                    );
                }

                RunEvent::SessionFinished { summary } => {
                    if let Some(pb) = spinner.take() {
                        pb.finish_and_clear();
                    }
                    println!("\n{} Session finished", "■".blue().bold());
                    println!("  Scenarios: {}", summary.total_scenarios);
                    println!(
                        "  Steps: {} passed, {} failed, {} skipped",
                        summary.passed.to_string().green(),
                        summary.failed.to_string().red(),
                        summary.skipped.to_string().yellow()
                    );
                    if let Some(duration) = summary.total_duration_ms {
                        println!("  Duration: {}ms", duration);
                    }
                }

                RunEvent::ScenarioStarted {
                    name, step_count, ..
                } => {
                    println!(
                        "\n  {} Scenario: {} ({} steps)",
                        "→".blue(),
                        name.white().bold(),
                        step_count
                    );
                }

                RunEvent::ScenarioFinished {
                    name,
                    status,
                    duration_ms,
                } => {
                    if let Some(pb) = spinner.take() {
                        pb.finish_and_clear();
                    }
                    let status_str = match status {
                        ScenarioStatus::Passed => "PASSED".green().bold(),
                        ScenarioStatus::Failed => "FAILED".red().bold(),
                        _ => "UNKNOWN".white().bold(),
                    };
                    match duration_ms {
                        Some(d) => println!("  {} {} [{}] ({}ms)", "←".blue(), name, status_str, d),
                        None => println!("  {} {} [{}]", "←".blue(), name, status_str),
                    }
                }

                RunEvent::StepStarted { index, display } => {
                    current = format!("[{}] {}", index, display);
                    if interactive {
                        let pb = ProgressBar::new_spinner();
                        pb.set_style(
                            ProgressStyle::default_spinner()
                                .template("    {spinner} {msg}")
                                .unwrap(),
                        );
                        pb.set_message(current.clone());
                        pb.enable_steady_tick(std::time::Duration::from_millis(100));
                        spinner = Some(pb);
                    }
                }

                RunEvent::StepPassed {
                    duration_ms,
                    message,
                    ..
                } => {
                    if let Some(pb) = spinner.take() {
                        pb.finish_and_clear();
                    }
                    match message {
                        Some(msg) => println!(
                            "    {} {} ({}ms) {}",
                            "✓".green(),
                            current,
                            duration_ms,
                            msg.dimmed()
                        ),
                        None => println!("    {} {} ({}ms)", "✓".green(), current, duration_ms),
                    }
                }

                RunEvent::StepFailed {
                    error, duration_ms, ..
                } => {
                    if let Some(pb) = spinner.take() {
                        pb.finish_and_clear();
                    }
                    println!("    {} {} ({}ms)", "✗".red(), current, duration_ms);
                    println!("      {}", error.red());
                }

                RunEvent::StepSkipped { index, reason } => {
                    if let Some(pb) = spinner.take() {
                        pb.finish_and_clear();
                    }
                    println!("    {} [{}] skipped ({})", "○".yellow(), index, reason.dimmed());
                }

                RunEvent::Log { message } => {
                    println!("      {}", message);
                }
            }
        }
    }
}
