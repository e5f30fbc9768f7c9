use clap::{Parser, Subcommand};
use colored::Colorize;
use std::path::PathBuf;

use mira_tester::{bridge, recorder, report, runner};

#[derive(Parser)]
#[command(name = "mira-tester")]
#[command(version = "0.1.0")]
#[command(about = "Scenario automation CLI for mirrored touchscreen devices", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run scenario file(s) or a directory of scenarios
    Test {
        /// Path to a .scenario file or a directory
        path: PathBuf,

        /// Output directory for reports and screenshots
        #[arg(short, long, default_value = "./output")]
        output: PathBuf,

        /// Replay compiled artifacts instead of running adaptively
        #[arg(long, default_value = "false")]
        compiled: bool,

        /// Continue on failure within a scenario
        #[arg(long, default_value = "false")]
        continue_on_failure: bool,

        /// Generate reports (JSON, JUnit)
        #[arg(long, default_value = "false")]
        report: bool,
    },

    /// Compile scenarios into replayable artifacts
    Compile {
        /// Path to a .scenario file or a directory
        path: PathBuf,

        /// Output directory for screenshots taken during the compile run
        #[arg(short, long, default_value = "./output")]
        output: PathBuf,
    },

    /// Record device interactions and generate a scenario file
    Record {
        /// Output path for the generated scenario
        #[arg(short, long)]
        output: PathBuf,

        /// Scenario name (defaults to the output file stem)
        #[arg(short, long)]
        name: Option<String>,
    },

    /// Generate a report from saved test results
    Report {
        /// Path to a results JSON file
        results: PathBuf,

        /// Output format (json, junit)
        #[arg(short, long, default_value = "json")]
        format: String,

        /// Output file path
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::init();
    let cli = Cli::parse();

    match cli.command {
        Commands::Test {
            path,
            output,
            compiled,
            continue_on_failure,
            report,
        } => {
            println!(
                "{} Running scenarios from: {}",
                "▶".green().bold(),
                path.display()
            );
            println!("  Output: {}", output.display().to_string().cyan());
            if compiled {
                println!("  Mode: {}", "compiled replay".yellow());
            }
            if report {
                println!("  Reports: {}", "Enabled".green());
            }

            let options = runner::RunOptions {
                output_dir: output,
                compiled,
                continue_on_failure,
                report,
            };
            let summary = runner::run_scenarios(&path, &options).await?;
            if !summary.is_success() {
                std::process::exit(1);
            }
        }

        Commands::Compile { path, output } => {
            println!(
                "{} Compiling scenarios from: {}",
                "▶".green().bold(),
                path.display()
            );
            let failures = runner::compile_scenarios(&path, &output).await?;
            if failures > 0 {
                println!(
                    "\n{} {} scenario(s) failed to compile",
                    "✗".red().bold(),
                    failures
                );
                std::process::exit(1);
            }
            println!("\n{} All scenarios compiled", "✓".green().bold());
        }

        Commands::Record { output, name } => {
            record_scenario(output, name).await?;
        }

        Commands::Report {
            results,
            format,
            output,
        } => {
            println!(
                "{} Generating {} report from: {}",
                "▶".blue(),
                format.cyan(),
                results.display()
            );
            report::generate_report(&results, &format, output.as_deref()).await?;
        }
    }

    Ok(())
}

async fn record_scenario(output: PathBuf, name: Option<String>) -> anyhow::Result<()> {
    println!("{} Starting record mode...", "●".red().bold());

    let session = bridge::connect().await?;
    let event_recorder = std::sync::Arc::new(recorder::EventRecorder::new(
        session.capabilities.bridge.clone(),
        session.capabilities.describer.clone(),
    ));
    let recorder_id = recorder::registry::register(event_recorder.clone());

    // Ctrl+C flips the flag; the select loop below notices and drains.
    let stop_flag = std::sync::Arc::new(std::sync::atomic::AtomicBool::new(false));
    let stop_flag_handler = stop_flag.clone();
    ctrlc::set_handler(move || {
        println!("\n\n{} Stopping recording...", "■".yellow());
        stop_flag_handler.store(true, std::sync::atomic::Ordering::SeqCst);
    })?;

    println!("\n  Interact with the mirrored device window.");
    println!("  Press Ctrl+C when done.\n");

    let mut child = session.transport.spawn_event_stream()?;
    let stdout = child
        .stdout
        .take()
        .ok_or_else(|| anyhow::anyhow!("event stream has no stdout"))?;

    use tokio::io::AsyncBufReadExt;
    let mut lines = tokio::io::BufReader::new(stdout).lines();

    loop {
        tokio::select! {
            line = lines.next_line() => {
                if stop_flag.load(std::sync::atomic::Ordering::SeqCst) {
                    break;
                }
                match line {
                    Ok(Some(line)) => dispatch_event_line(&line).await,
                    Ok(None) => break,
                    Err(_) => break,
                }
            }
            _ = tokio::time::sleep(std::time::Duration::from_millis(100)) => {
                if stop_flag.load(std::sync::atomic::Ordering::SeqCst) {
                    break;
                }
            }
        }
    }

    let _ = child.kill().await;

    let events = event_recorder.stop().await;
    recorder::registry::unregister(recorder_id);

    if events.is_empty() {
        println!("\n{} Nothing recorded", "○".yellow());
        return Ok(());
    }

    let scenario_name = name.unwrap_or_else(|| {
        output
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("recorded")
            .to_string()
    });
    let writer = recorder::ScenarioWriter::new(&scenario_name);
    writer.save(&events, &output)?;

    println!("\n{} Recording complete!", "✓".green().bold());
    println!("   Output: {}", output.display().to_string().cyan());
    Ok(())
}

/// Route one event-stream line to the active recorder.
///
/// Line formats from the helper:
///   `down <x> <y>` / `up <x> <y>`   pointer transitions, global coordinates
///   `key <name> <mods> [char]`      keystrokes; `<mods>` is `+`-joined or `-`
async fn dispatch_event_line(line: &str) {
    let Some(recorder) = recorder::registry::active() else {
        return;
    };

    if let Some((kind, x, y)) = parse_pointer_line(line) {
        match kind {
            "down" => recorder.on_pointer_down(x, y).await,
            "up" => recorder.on_pointer_up(x, y).await,
            _ => {}
        }
    } else if let Some((name, modifiers, character)) = parse_key_line(line) {
        recorder.on_key(&name, character, &modifiers).await;
    }
}

fn parse_pointer_line(line: &str) -> Option<(&str, f64, f64)> {
    let mut parts = line.split_whitespace();
    let kind = parts.next()?;
    if kind != "down" && kind != "up" {
        return None;
    }
    let x = parts.next()?.parse().ok()?;
    let y = parts.next()?.parse().ok()?;
    Some((kind, x, y))
}

fn parse_key_line(line: &str) -> Option<(String, Vec<String>, Option<char>)> {
    let mut parts = line.split_whitespace();
    if parts.next()? != "key" {
        return None;
    }
    let name = parts.next()?.to_string();
    let mods = parts.next().unwrap_or("-");
    let modifiers = if mods == "-" {
        Vec::new()
    } else {
        mods.split('+').map(|m| m.to_string()).collect()
    };
    let character = parts.next().and_then(|c| c.chars().next());
    Some((name, modifiers, character))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pointer_lines_parse() {
        assert_eq!(parse_pointer_line("down 512 384"), Some(("down", 512.0, 384.0)));
        assert_eq!(parse_pointer_line("up 512.5 384.25"), Some(("up", 512.5, 384.25)));
        assert_eq!(parse_pointer_line("key a - a"), None);
        assert_eq!(parse_pointer_line("down 512"), None);
    }

    #[test]
    fn key_lines_parse() {
        let (name, mods, ch) = parse_key_line("key a - a").unwrap();
        assert_eq!(name, "a");
        assert!(mods.is_empty());
        assert_eq!(ch, Some('a'));

        let (name, mods, ch) = parse_key_line("key c cmd+shift c").unwrap();
        assert_eq!(name, "c");
        assert_eq!(mods, vec!["cmd".to_string(), "shift".to_string()]);
        assert_eq!(ch, Some('c'));

        let (name, mods, ch) = parse_key_line("key return -").unwrap();
        assert_eq!(name, "return");
        assert!(mods.is_empty());
        assert_eq!(ch, None);

        assert!(parse_key_line("down 10 10").is_none());
    }
}
