//! Capability implementations backed by the companion helper binary.
//!
//! Every call spawns the helper with a subcommand and joins its exit on a hard
//! deadline, so a hung helper process can never block the engine indefinitely.
//! A timeout or a non-zero exit surfaces as a transport failure; the engine
//! never retries a transport call within a step.

use anyhow::Result;
use async_trait::async_trait;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::process::{Child, Command};

use crate::error::EngineError;

use super::traits::{
    DetectedElement, InputProvider, MirrorState, ScreenCapturer, ScreenDescriber,
    ScreenDescription, TypeOutcome, WindowBridge, WindowInfo,
};

const TRANSPORT_DEADLINE: Duration = Duration::from_secs(10);
/// App launches go through the host OS and can take much longer than an
/// injection round trip.
const LAUNCH_DEADLINE: Duration = Duration::from_secs(20);

/// One-shot helper invocations with a bounded wait.
pub struct HelperTransport {
    helper: PathBuf,
}

impl HelperTransport {
    pub fn new(helper: PathBuf) -> Self {
        Self { helper }
    }

    async fn run(&self, args: &[&str]) -> Result<String> {
        self.run_with_deadline(args, TRANSPORT_DEADLINE).await
    }

    async fn run_with_deadline(&self, args: &[&str], deadline: Duration) -> Result<String> {
        log::debug!("helper call: {}", args.join(" "));

        let child = Command::new(&self.helper)
            .args(args)
            .stdout(std::process::Stdio::piped())
            .stderr(std::process::Stdio::piped())
            .stdin(std::process::Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| EngineError::Transport(format!("failed to spawn helper: {}", e)))?;

        let output = tokio::time::timeout(deadline, child.wait_with_output())
            .await
            .map_err(|_| {
                EngineError::Transport(format!(
                    "helper call `{}` exceeded {}s deadline",
                    args.join(" "),
                    deadline.as_secs()
                ))
            })?
            .map_err(|e| EngineError::Transport(format!("helper I/O error: {}", e)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(EngineError::Transport(format!(
                "helper call `{}` failed: {}",
                args.join(" "),
                stderr.trim()
            ))
            .into());
        }

        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }

    /// Spawn the long-running event stream used by record mode. The caller
    /// owns the child and reads stdout line by line; killing the child ends
    /// the stream.
    pub fn spawn_event_stream(&self) -> Result<Child> {
        Command::new(&self.helper)
            .arg("events")
            .stdout(std::process::Stdio::piped())
            .stderr(std::process::Stdio::null())
            .stdin(std::process::Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| EngineError::Transport(format!("failed to start event stream: {}", e)).into())
    }
}

/// Helper-backed implementation of all four capability traits.
pub struct HostSession {
    transport: Arc<HelperTransport>,
}

impl HostSession {
    pub fn new(transport: Arc<HelperTransport>) -> Self {
        Self { transport }
    }

    fn fmt(v: f64) -> String {
        format!("{:.0}", v)
    }
}

#[async_trait]
impl WindowBridge for HostSession {
    async fn window_info(&self) -> Result<Option<WindowInfo>> {
        let out = self.transport.run(&["window-info"]).await?;
        if out.is_empty() {
            return Ok(None);
        }
        let parts: Vec<f64> = out
            .split_whitespace()
            .filter_map(|p| p.parse().ok())
            .collect();
        if parts.len() != 4 {
            return Err(
                EngineError::Transport(format!("malformed window-info reply: {:?}", out)).into(),
            );
        }
        Ok(Some(WindowInfo {
            x: parts[0],
            y: parts[1],
            width: parts[2],
            height: parts[3],
        }))
    }

    async fn state(&self) -> Result<MirrorState> {
        let out = self.transport.run(&["state"]).await?;
        MirrorState::parse(&out)
            .ok_or_else(|| EngineError::Transport(format!("unknown state reply: {:?}", out)).into())
    }

    async fn trigger_menu_action(&self, menu: &str, item: &str) -> Result<bool> {
        let out = self.transport.run(&["menu-action", menu, item]).await?;
        Ok(out == "ok")
    }

    async fn activate(&self) -> Result<()> {
        self.transport.run(&["activate"]).await?;
        Ok(())
    }
}

#[async_trait]
impl InputProvider for HostSession {
    async fn tap(&self, x: f64, y: f64) -> Result<()> {
        self.transport
            .run(&["tap", &Self::fmt(x), &Self::fmt(y)])
            .await?;
        Ok(())
    }

    async fn double_tap(&self, x: f64, y: f64) -> Result<()> {
        self.transport
            .run(&["double-tap", &Self::fmt(x), &Self::fmt(y)])
            .await?;
        Ok(())
    }

    async fn long_press(&self, x: f64, y: f64, duration_ms: u64) -> Result<()> {
        self.transport
            .run(&[
                "long-press",
                &Self::fmt(x),
                &Self::fmt(y),
                &duration_ms.to_string(),
            ])
            .await?;
        Ok(())
    }

    async fn swipe(&self, x1: f64, y1: f64, x2: f64, y2: f64, duration_ms: u64) -> Result<()> {
        self.transport
            .run(&[
                "swipe",
                &Self::fmt(x1),
                &Self::fmt(y1),
                &Self::fmt(x2),
                &Self::fmt(y2),
                &duration_ms.to_string(),
            ])
            .await?;
        Ok(())
    }

    async fn drag(&self, x1: f64, y1: f64, x2: f64, y2: f64) -> Result<()> {
        self.transport
            .run(&[
                "drag",
                &Self::fmt(x1),
                &Self::fmt(y1),
                &Self::fmt(x2),
                &Self::fmt(y2),
            ])
            .await?;
        Ok(())
    }

    async fn type_text(&self, text: &str) -> Result<TypeOutcome> {
        let out = self.transport.run(&["type", text]).await?;
        // The helper reports partial injection (e.g. characters the device
        // keyboard cannot produce) on stdout.
        let warning = out
            .lines()
            .find_map(|l| l.strip_prefix("warning: "))
            .map(|w| w.to_string());
        Ok(TypeOutcome {
            success: true,
            warning,
            error: None,
        })
    }

    async fn press_key(&self, name: &str, modifiers: &[String]) -> Result<()> {
        let mods = modifiers.join("+");
        let mut args = vec!["key", name];
        if !mods.is_empty() {
            args.push(&mods);
        }
        self.transport.run(&args).await?;
        Ok(())
    }

    async fn launch_app(&self, name: &str) -> Result<()> {
        self.transport
            .run_with_deadline(&["launch", name], LAUNCH_DEADLINE)
            .await?;
        Ok(())
    }

    async fn open_url(&self, url: &str) -> Result<()> {
        self.transport.run(&["open-url", url]).await?;
        Ok(())
    }

    async fn shake(&self) -> Result<()> {
        self.transport.run(&["shake"]).await?;
        Ok(())
    }
}

#[async_trait]
impl ScreenDescriber for HostSession {
    async fn describe(&self) -> Result<ScreenDescription> {
        let out = self.transport.run(&["describe"]).await?;
        let mut elements = Vec::new();
        let mut screenshot = None;

        // Reply format: an optional "screenshot <base64>" line, then one
        // tab-separated line per detected element: text, x, y, confidence.
        for line in out.lines() {
            if let Some(b64) = line.strip_prefix("screenshot ") {
                screenshot = Some(b64.trim().to_string());
                continue;
            }
            let parts: Vec<&str> = line.split('\t').collect();
            if parts.len() < 4 {
                continue;
            }
            let (Ok(x), Ok(y), Ok(confidence)) = (
                parts[1].parse::<f64>(),
                parts[2].parse::<f64>(),
                parts[3].parse::<f32>(),
            ) else {
                continue;
            };
            elements.push(DetectedElement {
                text: parts[0].to_string(),
                x,
                y,
                confidence,
            });
        }

        // Stable order: top to bottom, left to right.
        elements.sort_by(|a, b| {
            a.y.partial_cmp(&b.y)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then(a.x.partial_cmp(&b.x).unwrap_or(std::cmp::Ordering::Equal))
        });

        Ok(ScreenDescription {
            elements,
            screenshot,
        })
    }
}

#[async_trait]
impl ScreenCapturer for HostSession {
    async fn capture_base64(&self) -> Result<String> {
        self.transport.run(&["capture"]).await
    }
}
