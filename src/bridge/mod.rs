//! Capability interfaces for the mirroring host, plus the helper-backed
//! implementations the CLI wires in.
//!
//! The core never talks to the OS directly: window discovery, input
//! injection, text recognition and frame capture are consumed through the
//! traits in [`traits`], so executors and the recorder can be driven by any
//! backend (the helper binary in production, scripted fakes in tests).

pub mod host;
pub mod matcher;
pub mod resolver;
pub mod traits;

use anyhow::Result;
use std::sync::Arc;

use host::{HelperTransport, HostSession};
use traits::{InputProvider, MirrorState, ScreenCapturer, ScreenDescriber, WindowBridge};

/// The four injected capabilities, bundled for convenience.
#[derive(Clone)]
pub struct Capabilities {
    pub bridge: Arc<dyn WindowBridge>,
    pub input: Arc<dyn InputProvider>,
    pub describer: Arc<dyn ScreenDescriber>,
    pub capturer: Arc<dyn ScreenCapturer>,
}

/// A connected mirroring session: capabilities plus the raw transport
/// (record mode needs it for the event stream).
pub struct MirrorSession {
    pub capabilities: Capabilities,
    pub transport: Arc<HelperTransport>,
}

/// Locate the helper, probe the mirroring state and activate the window.
/// Fails when no device is connected.
pub async fn connect() -> Result<MirrorSession> {
    let helper = resolver::find_helper()?;
    log::info!("using helper binary at {}", helper.display());

    let transport = Arc::new(HelperTransport::new(helper));
    let session = Arc::new(HostSession::new(transport.clone()));

    let state = session.state().await?;
    match state {
        // Activation below also resumes a paused session.
        MirrorState::Connected | MirrorState::Paused => {}
        MirrorState::NoWindow => {
            anyhow::bail!("mirroring app is running but no device window is up")
        }
        MirrorState::NotRunning => anyhow::bail!("mirroring app is not running"),
    }
    session.activate().await?;

    Ok(MirrorSession {
        capabilities: Capabilities {
            bridge: session.clone(),
            input: session.clone(),
            describer: session.clone(),
            capturer: session,
        },
        transport,
    })
}

#[cfg(test)]
pub(crate) mod testkit {
    //! Scripted capability fakes shared by executor, compiler, replay and
    //! recorder tests.

    use super::traits::*;
    use anyhow::Result;
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    /// Bridge with a fixed window and state.
    pub struct StaticBridge {
        pub info: WindowInfo,
        pub state: MirrorState,
    }

    impl Default for StaticBridge {
        fn default() -> Self {
            Self {
                info: WindowInfo {
                    x: 100.0,
                    y: 50.0,
                    width: 400.0,
                    height: 800.0,
                },
                state: MirrorState::Connected,
            }
        }
    }

    #[async_trait]
    impl WindowBridge for StaticBridge {
        async fn window_info(&self) -> Result<Option<WindowInfo>> {
            Ok(Some(self.info))
        }
        async fn state(&self) -> Result<MirrorState> {
            Ok(self.state)
        }
        async fn trigger_menu_action(&self, _menu: &str, _item: &str) -> Result<bool> {
            Ok(true)
        }
        async fn activate(&self) -> Result<()> {
            Ok(())
        }
    }

    /// Input provider that records every call as a formatted line.
    #[derive(Default)]
    pub struct RecordingInput {
        pub calls: Mutex<Vec<String>>,
    }

    impl RecordingInput {
        pub fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }

        pub fn count_of(&self, prefix: &str) -> usize {
            self.calls()
                .iter()
                .filter(|c| c.starts_with(prefix))
                .count()
        }

        fn record(&self, call: String) {
            self.calls.lock().unwrap().push(call);
        }
    }

    #[async_trait]
    impl InputProvider for RecordingInput {
        async fn tap(&self, x: f64, y: f64) -> Result<()> {
            self.record(format!("tap {:.0} {:.0}", x, y));
            Ok(())
        }
        async fn double_tap(&self, x: f64, y: f64) -> Result<()> {
            self.record(format!("double-tap {:.0} {:.0}", x, y));
            Ok(())
        }
        async fn long_press(&self, x: f64, y: f64, duration_ms: u64) -> Result<()> {
            self.record(format!("long-press {:.0} {:.0} {}", x, y, duration_ms));
            Ok(())
        }
        async fn swipe(&self, x1: f64, y1: f64, x2: f64, y2: f64, _duration_ms: u64) -> Result<()> {
            self.record(format!("swipe {:.0} {:.0} {:.0} {:.0}", x1, y1, x2, y2));
            Ok(())
        }
        async fn drag(&self, x1: f64, y1: f64, x2: f64, y2: f64) -> Result<()> {
            self.record(format!("drag {:.0} {:.0} {:.0} {:.0}", x1, y1, x2, y2));
            Ok(())
        }
        async fn type_text(&self, text: &str) -> Result<TypeOutcome> {
            self.record(format!("type {}", text));
            Ok(TypeOutcome {
                success: true,
                warning: None,
                error: None,
            })
        }
        async fn press_key(&self, name: &str, modifiers: &[String]) -> Result<()> {
            self.record(format!("key {} [{}]", name, modifiers.join("+")));
            Ok(())
        }
        async fn launch_app(&self, name: &str) -> Result<()> {
            self.record(format!("launch {}", name));
            Ok(())
        }
        async fn open_url(&self, url: &str) -> Result<()> {
            self.record(format!("open-url {}", url));
            Ok(())
        }
        async fn shake(&self) -> Result<()> {
            self.record("shake".to_string());
            Ok(())
        }
    }

    /// Input provider whose every call fails, for transport-failure paths.
    pub struct FailingInput;

    #[async_trait]
    impl InputProvider for FailingInput {
        async fn tap(&self, _x: f64, _y: f64) -> Result<()> {
            Err(anyhow::anyhow!("input channel down"))
        }
        async fn double_tap(&self, _x: f64, _y: f64) -> Result<()> {
            Err(anyhow::anyhow!("input channel down"))
        }
        async fn long_press(&self, _x: f64, _y: f64, _duration_ms: u64) -> Result<()> {
            Err(anyhow::anyhow!("input channel down"))
        }
        async fn swipe(
            &self,
            _x1: f64,
            _y1: f64,
            _x2: f64,
            _y2: f64,
            _duration_ms: u64,
        ) -> Result<()> {
            Err(anyhow::anyhow!("input channel down"))
        }
        async fn drag(&self, _x1: f64, _y1: f64, _x2: f64, _y2: f64) -> Result<()> {
            Err(anyhow::anyhow!("input channel down"))
        }
        async fn type_text(&self, _text: &str) -> Result<TypeOutcome> {
            Err(anyhow::anyhow!("input channel down"))
        }
        async fn press_key(&self, _name: &str, _modifiers: &[String]) -> Result<()> {
            Err(anyhow::anyhow!("input channel down"))
        }
        async fn launch_app(&self, _name: &str) -> Result<()> {
            Err(anyhow::anyhow!("input channel down"))
        }
        async fn open_url(&self, _url: &str) -> Result<()> {
            Err(anyhow::anyhow!("input channel down"))
        }
        async fn shake(&self) -> Result<()> {
            Err(anyhow::anyhow!("input channel down"))
        }
    }

    /// Describer that plays back a scripted sequence of OCR frames, repeating
    /// the last frame once the script runs out. Counts passes.
    pub struct ScriptedDescriber {
        frames: Mutex<VecDeque<Vec<DetectedElement>>>,
        last: Mutex<Vec<DetectedElement>>,
        pub passes: Mutex<usize>,
    }

    impl ScriptedDescriber {
        pub fn new(frames: Vec<Vec<DetectedElement>>) -> Self {
            Self {
                frames: Mutex::new(frames.into()),
                last: Mutex::new(Vec::new()),
                passes: Mutex::new(0),
            }
        }

        pub fn pass_count(&self) -> usize {
            *self.passes.lock().unwrap()
        }
    }

    #[async_trait]
    impl ScreenDescriber for ScriptedDescriber {
        async fn describe(&self) -> Result<ScreenDescription> {
            *self.passes.lock().unwrap() += 1;
            let mut frames = self.frames.lock().unwrap();
            let elements = match frames.pop_front() {
                Some(frame) => {
                    *self.last.lock().unwrap() = frame.clone();
                    frame
                }
                None => self.last.lock().unwrap().clone(),
            };
            Ok(ScreenDescription {
                elements,
                screenshot: None,
            })
        }
    }

    /// Capturer returning a valid 1x1 PNG.
    pub struct TinyCapturer;

    #[async_trait]
    impl ScreenCapturer for TinyCapturer {
        async fn capture_base64(&self) -> Result<String> {
            use base64::Engine;
            let img = image::RgbaImage::from_pixel(1, 1, image::Rgba([0, 0, 0, 255]));
            let mut bytes = Vec::new();
            img.write_to(
                &mut std::io::Cursor::new(&mut bytes),
                image::ImageOutputFormat::Png,
            )?;
            Ok(base64::engine::general_purpose::STANDARD.encode(bytes))
        }
    }

    pub fn element(text: &str, x: f64, y: f64) -> DetectedElement {
        DetectedElement {
            text: text.to_string(),
            x,
            y,
            confidence: 0.95,
        }
    }
}
