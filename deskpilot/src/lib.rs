//! Desktop automation primitives for the deskpilot CLI.
//!
//! This crate provides a cross-platform `Desktop` facade over a
//! platform-specific accessibility engine, plus the portable capabilities
//! (screen capture, clipboard, shell execution, process inventory) that do
//! not need a native backend.

use std::path::Path;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

pub mod errors;
pub mod platforms;
pub mod selector;

pub use errors::AutomationError;
pub use selector::Selector;

/// Attributes of a single UI element.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ElementInfo {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub automation_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub class_name: Option<String>,
    pub control_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bounds: Option<Bounds>,
}

/// Screen-space rectangle of an element.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Bounds {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

/// A node in the UI tree, containing its attributes and children.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UiNode {
    pub attributes: ElementInfo,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<UiNode>,
}

/// A top-level window as reported by the capture backend.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WindowInfo {
    pub app_name: String,
    pub title: String,
    pub pid: u32,
    pub focused: bool,
}

/// A connected monitor.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MonitorInfo {
    pub name: String,
    pub width: u32,
    pub height: u32,
    pub is_primary: bool,
}

/// Holds the output of a shell command execution.
#[derive(Debug, Clone)]
pub struct CommandOutput {
    pub exit_status: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

/// Holds raw screenshot data.
#[derive(Debug, Clone)]
pub struct ScreenshotResult {
    /// Raw RGBA image data
    pub image_data: Vec<u8>,
    pub width: u32,
    pub height: u32,
}

impl ScreenshotResult {
    /// Encode the capture as PNG at `path`.
    pub fn save_png(&self, path: &Path) -> Result<(), AutomationError> {
        let image = image::RgbaImage::from_raw(self.width, self.height, self.image_data.clone())
            .ok_or_else(|| {
                AutomationError::Internal("screenshot buffer does not match dimensions".to_string())
            })?;
        image
            .save(path)
            .map_err(|e| AutomationError::PlatformError(format!("failed to encode PNG: {e}")))
    }
}

/// Mouse buttons understood by the pointer operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MouseButton {
    #[default]
    Left,
    Right,
    Middle,
}

impl FromStr for MouseButton {
    type Err = AutomationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "left" => Ok(MouseButton::Left),
            "right" => Ok(MouseButton::Right),
            "middle" => Ok(MouseButton::Middle),
            other => Err(AutomationError::InvalidArgument(format!(
                "unknown mouse button '{other}' (expected left, right or middle)"
            ))),
        }
    }
}

/// The main entry point for desktop automation.
pub struct Desktop {
    engine: Arc<dyn platforms::AutomationEngine>,
}

impl Desktop {
    pub fn new() -> Result<Self, AutomationError> {
        let engine = platforms::create_engine()?;
        Ok(Self { engine })
    }

    // ---- engine-backed operations ----

    #[instrument(skip(self))]
    pub fn window_tree(
        &self,
        title: Option<&str>,
        max_depth: usize,
    ) -> Result<UiNode, AutomationError> {
        self.engine.window_tree(title, max_depth)
    }

    #[instrument(skip(self, selector))]
    pub fn find_element(&self, selector: &Selector) -> Result<ElementInfo, AutomationError> {
        self.engine.find_element(selector)
    }

    #[instrument(skip(self, selector))]
    pub fn element_text(&self, selector: &Selector) -> Result<String, AutomationError> {
        self.engine.element_text(selector)
    }

    #[instrument(skip(self, selector))]
    pub fn invoke(&self, selector: &Selector) -> Result<ElementInfo, AutomationError> {
        self.engine.invoke(selector)
    }

    #[instrument(skip(self, selector, value))]
    pub fn set_value(&self, selector: &Selector, value: &str) -> Result<ElementInfo, AutomationError> {
        self.engine.set_value(selector, value)
    }

    #[instrument(skip(self, selector))]
    pub fn focus(&self, selector: &Selector) -> Result<ElementInfo, AutomationError> {
        self.engine.focus(selector)
    }

    pub fn mouse_move(&self, x: i32, y: i32) -> Result<(), AutomationError> {
        self.engine.mouse_move(x, y)
    }

    pub fn mouse_click(&self, x: i32, y: i32, button: MouseButton) -> Result<(), AutomationError> {
        self.engine.mouse_click(x, y, button)
    }

    pub fn mouse_double_click(&self, x: i32, y: i32) -> Result<(), AutomationError> {
        self.engine.mouse_double_click(x, y)
    }

    pub fn mouse_scroll(&self, dx: i32, dy: i32) -> Result<(), AutomationError> {
        self.engine.mouse_scroll(dx, dy)
    }

    #[instrument(skip(self, text))]
    pub fn type_text(&self, text: &str) -> Result<(), AutomationError> {
        self.engine.type_text(text)
    }

    #[instrument(skip(self))]
    pub fn send_keys(&self, keys: &[String]) -> Result<(), AutomationError> {
        self.engine.send_keys(keys)
    }

    pub fn activate_window(&self, title: &str) -> Result<(), AutomationError> {
        self.engine.activate_window(title)
    }

    pub fn close_window(&self, title: &str) -> Result<(), AutomationError> {
        self.engine.close_window(title)
    }

    pub fn minimize_window(&self, title: &str) -> Result<(), AutomationError> {
        self.engine.minimize_window(title)
    }

    pub fn maximize_window(&self, title: &str) -> Result<(), AutomationError> {
        self.engine.maximize_window(title)
    }

    pub async fn volume(&self) -> Result<u32, AutomationError> {
        self.engine.volume().await
    }

    pub async fn set_volume(&self, percent: u32) -> Result<(), AutomationError> {
        self.engine.set_volume(percent).await
    }

    pub async fn set_mute(&self, mute: bool) -> Result<(), AutomationError> {
        self.engine.set_mute(mute).await
    }

    pub async fn step_volume(&self, delta: i32) -> Result<(), AutomationError> {
        self.engine.step_volume(delta).await
    }

    pub async fn brightness(&self) -> Result<u32, AutomationError> {
        self.engine.brightness().await
    }

    pub async fn set_brightness(&self, percent: u32) -> Result<(), AutomationError> {
        self.engine.set_brightness(percent).await
    }

    pub async fn step_brightness(&self, delta: i32) -> Result<(), AutomationError> {
        self.engine.step_brightness(delta).await
    }

    pub async fn set_resolution(&self, width: u32, height: u32) -> Result<(), AutomationError> {
        self.engine.set_resolution(width, height).await
    }

    #[instrument(skip(self))]
    pub async fn ocr_image(&self, path: &Path) -> Result<String, AutomationError> {
        self.engine.ocr_image(path).await
    }

    /// OCR of the primary monitor: capture, spill to a temp PNG, recognize.
    #[instrument(skip(self))]
    pub async fn ocr_screen(&self) -> Result<String, AutomationError> {
        let shot = self.capture_screen().await?;
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("screen.png");
        shot.save_png(&path)?;
        self.engine.ocr_image(&path).await
    }

    // ---- portable capabilities (no native backend required) ----

    #[instrument(skip(self))]
    pub async fn capture_screen(&self) -> Result<ScreenshotResult, AutomationError> {
        let monitors = xcap::Monitor::all()
            .map_err(|e| AutomationError::PlatformError(format!("failed to list monitors: {e}")))?;
        let monitor = monitors
            .iter()
            .find(|m| m.is_primary().unwrap_or(false))
            .or_else(|| monitors.first())
            .ok_or_else(|| AutomationError::PlatformError("no monitor found".to_string()))?;
        let image = monitor.capture_image().map_err(|e| {
            AutomationError::PlatformError(format!("failed to capture monitor: {e}"))
        })?;
        Ok(ScreenshotResult {
            width: image.width(),
            height: image.height(),
            image_data: image.into_raw(),
        })
    }

    pub fn monitors(&self) -> Result<Vec<MonitorInfo>, AutomationError> {
        let monitors = xcap::Monitor::all()
            .map_err(|e| AutomationError::PlatformError(format!("failed to list monitors: {e}")))?;
        Ok(monitors
            .iter()
            .map(|m| MonitorInfo {
                name: m.name().unwrap_or_default(),
                width: m.width().unwrap_or(0),
                height: m.height().unwrap_or(0),
                is_primary: m.is_primary().unwrap_or(false),
            })
            .collect())
    }

    pub fn windows(&self) -> Result<Vec<WindowInfo>, AutomationError> {
        let windows = xcap::Window::all()
            .map_err(|e| AutomationError::PlatformError(format!("failed to list windows: {e}")))?;
        Ok(windows
            .iter()
            .map(|w| WindowInfo {
                app_name: w.app_name().unwrap_or_default(),
                title: w.title().unwrap_or_default(),
                pid: w.pid().unwrap_or(0),
                focused: w.is_focused().unwrap_or(false),
            })
            .collect())
    }

    pub fn focused_window(&self) -> Result<WindowInfo, AutomationError> {
        self.windows()?
            .into_iter()
            .find(|w| w.focused)
            .ok_or_else(|| AutomationError::WindowNotFound("no focused window".to_string()))
    }

    /// Current resolution of the primary monitor.
    pub fn resolution(&self) -> Result<(u32, u32), AutomationError> {
        let monitors = self.monitors()?;
        let primary = monitors
            .iter()
            .find(|m| m.is_primary)
            .or_else(|| monitors.first())
            .ok_or_else(|| AutomationError::PlatformError("no monitor found".to_string()))?;
        Ok((primary.width, primary.height))
    }

    pub fn clipboard_text(&self) -> Result<String, AutomationError> {
        let mut clipboard = arboard::Clipboard::new()
            .map_err(|e| AutomationError::PlatformError(format!("clipboard unavailable: {e}")))?;
        clipboard
            .get_text()
            .map_err(|e| AutomationError::PlatformError(format!("failed to read clipboard: {e}")))
    }

    pub fn set_clipboard_text(&self, text: &str) -> Result<(), AutomationError> {
        let mut clipboard = arboard::Clipboard::new()
            .map_err(|e| AutomationError::PlatformError(format!("clipboard unavailable: {e}")))?;
        clipboard
            .set_text(text.to_string())
            .map_err(|e| AutomationError::PlatformError(format!("failed to write clipboard: {e}")))
    }

    /// Run a shell command via the platform shell and capture its output.
    #[instrument(skip(self, command))]
    pub async fn run_command(
        &self,
        command: &str,
        timeout_ms: Option<u64>,
    ) -> Result<CommandOutput, AutomationError> {
        let mut cmd = if cfg!(target_os = "windows") {
            let mut c = tokio::process::Command::new("cmd");
            c.args(["/C", command]);
            c
        } else {
            let mut c = tokio::process::Command::new("sh");
            c.args(["-c", command]);
            c
        };

        debug!("running shell command");
        let fut = cmd.output();
        let output = match timeout_ms {
            Some(ms) => tokio::time::timeout(Duration::from_millis(ms), fut)
                .await
                .map_err(|_| {
                    AutomationError::Timeout(format!("command did not finish within {ms}ms"))
                })??,
            None => fut.await?,
        };

        Ok(CommandOutput {
            exit_status: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
        })
    }

    /// Process inventory, sorted by pid.
    pub fn processes(&self) -> Vec<(u32, String)> {
        let sys = sysinfo::System::new_all();
        let mut procs: Vec<(u32, String)> = sys
            .processes()
            .iter()
            .map(|(pid, p)| (pid.as_u32(), p.name().to_string_lossy().to_string()))
            .collect();
        procs.sort_by_key(|(pid, _)| *pid);
        procs
    }
}

impl Clone for Desktop {
    fn clone(&self) -> Self {
        Self {
            engine: self.engine.clone(),
        }
    }
}
