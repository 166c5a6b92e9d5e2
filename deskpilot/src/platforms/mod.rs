use std::path::Path;
use std::sync::Arc;

use crate::errors::AutomationError;
use crate::selector::Selector;
use crate::{ElementInfo, MouseButton, UiNode};

#[cfg(target_os = "windows")]
pub mod windows;

fn unsupported<T>(op: &str) -> Result<T, AutomationError> {
    Err(AutomationError::UnsupportedOperation(format!(
        "{op} is not supported by this platform engine"
    )))
}

/// The common trait that all platform-specific engines must implement.
///
/// Default implementations return an UnsupportedOperation error, allowing
/// platform-specific engines to override only what the platform can do.
#[async_trait::async_trait]
pub trait AutomationEngine: Send + Sync {
    // UI tree & element operations

    fn window_tree(
        &self,
        _title: Option<&str>,
        _max_depth: usize,
    ) -> Result<UiNode, AutomationError> {
        unsupported("window_tree")
    }

    fn find_element(&self, _selector: &Selector) -> Result<ElementInfo, AutomationError> {
        unsupported("find_element")
    }

    fn element_text(&self, _selector: &Selector) -> Result<String, AutomationError> {
        unsupported("element_text")
    }

    fn invoke(&self, _selector: &Selector) -> Result<ElementInfo, AutomationError> {
        unsupported("invoke")
    }

    fn set_value(&self, _selector: &Selector, _value: &str) -> Result<ElementInfo, AutomationError> {
        unsupported("set_value")
    }

    fn focus(&self, _selector: &Selector) -> Result<ElementInfo, AutomationError> {
        unsupported("focus")
    }

    // Pointer & keyboard

    fn mouse_move(&self, _x: i32, _y: i32) -> Result<(), AutomationError> {
        unsupported("mouse_move")
    }

    fn mouse_click(&self, _x: i32, _y: i32, _button: MouseButton) -> Result<(), AutomationError> {
        unsupported("mouse_click")
    }

    fn mouse_double_click(&self, _x: i32, _y: i32) -> Result<(), AutomationError> {
        unsupported("mouse_double_click")
    }

    fn mouse_scroll(&self, _dx: i32, _dy: i32) -> Result<(), AutomationError> {
        unsupported("mouse_scroll")
    }

    fn type_text(&self, _text: &str) -> Result<(), AutomationError> {
        unsupported("type_text")
    }

    fn send_keys(&self, _keys: &[String]) -> Result<(), AutomationError> {
        unsupported("send_keys")
    }

    // Window management

    fn activate_window(&self, _title: &str) -> Result<(), AutomationError> {
        unsupported("activate_window")
    }

    fn close_window(&self, _title: &str) -> Result<(), AutomationError> {
        unsupported("close_window")
    }

    fn minimize_window(&self, _title: &str) -> Result<(), AutomationError> {
        unsupported("minimize_window")
    }

    fn maximize_window(&self, _title: &str) -> Result<(), AutomationError> {
        unsupported("maximize_window")
    }

    // System controls

    async fn volume(&self) -> Result<u32, AutomationError> {
        unsupported("volume")
    }

    async fn set_volume(&self, _percent: u32) -> Result<(), AutomationError> {
        unsupported("set_volume")
    }

    async fn set_mute(&self, _mute: bool) -> Result<(), AutomationError> {
        unsupported("set_mute")
    }

    async fn step_volume(&self, _delta: i32) -> Result<(), AutomationError> {
        unsupported("step_volume")
    }

    async fn brightness(&self) -> Result<u32, AutomationError> {
        unsupported("brightness")
    }

    async fn set_brightness(&self, _percent: u32) -> Result<(), AutomationError> {
        unsupported("set_brightness")
    }

    async fn step_brightness(&self, _delta: i32) -> Result<(), AutomationError> {
        unsupported("step_brightness")
    }

    async fn set_resolution(&self, _width: u32, _height: u32) -> Result<(), AutomationError> {
        unsupported("set_resolution")
    }

    // OCR

    async fn ocr_image(&self, _path: &Path) -> Result<String, AutomationError> {
        unsupported("ocr_image")
    }
}

/// Engine for platforms without an accessibility backend. Every operation
/// reports UnsupportedOperation via the trait defaults; the portable
/// capabilities on `Desktop` (capture, clipboard, shell, process listing)
/// keep working.
#[derive(Debug, Default)]
pub struct FallbackEngine;

impl AutomationEngine for FallbackEngine {}

pub fn create_engine() -> Result<Arc<dyn AutomationEngine>, AutomationError> {
    #[cfg(target_os = "windows")]
    {
        Ok(Arc::new(windows::WindowsEngine::new()?))
    }
    #[cfg(not(target_os = "windows"))]
    {
        tracing::debug!("no native automation backend for this platform, using fallback engine");
        Ok(Arc::new(FallbackEngine))
    }
}
