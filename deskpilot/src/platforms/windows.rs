#![allow(clippy::arc_with_non_send_sync)]

use std::path::Path;
use std::sync::Arc;

use tracing::debug;
use uiautomation::controls::ControlType;
use uiautomation::inputs::Mouse;
use uiautomation::patterns;
use uiautomation::types::{Point, TreeScope, WindowVisualState};
use uiautomation::UIAutomation;

use windows::Win32::UI::Input::KeyboardAndMouse::{
    SendInput, INPUT, INPUT_0, INPUT_MOUSE, MOUSEEVENTF_HWHEEL, MOUSEEVENTF_MIDDLEDOWN,
    MOUSEEVENTF_MIDDLEUP, MOUSEEVENTF_WHEEL, MOUSEINPUT,
};

use crate::errors::AutomationError;
use crate::platforms::AutomationEngine;
use crate::selector::Selector;
use crate::{Bounds, ElementInfo, MouseButton, UiNode};

const FIND_TIMEOUT_MS: u64 = 3000;
const FIND_DEPTH: u32 = 16;
const WHEEL_DELTA: i32 = 120;

pub struct ThreadSafeWinUIAutomation(Arc<UIAutomation>);

// send and sync for wrapper
unsafe impl Send for ThreadSafeWinUIAutomation {}
unsafe impl Sync for ThreadSafeWinUIAutomation {}

pub struct WindowsEngine {
    automation: ThreadSafeWinUIAutomation,
}

impl WindowsEngine {
    pub fn new() -> Result<Self, AutomationError> {
        let automation = UIAutomation::new().map_err(|e| {
            AutomationError::PlatformError(format!("failed to initialize UI Automation: {e}"))
        })?;
        Ok(Self {
            automation: ThreadSafeWinUIAutomation(Arc::new(automation)),
        })
    }

    fn find(&self, selector: &Selector) -> Result<uiautomation::UIElement, AutomationError> {
        let root = self
            .automation
            .0
            .get_root_element()
            .map_err(|e| AutomationError::PlatformError(e.to_string()))?;
        let wanted = selector.clone();
        let matcher = self
            .automation
            .0
            .create_matcher()
            .from_ref(&root)
            .depth(FIND_DEPTH)
            .timeout(FIND_TIMEOUT_MS)
            .filter_fn(Box::new(move |e: &uiautomation::UIElement| {
                let automation_id = e.get_automation_id().unwrap_or_default();
                let name = e.get_name().unwrap_or_default();
                let class_name = e.get_classname().unwrap_or_default();
                let control_type = e
                    .get_control_type()
                    .map(|ct| format!("{ct:?}"))
                    .unwrap_or_default();
                Ok(wanted.matches(
                    non_empty(&automation_id),
                    non_empty(&name),
                    non_empty(&class_name),
                    &control_type,
                ))
            }));

        matcher.find_first().map_err(|e| {
            AutomationError::ElementNotFound(format!("no element matching '{selector}': {e}"))
        })
    }

    fn find_window(&self, title: &str) -> Result<uiautomation::UIElement, AutomationError> {
        let root = self
            .automation
            .0
            .get_root_element()
            .map_err(|e| AutomationError::PlatformError(e.to_string()))?;
        let wanted = title.to_lowercase();
        let matcher = self
            .automation
            .0
            .create_matcher()
            .from_ref(&root)
            .control_type(ControlType::Window)
            .depth(3)
            .timeout(FIND_TIMEOUT_MS)
            .filter_fn(Box::new(move |e: &uiautomation::UIElement| {
                let name = e.get_name().unwrap_or_default().to_lowercase();
                Ok(name.contains(&wanted))
            }));

        matcher.find_first().map_err(|e| {
            AutomationError::WindowNotFound(format!("no window with title '{title}': {e}"))
        })
    }

    fn focused(&self) -> Result<uiautomation::UIElement, AutomationError> {
        self.automation
            .0
            .get_focused_element()
            .map_err(|e| AutomationError::ElementNotFound(e.to_string()))
    }

    fn build_node(
        &self,
        element: &uiautomation::UIElement,
        depth: usize,
        max_depth: usize,
    ) -> UiNode {
        let mut children = Vec::new();
        if depth < max_depth {
            if let Ok(condition) = self.automation.0.create_true_condition() {
                if let Ok(elements) = element.find_all(TreeScope::Children, &condition) {
                    for child in &elements {
                        children.push(self.build_node(child, depth + 1, max_depth));
                    }
                }
            }
        }
        UiNode {
            attributes: element_info(element),
            children,
        }
    }

    fn window_pattern(
        &self,
        title: &str,
    ) -> Result<patterns::UIWindowPattern, AutomationError> {
        let window = self.find_window(title)?;
        window
            .get_pattern::<patterns::UIWindowPattern>()
            .map_err(|e| {
                AutomationError::UnsupportedOperation(format!(
                    "window '{title}' does not support the window pattern: {e}"
                ))
            })
    }

    async fn run_powershell(&self, script: &str) -> Result<String, AutomationError> {
        let output = tokio::process::Command::new("powershell")
            .args(["-NoProfile", "-NonInteractive", "-Command", script])
            .output()
            .await?;
        if !output.status.success() {
            return Err(AutomationError::PlatformError(format!(
                "powershell exited with {:?}: {}",
                output.status.code(),
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }
        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }

    /// Press a virtual key `count` times via WScript.Shell.
    async fn press_vk(&self, vk: u8, count: u32) -> Result<(), AutomationError> {
        let script = format!(
            "$sh = New-Object -ComObject WScript.Shell; 1..{count} | ForEach-Object {{ $sh.SendKeys([char]{vk}) }}"
        );
        self.run_powershell(&script).await.map(|_| ())
    }
}

fn non_empty(s: &str) -> Option<&str> {
    if s.is_empty() {
        None
    } else {
        Some(s)
    }
}

fn element_info(element: &uiautomation::UIElement) -> ElementInfo {
    let bounds = element.get_bounding_rectangle().ok().map(|rect| Bounds {
        x: rect.get_left(),
        y: rect.get_top(),
        width: rect.get_width(),
        height: rect.get_height(),
    });
    ElementInfo {
        automation_id: element
            .get_automation_id()
            .ok()
            .filter(|s| !s.is_empty()),
        name: element.get_name().ok().filter(|s| !s.is_empty()),
        class_name: element.get_classname().ok().filter(|s| !s.is_empty()),
        control_type: element
            .get_control_type()
            .map(|ct| format!("{ct:?}"))
            .unwrap_or_default(),
        bounds,
    }
}

/// Map a key token from the CLI (`ctrl`, `shift`, `esc`, `a`, ...) onto the
/// UI Automation send_keys syntax.
fn to_send_keys(tokens: &[String]) -> String {
    let mut out = String::new();
    for token in tokens {
        let lower = token.to_lowercase();
        let mapped = match lower.as_str() {
            "ctrl" | "control" => "{Ctrl}",
            "shift" => "{Shift}",
            "alt" => "{Alt}",
            "win" | "meta" => "{Win}",
            "enter" | "return" => "{Enter}",
            "esc" | "escape" => "{Esc}",
            "tab" => "{Tab}",
            "space" => " ",
            "backspace" => "{Backspace}",
            "delete" | "del" => "{Delete}",
            "insert" => "{Insert}",
            "home" => "{Home}",
            "end" => "{End}",
            "pageup" | "pgup" => "{PageUp}",
            "pagedown" | "pgdn" => "{PageDown}",
            "up" => "{Up}",
            "down" => "{Down}",
            "left" => "{Left}",
            "right" => "{Right}",
            other => {
                match other.strip_prefix('f').and_then(|n| n.parse::<u8>().ok()) {
                    Some(num) if (1..=24).contains(&num) => {
                        out.push_str(&format!("{{F{num}}}"));
                    }
                    _ => out.push_str(token),
                }
                continue;
            }
        };
        out.push_str(mapped);
    }
    out
}

fn send_mouse_input(flags: windows::Win32::UI::Input::KeyboardAndMouse::MOUSE_EVENT_FLAGS, data: i32) {
    let input = INPUT {
        r#type: INPUT_MOUSE,
        Anonymous: INPUT_0 {
            mi: MOUSEINPUT {
                dx: 0,
                dy: 0,
                mouseData: data as u32,
                dwFlags: flags,
                time: 0,
                dwExtraInfo: 0,
            },
        },
    };
    unsafe {
        SendInput(&[input], std::mem::size_of::<INPUT>() as i32);
    }
}

#[async_trait::async_trait]
impl AutomationEngine for WindowsEngine {
    fn window_tree(
        &self,
        title: Option<&str>,
        max_depth: usize,
    ) -> Result<UiNode, AutomationError> {
        let start = match title {
            Some(t) => self.find_window(t)?,
            None => self
                .automation
                .0
                .get_root_element()
                .map_err(|e| AutomationError::PlatformError(e.to_string()))?,
        };
        Ok(self.build_node(&start, 0, max_depth))
    }

    fn find_element(&self, selector: &Selector) -> Result<ElementInfo, AutomationError> {
        let element = self.find(selector)?;
        Ok(element_info(&element))
    }

    fn element_text(&self, selector: &Selector) -> Result<String, AutomationError> {
        let element = self.find(selector)?;
        if let Ok(value) = element.get_pattern::<patterns::UIValuePattern>() {
            if let Ok(text) = value.get_value() {
                if !text.is_empty() {
                    return Ok(text);
                }
            }
        }
        element
            .get_name()
            .map_err(|e| AutomationError::PlatformError(e.to_string()))
    }

    fn invoke(&self, selector: &Selector) -> Result<ElementInfo, AutomationError> {
        let element = self.find(selector)?;
        let info = element_info(&element);
        match element.get_pattern::<patterns::UIInvokePattern>() {
            Ok(invoke) => invoke
                .invoke()
                .map_err(|e| AutomationError::PlatformError(e.to_string()))?,
            Err(_) => {
                // Not every control is invokable; a plain click is the
                // closest equivalent.
                debug!("element has no invoke pattern, falling back to click");
                element
                    .click()
                    .map_err(|e| AutomationError::PlatformError(e.to_string()))?;
            }
        }
        Ok(info)
    }

    fn set_value(&self, selector: &Selector, value: &str) -> Result<ElementInfo, AutomationError> {
        let element = self.find(selector)?;
        let info = element_info(&element);
        let pattern = element
            .get_pattern::<patterns::UIValuePattern>()
            .map_err(|e| {
                AutomationError::UnsupportedOperation(format!(
                    "element does not support the value pattern: {e}"
                ))
            })?;
        pattern
            .set_value(value)
            .map_err(|e| AutomationError::PlatformError(e.to_string()))?;
        Ok(info)
    }

    fn focus(&self, selector: &Selector) -> Result<ElementInfo, AutomationError> {
        let element = self.find(selector)?;
        let info = element_info(&element);
        element
            .set_focus()
            .map_err(|e| AutomationError::PlatformError(e.to_string()))?;
        Ok(info)
    }

    fn mouse_move(&self, x: i32, y: i32) -> Result<(), AutomationError> {
        let mouse = Mouse::default();
        mouse
            .move_to(Point::new(x, y))
            .map_err(|e| AutomationError::PlatformError(e.to_string()))
    }

    fn mouse_click(&self, x: i32, y: i32, button: MouseButton) -> Result<(), AutomationError> {
        let mouse = Mouse::default();
        let point = Point::new(x, y);
        match button {
            MouseButton::Left => mouse
                .click(point)
                .map_err(|e| AutomationError::PlatformError(e.to_string())),
            MouseButton::Right => mouse
                .right_click(point)
                .map_err(|e| AutomationError::PlatformError(e.to_string())),
            MouseButton::Middle => {
                self.mouse_move(x, y)?;
                send_mouse_input(MOUSEEVENTF_MIDDLEDOWN, 0);
                send_mouse_input(MOUSEEVENTF_MIDDLEUP, 0);
                Ok(())
            }
        }
    }

    fn mouse_double_click(&self, x: i32, y: i32) -> Result<(), AutomationError> {
        let mouse = Mouse::default();
        mouse
            .double_click(Point::new(x, y))
            .map_err(|e| AutomationError::PlatformError(e.to_string()))
    }

    fn mouse_scroll(&self, dx: i32, dy: i32) -> Result<(), AutomationError> {
        if dy != 0 {
            send_mouse_input(MOUSEEVENTF_WHEEL, dy * WHEEL_DELTA);
        }
        if dx != 0 {
            send_mouse_input(MOUSEEVENTF_HWHEEL, dx * WHEEL_DELTA);
        }
        Ok(())
    }

    fn type_text(&self, text: &str) -> Result<(), AutomationError> {
        let focused = self.focused()?;
        focused
            .send_keys(text, 10)
            .map_err(|e| AutomationError::PlatformError(e.to_string()))
    }

    fn send_keys(&self, keys: &[String]) -> Result<(), AutomationError> {
        let sequence = to_send_keys(keys);
        let focused = self.focused()?;
        focused
            .send_keys(&sequence, 10)
            .map_err(|e| AutomationError::PlatformError(e.to_string()))
    }

    fn activate_window(&self, title: &str) -> Result<(), AutomationError> {
        let window = self.find_window(title)?;
        window
            .set_focus()
            .map_err(|e| AutomationError::PlatformError(e.to_string()))
    }

    fn close_window(&self, title: &str) -> Result<(), AutomationError> {
        self.window_pattern(title)?
            .close()
            .map_err(|e| AutomationError::PlatformError(e.to_string()))
    }

    fn minimize_window(&self, title: &str) -> Result<(), AutomationError> {
        self.window_pattern(title)?
            .set_window_visual_state(WindowVisualState::Minimized)
            .map_err(|e| AutomationError::PlatformError(e.to_string()))
    }

    fn maximize_window(&self, title: &str) -> Result<(), AutomationError> {
        self.window_pattern(title)?
            .set_window_visual_state(WindowVisualState::Maximized)
            .map_err(|e| AutomationError::PlatformError(e.to_string()))
    }

    async fn volume(&self) -> Result<u32, AutomationError> {
        let script = concat!(
            "Add-Type -TypeDefinition 'using System; using System.Runtime.InteropServices; ",
            "public class WaveOut { [DllImport(\"winmm.dll\")] public static extern int ",
            "waveOutGetVolume(IntPtr h, out uint v); }'; ",
            "[uint32]$v = 0; [void][WaveOut]::waveOutGetVolume([IntPtr]::Zero, [ref]$v); ",
            "[int](($v -band 0xFFFF) * 100 / 0xFFFF)"
        );
        let out = self.run_powershell(script).await?;
        out.parse::<u32>().map_err(|e| {
            AutomationError::PlatformError(format!("unexpected volume query output '{out}': {e}"))
        })
    }

    async fn set_volume(&self, percent: u32) -> Result<(), AutomationError> {
        let scaled = (percent.min(100) * 0xFFFF) / 100;
        let script = format!(
            concat!(
                "Add-Type -TypeDefinition 'using System; using System.Runtime.InteropServices; ",
                "public class WaveOut {{ [DllImport(\"winmm.dll\")] public static extern int ",
                "waveOutSetVolume(IntPtr h, uint v); }}'; ",
                "[void][WaveOut]::waveOutSetVolume([IntPtr]::Zero, {scaled} -bor ({scaled} -shl 16))"
            ),
            scaled = scaled
        );
        self.run_powershell(&script).await.map(|_| ())
    }

    async fn set_mute(&self, _mute: bool) -> Result<(), AutomationError> {
        // winmm exposes no absolute mute; VK_VOLUME_MUTE toggles the state.
        self.press_vk(173, 1).await
    }

    async fn step_volume(&self, delta: i32) -> Result<(), AutomationError> {
        // One volume key press moves the master volume by two percent.
        let presses = (delta.unsigned_abs()).div_ceil(2).max(1);
        let vk = if delta >= 0 { 175 } else { 174 };
        self.press_vk(vk, presses).await
    }

    async fn brightness(&self) -> Result<u32, AutomationError> {
        let script = "(Get-CimInstance -Namespace root/WMI -ClassName WmiMonitorBrightness).CurrentBrightness";
        let out = self.run_powershell(script).await?;
        out.lines()
            .next()
            .and_then(|l| l.trim().parse::<u32>().ok())
            .ok_or_else(|| {
                AutomationError::PlatformError(format!("unexpected brightness output '{out}'"))
            })
    }

    async fn set_brightness(&self, percent: u32) -> Result<(), AutomationError> {
        let script = format!(
            "(Get-CimInstance -Namespace root/WMI -ClassName WmiMonitorBrightnessMethods).WmiSetBrightness(1, {})",
            percent.min(100)
        );
        self.run_powershell(&script).await.map(|_| ())
    }

    async fn step_brightness(&self, delta: i32) -> Result<(), AutomationError> {
        let current = self.brightness().await? as i32;
        let next = (current + delta).clamp(0, 100) as u32;
        self.set_brightness(next).await
    }

    async fn set_resolution(&self, width: u32, height: u32) -> Result<(), AutomationError> {
        let script = format!(
            concat!(
                "Add-Type -TypeDefinition @'\n",
                "using System;\n",
                "using System.Runtime.InteropServices;\n",
                "public class Display {{\n",
                "  [StructLayout(LayoutKind.Sequential, CharSet = CharSet.Unicode)]\n",
                "  public struct DEVMODE {{\n",
                "    [MarshalAs(UnmanagedType.ByValTStr, SizeConst = 32)] public string dmDeviceName;\n",
                "    public ushort dmSpecVersion; public ushort dmDriverVersion; public ushort dmSize;\n",
                "    public ushort dmDriverExtra; public uint dmFields;\n",
                "    public int dmPositionX; public int dmPositionY;\n",
                "    public uint dmDisplayOrientation; public uint dmDisplayFixedOutput;\n",
                "    public short dmColor; public short dmDuplex; public short dmYResolution;\n",
                "    public short dmTTOption; public short dmCollate;\n",
                "    [MarshalAs(UnmanagedType.ByValTStr, SizeConst = 32)] public string dmFormName;\n",
                "    public ushort dmLogPixels; public uint dmBitsPerPel;\n",
                "    public uint dmPelsWidth; public uint dmPelsHeight;\n",
                "    public uint dmDisplayFlags; public uint dmDisplayFrequency;\n",
                "    public uint dmICMMethod; public uint dmICMIntent; public uint dmMediaType;\n",
                "    public uint dmDitherType; public uint dmReserved1; public uint dmReserved2;\n",
                "    public uint dmPanningWidth; public uint dmPanningHeight;\n",
                "  }}\n",
                "  [DllImport(\"user32.dll\")] public static extern bool EnumDisplaySettings(string name, int mode, ref DEVMODE dm);\n",
                "  [DllImport(\"user32.dll\")] public static extern int ChangeDisplaySettings(ref DEVMODE dm, int flags);\n",
                "}}\n",
                "'@\n",
                "$dm = New-Object Display+DEVMODE\n",
                "$dm.dmSize = [System.Runtime.InteropServices.Marshal]::SizeOf($dm)\n",
                "[void][Display]::EnumDisplaySettings($null, -1, [ref]$dm)\n",
                "$dm.dmPelsWidth = {width}\n",
                "$dm.dmPelsHeight = {height}\n",
                "$dm.dmFields = 0x80000 -bor 0x100000\n",
                "$r = [Display]::ChangeDisplaySettings([ref]$dm, 0)\n",
                "if ($r -ne 0) {{ throw \"ChangeDisplaySettings returned $r\" }}\n"
            ),
            width = width,
            height = height
        );
        self.run_powershell(&script).await.map(|_| ())
    }

    async fn ocr_image(&self, path: &Path) -> Result<String, AutomationError> {
        let canonical = std::fs::canonicalize(path)?;
        let escaped = canonical.display().to_string().replace('\'', "''");
        let script = format!(
            concat!(
                "Add-Type -AssemblyName System.Runtime.WindowsRuntime\n",
                "$null = [Windows.Media.Ocr.OcrEngine,Windows.Foundation.UniversalApiContract,ContentType=WindowsRuntime]\n",
                "$null = [Windows.Graphics.Imaging.BitmapDecoder,Windows.Foundation.UniversalApiContract,ContentType=WindowsRuntime]\n",
                "$null = [Windows.Storage.StorageFile,Windows.Storage,ContentType=WindowsRuntime]\n",
                "function Await($op, $type) {{\n",
                "  $asTask = ([System.WindowsRuntimeSystemExtensions].GetMethods() | Where-Object {{\n",
                "    $_.Name -eq 'AsTask' -and $_.GetParameters().Count -eq 1 -and\n",
                "    $_.GetParameters()[0].ParameterType.Name -eq 'IAsyncOperation`1' }})[0]\n",
                "  $task = $asTask.MakeGenericMethod($type).Invoke($null, @($op))\n",
                "  $task.Wait() | Out-Null\n",
                "  $task.Result\n",
                "}}\n",
                "$file = Await ([Windows.Storage.StorageFile]::GetFileFromPathAsync('{path}')) ([Windows.Storage.StorageFile])\n",
                "$stream = Await ($file.OpenAsync([Windows.Storage.FileAccessMode]::Read)) ([Windows.Storage.Streams.IRandomAccessStream])\n",
                "$decoder = Await ([Windows.Graphics.Imaging.BitmapDecoder]::CreateAsync($stream)) ([Windows.Graphics.Imaging.BitmapDecoder])\n",
                "$bitmap = Await ($decoder.GetSoftwareBitmapAsync()) ([Windows.Graphics.Imaging.SoftwareBitmap])\n",
                "$engine = [Windows.Media.Ocr.OcrEngine]::TryCreateFromUserProfileLanguages()\n",
                "if ($null -eq $engine) {{ throw 'no OCR language pack available' }}\n",
                "$result = Await ($engine.RecognizeAsync($bitmap)) ([Windows.Media.Ocr.OcrResult])\n",
                "$result.Text\n"
            ),
            path = escaped
        );
        self.run_powershell(&script).await
    }
}
