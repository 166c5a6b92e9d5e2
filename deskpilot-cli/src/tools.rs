//! The concrete operation catalog behind the command router.
//!
//! Every operation is an async call that takes typed, already-validated
//! arguments and returns a single string - plain text or JSON-as-text. The
//! trait carries default bodies that report the operation as unavailable
//! (the same pattern the platform engine trait uses), so test suites can
//! override only the operations they care about.

use std::path::Path;

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use serde_json::json;

use deskpilot::{Desktop, MouseButton, Selector};

macro_rules! unavailable {
    ($name:literal) => {
        Err(anyhow!(concat!(
            "operation '",
            $name,
            "' is not available in this tool suite"
        )))
    };
}

#[async_trait]
pub trait ToolSuite: Send + Sync {
    // desktop

    async fn mouse_move(&self, _x: i32, _y: i32) -> Result<String> {
        unavailable!("desktop.mouse-move")
    }

    async fn mouse_click(&self, _x: i32, _y: i32, _button: MouseButton) -> Result<String> {
        unavailable!("desktop.click")
    }

    async fn mouse_double_click(&self, _x: i32, _y: i32) -> Result<String> {
        unavailable!("desktop.double-click")
    }

    async fn mouse_scroll(&self, _dx: i32, _dy: i32) -> Result<String> {
        unavailable!("desktop.scroll")
    }

    async fn type_text(&self, _text: &str) -> Result<String> {
        unavailable!("desktop.type-text")
    }

    async fn send_keys(&self, _keys: &[String]) -> Result<String> {
        unavailable!("desktop.send-keys")
    }

    async fn clipboard_get(&self) -> Result<String> {
        unavailable!("desktop.clipboard-get")
    }

    async fn clipboard_set(&self, _text: &str) -> Result<String> {
        unavailable!("desktop.clipboard-set")
    }

    async fn exec(&self, _command: &str, _timeout_ms: Option<u64>) -> Result<String> {
        unavailable!("desktop.exec")
    }

    async fn screenshot(&self, _path: &Path) -> Result<String> {
        unavailable!("desktop.screenshot")
    }

    async fn apps(&self) -> Result<String> {
        unavailable!("desktop.apps")
    }

    async fn focused_window(&self) -> Result<String> {
        unavailable!("desktop.focused-window")
    }

    async fn window_activate(&self, _title: &str) -> Result<String> {
        unavailable!("desktop.window-activate")
    }

    async fn window_close(&self, _title: &str) -> Result<String> {
        unavailable!("desktop.window-close")
    }

    async fn window_minimize(&self, _title: &str) -> Result<String> {
        unavailable!("desktop.window-minimize")
    }

    async fn window_maximize(&self, _title: &str) -> Result<String> {
        unavailable!("desktop.window-maximize")
    }

    // ui

    async fn ui_tree(&self, _title: Option<&str>, _depth: usize) -> Result<String> {
        unavailable!("ui.tree")
    }

    async fn ui_find(&self, _selector: &Selector) -> Result<String> {
        unavailable!("ui.find")
    }

    async fn ui_text(&self, _selector: &Selector) -> Result<String> {
        unavailable!("ui.text")
    }

    async fn ui_invoke(&self, _selector: &Selector) -> Result<String> {
        unavailable!("ui.invoke")
    }

    async fn ui_set_value(&self, _selector: &Selector, _value: &str) -> Result<String> {
        unavailable!("ui.set-value")
    }

    async fn ui_focus(&self, _selector: &Selector) -> Result<String> {
        unavailable!("ui.focus")
    }

    // fs

    async fn fs_read(&self, _path: &Path) -> Result<String> {
        unavailable!("fs.read")
    }

    async fn fs_write(&self, _path: &Path, _content: &str, _append: bool) -> Result<String> {
        unavailable!("fs.write")
    }

    async fn fs_create(&self, _path: &Path) -> Result<String> {
        unavailable!("fs.create")
    }

    async fn fs_delete(&self, _path: &Path, _recursive: bool) -> Result<String> {
        unavailable!("fs.delete")
    }

    async fn fs_copy(&self, _from: &Path, _to: &Path) -> Result<String> {
        unavailable!("fs.copy")
    }

    async fn fs_move(&self, _from: &Path, _to: &Path) -> Result<String> {
        unavailable!("fs.move")
    }

    async fn fs_mkdir(&self, _path: &Path) -> Result<String> {
        unavailable!("fs.mkdir")
    }

    async fn fs_rmdir(&self, _path: &Path) -> Result<String> {
        unavailable!("fs.rmdir")
    }

    async fn fs_list(&self, _path: &Path) -> Result<String> {
        unavailable!("fs.list")
    }

    async fn fs_exists(&self, _path: &Path) -> Result<String> {
        unavailable!("fs.exists")
    }

    async fn fs_info(&self, _path: &Path) -> Result<String> {
        unavailable!("fs.info")
    }

    // ocr

    async fn ocr_image(&self, _path: &Path) -> Result<String> {
        unavailable!("ocr.image")
    }

    async fn ocr_screen(&self) -> Result<String> {
        unavailable!("ocr.screen")
    }

    // sys

    async fn volume_get(&self) -> Result<String> {
        unavailable!("sys.volume")
    }

    async fn volume_set(&self, _percent: u32) -> Result<String> {
        unavailable!("sys.volume")
    }

    async fn volume_mute(&self, _mute: bool) -> Result<String> {
        unavailable!("sys.volume")
    }

    async fn volume_step(&self, _delta: i32) -> Result<String> {
        unavailable!("sys.volume")
    }

    async fn brightness_get(&self) -> Result<String> {
        unavailable!("sys.brightness")
    }

    async fn brightness_set(&self, _percent: u32) -> Result<String> {
        unavailable!("sys.brightness")
    }

    async fn brightness_step(&self, _delta: i32) -> Result<String> {
        unavailable!("sys.brightness")
    }

    async fn resolution_get(&self) -> Result<String> {
        unavailable!("sys.resolution")
    }

    async fn resolution_set(&self, _width: u32, _height: u32) -> Result<String> {
        unavailable!("sys.resolution")
    }

    // contract

    async fn contract_validate(&self, _path: &Path) -> Result<String> {
        unavailable!("contract.validate")
    }

    // diag

    async fn diag_tail_log(&self, _path: &Path, _lines: usize) -> Result<String> {
        unavailable!("diag.tail-log")
    }

    async fn diag_state(&self) -> Result<String> {
        unavailable!("diag.state")
    }
}

/// Production tool suite backed by the core `Desktop`.
pub struct DesktopTools {
    desktop: Desktop,
}

impl DesktopTools {
    pub fn new() -> Result<Self> {
        Ok(Self {
            desktop: Desktop::new().context("failed to initialize desktop automation")?,
        })
    }
}

#[async_trait]
impl ToolSuite for DesktopTools {
    async fn mouse_move(&self, x: i32, y: i32) -> Result<String> {
        self.desktop.mouse_move(x, y)?;
        Ok(json!({"success": true, "action": "mouseMove", "x": x, "y": y}).to_string())
    }

    async fn mouse_click(&self, x: i32, y: i32, button: MouseButton) -> Result<String> {
        self.desktop.mouse_click(x, y, button)?;
        Ok(json!({
            "success": true,
            "action": "click",
            "x": x,
            "y": y,
            "button": format!("{button:?}").to_lowercase(),
        })
        .to_string())
    }

    async fn mouse_double_click(&self, x: i32, y: i32) -> Result<String> {
        self.desktop.mouse_double_click(x, y)?;
        Ok(json!({"success": true, "action": "doubleClick", "x": x, "y": y}).to_string())
    }

    async fn mouse_scroll(&self, dx: i32, dy: i32) -> Result<String> {
        self.desktop.mouse_scroll(dx, dy)?;
        Ok(json!({"success": true, "action": "scroll", "dx": dx, "dy": dy}).to_string())
    }

    async fn type_text(&self, text: &str) -> Result<String> {
        self.desktop.type_text(text)?;
        Ok(json!({"success": true, "action": "typeText", "length": text.chars().count()})
            .to_string())
    }

    async fn send_keys(&self, keys: &[String]) -> Result<String> {
        self.desktop.send_keys(keys)?;
        Ok(json!({"success": true, "action": "sendKeys", "keys": keys}).to_string())
    }

    async fn clipboard_get(&self) -> Result<String> {
        // Raw clipboard text; the normalizer treats prose as success.
        Ok(self.desktop.clipboard_text()?)
    }

    async fn clipboard_set(&self, text: &str) -> Result<String> {
        self.desktop.set_clipboard_text(text)?;
        Ok(json!({"success": true, "action": "clipboardSet", "length": text.chars().count()})
            .to_string())
    }

    async fn exec(&self, command: &str, timeout_ms: Option<u64>) -> Result<String> {
        let output = self.desktop.run_command(command, timeout_ms).await?;
        Ok(json!({
            "success": output.exit_status == Some(0),
            "exitCode": output.exit_status,
            "stdout": output.stdout,
            "stderr": output.stderr,
        })
        .to_string())
    }

    async fn screenshot(&self, path: &Path) -> Result<String> {
        let shot = self.desktop.capture_screen().await?;
        shot.save_png(path)?;
        Ok(json!({
            "success": true,
            "path": path.display().to_string(),
            "width": shot.width,
            "height": shot.height,
        })
        .to_string())
    }

    async fn apps(&self) -> Result<String> {
        let windows = self.desktop.windows()?;
        Ok(json!({"success": true, "windows": windows}).to_string())
    }

    async fn focused_window(&self) -> Result<String> {
        let window = self.desktop.focused_window()?;
        Ok(json!({"success": true, "window": window}).to_string())
    }

    async fn window_activate(&self, title: &str) -> Result<String> {
        self.desktop.activate_window(title)?;
        Ok(json!({"success": true, "action": "windowActivate", "title": title}).to_string())
    }

    async fn window_close(&self, title: &str) -> Result<String> {
        self.desktop.close_window(title)?;
        Ok(json!({"success": true, "action": "windowClose", "title": title}).to_string())
    }

    async fn window_minimize(&self, title: &str) -> Result<String> {
        self.desktop.minimize_window(title)?;
        Ok(json!({"success": true, "action": "windowMinimize", "title": title}).to_string())
    }

    async fn window_maximize(&self, title: &str) -> Result<String> {
        self.desktop.maximize_window(title)?;
        Ok(json!({"success": true, "action": "windowMaximize", "title": title}).to_string())
    }

    async fn ui_tree(&self, title: Option<&str>, depth: usize) -> Result<String> {
        let tree = self.desktop.window_tree(title, depth)?;
        Ok(json!({"success": true, "tree": tree}).to_string())
    }

    async fn ui_find(&self, selector: &Selector) -> Result<String> {
        let element = self.desktop.find_element(selector)?;
        Ok(json!({
            "success": true,
            "selector": selector.to_string(),
            "element": element,
        })
        .to_string())
    }

    async fn ui_text(&self, selector: &Selector) -> Result<String> {
        // Raw element text; prose rides the normalizer heuristic.
        Ok(self.desktop.element_text(selector)?)
    }

    async fn ui_invoke(&self, selector: &Selector) -> Result<String> {
        let element = self.desktop.invoke(selector)?;
        Ok(json!({
            "success": true,
            "action": "invoke",
            "selector": selector.to_string(),
            "element": element,
        })
        .to_string())
    }

    async fn ui_set_value(&self, selector: &Selector, value: &str) -> Result<String> {
        let element = self.desktop.set_value(selector, value)?;
        Ok(json!({
            "success": true,
            "action": "setValue",
            "selector": selector.to_string(),
            "element": element,
        })
        .to_string())
    }

    async fn ui_focus(&self, selector: &Selector) -> Result<String> {
        let element = self.desktop.focus(selector)?;
        Ok(json!({
            "success": true,
            "action": "focus",
            "selector": selector.to_string(),
            "element": element,
        })
        .to_string())
    }

    async fn fs_read(&self, path: &Path) -> Result<String> {
        let content = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("failed to read {}", path.display()))?;
        Ok(json!({
            "success": true,
            "path": path.display().to_string(),
            "content": content,
            "bytes": content.len(),
        })
        .to_string())
    }

    async fn fs_write(&self, path: &Path, content: &str, append: bool) -> Result<String> {
        if append {
            use tokio::io::AsyncWriteExt;
            let mut file = tokio::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .await
                .with_context(|| format!("failed to open {} for append", path.display()))?;
            file.write_all(content.as_bytes()).await?;
        } else {
            tokio::fs::write(path, content)
                .await
                .with_context(|| format!("failed to write {}", path.display()))?;
        }
        let action = if append { "append" } else { "write" };
        Ok(json!({
            "success": true,
            "action": action,
            "path": path.display().to_string(),
            "bytes": content.len(),
        })
        .to_string())
    }

    async fn fs_create(&self, path: &Path) -> Result<String> {
        tokio::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(path)
            .await
            .with_context(|| format!("failed to create {}", path.display()))?;
        Ok(json!({"success": true, "action": "create", "path": path.display().to_string()})
            .to_string())
    }

    async fn fs_delete(&self, path: &Path, recursive: bool) -> Result<String> {
        let metadata = tokio::fs::metadata(path)
            .await
            .with_context(|| format!("failed to stat {}", path.display()))?;
        if metadata.is_dir() {
            if !recursive {
                return Err(anyhow!(
                    "{} is a directory; pass --recursive to delete it",
                    path.display()
                ));
            }
            tokio::fs::remove_dir_all(path).await?;
        } else {
            tokio::fs::remove_file(path).await?;
        }
        Ok(json!({"success": true, "action": "delete", "path": path.display().to_string()})
            .to_string())
    }

    async fn fs_copy(&self, from: &Path, to: &Path) -> Result<String> {
        let bytes = tokio::fs::copy(from, to)
            .await
            .with_context(|| format!("failed to copy {} to {}", from.display(), to.display()))?;
        Ok(json!({
            "success": true,
            "action": "copy",
            "from": from.display().to_string(),
            "to": to.display().to_string(),
            "bytes": bytes,
        })
        .to_string())
    }

    async fn fs_move(&self, from: &Path, to: &Path) -> Result<String> {
        tokio::fs::rename(from, to)
            .await
            .with_context(|| format!("failed to move {} to {}", from.display(), to.display()))?;
        Ok(json!({
            "success": true,
            "action": "move",
            "from": from.display().to_string(),
            "to": to.display().to_string(),
        })
        .to_string())
    }

    async fn fs_mkdir(&self, path: &Path) -> Result<String> {
        tokio::fs::create_dir_all(path)
            .await
            .with_context(|| format!("failed to create directory {}", path.display()))?;
        Ok(json!({"success": true, "action": "mkdir", "path": path.display().to_string()})
            .to_string())
    }

    async fn fs_rmdir(&self, path: &Path) -> Result<String> {
        tokio::fs::remove_dir(path)
            .await
            .with_context(|| format!("failed to remove directory {}", path.display()))?;
        Ok(json!({"success": true, "action": "rmdir", "path": path.display().to_string()})
            .to_string())
    }

    async fn fs_list(&self, path: &Path) -> Result<String> {
        let mut read_dir = tokio::fs::read_dir(path)
            .await
            .with_context(|| format!("failed to list {}", path.display()))?;
        let mut entries = Vec::new();
        while let Some(entry) = read_dir.next_entry().await? {
            let file_type = entry.file_type().await?;
            let metadata = entry.metadata().await?;
            let kind = if file_type.is_symlink() {
                "symlink"
            } else if file_type.is_dir() {
                "dir"
            } else {
                "file"
            };
            entries.push(json!({
                "name": entry.file_name().to_string_lossy(),
                "kind": kind,
                "size": metadata.len(),
            }));
        }
        entries.sort_by(|a, b| a["name"].as_str().cmp(&b["name"].as_str()));
        Ok(json!({
            "success": true,
            "path": path.display().to_string(),
            "count": entries.len(),
            "entries": entries,
        })
        .to_string())
    }

    async fn fs_exists(&self, path: &Path) -> Result<String> {
        let exists = tokio::fs::try_exists(path).await.unwrap_or(false);
        Ok(json!({
            "success": true,
            "path": path.display().to_string(),
            "exists": exists,
        })
        .to_string())
    }

    async fn fs_info(&self, path: &Path) -> Result<String> {
        let metadata = tokio::fs::metadata(path)
            .await
            .with_context(|| format!("failed to stat {}", path.display()))?;
        let modified = metadata
            .modified()
            .ok()
            .map(|t| chrono::DateTime::<chrono::Utc>::from(t).to_rfc3339());
        Ok(json!({
            "success": true,
            "path": path.display().to_string(),
            "isDir": metadata.is_dir(),
            "size": metadata.len(),
            "readonly": metadata.permissions().readonly(),
            "modified": modified,
        })
        .to_string())
    }

    async fn ocr_image(&self, path: &Path) -> Result<String> {
        // Recognized text as-is; prose rides the normalizer heuristic.
        Ok(self.desktop.ocr_image(path).await?)
    }

    async fn ocr_screen(&self) -> Result<String> {
        Ok(self.desktop.ocr_screen().await?)
    }

    async fn volume_get(&self) -> Result<String> {
        let percent = self.desktop.volume().await?;
        Ok(json!({"success": true, "percent": percent}).to_string())
    }

    async fn volume_set(&self, percent: u32) -> Result<String> {
        self.desktop.set_volume(percent).await?;
        Ok(json!({"success": true, "action": "setVolume", "percent": percent}).to_string())
    }

    async fn volume_mute(&self, mute: bool) -> Result<String> {
        self.desktop.set_mute(mute).await?;
        let action = if mute { "mute" } else { "unmute" };
        Ok(json!({"success": true, "action": action}).to_string())
    }

    async fn volume_step(&self, delta: i32) -> Result<String> {
        self.desktop.step_volume(delta).await?;
        Ok(json!({"success": true, "action": "stepVolume", "delta": delta}).to_string())
    }

    async fn brightness_get(&self) -> Result<String> {
        let percent = self.desktop.brightness().await?;
        Ok(json!({"success": true, "percent": percent}).to_string())
    }

    async fn brightness_set(&self, percent: u32) -> Result<String> {
        self.desktop.set_brightness(percent).await?;
        Ok(json!({"success": true, "action": "setBrightness", "percent": percent}).to_string())
    }

    async fn brightness_step(&self, delta: i32) -> Result<String> {
        self.desktop.step_brightness(delta).await?;
        Ok(json!({"success": true, "action": "stepBrightness", "delta": delta}).to_string())
    }

    async fn resolution_get(&self) -> Result<String> {
        let (width, height) = self.desktop.resolution()?;
        Ok(json!({"success": true, "width": width, "height": height}).to_string())
    }

    async fn resolution_set(&self, width: u32, height: u32) -> Result<String> {
        self.desktop.set_resolution(width, height).await?;
        Ok(json!({
            "success": true,
            "action": "setResolution",
            "width": width,
            "height": height,
        })
        .to_string())
    }

    async fn contract_validate(&self, path: &Path) -> Result<String> {
        let text = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("failed to read {}", path.display()))?;
        let (errors, warnings) = match serde_json::from_str::<serde_json::Value>(&text) {
            Ok(document) => validate_contract(&document),
            Err(e) => (vec![format!("not valid JSON: {e}")], Vec::new()),
        };
        Ok(json!({
            "success": errors.is_empty(),
            "path": path.display().to_string(),
            "errors": errors,
            "warnings": warnings,
        })
        .to_string())
    }

    async fn diag_tail_log(&self, path: &Path, lines: usize) -> Result<String> {
        let text = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("failed to read {}", path.display()))?;
        let all: Vec<&str> = text.lines().collect();
        let start = all.len().saturating_sub(lines);
        let tail = &all[start..];
        Ok(json!({
            "success": true,
            "path": path.display().to_string(),
            "lineCount": tail.len(),
            "lines": tail,
        })
        .to_string())
    }

    async fn diag_state(&self) -> Result<String> {
        let monitors = self.desktop.monitors().unwrap_or_default();
        let windows = self.desktop.windows().unwrap_or_default();
        let processes = self.desktop.processes();
        Ok(json!({
            "success": true,
            "monitors": monitors,
            "windows": windows,
            "processCount": processes.len(),
        })
        .to_string())
    }
}

/// Structural validation of an automation contract document.
///
/// A contract must be a JSON object with non-empty `name` and `version`
/// strings and a non-empty `steps` array whose entries each carry a
/// non-empty `tool` string.
fn validate_contract(document: &serde_json::Value) -> (Vec<String>, Vec<String>) {
    use serde_json::Value;

    let mut errors = Vec::new();
    let mut warnings = Vec::new();

    let Some(object) = document.as_object() else {
        errors.push("contract root must be a JSON object".to_string());
        return (errors, warnings);
    };

    for field in ["name", "version"] {
        match object.get(field) {
            Some(Value::String(s)) if !s.trim().is_empty() => {}
            Some(Value::String(_)) => {
                errors.push(format!("required field '{field}' is empty"));
            }
            Some(_) => errors.push(format!("required field '{field}' must be a string")),
            None => errors.push(format!("missing required field '{field}'")),
        }
    }

    if object.get("description").is_none() {
        warnings.push("no 'description' field - consider documenting the contract".to_string());
    }

    match object.get("steps") {
        Some(Value::Array(steps)) if !steps.is_empty() => {
            for (index, step) in steps.iter().enumerate() {
                match step.get("tool").and_then(Value::as_str) {
                    Some(tool) if !tool.trim().is_empty() => {}
                    Some(_) => errors.push(format!("steps[{index}] has an empty 'tool' field")),
                    None => errors.push(format!("steps[{index}] is missing the 'tool' field")),
                }
                if step.get("arguments").is_none() {
                    warnings.push(format!("steps[{index}] has no 'arguments' field"));
                }
            }
        }
        Some(Value::Array(_)) => errors.push("'steps' must not be empty".to_string()),
        Some(_) => errors.push("'steps' must be an array".to_string()),
        None => errors.push("missing required field 'steps'".to_string()),
    }

    (errors, warnings)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn valid_contract_passes() {
        let document = json!({
            "name": "order-entry",
            "version": "1.2",
            "description": "fill the order form",
            "steps": [{"tool": "ui.set-value", "arguments": {"selector": "aid=qty", "value": "3"}}],
        });
        let (errors, warnings) = validate_contract(&document);
        assert!(errors.is_empty(), "{errors:?}");
        assert!(warnings.is_empty(), "{warnings:?}");
    }

    #[test]
    fn empty_required_fields_are_errors() {
        let document = json!({"name": "", "version": "", "steps": []});
        let (errors, _) = validate_contract(&document);
        assert!(errors.iter().any(|e| e.contains("'name'")));
        assert!(errors.iter().any(|e| e.contains("'version'")));
        assert!(errors.iter().any(|e| e.contains("steps")));
    }

    #[test]
    fn steps_without_tool_are_errors() {
        let document = json!({
            "name": "x", "version": "1",
            "steps": [{"arguments": {}}, {"tool": ""}],
        });
        let (errors, _) = validate_contract(&document);
        assert!(errors.iter().any(|e| e.contains("steps[0]")));
        assert!(errors.iter().any(|e| e.contains("steps[1]")));
    }

    #[test]
    fn non_object_root_is_an_error() {
        let (errors, _) = validate_contract(&json!([1, 2, 3]));
        assert_eq!(errors.len(), 1);
    }

    #[test]
    fn missing_description_is_only_a_warning() {
        let document = json!({
            "name": "x", "version": "1",
            "steps": [{"tool": "fs.read", "arguments": {}}],
        });
        let (errors, warnings) = validate_contract(&document);
        assert!(errors.is_empty());
        assert_eq!(warnings.len(), 1);
    }
}
