//! Two-level command routing: `(group, action)` resolves to exactly one
//! operation call. Argument extraction and type checks happen here, before
//! the operation runs; raw output is never interpreted here - that is the
//! normalizer's job.

use std::path::PathBuf;

use serde_json::json;

use deskpilot::{MouseButton, Selector};

use crate::error::CliError;
use crate::invocation::Invocation;
use crate::tools::ToolSuite;

pub const KNOWN_GROUPS: &[&str] = &["desktop", "ui", "fs", "ocr", "sys", "contract", "diag"];

const DEFAULT_TREE_DEPTH: usize = 10;
const DEFAULT_TAIL_LINES: usize = 100;
const VOLUME_STEP: i32 = 5;
const BRIGHTNESS_STEP: i32 = 10;

/// The resolved operation's identity and its raw output.
#[derive(Debug)]
pub struct Dispatched {
    pub tool: String,
    pub raw: String,
}

/// Resolve the invocation and run the operation exactly once.
///
/// An `Err` from the operation itself is folded into an explicit structured
/// failure payload so it flows down the same normalization path as an
/// in-band `success: false`.
pub async fn dispatch(
    invocation: &Invocation,
    tools: &dyn ToolSuite,
) -> Result<Dispatched, CliError> {
    let opts = &invocation.options;

    let out: anyhow::Result<String> = match (invocation.group.as_str(), invocation.action.as_str())
    {
        // desktop -----------------------------------------------------------
        ("desktop", "mouse-move") => {
            let x = to_i32(opts.require_int("x")?, "x")?;
            let y = to_i32(opts.require_int("y")?, "y")?;
            tools.mouse_move(x, y).await
        }
        ("desktop", "click") => {
            let x = to_i32(opts.require_int("x")?, "x")?;
            let y = to_i32(opts.require_int("y")?, "y")?;
            let button = parse_button(opts.get_string("button"))?;
            tools.mouse_click(x, y, button).await
        }
        ("desktop", "double-click") => {
            let x = to_i32(opts.require_int("x")?, "x")?;
            let y = to_i32(opts.require_int("y")?, "y")?;
            tools.mouse_double_click(x, y).await
        }
        ("desktop", "scroll") => {
            let dx = to_i32(opts.get_int("dx")?.unwrap_or(0), "dx")?;
            let dy = to_i32(opts.get_int("dy")?.unwrap_or(0), "dy")?;
            tools.mouse_scroll(dx, dy).await
        }
        ("desktop", "type-text") => {
            let text = opts.require_string("text")?;
            tools.type_text(&text).await
        }
        ("desktop", "send-keys") => {
            let combo = opts.require_string("keys")?;
            let keys = split_keys(&combo);
            if keys.is_empty() {
                return Err(CliError::BadArgs(format!(
                    "option --keys '{combo}' contains no key tokens"
                )));
            }
            tools.send_keys(&keys).await
        }
        ("desktop", "clipboard-get") => tools.clipboard_get().await,
        ("desktop", "clipboard-set") => {
            let text = opts.require_string("text")?;
            tools.clipboard_set(&text).await
        }
        ("desktop", "exec") => {
            let command = opts.require_string("command")?;
            let timeout_ms = match opts.get_int("timeout-ms")? {
                Some(ms) => Some(to_u64(ms, "timeout-ms")?),
                None => None,
            };
            tools.exec(&command, timeout_ms).await
        }
        ("desktop", "screenshot") => {
            let path = opts
                .get_string("path")
                .map(PathBuf::from)
                .unwrap_or_else(default_screenshot_path);
            tools.screenshot(&path).await
        }
        ("desktop", "apps") => tools.apps().await,
        ("desktop", "focused-window") => tools.focused_window().await,
        ("desktop", "window-activate") => {
            let title = opts.require_string("title")?;
            tools.window_activate(&title).await
        }
        ("desktop", "window-close") => {
            let title = opts.require_string("title")?;
            tools.window_close(&title).await
        }
        ("desktop", "window-minimize") => {
            let title = opts.require_string("title")?;
            tools.window_minimize(&title).await
        }
        ("desktop", "window-maximize") => {
            let title = opts.require_string("title")?;
            tools.window_maximize(&title).await
        }

        // ui ----------------------------------------------------------------
        ("ui", "tree") => {
            let title = opts.get_string("title");
            let depth = match opts.get_int("depth")? {
                Some(d) => to_usize(d, "depth")?,
                None => DEFAULT_TREE_DEPTH,
            };
            tools.ui_tree(title.as_deref(), depth).await
        }
        ("ui", "find") => {
            let raw = opts.require_string("selector")?;
            match Selector::parse(&raw) {
                Ok(selector) => tools.ui_find(&selector).await,
                Err(e) => Err(e.into()),
            }
        }
        ("ui", "text") => {
            let raw = opts.require_string("selector")?;
            match Selector::parse(&raw) {
                Ok(selector) => tools.ui_text(&selector).await,
                Err(e) => Err(e.into()),
            }
        }
        ("ui", "invoke") => {
            let raw = opts.require_string("selector")?;
            match Selector::parse(&raw) {
                Ok(selector) => tools.ui_invoke(&selector).await,
                Err(e) => Err(e.into()),
            }
        }
        ("ui", "set-value") => {
            let raw = opts.require_string("selector")?;
            let value = opts.require_string("value")?;
            match Selector::parse(&raw) {
                Ok(selector) => tools.ui_set_value(&selector, &value).await,
                Err(e) => Err(e.into()),
            }
        }
        ("ui", "focus") => {
            let raw = opts.require_string("selector")?;
            match Selector::parse(&raw) {
                Ok(selector) => tools.ui_focus(&selector).await,
                Err(e) => Err(e.into()),
            }
        }

        // fs ----------------------------------------------------------------
        ("fs", "read") => tools.fs_read(&require_path(invocation)?).await,
        ("fs", "write") => {
            let path = require_path(invocation)?;
            let content = opts.require_string("content")?;
            let append = opts.get_bool("append", false)?;
            tools.fs_write(&path, &content, append).await
        }
        ("fs", "create") => tools.fs_create(&require_path(invocation)?).await,
        ("fs", "delete") => {
            let path = require_path(invocation)?;
            let recursive = opts.get_bool("recursive", false)?;
            tools.fs_delete(&path, recursive).await
        }
        ("fs", "copy") => {
            let from = PathBuf::from(opts.require_string("from")?);
            let to = PathBuf::from(opts.require_string("to")?);
            tools.fs_copy(&from, &to).await
        }
        ("fs", "move") => {
            let from = PathBuf::from(opts.require_string("from")?);
            let to = PathBuf::from(opts.require_string("to")?);
            tools.fs_move(&from, &to).await
        }
        ("fs", "mkdir") => tools.fs_mkdir(&require_path(invocation)?).await,
        ("fs", "rmdir") => tools.fs_rmdir(&require_path(invocation)?).await,
        ("fs", "list") => tools.fs_list(&require_path(invocation)?).await,
        ("fs", "exists") => tools.fs_exists(&require_path(invocation)?).await,
        ("fs", "info") => tools.fs_info(&require_path(invocation)?).await,

        // ocr ---------------------------------------------------------------
        ("ocr", "image") => tools.ocr_image(&require_path(invocation)?).await,
        ("ocr", "screen") => tools.ocr_screen().await,

        // sys ---------------------------------------------------------------
        ("sys", "volume") => {
            if let Some(percent) = opts.get_int("percent")? {
                tools.volume_set(to_u32(percent, "percent")?).await
            } else if opts.get_bool("mute", false)? {
                tools.volume_mute(true).await
            } else if opts.get_bool("unmute", false)? {
                tools.volume_mute(false).await
            } else if opts.get_bool("inc", false)? {
                tools.volume_step(VOLUME_STEP).await
            } else if opts.get_bool("dec", false)? {
                tools.volume_step(-VOLUME_STEP).await
            } else {
                tools.volume_get().await
            }
        }
        ("sys", "brightness") => {
            if let Some(percent) = opts.get_int("percent")? {
                tools.brightness_set(to_u32(percent, "percent")?).await
            } else if opts.get_bool("inc", false)? {
                tools.brightness_step(BRIGHTNESS_STEP).await
            } else if opts.get_bool("dec", false)? {
                tools.brightness_step(-BRIGHTNESS_STEP).await
            } else {
                tools.brightness_get().await
            }
        }
        ("sys", "resolution") => {
            let width = opts.get_int("width")?;
            let height = opts.get_int("height")?;
            match (width, height) {
                (Some(w), Some(h)) => {
                    tools
                        .resolution_set(to_u32(w, "width")?, to_u32(h, "height")?)
                        .await
                }
                (None, None) => tools.resolution_get().await,
                _ => {
                    return Err(CliError::BadArgs(
                        "setting the resolution requires both --width and --height".to_string(),
                    ))
                }
            }
        }

        // contract ----------------------------------------------------------
        ("contract", "validate") => tools.contract_validate(&require_path(invocation)?).await,

        // diag --------------------------------------------------------------
        ("diag", "tail-log") => {
            let path = require_path(invocation)?;
            let lines = match opts.get_int("lines")? {
                Some(n) => to_usize(n, "lines")?,
                None => DEFAULT_TAIL_LINES,
            };
            tools.diag_tail_log(&path, lines).await
        }
        ("diag", "state") => tools.diag_state().await,

        // unknown -----------------------------------------------------------
        (group, action) => {
            return Err(if KNOWN_GROUPS.contains(&group) {
                CliError::UnknownAction {
                    group: group.to_string(),
                    action: action.to_string(),
                }
            } else {
                CliError::UnknownGroup(group.to_string())
            });
        }
    };

    let raw = out.unwrap_or_else(|e| json!({"success": false, "error": e.to_string()}).to_string());

    Ok(Dispatched {
        tool: format!("{}.{}", invocation.group, invocation.action),
        raw,
    })
}

/// Split a compound key argument like `ctrl+shift+esc` into discrete tokens.
pub fn split_keys(combo: &str) -> Vec<String> {
    combo
        .split(['+', ',', ' '])
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .collect()
}

fn require_path(invocation: &Invocation) -> Result<PathBuf, CliError> {
    Ok(PathBuf::from(invocation.options.require_string("path")?))
}

fn parse_button(raw: Option<String>) -> Result<MouseButton, CliError> {
    match raw {
        None => Ok(MouseButton::Left),
        Some(raw) => raw
            .parse::<MouseButton>()
            .map_err(|e| CliError::BadArgs(e.to_string())),
    }
}

fn to_i32(value: i64, name: &str) -> Result<i32, CliError> {
    i32::try_from(value)
        .map_err(|_| CliError::BadArgs(format!("option --{name} is out of range: {value}")))
}

fn to_u32(value: i64, name: &str) -> Result<u32, CliError> {
    u32::try_from(value)
        .map_err(|_| CliError::BadArgs(format!("option --{name} must be non-negative: {value}")))
}

fn to_u64(value: i64, name: &str) -> Result<u64, CliError> {
    u64::try_from(value)
        .map_err(|_| CliError::BadArgs(format!("option --{name} must be non-negative: {value}")))
}

fn to_usize(value: i64, name: &str) -> Result<usize, CliError> {
    usize::try_from(value)
        .map_err(|_| CliError::BadArgs(format!("option --{name} must be non-negative: {value}")))
}

fn default_screenshot_path() -> PathBuf {
    let stamp = chrono::Local::now().format("%Y%m%d-%H%M%S");
    std::env::temp_dir().join(format!("deskpilot-screenshot-{stamp}.png"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keys_split_on_plus_comma_and_space() {
        assert_eq!(split_keys("ctrl+shift+esc"), vec!["ctrl", "shift", "esc"]);
        assert_eq!(split_keys("ctrl, alt, del"), vec!["ctrl", "alt", "del"]);
        assert_eq!(split_keys("win d"), vec!["win", "d"]);
    }

    #[test]
    fn keys_split_drops_empty_tokens() {
        assert_eq!(split_keys("ctrl++esc"), vec!["ctrl", "esc"]);
        assert_eq!(split_keys("  "), Vec::<String>::new());
    }
}
