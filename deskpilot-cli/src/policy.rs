//! The safety gate in front of state-mutating and interactive operations.
//!
//! Membership is kept as plain data tables so the whole policy is auditable
//! in one place, independent of how the operations are implemented. The gate
//! runs before the router resolves anything: a denial touches no
//! operation-specific dependency and has zero side effects.

use crate::error::CliError;
use crate::invocation::Invocation;
use crate::options::OptionMap;

/// Desktop actions that move the pointer, press keys, touch the clipboard,
/// run shell commands or manipulate windows.
const GATED_DESKTOP_ACTIONS: &[&str] = &[
    "mouse-move",
    "click",
    "double-click",
    "scroll",
    "type-text",
    "send-keys",
    "clipboard-get",
    "clipboard-set",
    "exec",
    "window-activate",
    "window-close",
    "window-minimize",
    "window-maximize",
];

/// UI-automation actions that act on an element rather than inspecting it.
const GATED_UI_ACTIONS: &[&str] = &["invoke", "set-value", "focus"];

/// Filesystem actions that mutate state.
const GATED_FS_ACTIONS: &[&str] = &[
    "write", "create", "delete", "copy", "move", "mkdir", "rmdir",
];

/// Options whose presence turns a `sys` action into a mutation. A bare
/// "get current value" call is never gated.
const SYS_MUTATING_OPTIONS: &[&str] = &[
    "percent", "mute", "unmute", "inc", "dec", "width", "height",
];

pub fn is_gated(group: &str, action: &str, options: &OptionMap) -> bool {
    match group {
        "desktop" => GATED_DESKTOP_ACTIONS.contains(&action),
        "ui" => GATED_UI_ACTIONS.contains(&action),
        "fs" => GATED_FS_ACTIONS.contains(&action),
        "sys" => SYS_MUTATING_OPTIONS.iter().any(|o| options.has(o)),
        _ => false,
    }
}

pub fn ensure_allowed(invocation: &Invocation) -> Result<(), CliError> {
    if is_gated(&invocation.group, &invocation.action, &invocation.options)
        && !invocation.dangerous
    {
        return Err(CliError::PolicyDenied {
            group: invocation.group.clone(),
            action: invocation.action.clone(),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn inv(tokens: &[&str]) -> Invocation {
        let tokens: Vec<String> = tokens.iter().map(|s| s.to_string()).collect();
        Invocation::from_tokens(&tokens).unwrap()
    }

    #[test]
    fn desktop_interactive_actions_are_gated() {
        for action in GATED_DESKTOP_ACTIONS {
            assert!(
                is_gated("desktop", action, &OptionMap::default()),
                "{action} should be gated"
            );
        }
    }

    #[test]
    fn read_only_desktop_actions_are_not_gated() {
        for action in ["screenshot", "apps", "focused-window"] {
            assert!(!is_gated("desktop", action, &OptionMap::default()));
        }
    }

    #[test]
    fn ui_inspection_is_free_but_interaction_is_gated() {
        assert!(!is_gated("ui", "tree", &OptionMap::default()));
        assert!(!is_gated("ui", "find", &OptionMap::default()));
        assert!(is_gated("ui", "invoke", &OptionMap::default()));
        assert!(is_gated("ui", "set-value", &OptionMap::default()));
    }

    #[test]
    fn fs_mutations_are_gated_reads_are_not() {
        for action in GATED_FS_ACTIONS {
            assert!(is_gated("fs", action, &OptionMap::default()));
        }
        for action in ["read", "list", "exists", "info"] {
            assert!(!is_gated("fs", action, &OptionMap::default()));
        }
    }

    #[test]
    fn sys_actions_gate_only_when_a_mutating_option_is_present() {
        assert!(!is_gated("sys", "volume", &inv(&["sys", "volume"]).options));
        assert!(is_gated(
            "sys",
            "volume",
            &inv(&["sys", "volume", "--percent", "30"]).options
        ));
        assert!(is_gated(
            "sys",
            "volume",
            &inv(&["sys", "volume", "--mute"]).options
        ));
        assert!(!is_gated(
            "sys",
            "resolution",
            &inv(&["sys", "resolution"]).options
        ));
        assert!(is_gated(
            "sys",
            "resolution",
            &inv(&["sys", "resolution", "--width", "1920", "--height", "1080"]).options
        ));
    }

    #[test]
    fn denial_names_group_action_and_override_flag() {
        let err = ensure_allowed(&inv(&["sys", "volume", "--percent", "30"])).unwrap_err();
        let message = err.to_string();
        assert!(message.contains("sys"));
        assert!(message.contains("volume"));
        assert!(message.contains("--dangerous"));
    }

    #[test]
    fn dangerous_flag_unlocks_gated_actions() {
        assert!(ensure_allowed(&inv(&["sys", "volume", "--percent", "30", "--dangerous"])).is_ok());
        assert!(ensure_allowed(&inv(&["desktop", "click", "--x", "1", "--y", "2", "--dangerous"]))
            .is_ok());
    }

    #[test]
    fn ungated_actions_pass_without_the_flag() {
        assert!(ensure_allowed(&inv(&["fs", "read", "--path", "x"])).is_ok());
        assert!(ensure_allowed(&inv(&["sys", "volume"])).is_ok());
    }
}
