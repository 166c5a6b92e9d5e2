//! Best-effort diagnostic captures for failed invocations.
//!
//! Collection runs only when the normalized outcome is a failure and the
//! caller asked for it. Every capture is individually wrapped: a capture
//! that fails is logged and omitted, and collection never changes the
//! envelope's verdict.

use std::path::PathBuf;

use tracing::{debug, warn};

use crate::envelope::Artifact;
use crate::tools::ToolSuite;

/// Session id from local timestamp plus a random suffix, e.g.
/// `20260807-142311-9f3ab41c`. Generated before any collection attempt.
pub fn generate_session_id() -> String {
    let stamp = chrono::Local::now().format("%Y%m%d-%H%M%S");
    let suffix = uuid::Uuid::new_v4().simple().to_string();
    format!("{stamp}-{}", &suffix[..8])
}

/// The temporary-artifacts root; overridable for tests and packaging.
pub fn artifacts_root() -> PathBuf {
    std::env::var_os("DESKPILOT_ARTIFACTS_DIR")
        .map(PathBuf::from)
        .unwrap_or_else(|| std::env::temp_dir().join("deskpilot-artifacts"))
}

/// The session-scoped directory for a session id. Caller-supplied ids are
/// sanitized so they cannot escape the artifacts root.
pub fn session_dir(session: &str) -> PathBuf {
    let mut safe: String = session
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.') {
                c
            } else {
                '-'
            }
        })
        .collect();
    if safe.is_empty() || safe.chars().all(|c| c == '.') {
        safe = "session".to_string();
    }
    let dir = artifacts_root().join(safe);
    std::path::absolute(&dir).unwrap_or(dir)
}

/// Gather the fixed list of best-effort captures into the session directory.
///
/// When the failure occurred before a tool suite existed (policy denial,
/// argument errors), there is nothing to capture with; the session directory
/// is still ensured so the session id stays meaningful.
pub async fn collect(session: &str, tools: Option<&dyn ToolSuite>) -> Vec<Artifact> {
    let dir = session_dir(session);
    if let Err(e) = std::fs::create_dir_all(&dir) {
        warn!("failed to create artifact directory {}: {e}", dir.display());
        return Vec::new();
    }

    let Some(tools) = tools else {
        debug!("no tool suite available for failure captures");
        return Vec::new();
    };

    let mut artifacts = Vec::new();

    let screenshot_path = dir.join("screen.png");
    match tools.screenshot(&screenshot_path).await {
        Ok(_) => artifacts.push(Artifact {
            kind: "screenshot".to_string(),
            path: screenshot_path.display().to_string(),
            note: "primary monitor capture at time of failure".to_string(),
        }),
        Err(e) => warn!("screenshot capture failed: {e:#}"),
    }

    let state_path = dir.join("state.json");
    match tools.diag_state().await {
        Ok(dump) => match std::fs::write(&state_path, &dump) {
            Ok(()) => artifacts.push(Artifact {
                kind: "state".to_string(),
                path: state_path.display().to_string(),
                note: "desktop state dump at time of failure".to_string(),
            }),
            Err(e) => warn!("failed to write state dump: {e}"),
        },
        Err(e) => warn!("desktop state dump failed: {e:#}"),
    }

    artifacts
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn session_ids_are_filesystem_safe() {
        let id = generate_session_id();
        assert!(!id.is_empty());
        assert!(id
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-'));
    }

    #[test]
    fn session_ids_are_unique_enough() {
        assert_ne!(generate_session_id(), generate_session_id());
    }

    #[test]
    fn supplied_session_ids_cannot_escape_the_artifacts_root() {
        for hostile in ["../../etc/passwd", "..", "a/b", ""] {
            let dir = session_dir(hostile);
            assert!(dir.starts_with(artifacts_root()), "{hostile}");
            assert!(
                dir.components()
                    .all(|c| c.as_os_str() != std::ffi::OsStr::new("..")),
                "{hostile}"
            );
        }
    }
}
