//! End-to-end tests for the invocation pipeline: parse -> policy -> route ->
//! normalize -> collect, driven through `run` with mock and real tool suites.

use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use serde_json::{json, Value};

use deskpilot_cli::envelope::Code;
use deskpilot_cli::run;
use deskpilot_cli::tools::{DesktopTools, ToolSuite};

/// Guards DESKPILOT_ARTIFACTS_DIR, which is process-global.
static ENV_LOCK: Mutex<()> = Mutex::new(());

fn toks(args: &[&str]) -> Vec<String> {
    args.iter().map(|s| s.to_string()).collect()
}

fn to_value(envelope: &deskpilot_cli::envelope::Envelope) -> Value {
    serde_json::to_value(envelope).expect("envelope must serialize")
}

/// Strict mock: every operation is left at the trait default, which reports
/// the operation as unavailable. Used where no operation should ever run.
struct StrictSuite;

impl ToolSuite for StrictSuite {}

/// Recording mock: overrides a handful of operations and counts or captures
/// what reaches them.
#[derive(Clone, Default)]
struct RecordingSuite {
    volume_set_calls: Arc<AtomicUsize>,
    sent_keys: Arc<Mutex<Vec<String>>>,
}

#[async_trait]
impl ToolSuite for RecordingSuite {
    async fn volume_set(&self, percent: u32) -> Result<String> {
        self.volume_set_calls.fetch_add(1, Ordering::SeqCst);
        Ok(json!({"success": true, "action": "setVolume", "percent": percent}).to_string())
    }

    async fn send_keys(&self, keys: &[String]) -> Result<String> {
        *self.sent_keys.lock().unwrap() = keys.to_vec();
        Ok(json!({"success": true, "action": "sendKeys", "keys": keys}).to_string())
    }

    async fn fs_read(&self, _path: &Path) -> Result<String> {
        Err(anyhow!("disk unreadable"))
    }

    async fn ocr_screen(&self) -> Result<String> {
        Ok("Invoice total: 42,00".to_string())
    }

    async fn clipboard_get(&self) -> Result<String> {
        Ok("Error: clipboard says so".to_string())
    }
}

// ---- policy gate ----------------------------------------------------------

#[tokio::test]
async fn policy_denial_never_constructs_the_tool_suite() {
    let outcome = run(
        &toks(&["sys", "volume", "--percent", "30"]),
        || -> Result<StrictSuite> { panic!("tool suite must not be constructed on policy denial") },
    )
    .await;

    let envelope = outcome.envelope;
    assert!(!envelope.success);
    assert_eq!(envelope.code, Code::PolicyDenied);
    assert!(envelope.message.contains("--dangerous"));
    assert!(envelope.message.contains("sys"));
    assert!(envelope.message.contains("volume"));
    assert!(envelope.tool.is_none());
    assert!(envelope.result.is_none());
}

#[tokio::test]
async fn gated_actions_are_denied_across_groups() {
    for args in [
        vec!["desktop", "click", "--x", "1", "--y", "2"],
        vec!["desktop", "exec", "--command", "whoami"],
        vec!["ui", "invoke", "--selector", "name=OK"],
        vec!["fs", "delete", "--path", "/tmp/x"],
        vec!["sys", "resolution", "--width", "800", "--height", "600"],
    ] {
        let outcome = run(&toks(&args), || -> Result<StrictSuite> {
            panic!("tool suite must not be constructed for {args:?}")
        })
        .await;
        assert_eq!(outcome.envelope.code, Code::PolicyDenied, "{args:?}");
    }
}

#[tokio::test]
async fn dangerous_override_calls_the_operation_exactly_once() {
    let suite = RecordingSuite::default();
    let calls = suite.volume_set_calls.clone();

    let outcome = run(
        &toks(&["sys", "volume", "--percent", "30", "--dangerous"]),
        move || Ok(suite),
    )
    .await;

    assert!(outcome.envelope.success);
    assert_eq!(outcome.envelope.code, Code::Ok);
    assert_eq!(outcome.envelope.tool.as_deref(), Some("sys.volume"));
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn bare_sys_get_is_not_gated() {
    // The suite default reports the operation unavailable, which is a tool
    // failure, not a policy denial - the gate must have let it through.
    let outcome = run(&toks(&["sys", "volume"]), || Ok(StrictSuite)).await;
    assert_eq!(outcome.envelope.code, Code::ToolFailed);
}

#[tokio::test]
async fn policy_denial_with_snapshot_request_sets_session_without_building_the_suite() {
    let _guard = ENV_LOCK.lock().unwrap_or_else(|e| e.into_inner());
    let artifact_root = tempfile::tempdir().unwrap();
    std::env::set_var("DESKPILOT_ARTIFACTS_DIR", artifact_root.path());

    let outcome = run(
        &toks(&["sys", "volume", "--percent", "30", "--snapshot-on-error"]),
        || -> Result<StrictSuite> { panic!("tool suite must not be constructed on policy denial") },
    )
    .await;

    let envelope = outcome.envelope;
    assert_eq!(envelope.code, Code::PolicyDenied);
    // The session id is minted even though there was nothing to capture
    // with; the captures themselves are skipped.
    let session = envelope.session.as_deref().expect("session id must be set");
    assert!(!session.is_empty());
    assert!(envelope.artifacts.is_empty());
}

// ---- routing and argument checks ------------------------------------------

#[tokio::test]
async fn unknown_group_is_bad_args() {
    let outcome = run(&toks(&["nope", "read"]), || Ok(StrictSuite)).await;
    assert_eq!(outcome.envelope.code, Code::BadArgs);
    assert!(outcome.envelope.message.contains("unknown group 'nope'"));
}

#[tokio::test]
async fn unknown_action_in_known_group_is_bad_args() {
    let outcome = run(&toks(&["fs", "shred"]), || Ok(StrictSuite)).await;
    assert_eq!(outcome.envelope.code, Code::BadArgs);
    assert!(outcome.envelope.message.contains("'shred'"));
    assert!(outcome.envelope.message.contains("'fs'"));
}

#[tokio::test]
async fn missing_required_argument_fails_before_the_operation() {
    let suite = RecordingSuite::default();
    let calls = suite.volume_set_calls.clone();
    let outcome = run(&toks(&["sys", "volume", "--percent", "--dangerous"]), move || {
        Ok(suite)
    })
    .await;
    // --percent swallowed --dangerous? No: the next token starts with the
    // prefix, so --percent is a presence flag and fails the integer check.
    assert_eq!(outcome.envelope.code, Code::BadArgs);
    assert_eq!(calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn unparseable_integer_is_bad_args_not_a_crash() {
    let outcome = run(
        &toks(&["desktop", "click", "--x", "abc", "--y", "2", "--dangerous"]),
        || Ok(StrictSuite),
    )
    .await;
    assert_eq!(outcome.envelope.code, Code::BadArgs);
    assert!(outcome.envelope.message.contains("--x"));
}

#[tokio::test]
async fn malformed_command_line_echoes_raw_tokens() {
    let outcome = run(&toks(&["--pretty"]), || Ok(StrictSuite)).await;
    assert_eq!(outcome.envelope.code, Code::BadArgs);
    assert!(outcome.pretty);
    let value = to_value(&outcome.envelope);
    assert_eq!(value["input"]["tokens"], json!(["--pretty"]));
}

#[tokio::test]
async fn compound_keys_argument_is_split_for_the_operation() {
    let suite = RecordingSuite::default();
    let sent = suite.sent_keys.clone();
    let outcome = run(
        &toks(&["desktop", "send-keys", "--keys", "ctrl+shift+esc", "--dangerous"]),
        move || Ok(suite),
    )
    .await;
    assert!(outcome.envelope.success);
    assert_eq!(*sent.lock().unwrap(), vec!["ctrl", "shift", "esc"]);
}

#[tokio::test]
async fn selector_parse_failure_is_tool_failed_not_bad_args() {
    let outcome = run(
        &toks(&["ui", "find", "--selector", "bad"]),
        || Ok(StrictSuite),
    )
    .await;
    let envelope = outcome.envelope;
    assert_eq!(envelope.code, Code::ToolFailed);
    assert_eq!(envelope.tool.as_deref(), Some("ui.find"));
    assert_eq!(envelope.error.as_ref().unwrap().kind, "reported");
    let parsed = envelope.result.unwrap().parsed.unwrap();
    assert_eq!(parsed["success"], json!(false));
}

// ---- normalization --------------------------------------------------------

#[tokio::test]
async fn operation_error_is_folded_into_a_reported_failure() {
    let suite = RecordingSuite::default();
    let outcome = run(&toks(&["fs", "read", "--path", "/nope"]), move || Ok(suite)).await;
    let envelope = outcome.envelope;
    assert_eq!(envelope.code, Code::ToolFailed);
    assert_eq!(envelope.error.as_ref().unwrap().kind, "reported");
    assert!(envelope.message.contains("disk unreadable"));
}

#[tokio::test]
async fn prose_output_is_success_with_raw_only() {
    let suite = RecordingSuite::default();
    let outcome = run(&toks(&["ocr", "screen"]), move || Ok(suite)).await;
    let envelope = outcome.envelope;
    assert!(envelope.success);
    assert_eq!(envelope.message, "OK");
    let result = envelope.result.unwrap();
    assert_eq!(result.raw, "Invoice total: 42,00");
    assert!(result.parsed.is_none());
}

#[tokio::test]
async fn prose_with_failure_prefix_is_heuristic_failure() {
    let suite = RecordingSuite::default();
    let outcome = run(
        &toks(&["desktop", "clipboard-get", "--dangerous"]),
        move || Ok(suite),
    )
    .await;
    let envelope = outcome.envelope;
    assert!(!envelope.success);
    assert_eq!(envelope.code, Code::ToolFailed);
    assert_eq!(envelope.error.as_ref().unwrap().kind, "heuristic");
}

#[tokio::test]
async fn input_echo_carries_group_action_and_options() {
    let suite = RecordingSuite::default();
    let outcome = run(
        &toks(&["sys", "volume", "--percent", "30", "--dangerous"]),
        move || Ok(suite),
    )
    .await;
    let value = to_value(&outcome.envelope);
    assert_eq!(value["input"]["group"], "sys");
    assert_eq!(value["input"]["action"], "volume");
    assert_eq!(value["input"]["options"]["percent"], "30");
    assert_eq!(value["input"]["options"]["dangerous"], Value::Null);
}

// ---- end-to-end scenarios with the real tool suite ------------------------

#[tokio::test]
async fn scenario_fs_read_round_trips_file_content() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("greeting.txt");
    std::fs::write(&path, "hello").unwrap();

    let outcome = run(
        &toks(&["fs", "read", "--path", path.to_str().unwrap()]),
        DesktopTools::new,
    )
    .await;

    let envelope = outcome.envelope;
    assert!(envelope.success);
    assert_eq!(envelope.code, Code::Ok);
    assert_eq!(envelope.tool.as_deref(), Some("fs.read"));
    let parsed = envelope.result.unwrap().parsed.unwrap();
    assert_eq!(parsed["content"], "hello");
}

#[tokio::test]
async fn scenario_contract_with_empty_required_fields_fails_validation() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("contract.json");
    std::fs::write(&path, json!({"name": "", "version": "", "steps": []}).to_string()).unwrap();

    let outcome = run(
        &toks(&["contract", "validate", "--path", path.to_str().unwrap()]),
        DesktopTools::new,
    )
    .await;

    let envelope = outcome.envelope;
    assert!(!envelope.success);
    assert_eq!(envelope.code, Code::ToolFailed);
    let parsed = envelope.result.unwrap().parsed.unwrap();
    assert_eq!(parsed["success"], json!(false));
    let errors = parsed["errors"].as_array().unwrap();
    assert!(!errors.is_empty());
}

#[tokio::test]
async fn scenario_snapshot_on_error_sets_session_and_artifacts_array() {
    let _guard = ENV_LOCK.lock().unwrap_or_else(|e| e.into_inner());
    let artifact_root = tempfile::tempdir().unwrap();
    std::env::set_var("DESKPILOT_ARTIFACTS_DIR", artifact_root.path());

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("contract.json");
    std::fs::write(&path, json!({"name": "", "version": "", "steps": []}).to_string()).unwrap();

    let outcome = run(
        &toks(&[
            "contract",
            "validate",
            "--path",
            path.to_str().unwrap(),
            "--snapshot-on-error",
        ]),
        DesktopTools::new,
    )
    .await;

    let envelope = outcome.envelope;
    assert!(!envelope.success);
    let session = envelope.session.as_deref().expect("session id must be set");
    assert!(!session.is_empty());

    // Artifacts must always be present as an array - possibly empty when
    // every best-effort capture fails (e.g. headless environments).
    let value = to_value(&envelope);
    assert!(value["artifacts"].is_array());

    // The session directory itself must exist even if captures failed.
    assert!(artifact_root.path().join(session).is_dir());
}

#[tokio::test]
async fn scenario_tail_log_returns_last_lines_in_order() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("app.log");
    let content: String = (1..=10).map(|i| format!("line {i}\n")).collect();
    std::fs::write(&path, content).unwrap();

    let outcome = run(
        &toks(&[
            "diag",
            "tail-log",
            "--path",
            path.to_str().unwrap(),
            "--lines",
            "3",
        ]),
        DesktopTools::new,
    )
    .await;

    let envelope = outcome.envelope;
    assert!(envelope.success);
    let parsed = envelope.result.unwrap().parsed.unwrap();
    assert_eq!(parsed["lineCount"], json!(3));
    assert_eq!(parsed["lines"], json!(["line 8", "line 9", "line 10"]));
}

#[tokio::test]
async fn fs_write_then_read_without_override_is_denied_then_allowed() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("out.txt");
    let path_str = path.to_str().unwrap();

    let denied = run(
        &toks(&["fs", "write", "--path", path_str, "--content", "data"]),
        || -> Result<StrictSuite> { panic!("suite must not be constructed") },
    )
    .await;
    assert_eq!(denied.envelope.code, Code::PolicyDenied);
    assert!(!path.exists());

    let allowed = run(
        &toks(&[
            "fs",
            "write",
            "--path",
            path_str,
            "--content",
            "data",
            "--dangerous",
        ]),
        DesktopTools::new,
    )
    .await;
    assert!(allowed.envelope.success);
    assert_eq!(std::fs::read_to_string(&path).unwrap(), "data");
}

#[tokio::test]
async fn failure_without_snapshot_request_collects_nothing() {
    let outcome = run(&toks(&["fs", "read", "--path", "/does/not/exist"]), DesktopTools::new).await;
    let envelope = outcome.envelope;
    assert!(!envelope.success);
    assert!(envelope.artifacts.is_empty());
    assert!(envelope.session.is_none());
}

#[tokio::test]
async fn explicit_session_is_echoed_even_on_success() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("f.txt");
    std::fs::write(&path, "x").unwrap();

    let outcome = run(
        &toks(&[
            "fs",
            "read",
            "--path",
            path.to_str().unwrap(),
            "--session",
            "run-42",
        ]),
        DesktopTools::new,
    )
    .await;
    assert!(outcome.envelope.success);
    assert_eq!(outcome.envelope.session.as_deref(), Some("run-42"));
    assert!(outcome.envelope.artifacts.is_empty());
}

#[tokio::test]
async fn exec_surfaces_exit_code_as_success_signal() {
    let outcome = run(
        &toks(&["desktop", "exec", "--command", "exit 3", "--dangerous"]),
        DesktopTools::new,
    )
    .await;
    let envelope = outcome.envelope;
    assert!(!envelope.success);
    assert_eq!(envelope.code, Code::ToolFailed);
    let parsed = envelope.result.unwrap().parsed.unwrap();
    assert_eq!(parsed["exitCode"], json!(3));
}

#[tokio::test]
async fn fs_exists_reports_both_ways() {
    let dir = tempfile::tempdir().unwrap();
    let present = dir.path().join("here");
    std::fs::write(&present, "x").unwrap();

    let outcome = run(
        &toks(&["fs", "exists", "--path", present.to_str().unwrap()]),
        DesktopTools::new,
    )
    .await;
    let parsed = outcome.envelope.result.unwrap().parsed.unwrap();
    assert_eq!(parsed["exists"], json!(true));

    let absent = dir.path().join("gone");
    let outcome = run(
        &toks(&["fs", "exists", "--path", absent.to_str().unwrap()]),
        DesktopTools::new,
    )
    .await;
    assert!(outcome.envelope.success);
    let parsed = outcome.envelope.result.unwrap().parsed.unwrap();
    assert_eq!(parsed["exists"], json!(false));
}
