//! The single output contract of the CLI.
//!
//! Every run produces exactly one envelope, assembled at the very end of the
//! control flow - either from a resolved operation's raw output or from a
//! caught failure - and written as one line (or pretty block) to stdout.

use serde::Serialize;
use serde_json::Value;

use crate::error::CliError;
use crate::invocation::Invocation;
use crate::options::OptionMap;

pub const SCHEMA_VERSION: &str = "1.0";

/// Prefixes that mark a plain-text operation output as a failure. This list
/// is a known approximation (see the normalizer notes); do not extend it
/// casually.
const FAILURE_PREFIXES: &[&str] = &["error", "failed", "exception"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Code {
    Ok,
    PolicyDenied,
    BadArgs,
    ToolFailed,
    CliError,
}

/// Echo of what the caller asked for: the parsed command when an invocation
/// could be built, otherwise the raw tokens.
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum InputEcho {
    Command {
        group: String,
        action: String,
        options: OptionMap,
    },
    Tokens {
        tokens: Vec<String>,
    },
}

impl InputEcho {
    pub fn command(invocation: &Invocation) -> Self {
        InputEcho::Command {
            group: invocation.group.clone(),
            action: invocation.action.clone(),
            options: invocation.options.clone(),
        }
    }

    pub fn tokens(tokens: &[String]) -> Self {
        InputEcho::Tokens {
            tokens: tokens.to_vec(),
        }
    }
}

/// The operation's output: the raw text always, plus the parsed value when
/// the text is syntactically valid JSON. Presence of `parsed` is a format
/// detection, not a statement about the operation's own success.
#[derive(Debug, Clone, Serialize)]
pub struct RawResult {
    pub raw: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parsed: Option<Value>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ErrorDetail {
    /// `reported` when the operation signaled failure through a structured
    /// `success: false` field, `heuristic` when failure was inferred from a
    /// text prefix; `policy`, `arguments` and `internal` for layer failures.
    pub kind: String,
    pub message: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct Artifact {
    pub kind: String,
    pub path: String,
    pub note: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Envelope {
    pub schema_version: &'static str,
    pub success: bool,
    pub code: Code,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool: Option<String>,
    pub input: InputEcho,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<RawResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorDetail>,
    pub artifacts: Vec<Artifact>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session: Option<String>,
}

impl Envelope {
    /// Convert a layer failure (policy, arguments, internal) into an
    /// envelope. No tool ran, so `tool` and `result` stay absent.
    pub fn from_error(error: &CliError, input: InputEcho) -> Envelope {
        Envelope {
            schema_version: SCHEMA_VERSION,
            success: false,
            code: error.code(),
            message: error.to_string(),
            tool: None,
            input,
            result: None,
            error: Some(ErrorDetail {
                kind: error.kind().to_string(),
                message: error.to_string(),
            }),
            artifacts: Vec::new(),
            session: None,
        }
    }
}

/// Normalize an operation's raw output into the envelope.
///
/// Success determination, in priority order: a structured `success` boolean
/// wins outright; otherwise plain text starting with a failure prefix
/// (case-insensitive) is a failure and anything else is a success - prose
/// with no explicit signal defaults to success rather than being swallowed
/// as an error.
pub fn normalize(tool: &str, raw: String, input: InputEcho) -> Envelope {
    let trimmed = raw.trim();
    let parsed: Option<Value> = serde_json::from_str(trimmed).ok();

    let reported = parsed
        .as_ref()
        .and_then(|v| v.get("success"))
        .and_then(Value::as_bool);

    let (success, kind) = match reported {
        Some(flag) => (flag, "reported"),
        None => {
            let lowered = trimmed.to_lowercase();
            let looks_failed = FAILURE_PREFIXES.iter().any(|p| lowered.starts_with(p));
            (!looks_failed, "heuristic")
        }
    };

    let message = if success {
        "OK".to_string()
    } else {
        structured_message(parsed.as_ref()).unwrap_or_else(|| trimmed.to_string())
    };

    let error = if success {
        None
    } else {
        Some(ErrorDetail {
            kind: kind.to_string(),
            message: message.clone(),
        })
    };

    Envelope {
        schema_version: SCHEMA_VERSION,
        success,
        code: if success { Code::Ok } else { Code::ToolFailed },
        message,
        tool: Some(tool.to_string()),
        input,
        result: Some(RawResult { raw, parsed }),
        error,
        artifacts: Vec::new(),
        session: None,
    }
}

/// A structured `message` or `error` string field, when present.
fn structured_message(parsed: Option<&Value>) -> Option<String> {
    let object = parsed?;
    for field in ["message", "error"] {
        if let Some(text) = object.get(field).and_then(Value::as_str) {
            if !text.is_empty() {
                return Some(text.to_string());
            }
        }
    }
    None
}
