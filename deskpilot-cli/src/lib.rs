//! Command invocation and result normalization for the deskpilot CLI.
//!
//! One command line in, one result envelope out: tokens are parsed into an
//! immutable invocation, the policy gate runs before anything is resolved,
//! the router calls exactly one operation, and the normalizer folds whatever
//! came back - prose, JSON or a failure - into the envelope. On a failed
//! outcome, best-effort diagnostic artifacts are collected when requested.

use std::env;

use anyhow::Result;
use tracing::Level;
use tracing_subscriber::EnvFilter;

pub mod artifacts;
pub mod envelope;
pub mod error;
pub mod invocation;
pub mod options;
pub mod policy;
pub mod router;
pub mod tools;

use envelope::{Envelope, InputEcho};
use error::CliError;
use invocation::Invocation;
use options::OptionMap;
use tools::ToolSuite;

/// The envelope plus the rendering switch, which is needed even when the
/// invocation itself could not be built.
pub struct RunOutcome {
    pub envelope: Envelope,
    pub pretty: bool,
}

/// Run one invocation end to end. Every failure is converted into an
/// envelope here; nothing escapes to the process boundary.
///
/// The tool suite is built lazily through `make_tools`, after the policy
/// gate has passed - a denied invocation never constructs an operation or
/// touches its backing capability.
pub async fn run<T, F>(tokens: &[String], make_tools: F) -> RunOutcome
where
    T: ToolSuite + 'static,
    F: FnOnce() -> Result<T>,
{
    let invocation = match Invocation::from_tokens(tokens) {
        Ok(invocation) => invocation,
        Err(e) => {
            // No invocation means no reliable flags; scan the raw tokens so
            // --pretty still works on a malformed command line.
            let pretty = OptionMap::parse(tokens).get_bool("pretty", false).unwrap_or(false);
            return RunOutcome {
                envelope: Envelope::from_error(&e, InputEcho::tokens(tokens)),
                pretty,
            };
        }
    };

    let input = InputEcho::command(&invocation);
    let mut tools: Option<T> = None;
    let mut envelope = match execute(&invocation, &mut tools, make_tools, input.clone()).await {
        Ok(envelope) => envelope,
        Err(e) => Envelope::from_error(&e, input),
    };

    if !envelope.success && invocation.snapshot_on_error {
        let session = invocation
            .session
            .clone()
            .unwrap_or_else(artifacts::generate_session_id);
        envelope.artifacts =
            artifacts::collect(&session, tools.as_ref().map(|t| t as &dyn ToolSuite)).await;
        envelope.session = Some(session);
    } else if invocation.session.is_some() {
        envelope.session = invocation.session.clone();
    }

    RunOutcome {
        envelope,
        pretty: invocation.pretty,
    }
}

async fn execute<T, F>(
    invocation: &Invocation,
    tools_slot: &mut Option<T>,
    make_tools: F,
    input: InputEcho,
) -> Result<Envelope, CliError>
where
    T: ToolSuite + 'static,
    F: FnOnce() -> Result<T>,
{
    policy::ensure_allowed(invocation)?;

    let tools = make_tools()
        .map_err(|e| CliError::Internal(format!("failed to initialize operations: {e:#}")))?;
    let tools = tools_slot.insert(tools);

    let dispatched = router::dispatch(invocation, &*tools).await?;
    Ok(envelope::normalize(&dispatched.tool, dispatched.raw, input))
}

/// Route diagnostics to stderr so stdout stays machine-parseable.
pub fn init_logging() -> Result<()> {
    let log_level = env::var("LOG_LEVEL")
        .map(|level| match level.to_lowercase().as_str() {
            "error" => Level::ERROR,
            "warn" => Level::WARN,
            "info" => Level::INFO,
            "debug" => Level::DEBUG,
            _ => Level::INFO,
        })
        .unwrap_or(Level::INFO);

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive(log_level.into()))
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .init();

    Ok(())
}
