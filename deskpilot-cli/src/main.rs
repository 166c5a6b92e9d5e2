//! deskpilot - a CLI front end over a fixed catalog of desktop-automation
//! operations, emitting one machine-parseable result envelope per run.

use deskpilot_cli::tools::DesktopTools;
use deskpilot_cli::{init_logging, run};

const USAGE: &str = "\
deskpilot - desktop automation command line

Usage:
  deskpilot <group> <action> [--flag] [--key value] [--key=value] ...

Groups and actions:
  desktop   mouse-move, click, double-click, scroll, type-text, send-keys,
            clipboard-get, clipboard-set, exec, screenshot, apps,
            focused-window, window-activate, window-close, window-minimize,
            window-maximize
  ui        tree, find, text, invoke, set-value, focus
  fs        read, write, create, delete, copy, move, mkdir, rmdir, list,
            exists, info
  ocr       image, screen
  sys       volume, brightness, resolution
  contract  validate
  diag      tail-log, state

Flags recognized on every command:
  --pretty             pretty-print the result envelope
  --dangerous          allow state-mutating and interactive actions
  --snapshot-on-error  collect diagnostic artifacts when the outcome fails
  --session <id>       scope artifacts to a caller-chosen session id

Examples:
  deskpilot fs read --path notes.txt
  deskpilot ui find --selector \"automationId=btnSendHttp;controlType=Button\"
  deskpilot desktop send-keys --keys ctrl+shift+esc --dangerous
  deskpilot sys volume --percent 30 --dangerous
  deskpilot diag tail-log --path app.log --lines 50

The result envelope is a single JSON document on stdout; diagnostics go to
stderr. Exit code 0 on success, 1 on any failure.
";

#[tokio::main]
async fn main() {
    if let Err(e) = init_logging() {
        eprintln!("failed to initialize logging: {e}");
    }

    let tokens: Vec<String> = std::env::args().skip(1).collect();
    if tokens.is_empty() || matches!(tokens[0].as_str(), "help" | "-h" | "--help") {
        print!("{USAGE}");
        return;
    }

    let outcome = run(&tokens, DesktopTools::new).await;

    let rendered = if outcome.pretty {
        serde_json::to_string_pretty(&outcome.envelope)
    } else {
        serde_json::to_string(&outcome.envelope)
    };
    match rendered {
        Ok(line) => println!("{line}"),
        Err(e) => {
            eprintln!("failed to serialize result envelope: {e}");
            std::process::exit(1);
        }
    }

    std::process::exit(if outcome.envelope.success { 0 } else { 1 });
}
