use crate::error::CliError;
use crate::options::OptionMap;

/// The parsed command line: group, action, options, and the cross-cutting
/// switches recognized on every command. Built once per process run and
/// read-only afterwards.
#[derive(Debug, Clone)]
pub struct Invocation {
    pub group: String,
    pub action: String,
    pub options: OptionMap,
    pub pretty: bool,
    pub dangerous: bool,
    pub snapshot_on_error: bool,
    pub session: Option<String>,
}

impl Invocation {
    pub fn from_tokens(tokens: &[String]) -> Result<Self, CliError> {
        let mut positional = tokens.iter().take_while(|t| !t.starts_with("--"));
        let group = positional.next().ok_or_else(|| {
            CliError::BadArgs("expected '<group> <action> [options]'".to_string())
        })?;
        let action = positional.next().ok_or_else(|| {
            CliError::BadArgs(format!(
                "expected an action after group '{group}', e.g. '{group} <action> [options]'"
            ))
        })?;

        let options = OptionMap::parse(&tokens[2..]);
        let pretty = options.get_bool("pretty", false)?;
        let dangerous = options.get_bool("dangerous", false)?;
        let snapshot_on_error = options.get_bool("snapshot-on-error", false)?;
        let session = options.get_string("session");

        Ok(Invocation {
            group: group.to_ascii_lowercase(),
            action: action.to_ascii_lowercase(),
            options,
            pretty,
            dangerous,
            snapshot_on_error,
            session,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn toks(args: &[&str]) -> Vec<String> {
        args.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn splits_group_action_and_options() {
        let inv = Invocation::from_tokens(&toks(&["fs", "read", "--path", "/tmp/x"])).unwrap();
        assert_eq!(inv.group, "fs");
        assert_eq!(inv.action, "read");
        assert_eq!(inv.options.get_string("path").as_deref(), Some("/tmp/x"));
        assert!(!inv.dangerous);
        assert!(!inv.pretty);
    }

    #[test]
    fn group_and_action_are_lowercased() {
        let inv = Invocation::from_tokens(&toks(&["FS", "Read"])).unwrap();
        assert_eq!(inv.group, "fs");
        assert_eq!(inv.action, "read");
    }

    #[test]
    fn cross_cutting_flags_are_lifted() {
        let inv = Invocation::from_tokens(&toks(&[
            "sys",
            "volume",
            "--percent",
            "30",
            "--dangerous",
            "--pretty",
            "--snapshot-on-error",
            "--session",
            "abc",
        ]))
        .unwrap();
        assert!(inv.dangerous);
        assert!(inv.pretty);
        assert!(inv.snapshot_on_error);
        assert_eq!(inv.session.as_deref(), Some("abc"));
    }

    #[test]
    fn missing_action_is_bad_args() {
        let err = Invocation::from_tokens(&toks(&["fs"])).unwrap_err();
        assert!(matches!(err, CliError::BadArgs(_)));
    }

    #[test]
    fn leading_flag_instead_of_group_is_bad_args() {
        let err = Invocation::from_tokens(&toks(&["--path", "x"])).unwrap_err();
        assert!(matches!(err, CliError::BadArgs(_)));
    }
}
