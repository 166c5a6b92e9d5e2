use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};

use crate::error::CliError;

const PREFIX: &str = "--";

/// An ordered, case-insensitive option map parsed from command-line tokens.
///
/// Keys are stored lowercased in first-seen order; a later occurrence of the
/// same key overwrites the earlier value in place (last wins, no
/// accumulation). Values keep their raw string form so they can be echoed
/// verbatim in the envelope's input echo.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OptionMap {
    entries: Vec<(String, Option<String>)>,
}

impl OptionMap {
    /// Parse a flat token list into an option map.
    ///
    /// `--key value` and `--key=value` both bind a value (the latter may be
    /// empty); a `--key` with no usable next token is a boolean presence
    /// flag. Tokens without the prefix marker are ignored here - group and
    /// action are consumed by the caller before options are parsed.
    pub fn parse(tokens: &[String]) -> OptionMap {
        let mut map = OptionMap::default();
        let mut i = 0;
        while i < tokens.len() {
            let token = &tokens[i];
            if let Some(stripped) = token.strip_prefix(PREFIX) {
                if stripped.is_empty() {
                    i += 1;
                    continue;
                }
                if let Some((key, value)) = stripped.split_once('=') {
                    if !key.is_empty() {
                        map.insert(key, Some(value.to_string()));
                    }
                } else if i + 1 < tokens.len() && !tokens[i + 1].starts_with(PREFIX) {
                    map.insert(stripped, Some(tokens[i + 1].clone()));
                    i += 1;
                } else {
                    map.insert(stripped, None);
                }
            }
            i += 1;
        }
        map
    }

    fn insert(&mut self, key: &str, value: Option<String>) {
        let key = key.to_ascii_lowercase();
        if let Some(entry) = self.entries.iter_mut().find(|(k, _)| *k == key) {
            entry.1 = value;
        } else {
            self.entries.push((key, value));
        }
    }

    fn lookup(&self, key: &str) -> Option<&Option<String>> {
        let key = key.to_ascii_lowercase();
        self.entries.iter().find(|(k, _)| *k == key).map(|(_, v)| v)
    }

    /// True when the key appeared at all, with or without a value.
    pub fn has(&self, key: &str) -> bool {
        self.lookup(key).is_some()
    }

    /// The value bound to `key`, if the key appeared with a value.
    pub fn get_string(&self, key: &str) -> Option<String> {
        self.lookup(key).and_then(|v| v.clone())
    }

    pub fn require_string(&self, key: &str) -> Result<String, CliError> {
        match self.lookup(key) {
            None => Err(CliError::BadArgs(format!(
                "missing required option --{key}"
            ))),
            Some(None) => Err(CliError::BadArgs(format!("option --{key} requires a value"))),
            Some(Some(value)) => Ok(value.clone()),
        }
    }

    pub fn get_int(&self, key: &str) -> Result<Option<i64>, CliError> {
        match self.lookup(key) {
            None => Ok(None),
            Some(None) => Err(CliError::BadArgs(format!("option --{key} requires a value"))),
            Some(Some(raw)) => raw.trim().parse::<i64>().map(Some).map_err(|_| {
                CliError::BadArgs(format!("option --{key} expects an integer, got '{raw}'"))
            }),
        }
    }

    pub fn require_int(&self, key: &str) -> Result<i64, CliError> {
        self.get_int(key)?
            .ok_or_else(|| CliError::BadArgs(format!("missing required option --{key}")))
    }

    /// Boolean accessor: absent key yields `default`; a bare presence flag is
    /// true; an explicit value is parsed from
    /// true/false/1/0/yes/no/y/n/on/off (case-insensitive).
    pub fn get_bool(&self, key: &str, default: bool) -> Result<bool, CliError> {
        match self.lookup(key) {
            None => Ok(default),
            Some(None) => Ok(true),
            Some(Some(raw)) => match raw.trim().to_ascii_lowercase().as_str() {
                "true" | "1" | "yes" | "y" | "on" => Ok(true),
                "false" | "0" | "no" | "n" | "off" => Ok(false),
                _ => Err(CliError::BadArgs(format!(
                    "option --{key} expects a boolean, got '{raw}'"
                ))),
            },
        }
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, Option<&str>)> {
        self.entries
            .iter()
            .map(|(k, v)| (k.as_str(), v.as_deref()))
    }
}

impl Serialize for OptionMap {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (key, value) in &self.entries {
            map.serialize_entry(key, value)?;
        }
        map.end()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn toks(args: &[&str]) -> Vec<String> {
        args.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn parses_space_and_equals_forms() {
        let map = OptionMap::parse(&toks(&["--path", "/tmp/x", "--lines=3"]));
        assert_eq!(map.get_string("path").as_deref(), Some("/tmp/x"));
        assert_eq!(map.get_string("lines").as_deref(), Some("3"));
    }

    #[test]
    fn equals_form_allows_empty_value() {
        let map = OptionMap::parse(&toks(&["--content="]));
        assert_eq!(map.get_string("content").as_deref(), Some(""));
    }

    #[test]
    fn bare_flag_has_no_value() {
        let map = OptionMap::parse(&toks(&["--pretty", "--path", "x"]));
        assert!(map.has("pretty"));
        assert_eq!(map.get_string("pretty"), None);
        assert!(map.get_bool("pretty", false).unwrap());
    }

    #[test]
    fn flag_before_another_option_is_not_given_a_value() {
        let map = OptionMap::parse(&toks(&["--dangerous", "--percent", "30"]));
        assert!(map.get_bool("dangerous", false).unwrap());
        assert_eq!(map.get_string("percent").as_deref(), Some("30"));
    }

    #[test]
    fn negative_numbers_are_consumed_as_values() {
        let map = OptionMap::parse(&toks(&["--dy", "-5"]));
        assert_eq!(map.get_int("dy").unwrap(), Some(-5));
    }

    #[test]
    fn keys_are_case_insensitive_and_last_wins() {
        let map = OptionMap::parse(&toks(&["--Path", "a", "--PATH", "b"]));
        assert_eq!(map.get_string("path").as_deref(), Some("b"));
        assert_eq!(map.iter().count(), 1);
    }

    #[test]
    fn non_prefixed_tokens_are_ignored() {
        let map = OptionMap::parse(&toks(&["stray", "--path", "x", "leftover"]));
        assert_eq!(map.get_string("path").as_deref(), Some("x"));
        assert_eq!(map.iter().count(), 1);
    }

    #[test]
    fn parsing_is_idempotent() {
        let tokens = toks(&["--a", "1", "--b=2", "--C"]);
        let first = OptionMap::parse(&tokens);
        let second = OptionMap::parse(&tokens);
        assert_eq!(first, second);
    }

    #[test]
    fn bool_parsing_accepts_the_documented_spellings() {
        for (raw, expected) in [
            ("true", true),
            ("FALSE", false),
            ("1", true),
            ("0", false),
            ("yes", true),
            ("no", false),
            ("y", true),
            ("n", false),
            ("on", true),
            ("off", false),
        ] {
            let map = OptionMap::parse(&toks(&[&format!("--flag={raw}")]));
            assert_eq!(map.get_bool("flag", false).unwrap(), expected, "{raw}");
        }
    }

    #[test]
    fn bool_parsing_rejects_garbage() {
        let map = OptionMap::parse(&toks(&["--flag", "maybe"]));
        assert!(map.get_bool("flag", false).is_err());
    }

    #[test]
    fn int_parse_failure_is_an_error_not_a_panic() {
        let map = OptionMap::parse(&toks(&["--x", "abc"]));
        assert!(map.get_int("x").is_err());
        assert!(map.require_int("x").is_err());
    }

    #[test]
    fn valueless_key_is_an_error_for_string_and_int_accessors() {
        let map = OptionMap::parse(&toks(&["--path"]));
        assert!(map.require_string("path").is_err());
        assert!(map.get_int("path").is_err());
    }

    #[test]
    fn missing_required_option_is_reported_by_name() {
        let map = OptionMap::parse(&[]);
        let err = map.require_string("path").unwrap_err();
        assert!(err.to_string().contains("--path"));
    }

    #[test]
    fn serializes_in_insertion_order() {
        let map = OptionMap::parse(&toks(&["--b", "2", "--a", "1"]));
        let json = serde_json::to_string(&map).unwrap();
        assert_eq!(json, r#"{"b":"2","a":"1"}"#);
    }
}
