use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::errors::AutomationError;

/// A structured way to locate a UI element.
///
/// Built from a selector string of `key=value` segments separated by `;` or
/// `,`, e.g. `automationId=btnSendHttp;controlType=Button`. Values may be
/// double-quote-wrapped. Each recognized key has exactly one alias:
/// `automationId`/`aid`, `name`/`text`, `className`/`class`,
/// `controlType`/`type`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Selector {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub automation_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub class_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub control_type: Option<String>,
    /// Unrecognized keys are kept as-is so newer selector vocabularies can
    /// pass through without breaking older builds.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub extras: BTreeMap<String, String>,
}

impl Selector {
    /// Parse a selector string.
    ///
    /// At least one of the four recognized fields must resolve to a
    /// non-empty value. When an alias and its canonical key both appear for
    /// the same field, the last write wins.
    pub fn parse(s: &str) -> Result<Self, AutomationError> {
        let mut selector = Selector::default();
        let mut saw_segment = false;

        for segment in s.split([';', ',']) {
            let segment = segment.trim();
            if segment.is_empty() {
                continue;
            }
            saw_segment = true;

            let (key, value) = segment.split_once('=').ok_or_else(|| {
                AutomationError::InvalidSelector(format!(
                    "segment '{segment}' is not of the form key=value"
                ))
            })?;

            let key = key.trim();
            let value = unquote(value.trim());
            if key.is_empty() || value.is_empty() {
                return Err(AutomationError::InvalidSelector(format!(
                    "segment '{segment}' has an empty key or value"
                )));
            }

            match key.to_ascii_lowercase().as_str() {
                "automationid" | "aid" => selector.automation_id = Some(value.to_string()),
                "name" | "text" => selector.name = Some(value.to_string()),
                "classname" | "class" => selector.class_name = Some(value.to_string()),
                "controltype" | "type" => selector.control_type = Some(value.to_string()),
                _ => {
                    selector
                        .extras
                        .insert(key.to_string(), value.to_string());
                }
            }
        }

        if !saw_segment {
            return Err(AutomationError::InvalidSelector(
                "selector string is empty".to_string(),
            ));
        }

        if selector.automation_id.is_none()
            && selector.name.is_none()
            && selector.class_name.is_none()
            && selector.control_type.is_none()
        {
            return Err(AutomationError::InvalidSelector(format!(
                "selector '{s}' sets none of automationId, name, className or controlType"
            )));
        }

        Ok(selector)
    }

    /// True when `info`'s attributes satisfy every populated field.
    pub fn matches(
        &self,
        automation_id: Option<&str>,
        name: Option<&str>,
        class_name: Option<&str>,
        control_type: &str,
    ) -> bool {
        fn field_matches(wanted: &Option<String>, actual: Option<&str>) -> bool {
            match wanted {
                Some(w) => actual.is_some_and(|a| a.eq_ignore_ascii_case(w)),
                None => true,
            }
        }

        field_matches(&self.automation_id, automation_id)
            && field_matches(&self.name, name)
            && field_matches(&self.class_name, class_name)
            && self
                .control_type
                .as_ref()
                .is_none_or(|w| control_type.eq_ignore_ascii_case(w))
    }
}

impl std::fmt::Display for Selector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut parts = Vec::new();
        if let Some(v) = &self.automation_id {
            parts.push(format!("automationId={v}"));
        }
        if let Some(v) = &self.name {
            parts.push(format!("name={v}"));
        }
        if let Some(v) = &self.class_name {
            parts.push(format!("className={v}"));
        }
        if let Some(v) = &self.control_type {
            parts.push(format!("controlType={v}"));
        }
        write!(f, "{}", parts.join(";"))
    }
}

fn unquote(s: &str) -> &str {
    s.strip_prefix('"')
        .and_then(|s| s.strip_suffix('"'))
        .unwrap_or(s)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_canonical_keys() {
        let sel = Selector::parse("automationId=btnSendHttp;controlType=Button").unwrap();
        assert_eq!(sel.automation_id.as_deref(), Some("btnSendHttp"));
        assert_eq!(sel.control_type.as_deref(), Some("Button"));
        assert_eq!(sel.name, None);
        assert_eq!(sel.class_name, None);
    }

    #[test]
    fn parses_aliases() {
        let sel = Selector::parse("aid=ok;text=Send;class=Btn;type=Button").unwrap();
        assert_eq!(sel.automation_id.as_deref(), Some("ok"));
        assert_eq!(sel.name.as_deref(), Some("Send"));
        assert_eq!(sel.class_name.as_deref(), Some("Btn"));
        assert_eq!(sel.control_type.as_deref(), Some("Button"));
    }

    #[test]
    fn alias_and_canonical_last_write_wins() {
        let sel = Selector::parse("aid=first;automationId=second").unwrap();
        assert_eq!(sel.automation_id.as_deref(), Some("second"));
        let sel = Selector::parse("automationId=first;aid=second").unwrap();
        assert_eq!(sel.automation_id.as_deref(), Some("second"));
    }

    #[test]
    fn strips_double_quotes() {
        let sel = Selector::parse(r#"name="Save As""#).unwrap();
        assert_eq!(sel.name.as_deref(), Some("Save As"));
    }

    #[test]
    fn comma_separator_works() {
        let sel = Selector::parse("name=OK,controlType=Button").unwrap();
        assert_eq!(sel.name.as_deref(), Some("OK"));
        assert_eq!(sel.control_type.as_deref(), Some("Button"));
    }

    #[test]
    fn unknown_keys_are_retained_not_fatal() {
        let sel = Selector::parse("name=OK;frameId=7").unwrap();
        assert_eq!(sel.extras.get("frameId").map(String::as_str), Some("7"));
    }

    #[test]
    fn rejects_segment_without_equals() {
        assert!(Selector::parse("bad").is_err());
    }

    #[test]
    fn rejects_selector_with_only_unknown_keys() {
        assert!(Selector::parse("frameId=7").is_err());
    }

    #[test]
    fn rejects_empty_value() {
        assert!(Selector::parse("name=").is_err());
    }

    #[test]
    fn keys_are_case_insensitive() {
        let sel = Selector::parse("AUTOMATIONID=x;ControlType=Edit").unwrap();
        assert_eq!(sel.automation_id.as_deref(), Some("x"));
        assert_eq!(sel.control_type.as_deref(), Some("Edit"));
    }

    #[test]
    fn matches_is_case_insensitive_on_values() {
        let sel = Selector::parse("controlType=button").unwrap();
        assert!(sel.matches(None, None, None, "Button"));
        assert!(!sel.matches(None, None, None, "Edit"));
    }
}
