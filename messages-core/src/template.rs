//! Placeholder substitution for message templates.
//!
//! A placeholder is `{path}` where `path` is a dot-separated walk through the
//! variables object, e.g. `{user.firstName}`.

use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Outcome of processing a template.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessedTemplate {
    pub result: String,
    pub errors: Vec<String>,
}

fn placeholder_regex() -> &'static Regex {
    static PLACEHOLDER: OnceLock<Regex> = OnceLock::new();
    PLACEHOLDER.get_or_init(|| Regex::new(r"\{([^}]+)\}").expect("placeholder pattern is valid"))
}

/// Substitutes every resolvable placeholder in `template`.
///
/// Unresolvable placeholders stay in the output verbatim and produce one
/// error per occurrence, in order of appearance. Substituted values are not
/// scanned again.
pub fn process_template(template: &str, variables: &Value) -> ProcessedTemplate {
    let mut result = String::with_capacity(template.len());
    let mut errors = Vec::new();
    let mut last = 0;

    for caps in placeholder_regex().captures_iter(template) {
        let (Some(whole), Some(name)) = (caps.get(0), caps.get(1)) else {
            continue;
        };
        result.push_str(&template[last..whole.start()]);
        match resolve(variables, name.as_str()) {
            Some(value) => result.push_str(&render(value)),
            None => {
                errors.push(format!("Variable '{}' not found or invalid", name.as_str()));
                result.push_str(whole.as_str());
            }
        }
        last = whole.end();
    }
    result.push_str(&template[last..]);

    tracing::debug!(placeholders_failed = errors.len(), "Processed template");
    ProcessedTemplate { result, errors }
}

fn resolve<'a>(variables: &'a Value, path: &str) -> Option<&'a Value> {
    path.split('.')
        .try_fold(variables, |value, part| value.as_object()?.get(part))
}

fn render(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_simple_substitution() {
        let out = process_template("Hello {name}!", &json!({"name": "Ada"}));
        assert_eq!(out.result, "Hello Ada!");
        assert!(out.errors.is_empty());
    }

    #[test]
    fn test_nested_lookup() {
        let vars = json!({"user": {"firstName": "Grace", "address": {"city": "Arlington"}}});
        let out = process_template("Dear {user.firstName} from {user.address.city}", &vars);
        assert_eq!(out.result, "Dear Grace from Arlington");
        assert!(out.errors.is_empty());
    }

    #[test]
    fn test_missing_variable_is_reported_and_kept() {
        let out = process_template("Hi {name}, code {code}", &json!({"name": "Bob"}));
        assert_eq!(out.result, "Hi Bob, code {code}");
        assert_eq!(out.errors, vec!["Variable 'code' not found or invalid".to_string()]);
    }

    #[test]
    fn test_each_failing_occurrence_is_reported() {
        let out = process_template("{x} and {x}", &json!({}));
        assert_eq!(out.result, "{x} and {x}");
        assert_eq!(out.errors.len(), 2);
    }

    #[test]
    fn test_walk_through_non_object_fails() {
        let vars = json!({"user": "plain", "items": [1, 2]});
        let out = process_template("{user.name} {items.0}", &vars);
        assert_eq!(out.errors.len(), 2);
        assert_eq!(out.result, "{user.name} {items.0}");
    }

    #[test]
    fn test_non_string_values_render_as_json() {
        let vars = json!({"n": 5, "f": 1.5, "b": true, "z": null, "list": [1, "a"], "obj": {"k": 1}});
        let out = process_template("{n}|{f}|{b}|{z}|{list}|{obj}", &vars);
        assert_eq!(out.result, r#"5|1.5|true|null|[1,"a"]|{"k":1}"#);
        assert!(out.errors.is_empty());
    }

    #[test]
    fn test_substituted_values_are_not_rescanned() {
        let out = process_template("{a}", &json!({"a": "{b}", "b": "nope"}));
        assert_eq!(out.result, "{b}");
        assert!(out.errors.is_empty());
    }

    #[test]
    fn test_empty_braces_and_unclosed_are_literal() {
        let out = process_template("{} {open", &json!({}));
        assert_eq!(out.result, "{} {open");
        assert!(out.errors.is_empty());
    }

    #[test]
    fn test_variables_not_an_object() {
        let out = process_template("{a}", &json!([1, 2, 3]));
        assert_eq!(out.errors.len(), 1);
    }
}
