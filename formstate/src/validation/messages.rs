//! Message templates for the built-in rules.

use serde::Deserialize;
use serde::Serialize;

/// Message templates used when a rule has no explicit message.
///
/// Each `%s` is replaced in order: first with the field name, then with the
/// rule's argument (bound, pattern, expected value).
///
/// Tables deserialize with missing keys falling back to the defaults, so a
/// partial override only needs the templates it changes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ValidateMessages {
    pub required: String,
    pub min_length: String,
    pub max_length: String,
    pub min: String,
    pub max: String,
    pub pattern: String,
    pub email: String,
    pub equals: String,
    pub one_of: String,
    pub invalid: String,
}

impl Default for ValidateMessages {
    fn default() -> Self {
        Self {
            required: "%s is required".into(),
            min_length: "%s must be at least %s characters".into(),
            max_length: "%s cannot be longer than %s characters".into(),
            min: "%s cannot be less than %s".into(),
            max: "%s cannot be greater than %s".into(),
            pattern: "%s does not match pattern %s".into(),
            email: "%s is not a valid email".into(),
            equals: "%s must equal %s".into(),
            one_of: "%s must be one of %s".into(),
            invalid: "%s is invalid".into(),
        }
    }
}

/// Replaces each `%s` in `template` with the next argument.
///
/// Surplus placeholders are left untouched.
pub fn fill(template: &str, args: &[&str]) -> String {
    let mut out = String::with_capacity(template.len());
    let mut args = args.iter();
    let mut rest = template;
    while let Some(pos) = rest.find("%s") {
        out.push_str(&rest[..pos]);
        match args.next() {
            Some(arg) => out.push_str(arg),
            None => out.push_str("%s"),
        }
        rest = &rest[pos + 2..];
    }
    out.push_str(rest);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fill_in_order() {
        assert_eq!(
            fill("%s must be at least %s characters", &["name", "3"]),
            "name must be at least 3 characters"
        );
    }

    #[test]
    fn test_fill_missing_args() {
        assert_eq!(fill("%s and %s", &["a"]), "a and %s");
    }

    #[test]
    fn test_partial_table_deserializes() {
        let messages: ValidateMessages =
            serde_json::from_str(r#"{"required": "please fill %s"}"#).unwrap();
        assert_eq!(messages.required, "please fill %s");
        assert_eq!(messages.email, ValidateMessages::default().email);
    }
}
