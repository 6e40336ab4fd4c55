//! Validation rules evaluated by the built-in validator.

use std::fmt;
use std::future::Future;
use std::sync::Arc;

use futures::future::BoxFuture;
use regex::Regex;
use serde_json::Value;

use super::messages::ValidateMessages;
use super::messages::fill;
use crate::error::FormError;

/// Type alias for sync check closures.
pub type SyncCheck = Arc<dyn Fn(&Value) -> Result<(), String> + Send + Sync>;

/// Type alias for async check closures.
pub type AsyncCheck = Arc<dyn Fn(Value) -> BoxFuture<'static, Result<(), String>> + Send + Sync>;

/// What a rule checks.
#[derive(Clone)]
pub enum RuleKind {
    /// Value must be present and non-blank.
    Required,
    /// Minimum length of a string (characters) or array (items).
    MinLength(usize),
    /// Maximum length of a string (characters) or array (items).
    MaxLength(usize),
    /// Lower bound for numbers.
    Min(f64),
    /// Upper bound for numbers.
    Max(f64),
    /// String must match the regex.
    Pattern(Regex),
    /// String must be a valid email address.
    Email,
    /// Value must equal the given value.
    Equals(Value),
    /// Value must be one of the given values.
    OneOf(Vec<Value>),
    /// Custom synchronous check.
    Custom(SyncCheck),
    /// Custom asynchronous check.
    CustomAsync(AsyncCheck),
}

impl fmt::Debug for RuleKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Required => write!(f, "Required"),
            Self::MinLength(n) => write!(f, "MinLength({})", n),
            Self::MaxLength(n) => write!(f, "MaxLength({})", n),
            Self::Min(n) => write!(f, "Min({})", n),
            Self::Max(n) => write!(f, "Max({})", n),
            Self::Pattern(re) => write!(f, "Pattern({})", re.as_str()),
            Self::Email => write!(f, "Email"),
            Self::Equals(v) => write!(f, "Equals({})", v),
            Self::OneOf(vs) => write!(f, "OneOf({:?})", vs),
            Self::Custom(_) => write!(f, "Custom"),
            Self::CustomAsync(_) => write!(f, "CustomAsync"),
        }
    }
}

/// A single validation rule with an optional message override.
///
/// # Example
///
/// ```
/// use formstate::validation::Rule;
///
/// let rules = vec![
///     Rule::required().message("Username is required"),
///     Rule::min_length(3),
///     Rule::custom(|v| v.as_str() != Some("admin")).message("Reserved name"),
/// ];
/// assert_eq!(rules.len(), 3);
/// ```
#[derive(Debug, Clone)]
pub struct Rule {
    kind: RuleKind,
    message: Option<String>,
}

impl Rule {
    /// Creates a rule from its kind.
    pub fn new(kind: RuleKind) -> Self {
        Self { kind, message: None }
    }

    /// Require a non-blank value.
    pub fn required() -> Self {
        Self::new(RuleKind::Required)
    }

    /// Require minimum length.
    pub fn min_length(min: usize) -> Self {
        Self::new(RuleKind::MinLength(min))
    }

    /// Require maximum length.
    pub fn max_length(max: usize) -> Self {
        Self::new(RuleKind::MaxLength(max))
    }

    /// Require a number no smaller than `min`.
    pub fn min(min: f64) -> Self {
        Self::new(RuleKind::Min(min))
    }

    /// Require a number no greater than `max`.
    pub fn max(max: f64) -> Self {
        Self::new(RuleKind::Max(max))
    }

    /// Require the value to match a regex pattern.
    pub fn pattern(pattern: &str) -> Result<Self, FormError> {
        Ok(Self::new(RuleKind::Pattern(Regex::new(pattern)?)))
    }

    /// Require a valid email address.
    pub fn email() -> Self {
        Self::new(RuleKind::Email)
    }

    /// Require the value to equal `expected`.
    pub fn equals(expected: impl Into<Value>) -> Self {
        Self::new(RuleKind::Equals(expected.into()))
    }

    /// Require the value to be one of `allowed`.
    pub fn one_of<I, V>(allowed: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        Self::new(RuleKind::OneOf(allowed.into_iter().map(Into::into).collect()))
    }

    /// Add a custom synchronous predicate.
    pub fn custom<F>(f: F) -> Self
    where
        F: Fn(&Value) -> bool + Send + Sync + 'static,
    {
        Self::new(RuleKind::Custom(Arc::new(move |v| {
            if f(v) { Ok(()) } else { Err(String::new()) }
        })))
    }

    /// Add a custom synchronous check that reports its own message.
    pub fn custom_with<F>(f: F) -> Self
    where
        F: Fn(&Value) -> Result<(), String> + Send + Sync + 'static,
    {
        Self::new(RuleKind::Custom(Arc::new(f)))
    }

    /// Add a custom asynchronous predicate.
    pub fn custom_async<F, Fut>(f: F) -> Self
    where
        F: Fn(Value) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = bool> + Send + 'static,
    {
        Self::new(RuleKind::CustomAsync(Arc::new(move |v| {
            let fut = f(v);
            Box::pin(async move { if fut.await { Ok(()) } else { Err(String::new()) } })
        })))
    }

    /// Override the failure message.
    pub fn message(mut self, msg: impl Into<String>) -> Self {
        self.message = Some(msg.into());
        self
    }

    /// Returns what the rule checks.
    pub fn kind(&self) -> &RuleKind {
        &self.kind
    }

    /// Returns the message override, if any.
    pub fn custom_message(&self) -> Option<&str> {
        self.message.as_deref()
    }

    /// Evaluates the rule against `value` (`None` when the field is unset).
    ///
    /// Rules other than `Required` and the custom checks pass on empty
    /// values; combine them with `Rule::required()` to reject blanks.
    pub async fn evaluate(
        &self,
        field: &str,
        value: Option<&Value>,
        messages: &ValidateMessages,
    ) -> Result<(), String> {
        let empty = is_empty(value);
        let outcome = match &self.kind {
            RuleKind::Required => check(!empty, || fill(&messages.required, &[field])),
            _ if empty && !self.is_custom() => Ok(()),
            RuleKind::MinLength(min) => match length(value) {
                Some(len) => check(len >= *min, || {
                    fill(&messages.min_length, &[field, min.to_string().as_str()])
                }),
                None => Ok(()),
            },
            RuleKind::MaxLength(max) => match length(value) {
                Some(len) => check(len <= *max, || {
                    fill(&messages.max_length, &[field, max.to_string().as_str()])
                }),
                None => Ok(()),
            },
            RuleKind::Min(min) => match value.and_then(Value::as_f64) {
                Some(n) => check(n >= *min, || fill(&messages.min, &[field, min.to_string().as_str()])),
                None => Ok(()),
            },
            RuleKind::Max(max) => match value.and_then(Value::as_f64) {
                Some(n) => check(n <= *max, || fill(&messages.max, &[field, max.to_string().as_str()])),
                None => Ok(()),
            },
            RuleKind::Pattern(re) => {
                let matched = value.and_then(Value::as_str).is_some_and(|s| re.is_match(s));
                check(matched, || fill(&messages.pattern, &[field, re.as_str()]))
            }
            RuleKind::Email => {
                let valid = value
                    .and_then(Value::as_str)
                    .is_some_and(email_address::EmailAddress::is_valid);
                check(valid, || fill(&messages.email, &[field]))
            }
            RuleKind::Equals(expected) => check(value == Some(expected), || {
                fill(&messages.equals, &[field, expected.to_string().as_str()])
            }),
            RuleKind::OneOf(allowed) => {
                let found = value.is_some_and(|v| allowed.contains(v));
                check(found, || {
                    let list = allowed
                        .iter()
                        .map(Value::to_string)
                        .collect::<Vec<_>>()
                        .join(", ");
                    fill(&messages.one_of, &[field, list.as_str()])
                })
            }
            RuleKind::Custom(f) => f(value.unwrap_or(&Value::Null)),
            RuleKind::CustomAsync(f) => f(value.cloned().unwrap_or(Value::Null)).await,
        };

        outcome.map_err(|msg| match &self.message {
            Some(custom) => custom.clone(),
            None if msg.is_empty() => fill(&messages.invalid, &[field]),
            None => msg,
        })
    }

    fn is_custom(&self) -> bool {
        matches!(self.kind, RuleKind::Custom(_) | RuleKind::CustomAsync(_))
    }
}

fn check(ok: bool, msg: impl FnOnce() -> String) -> Result<(), String> {
    if ok { Ok(()) } else { Err(msg()) }
}

/// Unset, `null`, blank strings and empty arrays count as empty.
fn is_empty(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => true,
        Some(Value::String(s)) => s.trim().is_empty(),
        Some(Value::Array(items)) => items.is_empty(),
        Some(_) => false,
    }
}

fn length(value: Option<&Value>) -> Option<usize> {
    match value? {
        Value::String(s) => Some(s.chars().count()),
        Value::Array(items) => Some(items.len()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn run(rule: &Rule, value: Option<Value>) -> Result<(), String> {
        futures::executor::block_on(rule.evaluate(
            "name",
            value.as_ref(),
            &ValidateMessages::default(),
        ))
    }

    #[test]
    fn test_required() {
        let rule = Rule::required();
        assert_eq!(run(&rule, None), Err("name is required".to_string()));
        assert!(run(&rule, Some(json!("   "))).is_err());
        assert!(run(&rule, Some(json!([]))).is_err());
        assert!(run(&rule, Some(json!(0))).is_ok());
        assert!(run(&rule, Some(json!("x"))).is_ok());
    }

    #[test]
    fn test_non_required_rules_skip_empty() {
        assert!(run(&Rule::min_length(3), None).is_ok());
        assert!(run(&Rule::email(), Some(json!(""))).is_ok());
    }

    #[test]
    fn test_lengths_count_chars() {
        let rule = Rule::min_length(3);
        assert!(run(&rule, Some(json!("héé"))).is_ok());
        assert_eq!(
            run(&rule, Some(json!("ab"))),
            Err("name must be at least 3 characters".to_string())
        );
        assert!(run(&Rule::max_length(1), Some(json!([1, 2]))).is_err());
    }

    #[test]
    fn test_numeric_bounds() {
        assert!(run(&Rule::min(1.0), Some(json!(0))).is_err());
        assert!(run(&Rule::max(10.0), Some(json!(10))).is_ok());
    }

    #[test]
    fn test_pattern_and_email() {
        let rule = Rule::pattern("^[a-z]+$").unwrap();
        assert!(run(&rule, Some(json!("abc"))).is_ok());
        assert!(run(&rule, Some(json!("ABC"))).is_err());
        assert!(Rule::pattern("(").is_err());

        assert!(run(&Rule::email(), Some(json!("a@example.com"))).is_ok());
        assert!(run(&Rule::email(), Some(json!("not-an-email"))).is_err());
    }

    #[test]
    fn test_custom_messages() {
        let rule = Rule::custom(|v| v.as_str() == Some("ok"));
        assert_eq!(run(&rule, Some(json!("no"))), Err("name is invalid".to_string()));

        let rule = Rule::custom_with(|_| Err("taken".to_string()));
        assert_eq!(run(&rule, Some(json!("x"))), Err("taken".to_string()));

        let rule = Rule::required().message("fill me");
        assert_eq!(run(&rule, None), Err("fill me".to_string()));
    }

    #[test]
    fn test_custom_async() {
        let rule = Rule::custom_async(|v| async move { v.as_i64() == Some(1) });
        assert!(run(&rule, Some(json!(1))).is_ok());
        assert!(run(&rule, Some(json!(2))).is_err());
    }

    #[test]
    fn test_one_of_and_equals() {
        let rule = Rule::one_of(["red", "green"]);
        assert!(run(&rule, Some(json!("red"))).is_ok());
        assert_eq!(
            run(&rule, Some(json!("blue"))),
            Err("name must be one of \"red\", \"green\"".to_string())
        );
        assert!(run(&Rule::equals(5), Some(json!(5))).is_ok());
    }
}
