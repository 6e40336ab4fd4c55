//! Default rule validator.

use async_trait::async_trait;
use futures::future::join_all;
use serde_json::Value;

use super::errors::ValidationError;
use super::messages::ValidateMessages;
use super::rule::Rule;
use super::validator::RuleValidator;
use super::validator::ValidationRequest;

/// Evaluates [`Rule`]s in-process.
///
/// Fields are checked concurrently; the rules of one field run in order.
///
/// # Example
///
/// ```
/// use formstate::validation::{BuiltinValidator, ValidateMessages};
///
/// let messages = ValidateMessages {
///     required: "Please fill in %s".into(),
///     ..Default::default()
/// };
/// let validator = BuiltinValidator::with_messages(messages);
/// ```
#[derive(Debug, Clone, Default)]
pub struct BuiltinValidator {
    messages: ValidateMessages,
}

impl BuiltinValidator {
    /// Creates a validator with the default message table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a validator with a custom message table.
    pub fn with_messages(messages: ValidateMessages) -> Self {
        Self { messages }
    }
}

#[async_trait]
impl RuleValidator for BuiltinValidator {
    async fn validate(&self, request: ValidationRequest) -> Vec<ValidationError> {
        let messages = request.messages.as_ref().unwrap_or(&self.messages);

        let checks = request.rules.iter().map(|(name, rules)| {
            let value = request.values.get(name).and_then(Option::as_ref);
            let stop_at_first = request.options.first_fields.contains(name);
            check_field(name, rules, value, stop_at_first, messages)
        });
        let results = join_all(checks).await;

        let mut errors = Vec::new();
        for field_errors in results {
            if request.options.first && !field_errors.is_empty() {
                errors.extend(field_errors.into_iter().take(1));
                break;
            }
            errors.extend(field_errors);
        }
        errors
    }
}

async fn check_field(
    name: &str,
    rules: &[Rule],
    value: Option<&Value>,
    stop_at_first: bool,
    messages: &ValidateMessages,
) -> Vec<ValidationError> {
    let mut errors = Vec::new();
    for rule in rules {
        if let Err(message) = rule.evaluate(name, value, messages).await {
            errors.push(ValidationError::new(name, message));
            if stop_at_first {
                break;
            }
        }
    }
    errors
}
