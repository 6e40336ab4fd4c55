//! The rule-validator seam and the options a run passes through it.

use std::collections::BTreeMap;

use async_trait::async_trait;
use serde_json::Value;

use super::errors::ValidationError;
use super::messages::ValidateMessages;
use super::rule::Rule;

/// Which fields stop at their first failing rule.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum FirstFields {
    /// Every rule of every field runs.
    #[default]
    None,
    /// Every field stops at its first failure.
    All,
    /// Only the named fields stop at their first failure.
    Names(Vec<String>),
}

impl FirstFields {
    /// Returns `true` if `name` stops at its first failure.
    pub fn contains(&self, name: &str) -> bool {
        match self {
            Self::None => false,
            Self::All => true,
            Self::Names(names) => names.iter().any(|n| n == name),
        }
    }

    /// Converts a boolean flag into `All` or `None`.
    pub fn from_flag(flag: bool) -> Self {
        if flag { Self::All } else { Self::None }
    }
}

/// Options forwarded to the rule validator.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunOptions {
    /// Stop the whole batch at the first failing field.
    pub first: bool,
    /// Per-field stop-at-first-error mode.
    pub first_fields: FirstFields,
}

/// Caller-facing options for `validate_fields`.
///
/// # Example
///
/// ```
/// use formstate::validation::{FirstFields, ValidateOptions};
///
/// let options = ValidateOptions::new()
///     .force(true)
///     .first_fields(FirstFields::All);
/// assert!(options.force);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidateOptions {
    /// Validate fields even when they are not dirty.
    pub force: bool,
    /// Stop the whole batch at the first failing field.
    pub first: bool,
    /// Per-field stop-at-first-error mode. When unset, fields registered
    /// with `validate_first` stop at their first failure.
    pub first_fields: Option<FirstFields>,
}

impl ValidateOptions {
    /// Creates default options.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the force flag.
    pub fn force(mut self, force: bool) -> Self {
        self.force = force;
        self
    }

    /// Sets the batch-level first flag.
    pub fn first(mut self, first: bool) -> Self {
        self.first = first;
        self
    }

    /// Sets the per-field first mode.
    pub fn first_fields(mut self, first_fields: FirstFields) -> Self {
        self.first_fields = Some(first_fields);
        self
    }
}

/// One batch handed to the rule validator.
#[derive(Debug, Clone, Default)]
pub struct ValidationRequest {
    /// Rules per field name.
    pub rules: BTreeMap<String, Vec<Rule>>,
    /// Snapshot values per field name (`None` when unset).
    pub values: BTreeMap<String, Option<Value>>,
    /// Run options.
    pub options: RunOptions,
    /// Message table overriding the validator's own, if configured.
    pub messages: Option<ValidateMessages>,
}

/// Evaluates rule batches.
///
/// Implementations must report every failure as a [`ValidationError`] whose
/// `field` is the full dotted name it was requested under. They never fail
/// as a whole: an unreachable backend is just another error record.
#[async_trait]
pub trait RuleValidator: Send + Sync {
    /// Validates one batch.
    async fn validate(&self, request: ValidationRequest) -> Vec<ValidationError>;
}
