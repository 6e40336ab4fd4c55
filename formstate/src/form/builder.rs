//! Form construction.

use std::sync::Arc;

use serde_json::Value;
use tokio::runtime::Handle;

use super::Form;
use super::config::FormConfig;
use crate::error::UsageWarning;
use crate::field::Field;
use crate::field::Fields;
use crate::validation::BuiltinValidator;
use crate::validation::RuleValidator;

/// Field changes reported to the `on_fields_change` hook.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldsChange {
    /// Nested state of the fields that were written.
    pub changed: Value,
    /// Nested state of every valid field after the write.
    pub all: Value,
}

/// Called after field state is committed.
pub type FieldsChangeHook = Arc<dyn Fn(&FieldsChange) + Send + Sync>;

/// Called with `(changed_values, all_values)` when the user or
/// `set_fields_value` changes values. Both are nested.
pub type ValuesChangeHook = Arc<dyn Fn(&Value, &Value) + Send + Sync>;

/// Called for every usage warning, after it has been logged.
pub type WarningHook = Arc<dyn Fn(&UsageWarning) + Send + Sync>;

#[derive(Clone, Default)]
pub(crate) struct Hooks {
    pub on_fields_change: Option<FieldsChangeHook>,
    pub on_values_change: Option<ValuesChangeHook>,
    pub on_warning: Option<WarningHook>,
}

/// Builds a [`Form`].
///
/// # Example
///
/// ```
/// use formstate::{Form, FormConfig};
///
/// let form = Form::builder()
///     .config(FormConfig::default().with_field_name_prop("id"))
///     .on_values_change(|changed, _all| println!("changed: {changed}"))
///     .build();
/// ```
#[derive(Default)]
pub struct FormBuilder {
    config: FormConfig,
    validator: Option<Arc<dyn RuleValidator>>,
    fields: Fields,
    hooks: Hooks,
    runtime: Option<Handle>,
}

impl FormBuilder {
    /// Creates a builder with default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the configuration.
    pub fn config(mut self, config: FormConfig) -> Self {
        self.config = config;
        self
    }

    /// Sets the rule validator. Defaults to [`BuiltinValidator`].
    pub fn validator<V: RuleValidator + 'static>(mut self, validator: V) -> Self {
        self.validator = Some(Arc::new(validator));
        self
    }

    /// Sets a shared rule validator.
    pub fn shared_validator(mut self, validator: Arc<dyn RuleValidator>) -> Self {
        self.validator = Some(validator);
        self
    }

    /// Seeds the store with externally supplied field state.
    pub fn fields<I>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = (String, Field)>,
    {
        self.fields.extend(fields);
        self
    }

    /// Sets the field change hook.
    pub fn on_fields_change<F>(mut self, hook: F) -> Self
    where
        F: Fn(&FieldsChange) + Send + Sync + 'static,
    {
        self.hooks.on_fields_change = Some(Arc::new(hook));
        self
    }

    /// Sets the value change hook.
    pub fn on_values_change<F>(mut self, hook: F) -> Self
    where
        F: Fn(&Value, &Value) + Send + Sync + 'static,
    {
        self.hooks.on_values_change = Some(Arc::new(hook));
        self
    }

    /// Sets the usage warning hook.
    pub fn on_warning<F>(mut self, hook: F) -> Self
    where
        F: Fn(&UsageWarning) + Send + Sync + 'static,
    {
        self.hooks.on_warning = Some(Arc::new(hook));
        self
    }

    /// Runtime that validation started from handlers is spawned on.
    ///
    /// Without one, the runtime current at the time of the event is used.
    pub fn runtime(mut self, handle: Handle) -> Self {
        self.runtime = Some(handle);
        self
    }

    /// Builds the form.
    pub fn build(self) -> Form {
        let validator = self
            .validator
            .unwrap_or_else(|| Arc::new(BuiltinValidator::new()));
        Form::from_parts(self.config, validator, self.fields, self.hooks, self.runtime)
    }
}
