//! Per-field state and metadata.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use serde::Serialize;
use serde_json::Map;
use serde_json::Value;

use crate::handler::ElementProps;
use crate::handler::FieldHandler;
use crate::handler::FieldInstance;
use crate::handler::ValueExtractor;
use crate::handler::WidgetHandlers;
use crate::validation::Rule;
use crate::validation::ValidationError;

/// Rewrites a value as it is stored.
///
/// Called with `(new_value, previous_value, all_new_values)`.
pub type Normalizer =
    Arc<dyn Fn(Option<&Value>, Option<&Value>, &Map<String, Value>) -> Option<Value> + Send + Sync>;

/// Called with the mounted element whenever the field is attached.
pub type InstanceHook = Arc<dyn Fn(&FieldInstance) + Send + Sync>;

// =============================================================================
// Field State
// =============================================================================

/// Live state of one field.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Field {
    /// Current value; `None` when unset (reads fall back to the initial value).
    pub value: Option<Value>,
    /// Changed since the last completed validation.
    ///
    /// A field that has never completed validation counts as dirty.
    pub dirty: bool,
    /// A validation run for this field is in flight.
    pub validating: bool,
    /// The user has interacted with the field.
    pub touched: bool,
    /// Errors from the last completed validation.
    pub errors: Option<Vec<ValidationError>>,
}

impl Default for Field {
    fn default() -> Self {
        Self {
            value: None,
            dirty: true,
            validating: false,
            touched: false,
            errors: None,
        }
    }
}

impl Field {
    /// Creates a fresh field holding `value`.
    pub fn with_value(value: impl Into<Value>) -> Self {
        Self {
            value: Some(value.into()),
            ..Self::default()
        }
    }

    /// Creates a fresh field from an optional value.
    pub fn from_value(value: Option<Value>) -> Self {
        Self {
            value,
            ..Self::default()
        }
    }
}

// =============================================================================
// Trigger-scoped rules
// =============================================================================

/// Rules that run when one of `trigger` fires.
#[derive(Debug, Clone, Default)]
pub struct ValidateRule {
    pub trigger: Vec<String>,
    pub rules: Vec<Rule>,
}

impl ValidateRule {
    /// Creates a trigger-scoped rule set.
    pub fn new<I, S>(trigger: I, rules: Vec<Rule>) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            trigger: trigger.into_iter().map(Into::into).collect(),
            rules,
        }
    }
}

/// Combines explicit trigger-scoped rules with top-level `rules`, which run
/// on `validate_trigger`.
pub fn normalize_validate_rules(
    validate: Vec<ValidateRule>,
    rules: Option<Vec<Rule>>,
    validate_trigger: Vec<String>,
) -> Vec<ValidateRule> {
    let mut normalized = validate;
    if let Some(rules) = rules {
        normalized.push(ValidateRule {
            trigger: validate_trigger,
            rules,
        });
    }
    normalized
}

/// Distinct triggers that have at least one rule, in declaration order.
pub fn validate_triggers(validate: &[ValidateRule]) -> Vec<String> {
    let mut triggers: Vec<String> = Vec::new();
    for item in validate.iter().filter(|item| !item.rules.is_empty()) {
        for trigger in &item.trigger {
            if !triggers.contains(trigger) {
                triggers.push(trigger.clone());
            }
        }
    }
    triggers
}

/// Returns `true` if any entry carries rules.
pub fn has_rules(validate: &[ValidateRule]) -> bool {
    validate.iter().any(|item| !item.rules.is_empty())
}

/// Rules that apply to `action`, or all rules when no action is given.
pub fn rules_for(validate: &[ValidateRule], action: Option<&str>) -> Vec<Rule> {
    validate
        .iter()
        .filter(|item| action.is_none_or(|a| item.trigger.iter().any(|t| t == a)))
        .flat_map(|item| item.rules.iter().cloned())
        .collect()
}

// =============================================================================
// Field Options
// =============================================================================

/// Options supplied on each registration.
///
/// `None` means "not supplied": the previous registration's value is kept,
/// except for `trigger` and `value_prop_name`, which fall back to the form
/// defaults on every registration.
///
/// # Example
///
/// ```
/// use formstate::{FieldOptions, validation::Rule};
/// use serde_json::json;
///
/// let options = FieldOptions::new()
///     .initial_value(json!("Berlin"))
///     .rules(vec![Rule::required()])
///     .validate_trigger(["onBlur"]);
/// ```
#[derive(Clone, Default)]
pub struct FieldOptions {
    pub trigger: Option<String>,
    pub validate_trigger: Option<Vec<String>>,
    pub value_prop_name: Option<String>,
    pub rules: Option<Vec<Rule>>,
    pub validate: Vec<ValidateRule>,
    pub initial_value: Option<Value>,
    pub validate_first: Option<bool>,
    pub hidden: Option<bool>,
    pub preserve: Option<bool>,
    pub get_value_from_event: Option<ValueExtractor>,
    pub normalize: Option<Normalizer>,
    pub handlers: WidgetHandlers,
    pub on_instance: Option<InstanceHook>,
}

impl FieldOptions {
    /// Creates empty options.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the action that collects the value.
    pub fn trigger(mut self, trigger: impl Into<String>) -> Self {
        self.trigger = Some(trigger.into());
        self
    }

    /// Sets the actions that run the top-level `rules`.
    pub fn validate_trigger<I, S>(mut self, triggers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.validate_trigger = Some(triggers.into_iter().map(Into::into).collect());
        self
    }

    /// Sets the prop name the value is delivered under.
    pub fn value_prop_name(mut self, name: impl Into<String>) -> Self {
        self.value_prop_name = Some(name.into());
        self
    }

    /// Sets the top-level rules.
    pub fn rules(mut self, rules: Vec<Rule>) -> Self {
        self.rules = Some(rules);
        self
    }

    /// Adds a trigger-scoped rule set.
    pub fn validate(mut self, rule: ValidateRule) -> Self {
        self.validate.push(rule);
        self
    }

    /// Sets the initial value.
    pub fn initial_value(mut self, value: impl Into<Value>) -> Self {
        self.initial_value = Some(value.into());
        self
    }

    /// Stop at the first failing rule of this field.
    pub fn validate_first(mut self, first: bool) -> Self {
        self.validate_first = Some(first);
        self
    }

    /// Exclude the field from whole-form reads and validation.
    pub fn hidden(mut self, hidden: bool) -> Self {
        self.hidden = Some(hidden);
        self
    }

    /// Keeps the field's state when its element detaches.
    pub fn preserve(mut self, preserve: bool) -> Self {
        self.preserve = Some(preserve);
        self
    }

    /// Sets a custom value extractor.
    pub fn get_value_from_event<F>(mut self, f: F) -> Self
    where
        F: Fn(&crate::handler::EventData) -> Option<Value> + Send + Sync + 'static,
    {
        self.get_value_from_event = Some(Arc::new(f));
        self
    }

    /// Sets a normalizer.
    pub fn normalize<F>(mut self, f: F) -> Self
    where
        F: Fn(Option<&Value>, Option<&Value>, &Map<String, Value>) -> Option<Value>
            + Send
            + Sync
            + 'static,
    {
        self.normalize = Some(Arc::new(f));
        self
    }

    /// Adds a handler that runs before the form collects `action`.
    pub fn on<F>(mut self, action: impl Into<String>, handler: F) -> Self
    where
        F: Fn(crate::handler::EventData) + Send + Sync + 'static,
    {
        self.handlers.insert(action.into(), Arc::new(handler));
        self
    }

    /// Sets the hook called with the element on attach.
    pub fn on_instance<F>(mut self, hook: F) -> Self
    where
        F: Fn(&FieldInstance) + Send + Sync + 'static,
    {
        self.on_instance = Some(Arc::new(hook));
        self
    }
}

// =============================================================================
// Field Metadata
// =============================================================================

/// Registration metadata of one field.
#[derive(Clone, Default)]
pub struct FieldMeta {
    pub name: String,
    pub trigger: String,
    pub value_prop_name: String,
    pub validate: Vec<ValidateRule>,
    pub initial_value: Option<Value>,
    pub validate_first: bool,
    pub hidden: bool,
    pub preserve: bool,
    pub get_value_from_event: Option<ValueExtractor>,
    pub normalize: Option<Normalizer>,
    pub handlers: WidgetHandlers,
    pub original_props: Option<ElementProps>,
    pub on_instance: Option<InstanceHook>,
}

impl FieldMeta {
    /// Creates an empty record for `name`.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Applies one registration on top of this record.
    ///
    /// Later registration wins per key. `trigger` and `value_prop_name` are
    /// always reset (to the given defaults when not supplied). Rule lists
    /// are replaced, never merged. Handlers merge per action.
    pub fn merge_options(
        &self,
        options: FieldOptions,
        default_trigger: &str,
        default_value_prop: &str,
    ) -> FieldMeta {
        let trigger = options
            .trigger
            .unwrap_or_else(|| default_trigger.to_string());
        let validate_trigger = options
            .validate_trigger
            .unwrap_or_else(|| vec![trigger.clone()]);
        let validate = normalize_validate_rules(options.validate, options.rules, validate_trigger);

        let mut handlers = self.handlers.clone();
        handlers.extend(options.handlers);

        FieldMeta {
            name: self.name.clone(),
            trigger,
            value_prop_name: options
                .value_prop_name
                .unwrap_or_else(|| default_value_prop.to_string()),
            validate,
            initial_value: options.initial_value.or_else(|| self.initial_value.clone()),
            validate_first: options.validate_first.unwrap_or(self.validate_first),
            hidden: options.hidden.unwrap_or(self.hidden),
            preserve: options.preserve.unwrap_or(self.preserve),
            get_value_from_event: options
                .get_value_from_event
                .or_else(|| self.get_value_from_event.clone()),
            normalize: options.normalize.or_else(|| self.normalize.clone()),
            handlers,
            original_props: self.original_props.clone(),
            on_instance: options.on_instance.or_else(|| self.on_instance.clone()),
        }
    }

    /// Returns `true` if any rule is attached.
    pub fn has_rules(&self) -> bool {
        has_rules(&self.validate)
    }

    /// Rules for `action` (all rules when `None`).
    pub fn rules_for(&self, action: Option<&str>) -> Vec<Rule> {
        rules_for(&self.validate, action)
    }

    /// Distinct validate triggers.
    pub fn validate_triggers(&self) -> Vec<String> {
        validate_triggers(&self.validate)
    }

    /// Serializable view of the metadata, without closures.
    pub fn to_json(&self) -> Value {
        serde_json::json!({
            "name": self.name,
            "trigger": self.trigger,
            "valuePropName": self.value_prop_name,
            "validateTriggers": self.validate_triggers(),
            "initialValue": self.initial_value,
            "validateFirst": self.validate_first,
            "hidden": self.hidden,
            "preserve": self.preserve,
        })
    }

    /// Handler to run before collecting `action`: the field's own, else the
    /// one from the element's original props.
    pub fn action_handler(&self, action: &str) -> Option<FieldHandler> {
        self.handlers.get(action).cloned().or_else(|| {
            self.original_props
                .as_ref()
                .and_then(|props| props.handlers.get(action).cloned())
        })
    }
}

impl fmt::Debug for FieldMeta {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut actions: Vec<&String> = self.handlers.keys().collect();
        actions.sort();
        f.debug_struct("FieldMeta")
            .field("name", &self.name)
            .field("trigger", &self.trigger)
            .field("value_prop_name", &self.value_prop_name)
            .field("validate", &self.validate)
            .field("initial_value", &self.initial_value)
            .field("validate_first", &self.validate_first)
            .field("hidden", &self.hidden)
            .field("preserve", &self.preserve)
            .field("get_value_from_event", &self.get_value_from_event.is_some())
            .field("normalize", &self.normalize.is_some())
            .field("handlers", &actions)
            .field("original_props", &self.original_props)
            .field("on_instance", &self.on_instance.is_some())
            .finish()
    }
}

/// Snapshot taken when a field's element unmounts.
#[derive(Debug, Clone)]
pub struct ClearedField {
    pub field: Field,
    pub meta: FieldMeta,
    pub cleared_at: std::time::Instant,
}

/// Flat map of field state keyed by dotted name.
pub type Fields = BTreeMap<String, Field>;
