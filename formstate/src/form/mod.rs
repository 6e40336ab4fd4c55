//! The adapter-facing form handle.
//!
//! [`Form`] is a cheap, cloneable handle around one [`FieldsStore`] plus the
//! lifecycle bookkeeping that ties it to mounted elements. Every operation
//! takes the state lock once, collects the notifications it owes (change
//! hooks, usage warnings) and fires them after the lock is released, so hooks
//! may call back into the form.
//!
//! Field normalizers run while the lock is held and must not call back into
//! the form.

mod builder;
mod config;
mod lifecycle;
mod props;

pub use builder::{FieldsChange, FieldsChangeHook, FormBuilder, ValuesChangeHook, WarningHook};
pub use config::FormConfig;
pub use lifecycle::FieldDecorator;
pub use props::FieldProps;

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::sync::PoisonError;
use std::sync::RwLock;
use std::sync::RwLockReadGuard;
use std::sync::RwLockWriteGuard;

use futures::FutureExt;
use serde_json::Map;
use serde_json::Value;
use tokio::runtime::Handle;

use crate::error::UsageWarning;
use crate::field::ClearedField;
use crate::field::Field;
use crate::field::FieldMeta;
use crate::field::Fields;
use crate::handler::AttachHandler;
use crate::handler::FieldHandler;
use crate::handler::FieldInstance;
use crate::path::FieldPath;
use crate::path::set_in;
use crate::path::unflatten;
use crate::store::FieldsStore;
use crate::store::field_to_json;
use crate::validation::ErrorTree;
use crate::validation::FirstFields;
use crate::validation::Prepared;
use crate::validation::RuleValidator;
use crate::validation::RunOptions;
use crate::validation::ValidateOptions;
use crate::validation::ValidationError;
use crate::validation::ValidationOutcome;
use crate::validation::ValidationRun;
use crate::validation::ValidationTask;
use crate::validation::run_options;

use builder::Hooks;

// =============================================================================
// Shared State
// =============================================================================

/// What a bound handler does with the collected value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum BindKind {
    /// Store the value.
    Collect,
    /// Store the value and validate the field for the action.
    CollectValidate,
}

#[derive(Clone)]
pub(crate) struct BoundHandler {
    kind: BindKind,
    handler: FieldHandler,
}

#[derive(Default)]
pub(crate) struct FormState {
    store: FieldsStore,
    instances: HashMap<String, FieldInstance>,
    bound: HashMap<String, HashMap<String, BoundHandler>>,
    attach_bound: HashMap<String, AttachHandler>,
    cleared: HashMap<String, ClearedField>,
}

impl FormState {
    /// Drops everything bound to `name` except the cleared cache.
    fn forget(&mut self, name: &str) {
        self.store.clear_field(name);
        self.instances.remove(name);
        self.bound.remove(name);
        self.attach_bound.remove(name);
    }
}

/// Notifications collected under the lock and fired after it is released.
#[derive(Default)]
pub(crate) struct Notices {
    fields_changes: Vec<FieldsChange>,
    values_change: Option<(Value, Value)>,
    warnings: Vec<UsageWarning>,
}

impl Notices {
    fn warn(&mut self, warning: UsageWarning) {
        self.warnings.push(warning);
    }
}

pub(crate) struct FormInner {
    state: RwLock<FormState>,
    config: FormConfig,
    validator: Arc<dyn RuleValidator>,
    hooks: Hooks,
    runtime: Option<Handle>,
}

impl FormInner {
    fn read(&self) -> RwLockReadGuard<'_, FormState> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, FormState> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Commits `fields` for registered names only. Returns the names that
    /// were dropped because they are not registered.
    fn apply_fields(&self, state: &mut FormState, fields: Fields, notices: &mut Notices) -> Vec<String> {
        let (registered, stray): (Fields, Fields) = fields
            .into_iter()
            .partition(|(name, _)| state.store.is_registered(name));
        if registered.is_empty() {
            return stray.into_keys().collect();
        }

        let names: Vec<String> = registered.keys().cloned().collect();
        state.store.set_fields(registered);

        if self.hooks.on_fields_change.is_some() {
            let mut changed = Value::Object(Map::new());
            for name in &names {
                let field = state.store.get_field(name);
                set_in(&mut changed, &FieldPath::parse(name), field_to_json(&field));
            }
            notices.fields_changes.push(FieldsChange {
                changed,
                all: state.store.get_nested_all_fields(),
            });
        }
        stray.into_keys().collect()
    }

    /// Builds the `(changed, all)` pair for the values hook, with `name`
    /// overridden by `value`.
    fn values_change(&self, state: &FormState, changed: Value, overrides: Option<(&str, &Value)>) -> Option<(Value, Value)> {
        self.hooks.on_values_change.as_ref()?;
        let mut all = state.store.get_all_values();
        if let Some((name, value)) = overrides {
            all.insert(name.to_string(), value.clone());
        }
        let all = unflatten(all.iter().map(|(name, value)| (name.as_str(), value.clone())));
        Some((changed, all))
    }

    fn emit(&self, notices: Notices) {
        for warning in &notices.warnings {
            log::warn!("{}", warning);
            if let Some(hook) = &self.hooks.on_warning {
                hook(warning);
            }
        }
        if let Some(hook) = &self.hooks.on_fields_change {
            for change in &notices.fields_changes {
                hook(change);
            }
        }
        if let (Some(hook), Some((changed, all))) = (&self.hooks.on_values_change, &notices.values_change) {
            hook(changed, all);
        }
    }

    /// Runs the selection, eligibility and snapshot phases of a validation
    /// run and returns the task that finishes it.
    #[allow(clippy::too_many_arguments)]
    fn start_run(
        self: &Arc<Self>,
        state: &mut FormState,
        targets: Vec<(String, Field)>,
        field_names: Option<Vec<String>>,
        action: Option<&str>,
        force: bool,
        options: RunOptions,
        notices: &mut Notices,
    ) -> ValidationTask {
        let Prepared { mut run, snapshot } =
            ValidationRun::prepare(&state.store, targets, field_names, action, force, options);
        self.apply_fields(state, snapshot, notices);
        run.refresh_values(&state.store);

        if run.is_empty() {
            return ValidationTask::ready(run.skipped(&state.store));
        }

        let request = run.request(self.config.validate_messages.clone());
        let validator = Arc::clone(&self.validator);
        let inner = Arc::clone(self);
        ValidationTask::pending(async move {
            let errors = validator.validate(request).await;
            inner.finish_run(run, errors)
        })
    }

    fn finish_run(&self, run: ValidationRun, errors: Vec<ValidationError>) -> ValidationOutcome {
        let mut notices = Notices::default();
        let outcome = {
            let mut state = self.write();
            let mut reconciliation = run.reconcile(&state.store, errors);
            let commit = std::mem::take(&mut reconciliation.commit);
            let detached = self.apply_fields(&mut state, commit, &mut notices);
            if !detached.is_empty() {
                log::debug!("dropping results for detached fields: {:?}", detached);
            }
            reconciliation.into_outcome(&state.store)
        };
        self.emit(notices);
        outcome
    }

    fn spawn<F>(&self, future: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        if let Some(handle) = &self.runtime {
            handle.spawn(future);
            return;
        }
        match Handle::try_current() {
            Ok(handle) => {
                handle.spawn(future);
            }
            Err(_) => {
                log::warn!("No tokio runtime available, running validation inline");
                futures::executor::block_on(future);
            }
        }
    }
}

// =============================================================================
// Form
// =============================================================================

/// Handle to a form's state.
///
/// # Example
///
/// ```
/// use formstate::{FieldOptions, Form};
/// use serde_json::json;
///
/// let form = Form::new();
/// form.register("address.city", FieldOptions::new().initial_value("Berlin")).unwrap();
/// form.register("address.zip", FieldOptions::new()).unwrap();
/// form.set_fields_value(&json!({"address": {"zip": "10115"}}));
///
/// assert_eq!(
///     form.get_fields_value(),
///     json!({"address": {"city": "Berlin", "zip": "10115"}})
/// );
/// ```
#[derive(Clone)]
pub struct Form {
    inner: Arc<FormInner>,
}

impl Default for Form {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Form {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Form")
            .field("config", &self.inner.config)
            .field("fields", &self.inner.read().store.get_all_fields_name())
            .finish()
    }
}

impl Form {
    /// Creates a form with default configuration and the built-in validator.
    pub fn new() -> Self {
        FormBuilder::new().build()
    }

    /// Starts building a form.
    pub fn builder() -> FormBuilder {
        FormBuilder::new()
    }

    pub(crate) fn from_parts(
        config: FormConfig,
        validator: Arc<dyn RuleValidator>,
        fields: Fields,
        hooks: Hooks,
        runtime: Option<Handle>,
    ) -> Self {
        let state = FormState {
            store: FieldsStore::new(fields),
            ..FormState::default()
        };
        Self {
            inner: Arc::new(FormInner {
                state: RwLock::new(state),
                config,
                validator,
                hooks,
                runtime,
            }),
        }
    }

    /// The form's configuration.
    pub fn config(&self) -> &FormConfig {
        &self.inner.config
    }

    // -------------------------------------------------------------------------
    // Values
    // -------------------------------------------------------------------------

    /// Value of `name`, falling back to its initial value. Partial names
    /// return the nested structure below them.
    pub fn get_field_value(&self, name: &str) -> Option<Value> {
        self.inner.read().store.get_field_value(name)
    }

    /// Nested values of every valid field.
    pub fn get_fields_value(&self) -> Value {
        self.inner.read().store.get_fields_value::<&str>(None)
    }

    /// Nested values of `names`.
    pub fn get_fields_value_for<S: AsRef<str>>(&self, names: &[S]) -> Value {
        self.inner.read().store.get_fields_value(Some(names))
    }

    /// Flat map of every registered field's value.
    pub fn get_all_values(&self) -> Map<String, Value> {
        self.inner.read().store.get_all_values()
    }

    /// Copy of the live state of `name`.
    pub fn get_field(&self, name: &str) -> Field {
        self.inner.read().store.get_field(name)
    }

    /// Copy of the registration metadata of `name`.
    pub fn get_field_meta(&self, name: &str) -> Option<FieldMeta> {
        self.inner.read().store.field_meta(name).cloned()
    }

    /// Registered, non-hidden field names.
    pub fn get_valid_fields_name(&self) -> Vec<String> {
        self.inner.read().store.get_valid_fields_name()
    }

    /// Merges field state for registered names. Unregistered names are
    /// dropped with a warning.
    pub fn set_fields(&self, fields: Fields) {
        let mut notices = Notices::default();
        {
            let mut state = self.inner.write();
            for name in self.inner.apply_fields(&mut state, fields, &mut notices) {
                notices.warn(UsageWarning::unregistered_field(name));
            }
        }
        self.inner.emit(notices);
    }

    /// Sets values from a nested or flat mapping. Each registered name
    /// touched gets fresh state holding the new value; other paths are
    /// dropped with a warning.
    pub fn set_fields_value(&self, values: &Value) {
        let mut notices = Notices::default();
        {
            let mut state = self.inner.write();
            let flattened = state.store.flatten_registered_fields(values);
            for name in flattened.stray {
                notices.warn(UsageWarning::unregistered_field(name));
            }
            let fields: Fields = flattened
                .leaves
                .into_iter()
                .map(|(name, value)| (name, Field::from_value(Some(value))))
                .collect();
            self.inner.apply_fields(&mut state, fields, &mut notices);
            notices.values_change = self.inner.values_change(&state, values.clone(), None);
        }
        self.inner.emit(notices);
    }

    /// Updates the initial values of registered fields.
    pub fn set_fields_initial_value(&self, values: &Value) {
        let mut notices = Notices::default();
        {
            let mut state = self.inner.write();
            for name in state.store.set_fields_initial_value(values) {
                notices.warn(UsageWarning::unregistered_field(name));
            }
        }
        self.inner.emit(notices);
    }

    /// Replaces all live field state, for adapters that own it externally.
    pub fn update_fields(&self, fields: Fields) {
        self.inner.write().store.update_fields(fields);
    }

    /// Resets every registered field to its initial value and empties the
    /// cleared-field cache.
    pub fn reset_fields(&self) {
        self.reset(None);
    }

    /// Resets `names` (partial names expand) and drops their cleared-field
    /// entries.
    pub fn reset_fields_for<S: AsRef<str>>(&self, names: &[S]) {
        let names: Vec<String> = names.iter().map(|n| n.as_ref().to_string()).collect();
        self.reset(Some(names));
    }

    fn reset(&self, names: Option<Vec<String>>) {
        let mut notices = Notices::default();
        {
            let mut state = self.inner.write();
            let fields = state.store.reset_fields(names.as_deref());
            self.inner.apply_fields(&mut state, fields, &mut notices);
            match names {
                Some(names) => {
                    for name in names {
                        state.cleared.remove(&name);
                    }
                }
                None => state.cleared.clear(),
            }
        }
        self.inner.emit(notices);
    }

    // -------------------------------------------------------------------------
    // Errors & Flags
    // -------------------------------------------------------------------------

    /// Error messages of `name`.
    pub fn get_field_error(&self, name: &str) -> Option<Vec<String>> {
        self.inner.read().store.get_field_error(name)
    }

    /// Nested error messages of every valid field.
    pub fn get_fields_error(&self) -> Value {
        self.inner.read().store.get_fields_error::<&str>(None)
    }

    /// Nested error messages of `names`.
    pub fn get_fields_error_for<S: AsRef<str>>(&self, names: &[S]) -> Value {
        self.inner.read().store.get_fields_error(Some(names))
    }

    /// Returns `true` if `name` is being validated.
    pub fn is_field_validating(&self, name: &str) -> bool {
        self.inner.read().store.is_field_validating(name)
    }

    /// Returns `true` if any valid field is being validated.
    pub fn is_fields_validating(&self) -> bool {
        self.inner.read().store.is_fields_validating::<&str>(None)
    }

    /// Returns `true` if any of `names` is being validated.
    pub fn is_fields_validating_for<S: AsRef<str>>(&self, names: &[S]) -> bool {
        self.inner.read().store.is_fields_validating(Some(names))
    }

    /// Returns `true` if the user has interacted with `name`.
    pub fn is_field_touched(&self, name: &str) -> bool {
        self.inner.read().store.is_field_touched(name)
    }

    /// Returns `true` if the user has interacted with any valid field.
    pub fn is_fields_touched(&self) -> bool {
        self.inner.read().store.is_fields_touched::<&str>(None)
    }

    /// Returns `true` if the user has interacted with any of `names`.
    pub fn is_fields_touched_for<S: AsRef<str>>(&self, names: &[S]) -> bool {
        self.inner.read().store.is_fields_touched(Some(names))
    }

    // -------------------------------------------------------------------------
    // Validation
    // -------------------------------------------------------------------------

    /// Validates every valid field that carries rules.
    ///
    /// The snapshot is committed before this returns; await the task for
    /// the outcome.
    pub fn validate_fields(&self, options: ValidateOptions) -> ValidationTask {
        self.validate_names(None, options)
    }

    /// Validates `names` (partial names expand).
    pub fn validate_fields_for<S: AsRef<str>>(&self, names: &[S], options: ValidateOptions) -> ValidationTask {
        let names = names.iter().map(|n| n.as_ref().to_string()).collect();
        self.validate_names(Some(names), options)
    }

    /// Callback form of [`validate_fields`](Form::validate_fields).
    ///
    /// The callback runs before this returns when nothing needs evaluating;
    /// otherwise the run is spawned and the callback runs on completion.
    pub fn validate_fields_with<F>(&self, names: Option<Vec<String>>, options: ValidateOptions, callback: F)
    where
        F: FnOnce(ValidationOutcome) + Send + 'static,
    {
        let task = self.validate_names(names, options);
        if task.is_ready() {
            if let Some(outcome) = task.now_or_never() {
                callback(outcome);
            }
            return;
        }
        self.inner.spawn(async move { callback(task.await) });
    }

    fn validate_names(&self, names: Option<Vec<String>>, options: ValidateOptions) -> ValidationTask {
        let mut notices = Notices::default();
        let task = {
            let mut state = self.inner.write();
            let field_names = match &names {
                Some(names) => state.store.get_valid_fields_full_name(names),
                None => state.store.get_valid_fields_name(),
            };
            let targets: Vec<(String, Field)> = field_names
                .iter()
                .filter(|name| state.store.field_meta(name).is_some_and(FieldMeta::has_rules))
                .map(|name| {
                    let mut field = state.store.get_field(name);
                    field.value = state.store.get_field_value(name);
                    (name.clone(), field)
                })
                .collect();

            if targets.is_empty() {
                let values = state.store.get_fields_value(Some(field_names.as_slice()));
                log::debug!("nothing to validate in {:?}", field_names);
                ValidationTask::ready(ValidationOutcome::new(ErrorTree::new(), values))
            } else {
                let first_fields = FirstFields::Names(
                    field_names
                        .iter()
                        .filter(|name| state.store.field_meta(name).is_some_and(|m| m.validate_first))
                        .cloned()
                        .collect(),
                );
                let run = run_options(&options, first_fields);
                self.inner.start_run(
                    &mut state,
                    targets,
                    Some(field_names),
                    None,
                    options.force,
                    run,
                    &mut notices,
                )
            }
        };
        self.inner.emit(notices);
        task
    }
}
