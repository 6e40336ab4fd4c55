//! Validation runs against a [`FieldsStore`].
//!
//! A run is split at its two store checkpoints. [`ValidationRun::prepare`]
//! selects the eligible fields and produces the snapshot to commit;
//! [`ValidationRun::reconcile`] takes the rule validator's output and
//! decides, per field, whether the result still applies to the live value.
//! The caller owns locking and commits both payloads itself, so the store is
//! never borrowed across the asynchronous gap.

use std::collections::BTreeMap;
use std::future::Future;
use std::pin::Pin;
use std::task::Context;
use std::task::Poll;

use futures::future::BoxFuture;
use futures::future::Ready;
use serde_json::Value;
use uuid::Uuid;

use super::errors::ErrorTree;
use super::errors::FieldErrors;
use super::errors::ValidationError;
use super::messages::ValidateMessages;
use super::rule::Rule;
use super::validator::FirstFields;
use super::validator::RunOptions;
use super::validator::ValidateOptions;
use super::validator::ValidationRequest;
use crate::field::Field;
use crate::field::Fields;
use crate::store::FieldsStore;

// =============================================================================
// Outcome
// =============================================================================

/// What a finished run reports: `(errors_or_none, values)`.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidationOutcome {
    /// Aggregated errors, `None` when no field has any.
    pub errors: Option<ErrorTree>,
    /// Nested values of the run's target fields.
    pub values: Value,
}

impl ValidationOutcome {
    /// Builds an outcome, collapsing an empty tree to `None`.
    pub fn new(errors: ErrorTree, values: Value) -> Self {
        Self {
            errors: if errors.is_empty() { None } else { Some(errors) },
            values,
        }
    }

    /// Returns `true` if no field reported errors.
    pub fn is_valid(&self) -> bool {
        self.errors.is_none()
    }
}

/// A validation run in progress.
///
/// The synchronous phases have already happened when a task exists. A task
/// that needed no rule evaluation is already resolved; see
/// [`is_ready`](ValidationTask::is_ready).
pub struct ValidationTask {
    inner: TaskInner,
}

enum TaskInner {
    Ready(Ready<ValidationOutcome>),
    Pending(BoxFuture<'static, ValidationOutcome>),
}

impl ValidationTask {
    pub(crate) fn ready(outcome: ValidationOutcome) -> Self {
        Self {
            inner: TaskInner::Ready(futures::future::ready(outcome)),
        }
    }

    pub(crate) fn pending<F>(future: F) -> Self
    where
        F: Future<Output = ValidationOutcome> + Send + 'static,
    {
        Self {
            inner: TaskInner::Pending(Box::pin(future)),
        }
    }

    /// Returns `true` if the outcome is available without awaiting.
    pub fn is_ready(&self) -> bool {
        matches!(self.inner, TaskInner::Ready(_))
    }
}

impl Future for ValidationTask {
    type Output = ValidationOutcome;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        match &mut self.get_mut().inner {
            TaskInner::Ready(ready) => Pin::new(ready).poll(cx),
            TaskInner::Pending(future) => future.as_mut().poll(cx),
        }
    }
}

impl std::fmt::Debug for ValidationTask {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ValidationTask")
            .field("ready", &self.is_ready())
            .finish()
    }
}

// =============================================================================
// Run
// =============================================================================

/// One batch of fields being validated together.
#[derive(Debug, Clone)]
pub struct ValidationRun {
    id: Uuid,
    field_names: Option<Vec<String>>,
    rules: BTreeMap<String, Vec<Rule>>,
    values: BTreeMap<String, Option<Value>>,
    already: ErrorTree,
    options: RunOptions,
}

/// Result of the selection, eligibility and snapshot phases.
#[derive(Debug)]
pub struct Prepared {
    /// The run to hand to the rule validator.
    pub run: ValidationRun,
    /// Snapshot to commit before evaluation starts.
    pub snapshot: Fields,
}

impl ValidationRun {
    /// Decides which of `fields` enter validation and builds the snapshot.
    ///
    /// Fields that are clean keep their recorded errors and are skipped
    /// unless `force` is set. `field_names` are the names whose values the
    /// outcome reports (all valid fields when `None`).
    pub fn prepare(
        store: &FieldsStore,
        fields: Vec<(String, Field)>,
        field_names: Option<Vec<String>>,
        action: Option<&str>,
        force: bool,
        options: RunOptions,
    ) -> Prepared {
        let mut already = ErrorTree::new();
        let mut rules = BTreeMap::new();
        let mut values = BTreeMap::new();
        let mut snapshot = Fields::new();

        for (name, field) in fields {
            if !force && !field.dirty {
                if let Some(errors) = &field.errors {
                    already.insert(&name, FieldErrors::new(errors.clone()));
                }
                continue;
            }
            let field_rules = store
                .field_meta(&name)
                .map(|meta| meta.rules_for(action))
                .unwrap_or_default();

            values.insert(name.clone(), field.value.clone());
            rules.insert(name.clone(), field_rules);
            snapshot.insert(
                name,
                Field {
                    errors: None,
                    validating: true,
                    dirty: true,
                    ..field
                },
            );
        }

        let run = Self {
            id: Uuid::new_v4(),
            field_names,
            rules,
            values,
            already,
            options,
        };
        log::debug!(
            "validation run {} prepared: {:?} (skipped with errors: {})",
            run.id,
            run.rules.keys().collect::<Vec<_>>(),
            run.already.leaves().len()
        );
        Prepared { run, snapshot }
    }

    /// Run id used in log lines.
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Returns `true` if no field entered validation.
    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Names under validation.
    pub fn names(&self) -> Vec<String> {
        self.rules.keys().cloned().collect()
    }

    /// Re-reads the snapshot values after the snapshot commit, so that
    /// normalizers applied by the store are what gets validated.
    pub fn refresh_values(&mut self, store: &FieldsStore) {
        for (name, value) in self.values.iter_mut() {
            *value = store.get_field_value(name);
        }
    }

    /// Outcome for a run that evaluates nothing.
    pub fn skipped(self, store: &FieldsStore) -> ValidationOutcome {
        let values = store.get_fields_value(self.field_names.as_deref());
        ValidationOutcome::new(self.already, values)
    }

    /// Builds the batch for the rule validator.
    pub fn request(&self, messages: Option<ValidateMessages>) -> ValidationRequest {
        ValidationRequest {
            rules: self.rules.clone(),
            values: self.values.clone(),
            options: self.options.clone(),
            messages,
        }
    }

    /// Matches validator output against the live store.
    ///
    /// Fields whose live value no longer equals the validated value are
    /// marked expired and left untouched; the rest get their errors
    /// committed with `validating` and `dirty` cleared.
    pub fn reconcile(self, store: &FieldsStore, errors: Vec<ValidationError>) -> Reconciliation {
        let mut tree = self.already;
        for error in errors {
            let name = owning_field(&self.rules, &error.field);
            tree.push(&name, error);
        }

        let mut commit = Fields::new();
        let mut expired = Vec::new();
        for name in self.rules.keys() {
            // Both sides fall back to the initial value, as `refresh_values` does.
            let validated = self.values.get(name).cloned().flatten();
            if store.get_field_value(name) != validated {
                expired.push(name.clone());
                continue;
            }
            let live = store.get_field(name);
            commit.insert(
                name.clone(),
                Field {
                    errors: tree.get(name).map(|e| e.errors.clone()),
                    validating: false,
                    dirty: false,
                    ..live
                },
            );
        }

        for name in &expired {
            tree.insert(name, FieldErrors::expired(name));
        }
        if !expired.is_empty() {
            log::debug!("validation run {} expired: {:?}", self.id, expired);
        }

        Reconciliation {
            id: self.id,
            commit,
            errors: tree,
            expired,
            field_names: self.field_names,
        }
    }
}

/// Maps an error reported for an element of an array field (`list.0`) back
/// to the field that owns the rule (`list`).
fn owning_field(rules: &BTreeMap<String, Vec<Rule>>, reported: &str) -> String {
    if rules.contains_key(reported) {
        return reported.to_string();
    }
    rules
        .keys()
        .find(|name| {
            let Some(rest) = reported.strip_prefix(name.as_str()) else {
                return false;
            };
            let index = rest
                .strip_prefix('.')
                .or_else(|| rest.strip_prefix('[').and_then(|r| r.strip_suffix(']')));
            index.is_some_and(|i| !i.is_empty() && i.bytes().all(|b| b.is_ascii_digit()))
        })
        .cloned()
        .unwrap_or_else(|| reported.to_string())
}

/// The commit half of a finished run.
#[derive(Debug, Clone)]
pub struct Reconciliation {
    id: Uuid,
    /// Field states to commit.
    pub commit: Fields,
    /// Aggregated errors, including expired markers.
    pub errors: ErrorTree,
    /// Names whose result was discarded.
    pub expired: Vec<String>,
    field_names: Option<Vec<String>>,
}

impl Reconciliation {
    /// Builds the outcome once `commit` has been applied to `store`.
    pub fn into_outcome(self, store: &FieldsStore) -> ValidationOutcome {
        log::debug!(
            "validation run {} finished: {} field(s) with errors",
            self.id,
            self.errors.leaves().len()
        );
        let values = store.get_fields_value(self.field_names.as_deref());
        ValidationOutcome::new(self.errors, values)
    }
}

/// Resolves caller options against the per-field `validate_first` defaults.
pub fn run_options(options: &ValidateOptions, default_first_fields: FirstFields) -> RunOptions {
    RunOptions {
        first: options.first,
        first_fields: options
            .first_fields
            .clone()
            .unwrap_or(default_first_fields),
    }
}
