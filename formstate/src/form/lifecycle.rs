//! Field registration, element attachment and value collection.
//!
//! Registration is idempotent per render: calling [`Form::register`] again
//! refreshes the metadata and returns the same handler `Arc`s. Attaching
//! and detaching an element moves a field between the live store and the
//! cleared-field cache, so an element that is briefly unmounted and mounted
//! again keeps its state.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::Weak;
use std::time::Instant;

use serde_json::Map;
use serde_json::Value;

use super::BindKind;
use super::BoundHandler;
use super::FieldProps;
use super::Form;
use super::FormInner;
use super::FormState;
use super::Notices;
use crate::error::FormError;
use crate::error::UsageWarning;
use crate::field::ClearedField;
use crate::field::Field;
use crate::field::FieldMeta;
use crate::field::FieldOptions;
use crate::field::Fields;
use crate::handler::AttachHandler;
use crate::handler::ElementProps;
use crate::handler::EventData;
use crate::handler::FieldHandler;
use crate::handler::FieldInstance;
use crate::path::FieldPath;
use crate::path::set_in;
use crate::store::field_to_json;
use crate::validation::FirstFields;
use crate::validation::RunOptions;

// =============================================================================
// Handler Binding
// =============================================================================

/// Returns the cached handler for `(name, action)`, binding a new one when
/// none exists or the cached one does something else.
fn bind(state: &mut FormState, form: &Weak<FormInner>, name: &str, action: &str, kind: BindKind) -> FieldHandler {
    let cache = state.bound.entry(name.to_string()).or_default();
    if let Some(bound) = cache.get(action) {
        if bound.kind == kind {
            return Arc::clone(&bound.handler);
        }
    }

    let form = Weak::clone(form);
    let field = name.to_string();
    let trigger = action.to_string();
    let handler: FieldHandler = Arc::new(move |event: EventData| {
        let Some(inner) = form.upgrade() else {
            log::debug!("form dropped; ignoring `{}` for `{}`", trigger, field);
            return;
        };
        let form = Form { inner };
        match kind {
            BindKind::Collect => form.collect(&field, &trigger, event),
            BindKind::CollectValidate => form.collect_validate(&field, &trigger, event),
        }
    });
    cache.insert(
        action.to_string(),
        BoundHandler {
            kind,
            handler: Arc::clone(&handler),
        },
    );
    handler
}

fn bind_attach(state: &mut FormState, form: &Weak<FormInner>, name: &str) -> AttachHandler {
    if let Some(handler) = state.attach_bound.get(name) {
        return Arc::clone(handler);
    }
    let form = Weak::clone(form);
    let field = name.to_string();
    let handler: AttachHandler = Arc::new(move |instance: Option<FieldInstance>| {
        if let Some(inner) = form.upgrade() {
            Form { inner }.attach_instance(&field, instance);
        }
    });
    state.attach_bound.insert(name.to_string(), Arc::clone(&handler));
    handler
}

/// `default` + capitalized prop name, e.g. `defaultValue`.
fn default_prop_name(prop: &str) -> String {
    let mut chars = prop.chars();
    match chars.next() {
        Some(first) => format!("default{}{}", first.to_uppercase(), chars.as_str()),
        None => "default".to_string(),
    }
}

// =============================================================================
// Decorator
// =============================================================================

/// Binds one adapter element to a registered field.
///
/// Created by [`Form::get_field_decorator`]. The element's own props are
/// kept; the registration props win on conflict, and the element's own
/// handlers still run before the form collects the same action.
#[derive(Debug)]
pub struct FieldDecorator {
    form: Form,
    props: FieldProps,
}

impl FieldDecorator {
    /// The registration props alone.
    pub fn props(&self) -> &FieldProps {
        &self.props
    }

    /// Records `element` as the field's original props and returns the
    /// merged props.
    pub fn decorate(self, element: ElementProps) -> FieldProps {
        let name = self.props.name.clone();
        let mut notices = Notices::default();
        let (value_prop_name, value) = {
            let mut state = self.form.inner.write();
            let meta = state.store.get_field_meta(&name);

            let prop = meta.value_prop_name.clone();
            if element.values.contains_key(&prop) {
                notices.warn(UsageWarning::ValuePropOverride {
                    name: name.clone(),
                    prop: prop.clone(),
                });
            }
            let default_prop = default_prop_name(&prop);
            if element.values.contains_key(&default_prop) {
                notices.warn(UsageWarning::DefaultValueProp {
                    name: name.clone(),
                    prop: default_prop,
                });
            }

            meta.original_props = Some(element.clone());
            let meta = meta.clone();
            state.store.get_field_value_prop_value(&meta)
        };
        self.form.inner.emit(notices);

        let mut handlers: BTreeMap<String, FieldHandler> = element.handlers.into_iter().collect();
        handlers.extend(self.props.handlers);
        let mut extra = element.values;
        extra.remove(&value_prop_name);
        extra.extend(self.props.extra);

        FieldProps {
            name,
            value_prop_name,
            value,
            handlers,
            attach: self.props.attach,
            extra,
        }
    }
}

// =============================================================================
// Lifecycle
// =============================================================================

impl Form {
    /// Registers `name` (or refreshes its registration) and returns the
    /// props to bind to its element.
    ///
    /// Any cleared-field entry for `name` is discarded. Fails only when
    /// `name` is empty.
    pub fn register(&self, name: &str, options: FieldOptions) -> Result<FieldProps, FormError> {
        if name.is_empty() {
            return Err(FormError::MissingName);
        }
        let weak = Arc::downgrade(&self.inner);
        let config = &self.inner.config;
        let mut notices = Notices::default();

        let props = {
            let mut state = self.inner.write();
            state.cleared.remove(name);
            if !state.store.is_valid_nested_field_name(name) {
                notices.warn(UsageWarning::nested_name_collision(name));
            }

            let meta = state.store.get_field_meta(name).merge_options(
                options,
                &config.default_trigger,
                &config.value_prop_name,
            );
            state.store.set_field_meta(name, meta.clone());

            let triggers = meta.validate_triggers();
            let mut handlers = BTreeMap::new();
            for action in &triggers {
                let handler = bind(&mut state, &weak, name, action, BindKind::CollectValidate);
                handlers.insert(action.clone(), handler);
            }
            if !triggers.contains(&meta.trigger) {
                let handler = bind(&mut state, &weak, name, &meta.trigger, BindKind::Collect);
                handlers.insert(meta.trigger.clone(), handler);
            }
            let attach = bind_attach(&mut state, &weak, name);

            let mut extra = Map::new();
            if let Some(key) = &config.field_name_prop {
                extra.insert(key.clone(), Value::from(name));
            }
            if let Some(key) = &config.field_meta_prop {
                extra.insert(key.clone(), meta.to_json());
            }
            if let Some(key) = &config.field_data_prop {
                extra.insert(key.clone(), field_to_json(&state.store.get_field(name)));
            }

            let (value_prop_name, value) = state.store.get_field_value_prop_value(&meta);
            FieldProps {
                name: name.to_string(),
                value_prop_name,
                value,
                handlers,
                attach,
                extra,
            }
        };
        self.inner.emit(notices);
        Ok(props)
    }

    /// Registers `name` and returns a decorator for its element.
    pub fn get_field_decorator(&self, name: &str, options: FieldOptions) -> Result<FieldDecorator, FormError> {
        let props = self.register(name, options)?;
        Ok(FieldDecorator {
            form: self.clone(),
            props,
        })
    }

    /// Reports an element mounting (`Some`) or unmounting (`None`).
    ///
    /// Unmounting moves the field's state and metadata into the cleared
    /// cache and purges it from the store, unless the field is registered
    /// with `preserve`. Mounting restores a cached entry that is still
    /// within the grace window.
    pub fn attach_instance(&self, name: &str, instance: Option<FieldInstance>) {
        let Some(instance) = instance else {
            self.detach(name);
            return;
        };

        let hook = {
            let mut state = self.inner.write();
            self.recover_cleared_field(&mut state, name);
            state.instances.insert(name.to_string(), Arc::clone(&instance));
            state.store.field_meta(name).and_then(|meta| meta.on_instance.clone())
        };
        if let Some(hook) = hook {
            hook(&instance);
        }
    }

    fn detach(&self, name: &str) {
        let mut state = self.inner.write();
        let Some(meta) = state.store.field_meta(name).cloned() else {
            state.instances.remove(name);
            return;
        };
        if meta.preserve {
            state.instances.remove(name);
            return;
        }
        let field = state.store.get_field(name);
        log::debug!("caching cleared field `{}`", name);
        state.cleared.insert(
            name.to_string(),
            ClearedField {
                field,
                meta,
                cleared_at: Instant::now(),
            },
        );
        state.forget(name);
    }

    fn recover_cleared_field(&self, state: &mut FormState, name: &str) {
        let Some(cleared) = state.cleared.remove(name) else {
            return;
        };
        let expired = self
            .inner
            .config
            .cleared_field_ttl
            .is_some_and(|ttl| cleared.cleared_at.elapsed() > ttl);
        if expired {
            log::debug!("cleared field `{}` expired; not restoring", name);
            return;
        }
        log::debug!("restoring cleared field `{}`", name);
        state.store.set_field_meta(name, cleared.meta);
        state.store.set_fields(Fields::from([(name.to_string(), cleared.field)]));
    }

    /// The element currently attached to `name`.
    pub fn get_field_instance(&self, name: &str) -> Option<FieldInstance> {
        self.inner.read().instances.get(name).cloned()
    }

    /// Names with a pending cleared-field entry.
    pub fn cleared_fields(&self) -> Vec<String> {
        let mut names: Vec<String> = self.inner.read().cleared.keys().cloned().collect();
        names.sort();
        names
    }

    // -------------------------------------------------------------------------
    // Collection
    // -------------------------------------------------------------------------

    /// Collects a value for `name` from an `action` event and stores it.
    ///
    /// The field is marked touched, and dirty when it carries rules.
    pub fn collect(&self, name: &str, action: &str, event: EventData) {
        let Some((value, meta)) = self.collect_common(name, action, event) else {
            return;
        };
        let mut notices = Notices::default();
        {
            let mut state = self.inner.write();
            let field = Field {
                value,
                touched: true,
                dirty: meta.has_rules(),
                ..state.store.get_field(name)
            };
            self.inner
                .apply_fields(&mut state, Fields::from([(name.to_string(), field)]), &mut notices);
        }
        self.inner.emit(notices);
    }

    /// Collects a value for `name` and validates it with the rules bound to
    /// `action`. The run is spawned on the form's runtime.
    pub fn collect_validate(&self, name: &str, action: &str, event: EventData) {
        let Some((value, meta)) = self.collect_common(name, action, event) else {
            return;
        };
        let mut notices = Notices::default();
        let task = {
            let mut state = self.inner.write();
            let field = Field {
                value,
                touched: true,
                dirty: true,
                ..state.store.get_field(name)
            };
            let options = RunOptions {
                first: false,
                first_fields: FirstFields::from_flag(meta.validate_first),
            };
            self.inner.start_run(
                &mut state,
                vec![(name.to_string(), field)],
                None,
                Some(action),
                false,
                options,
                &mut notices,
            )
        };
        self.inner.emit(notices);
        if !task.is_ready() {
            self.inner.spawn(async move {
                task.await;
            });
        }
    }

    /// Shared part of collection: forwards the event to the field's own
    /// handler, extracts the value and reports the value change.
    ///
    /// Only the value is returned. Callers apply it to the live field under
    /// their own write lock, so a run committing in between is not undone.
    fn collect_common(
        &self,
        name: &str,
        action: &str,
        event: EventData,
    ) -> Option<(Option<Value>, FieldMeta)> {
        let Some(meta) = self.get_field_meta(name) else {
            log::debug!("ignoring `{}` for unregistered field `{}`", action, name);
            return None;
        };
        if let Some(handler) = meta.action_handler(action) {
            handler(event.clone());
        }

        let mut notices = Notices::default();
        let value = {
            let state = self.inner.read();
            let current = state.store.get_field_value(name);
            let value = match &meta.get_value_from_event {
                Some(extract) => extract(&event),
                None => event.default_value(),
            }
            .or_else(|| current.clone());
            if value != current {
                let mut changed = Value::Object(Map::new());
                let new_value = value.clone().unwrap_or(Value::Null);
                set_in(&mut changed, &FieldPath::parse(name), new_value.clone());
                notices.values_change = self.inner.values_change(&state, changed, Some((name, &new_value)));
            }
            value
        };
        self.inner.emit(notices);
        Some((value, meta))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::validation::Rule;
    use serde_json::json;
    use std::collections::HashMap;

    fn bound_actions(state: &FormState, name: &str) -> Vec<String> {
        let mut actions: Vec<String> = state
            .bound
            .get(name)
            .map(HashMap::keys)
            .into_iter()
            .flatten()
            .cloned()
            .collect();
        actions.sort();
        actions
    }

    #[test]
    fn test_default_prop_name() {
        assert_eq!(default_prop_name("value"), "defaultValue");
        assert_eq!(default_prop_name("checked"), "defaultChecked");
    }

    #[test]
    fn test_register_binds_validate_and_value_triggers() {
        let form = Form::new();
        let props = form
            .register(
                "email",
                FieldOptions::new()
                    .rules(vec![Rule::email()])
                    .validate_trigger(["onBlur"]),
            )
            .unwrap();
        let actions: Vec<&String> = props.handlers.keys().collect();
        assert_eq!(actions, vec!["onBlur", "onChange"]);

        let state = form.inner.read();
        assert_eq!(bound_actions(&state, "email"), vec!["onBlur", "onChange"]);
    }

    #[test]
    fn test_rebinding_when_kind_changes() {
        let form = Form::new();
        let plain = form.register("a", FieldOptions::new()).unwrap();
        let validated = form
            .register("a", FieldOptions::new().rules(vec![Rule::required()]))
            .unwrap();
        assert!(!Arc::ptr_eq(
            plain.handler("onChange").unwrap(),
            validated.handler("onChange").unwrap()
        ));
    }

    #[test]
    fn test_collect_on_unregistered_field_is_ignored() {
        let form = Form::new();
        form.collect("ghost", "onChange", EventData::value(json!(1)));
        assert_eq!(form.get_field_value("ghost"), None);
    }
}
