//! Adapter-facing props returned by registration.

use std::collections::BTreeMap;
use std::fmt;

use serde_json::Map;
use serde_json::Value;

use crate::handler::AttachHandler;
use crate::handler::EventData;
use crate::handler::FieldHandler;
use crate::handler::FieldInstance;

/// Everything an adapter needs to bind one element to a field.
///
/// Handlers are memoized per `(name, action)`: registering the same field
/// again returns the same `Arc`s, so adapters can compare them with
/// [`Arc::ptr_eq`](std::sync::Arc::ptr_eq) to skip rebinding.
#[derive(Clone)]
pub struct FieldProps {
    /// Field name.
    pub name: String,
    /// Prop the value is bound to.
    pub value_prop_name: String,
    /// Current value, falling back to the initial value.
    pub value: Option<Value>,
    /// Bound handlers keyed by action.
    pub handlers: BTreeMap<String, FieldHandler>,
    /// Attach/detach callback for the element instance.
    pub attach: AttachHandler,
    /// Pass-through props (name, meta and data keys, and the element's own
    /// plain props after decoration).
    pub extra: Map<String, Value>,
}

impl FieldProps {
    /// Returns the handler bound to `action`.
    pub fn handler(&self, action: &str) -> Option<&FieldHandler> {
        self.handlers.get(action)
    }

    /// Invokes the handler bound to `action`. Returns `false` if none is.
    pub fn fire(&self, action: &str, event: EventData) -> bool {
        match self.handlers.get(action) {
            Some(handler) => {
                handler(event);
                true
            }
            None => false,
        }
    }

    /// Reports the element as mounted.
    pub fn mount(&self, instance: FieldInstance) {
        (self.attach)(Some(instance));
    }

    /// Reports the element as unmounted.
    pub fn unmount(&self) {
        (self.attach)(None);
    }

    /// Plain props as one map: the extras plus `{value_prop_name: value}`.
    pub fn to_map(&self) -> Map<String, Value> {
        let mut map = self.extra.clone();
        if let Some(value) = &self.value {
            map.insert(self.value_prop_name.clone(), value.clone());
        }
        map
    }
}

impl fmt::Debug for FieldProps {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FieldProps")
            .field("name", &self.name)
            .field("value_prop_name", &self.value_prop_name)
            .field("value", &self.value)
            .field("handlers", &self.handlers.keys().collect::<Vec<_>>())
            .field("extra", &self.extra)
            .finish()
    }
}
