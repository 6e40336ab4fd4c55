//! Adapter-facing handler types.
//!
//! The UI adapter delivers user interaction to the form by calling the
//! handlers it received from registration. Each handler takes an
//! [`EventData`] describing what happened.

use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use serde_json::Map;
use serde_json::Value;

// =============================================================================
// Handler Types
// =============================================================================

/// A trigger handler bound to one `(field, action)` pair.
///
/// Handlers returned from registration are memoized, so repeated
/// registration of an unchanged pair yields the same `Arc` (compare with
/// [`Arc::ptr_eq`]).
pub type FieldHandler = Arc<dyn Fn(EventData) + Send + Sync>;

/// Map of action names to handlers.
///
/// Standard action names:
/// - `"onChange"` - value changed (the default trigger)
/// - `"onBlur"` - element lost focus
/// - `"onSubmit"` - enter pressed / form submitted
pub type WidgetHandlers = HashMap<String, FieldHandler>;

/// An opaque handle to a mounted UI element.
pub type FieldInstance = Arc<dyn Any + Send + Sync>;

/// Handler the adapter calls when an element mounts (`Some`) or unmounts
/// (`None`).
pub type AttachHandler = Arc<dyn Fn(Option<FieldInstance>) + Send + Sync>;

/// Extracts a field value from an event. `None` keeps the current value.
pub type ValueExtractor = Arc<dyn Fn(&EventData) -> Option<Value> + Send + Sync>;

// =============================================================================
// Event Data
// =============================================================================

/// Event-specific data passed to handlers.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum EventData {
    /// No event data.
    #[default]
    None,
    /// A raw value supplied directly by the adapter.
    Value(Value),
    /// Text input changed.
    Change {
        /// The new text value.
        text: String,
    },
    /// Checkbox or switch toggled.
    Toggle {
        /// The new checked state.
        checked: bool,
    },
    /// Element lost focus.
    Blur,
}

impl EventData {
    /// Creates a text change event.
    pub fn change(text: impl Into<String>) -> Self {
        Self::Change { text: text.into() }
    }

    /// Creates a raw value event.
    pub fn value(value: impl Into<Value>) -> Self {
        Self::Value(value.into())
    }

    /// Default value extraction: toggles yield their checked state, changes
    /// their text, raw events their value. Blur and empty events carry no
    /// value.
    pub fn default_value(&self) -> Option<Value> {
        match self {
            Self::Value(value) => Some(value.clone()),
            Self::Change { text } => Some(Value::String(text.clone())),
            Self::Toggle { checked } => Some(Value::Bool(*checked)),
            Self::None | Self::Blur => None,
        }
    }
}

// =============================================================================
// Element Props
// =============================================================================

/// Props an adapter element carried before it was decorated.
///
/// Handlers in here are forwarded to whenever the form collects the same
/// action and the field options did not supply their own handler.
#[derive(Clone, Default)]
pub struct ElementProps {
    /// Plain props.
    pub values: Map<String, Value>,
    /// Event props.
    pub handlers: WidgetHandlers,
}

impl ElementProps {
    /// Creates empty props.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a plain prop.
    pub fn with_value(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.values.insert(key.into(), value.into());
        self
    }

    /// Adds an event prop.
    pub fn with_handler<F>(mut self, action: impl Into<String>, handler: F) -> Self
    where
        F: Fn(EventData) + Send + Sync + 'static,
    {
        self.handlers.insert(action.into(), Arc::new(handler));
        self
    }
}

impl fmt::Debug for ElementProps {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut actions: Vec<&String> = self.handlers.keys().collect();
        actions.sort();
        f.debug_struct("ElementProps")
            .field("values", &self.values)
            .field("handlers", &actions)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_default_value_extraction() {
        assert_eq!(EventData::change("abc").default_value(), Some(json!("abc")));
        assert_eq!(
            EventData::Toggle { checked: true }.default_value(),
            Some(json!(true))
        );
        assert_eq!(EventData::value(json!([1, 2])).default_value(), Some(json!([1, 2])));
        assert_eq!(EventData::Blur.default_value(), None);
        assert_eq!(EventData::None.default_value(), None);
    }
}
