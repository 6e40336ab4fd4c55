//! Form configuration

use std::time::Duration;

use crate::validation::ValidateMessages;

/// Configuration shared by every field of a form.
///
/// # Example
///
/// ```
/// use std::time::Duration;
/// use formstate::FormConfig;
///
/// let config = FormConfig::default()
///     .with_default_trigger("onInput")
///     .with_cleared_field_ttl(Duration::from_secs(30));
/// ```
#[derive(Debug, Clone)]
pub struct FormConfig {
    /// Action that collects a value when a field has no explicit trigger.
    ///
    /// Default: `"onChange"`
    pub default_trigger: String,

    /// Prop that carries the field value when a field does not override it.
    ///
    /// Default: `"value"`
    pub value_prop_name: String,

    /// Prop key the field name is passed through under, if any.
    pub field_name_prop: Option<String>,

    /// Prop key the field's registration metadata is passed through under,
    /// if any.
    pub field_meta_prop: Option<String>,

    /// Prop key the field's live state is passed through under, if any.
    pub field_data_prop: Option<String>,

    /// Message table overriding the rule validator's own.
    pub validate_messages: Option<ValidateMessages>,

    /// How long a detached field can be restored by reattaching it.
    ///
    /// Default: `None` (for the lifetime of the form)
    pub cleared_field_ttl: Option<Duration>,
}

impl Default for FormConfig {
    fn default() -> Self {
        Self {
            default_trigger: "onChange".to_string(),
            value_prop_name: "value".to_string(),
            field_name_prop: None,
            field_meta_prop: None,
            field_data_prop: None,
            validate_messages: None,
            cleared_field_ttl: None,
        }
    }
}

impl FormConfig {
    /// Creates a config with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the default trigger action.
    pub fn with_default_trigger(mut self, trigger: impl Into<String>) -> Self {
        self.default_trigger = trigger.into();
        self
    }

    /// Sets the default value prop name.
    pub fn with_value_prop_name(mut self, name: impl Into<String>) -> Self {
        self.value_prop_name = name.into();
        self
    }

    /// Passes the field name through under `key`.
    pub fn with_field_name_prop(mut self, key: impl Into<String>) -> Self {
        self.field_name_prop = Some(key.into());
        self
    }

    /// Passes the field metadata through under `key`.
    pub fn with_field_meta_prop(mut self, key: impl Into<String>) -> Self {
        self.field_meta_prop = Some(key.into());
        self
    }

    /// Passes the live field state through under `key`.
    pub fn with_field_data_prop(mut self, key: impl Into<String>) -> Self {
        self.field_data_prop = Some(key.into());
        self
    }

    /// Sets the message table.
    pub fn with_validate_messages(mut self, messages: ValidateMessages) -> Self {
        self.validate_messages = Some(messages);
        self
    }

    /// Sets the grace window for restoring detached fields.
    pub fn with_cleared_field_ttl(mut self, ttl: Duration) -> Self {
        self.cleared_field_ttl = Some(ttl);
        self
    }
}
