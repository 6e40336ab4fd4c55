//! Usage error types.
//!
//! Hard failures are returned as [`FormError`]. Recoverable misuse is
//! reported as a [`UsageWarning`]: logged through `log::warn!` and handed to
//! the form's warning hook, while the call itself degrades gracefully.
//! Rule failures are not errors at all; see [`crate::validation`].

/// Errors that abort the call that caused them.
#[derive(Debug, thiserror::Error)]
pub enum FormError {
    /// A field was registered without a name.
    #[error("Must register a field with a non-empty name")]
    MissingName,

    /// A pattern rule was built from an invalid regular expression.
    #[error("Invalid pattern: {0}")]
    InvalidPattern(#[from] regex::Error),
}

/// Non-fatal misuse of the form API.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum UsageWarning {
    /// A registered name is a dotted prefix of another registered name.
    #[error("Field `{name}` collides with another field: one field name cannot be part of another, e.g. `a` and `a.b`")]
    NestedNameCollision { name: String },

    /// Values were set for a name that has not been registered.
    #[error("Cannot set `{name}` before registering it")]
    UnregisteredField { name: String },

    /// The element handed to a decorator already sets the value prop.
    #[error("Decorator for `{name}` will override `{prop}`; set it through `set_fields_value` instead")]
    ValuePropOverride { name: String, prop: String },

    /// The element handed to a decorator sets the `default*` value prop.
    #[error("`{prop}` is ignored for `{name}`; use the `initial_value` option instead")]
    DefaultValueProp { name: String, prop: String },
}

impl UsageWarning {
    /// Creates a nested name collision warning.
    pub fn nested_name_collision(name: impl Into<String>) -> Self {
        Self::NestedNameCollision { name: name.into() }
    }

    /// Creates an unregistered field warning.
    pub fn unregistered_field(name: impl Into<String>) -> Self {
        Self::UnregisteredField { name: name.into() }
    }

    /// Returns the field name the warning is about.
    pub fn field_name(&self) -> &str {
        match self {
            Self::NestedNameCollision { name }
            | Self::UnregisteredField { name }
            | Self::ValuePropOverride { name, .. }
            | Self::DefaultValueProp { name, .. } => name,
        }
    }
}
