//! Form state engine
//!
//! Tracks the value, validation status and metadata of a dynamically
//! registered set of named fields (nested through dotted names such as
//! `address.city`), runs asynchronous validation rules against them and
//! reconciles results that arrive after the user has moved on.
//!
//! UI bindings talk to a [`Form`]: they [`register`](Form::register) fields,
//! bind the returned handlers to their elements and report element mounts
//! through the attach handler.

pub mod error;
pub mod field;
pub mod form;
pub mod handler;
pub mod path;
pub mod store;
pub mod validation;

pub use error::{FormError, UsageWarning};
pub use field::{Field, FieldMeta, FieldOptions, Fields, ValidateRule};
pub use form::{FieldDecorator, FieldProps, FieldsChange, Form, FormBuilder, FormConfig};
pub use handler::{ElementProps, EventData, FieldInstance};
pub use store::FieldsStore;

pub mod prelude {
    pub use crate::error::{FormError, UsageWarning};
    pub use crate::field::{Field, FieldOptions, Fields, ValidateRule};
    pub use crate::form::{FieldProps, Form, FormConfig};
    pub use crate::handler::{ElementProps, EventData, FieldInstance};
    pub use crate::path::FieldPath;
    pub use crate::validation::{
        BuiltinValidator, ErrorTree, FieldErrors, FirstFields, Rule, RuleValidator,
        ValidateOptions, ValidationError, ValidationOutcome, ValidationRequest,
    };
}
