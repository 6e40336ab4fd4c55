//! Field validation.
//!
//! Rules are attached to fields at registration and evaluated in batches by a
//! [`RuleValidator`]. The coordinator decides which fields enter a run and
//! reconciles the results against the live store.
//!
//! # Example
//!
//! ```
//! use formstate::validation::{BuiltinValidator, Rule, RuleValidator, ValidationRequest};
//! use serde_json::json;
//!
//! let mut request = ValidationRequest::default();
//! request.rules.insert("email".into(), vec![Rule::required(), Rule::email()]);
//! request.values.insert("email".into(), Some(json!("not-an-email")));
//!
//! let errors = futures::executor::block_on(BuiltinValidator::new().validate(request));
//! assert_eq!(errors[0].message, "email is not a valid email");
//! ```

mod builtin;
mod coordinator;
mod errors;
mod messages;
mod rule;
mod validator;

pub use builtin::BuiltinValidator;
pub use coordinator::{Prepared, Reconciliation, ValidationOutcome, ValidationRun, ValidationTask};
pub use coordinator::run_options;
pub use errors::{ErrorNode, ErrorTree, FieldErrors, ValidationError};
pub use messages::{ValidateMessages, fill};
pub use rule::{AsyncCheck, Rule, RuleKind, SyncCheck};
pub use validator::{FirstFields, RuleValidator, RunOptions, ValidateOptions, ValidationRequest};
