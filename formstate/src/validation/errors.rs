//! Validation error records and their nested aggregation.

use std::collections::BTreeMap;

use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;

use crate::path::FieldPath;

/// A single rule failure reported by the rule validator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationError {
    /// Full dotted name of the failing field.
    pub field: String,
    /// Human-readable message.
    pub message: String,
}

impl ValidationError {
    /// Creates a new validation error.
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Errors collected for one field.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldErrors {
    pub errors: Vec<ValidationError>,
    /// Set when the field changed while its validation was in flight. The
    /// errors then hold a single "need to revalidate" record rather than a
    /// rule failure.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub expired: bool,
}

impl FieldErrors {
    /// Creates a record from rule failures.
    pub fn new(errors: Vec<ValidationError>) -> Self {
        Self {
            errors,
            expired: false,
        }
    }

    /// Creates the synthetic record for a field whose result expired.
    pub fn expired(name: &str) -> Self {
        Self {
            errors: vec![ValidationError::new(
                name,
                format!("{} need to revalidate", name),
            )],
            expired: true,
        }
    }

    /// Returns the messages only.
    pub fn messages(&self) -> Vec<String> {
        self.errors.iter().map(|e| e.message.clone()).collect()
    }
}

/// A node of an [`ErrorTree`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum ErrorNode {
    /// Errors for a registered field.
    Leaf(FieldErrors),
    /// Intermediate path segment.
    Branch(BTreeMap<String, ErrorNode>),
}

/// Errors of a validation run keyed by nested path.
///
/// Dotted names are expanded into nested branches, so errors for `a.b` and
/// `a.c` serialize as `{"a": {"b": {"errors": [..]}, "c": {"errors": [..]}}}`.
/// Array indices become string keys (`"0"`).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct ErrorTree {
    root: BTreeMap<String, ErrorNode>,
}

impl ErrorTree {
    /// Creates an empty tree.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `true` if the tree holds no errors.
    pub fn is_empty(&self) -> bool {
        self.root.is_empty()
    }

    /// Replaces the errors recorded for `name`.
    pub fn insert(&mut self, name: &str, errors: FieldErrors) {
        *self.leaf_mut(name) = errors;
    }

    /// Appends one error to the record for `name`, creating it if needed.
    pub fn push(&mut self, name: &str, error: ValidationError) {
        self.leaf_mut(name).errors.push(error);
    }

    /// Returns the errors recorded for the full name `name`.
    pub fn get(&self, name: &str) -> Option<&FieldErrors> {
        match self.node(name)? {
            ErrorNode::Leaf(errors) => Some(errors),
            ErrorNode::Branch(_) => None,
        }
    }

    /// Returns the node at `name`, leaf or branch.
    pub fn node(&self, name: &str) -> Option<&ErrorNode> {
        let path = FieldPath::parse(name);
        let (first, rest) = path.segments().split_first()?;
        let mut node = self.root.get(&first.to_string())?;
        for segment in rest {
            match node {
                ErrorNode::Branch(children) => node = children.get(&segment.to_string())?,
                ErrorNode::Leaf(_) => return None,
            }
        }
        Some(node)
    }

    /// Returns `true` if any leaf under `name` is recorded.
    pub fn contains(&self, name: &str) -> bool {
        self.node(name).is_some()
    }

    /// Returns all leaves with their dotted names.
    pub fn leaves(&self) -> Vec<(String, &FieldErrors)> {
        let mut out = Vec::new();
        for (key, node) in &self.root {
            collect_leaves(key.clone(), node, &mut out);
        }
        out
    }

    /// Returns the names whose results expired.
    pub fn expired_fields(&self) -> Vec<String> {
        self.leaves()
            .into_iter()
            .filter(|(_, errors)| errors.expired)
            .map(|(name, _)| name)
            .collect()
    }

    /// Serializes the tree into nested JSON.
    pub fn to_json(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }

    /// Walks to the leaf for `name`, replacing anything in the way.
    fn leaf_mut(&mut self, name: &str) -> &mut FieldErrors {
        let mut keys: Vec<String> = FieldPath::parse(name)
            .segments()
            .iter()
            .map(ToString::to_string)
            .collect();
        let last = keys.pop().unwrap_or_default();

        let mut children = &mut self.root;
        for key in &keys {
            let node = children
                .entry(key.clone())
                .or_insert_with(|| ErrorNode::Branch(BTreeMap::new()));
            if let ErrorNode::Leaf(_) = node {
                *node = ErrorNode::Branch(BTreeMap::new());
            }
            children = match node {
                ErrorNode::Branch(children) => children,
                ErrorNode::Leaf(_) => unreachable!("leaf was just replaced with a branch"),
            };
        }

        let node = children
            .entry(last)
            .or_insert_with(|| ErrorNode::Leaf(FieldErrors::default()));
        if let ErrorNode::Branch(_) = node {
            *node = ErrorNode::Leaf(FieldErrors::default());
        }
        match node {
            ErrorNode::Leaf(errors) => errors,
            ErrorNode::Branch(_) => unreachable!("branch was just replaced with a leaf"),
        }
    }
}

fn collect_leaves<'a>(name: String, node: &'a ErrorNode, out: &mut Vec<(String, &'a FieldErrors)>) {
    match node {
        ErrorNode::Leaf(errors) => out.push((name, errors)),
        ErrorNode::Branch(children) => {
            for (key, child) in children {
                collect_leaves(format!("{}.{}", name, key), child, out);
            }
        }
    }
}
