//! The fields store: live field state plus registration metadata.
//!
//! `FieldsStore` is plain data. It performs no I/O, spawns nothing and calls
//! no hooks other than field normalizers; the [`Form`](crate::Form) handle
//! owns it behind a lock and layers lifecycle and validation on top.

use std::collections::BTreeMap;

use serde_json::Map;
use serde_json::Value;

use crate::field::Field;
use crate::field::FieldMeta;
use crate::field::Fields;
use crate::path::FieldPath;
use crate::path::Flattened;
use crate::path::flatten;
use crate::path::is_part_of;
use crate::path::set_in;

/// Field state and metadata keyed by dotted name.
#[derive(Debug, Clone, Default)]
pub struct FieldsStore {
    fields: Fields,
    fields_meta: BTreeMap<String, FieldMeta>,
}

impl FieldsStore {
    /// Creates a store seeded with externally supplied field state.
    pub fn new<I>(fields: I) -> Self
    where
        I: IntoIterator<Item = (String, Field)>,
    {
        Self {
            fields: fields.into_iter().collect(),
            fields_meta: BTreeMap::new(),
        }
    }

    /// Replaces all live field state. Metadata is kept.
    pub fn update_fields<I>(&mut self, fields: I)
    where
        I: IntoIterator<Item = (String, Field)>,
    {
        self.fields = fields.into_iter().collect();
    }

    // =========================================================================
    // Metadata
    // =========================================================================

    /// Returns the metadata for `name`, creating an empty record on first
    /// access.
    pub fn get_field_meta(&mut self, name: &str) -> &mut FieldMeta {
        self.fields_meta
            .entry(name.to_string())
            .or_insert_with(|| FieldMeta::new(name))
    }

    /// Returns the metadata for `name` without creating it.
    pub fn field_meta(&self, name: &str) -> Option<&FieldMeta> {
        self.fields_meta.get(name)
    }

    /// Overwrites the metadata for `name`.
    pub fn set_field_meta(&mut self, name: &str, meta: FieldMeta) {
        self.fields_meta.insert(name.to_string(), meta);
    }

    /// Returns `true` if `name` has metadata.
    pub fn is_registered(&self, name: &str) -> bool {
        self.fields_meta.contains_key(name)
    }

    /// All registered names.
    pub fn get_all_fields_name(&self) -> Vec<String> {
        self.fields_meta.keys().cloned().collect()
    }

    /// Registered names that are not hidden.
    pub fn get_valid_fields_name(&self) -> Vec<String> {
        self.fields_meta
            .iter()
            .filter(|(_, meta)| !meta.hidden)
            .map(|(name, _)| name.clone())
            .collect()
    }

    /// Expands partial names to the full valid names they cover.
    ///
    /// `address` expands to `address.city` and `address.zip`; a full name
    /// expands to itself.
    pub fn get_valid_fields_full_name<S: AsRef<str>>(&self, partials: &[S]) -> Vec<String> {
        self.get_valid_fields_name()
            .into_iter()
            .filter(|full| {
                partials.iter().any(|partial| {
                    let partial = partial.as_ref();
                    full == partial || is_part_of(partial, full)
                })
            })
            .collect()
    }

    /// Returns `true` if registering `name` keeps the registered names
    /// prefix-free.
    pub fn is_valid_nested_field_name(&self, name: &str) -> bool {
        self.fields_meta
            .keys()
            .all(|n| !is_part_of(n, name) && !is_part_of(name, n))
    }

    /// Updates the initial value of registered fields from a nested or flat
    /// value. Returns the paths that matched no registered field.
    pub fn set_fields_initial_value(&mut self, values: &Value) -> Vec<String> {
        let flattened = self.flatten_registered_fields(values);
        for (name, value) in flattened.leaves {
            if let Some(meta) = self.fields_meta.get_mut(&name) {
                meta.initial_value = Some(value);
            }
        }
        flattened.stray
    }

    // =========================================================================
    // Field State
    // =========================================================================

    /// Returns a copy of the field state (default state when absent).
    pub fn get_field(&self, name: &str) -> Field {
        self.fields.get(name).cloned().unwrap_or_default()
    }

    /// Returns the live field state without defaulting.
    pub fn field(&self, name: &str) -> Option<&Field> {
        self.fields.get(name)
    }

    /// Merges per-name updates. Each given field replaces the stored one;
    /// other names are untouched. Normalizers run on the merged values.
    ///
    /// Does not create metadata.
    pub fn set_fields(&mut self, fields: Fields) {
        if fields.is_empty() {
            return;
        }
        log::trace!("set_fields: {:?}", fields.keys().collect::<Vec<_>>());

        let previous: Vec<(String, Option<Value>)> = self
            .fields_meta
            .iter()
            .filter(|(_, meta)| meta.normalize.is_some())
            .map(|(name, _)| (name.clone(), self.value_from_fields(name)))
            .collect();

        self.fields.extend(fields);

        if previous.is_empty() {
            return;
        }

        let now_values = self.get_all_values();
        for (name, prev) in previous {
            let Some(normalize) = self.fields_meta.get(&name).and_then(|m| m.normalize.clone())
            else {
                continue;
            };
            let value = self.value_from_fields(&name);
            let normalized = normalize(value.as_ref(), prev.as_ref(), &now_values);
            if normalized != value {
                self.fields.entry(name).or_default().value = normalized;
            }
        }
    }

    /// Computes the reset payload for `names` (all registered names when
    /// `None`). Nothing is committed; apply it with [`set_fields`].
    ///
    /// [`set_fields`]: FieldsStore::set_fields
    pub fn reset_fields<S: AsRef<str>>(&self, names: Option<&[S]>) -> Fields {
        let names = match names {
            Some(names) => self.get_valid_fields_full_name(names),
            None => self.get_all_fields_name(),
        };
        names
            .into_iter()
            .filter_map(|name| {
                let meta = self.fields_meta.get(&name)?;
                let field = Field::from_value(meta.initial_value.clone());
                Some((name, field))
            })
            .collect()
    }

    /// Removes both the live state and the metadata of `name`.
    pub fn clear_field(&mut self, name: &str) {
        self.fields.remove(name);
        self.fields_meta.remove(name);
    }

    /// Keeps only the entries of a nested or flat value whose dotted path is
    /// a registered name.
    pub fn flatten_registered_fields(&self, values: &Value) -> Flattened {
        flatten(values, |path, _| self.fields_meta.contains_key(path))
    }

    // =========================================================================
    // Values
    // =========================================================================

    /// Stored value, falling back to the initial value.
    fn value_from_fields(&self, name: &str) -> Option<Value> {
        match self.fields.get(name).and_then(|f| f.value.clone()) {
            Some(value) => Some(value),
            None => self.fields_meta.get(name)?.initial_value.clone(),
        }
    }

    /// Flat map of every registered field's value (unset fields skipped).
    pub fn get_all_values(&self) -> Map<String, Value> {
        self.fields_meta
            .keys()
            .filter_map(|name| Some((name.clone(), self.value_from_fields(name)?)))
            .collect()
    }

    /// Value of `name`, falling back to its initial value.
    ///
    /// A partial name such as `address` returns the nested structure of all
    /// the fields below it.
    pub fn get_field_value(&self, name: &str) -> Option<Value> {
        self.get_nested_field(name, |full| self.value_from_fields(full))
    }

    /// Nested values of `names` (all valid fields when `None`). Unset fields
    /// are skipped.
    pub fn get_fields_value<S: AsRef<str>>(&self, names: Option<&[S]>) -> Value {
        self.get_nested_fields(names, |name| self.get_field_value(name))
    }

    /// Error messages of the full name `name`.
    pub fn get_field_error(&self, name: &str) -> Option<Vec<String>> {
        let errors = self.fields.get(name)?.errors.as_ref()?;
        Some(errors.iter().map(|e| e.message.clone()).collect())
    }

    /// Nested error messages of `names` (all valid fields when `None`).
    pub fn get_fields_error<S: AsRef<str>>(&self, names: Option<&[S]>) -> Value {
        self.get_nested_fields(names, |name| {
            self.get_nested_field(name, |full| {
                self.get_field_error(full).map(Value::from)
            })
        })
    }

    /// `{value_prop_name: value}` pair handed to the adapter.
    pub fn get_field_value_prop_value(&self, meta: &FieldMeta) -> (String, Option<Value>) {
        let value = self
            .fields
            .get(&meta.name)
            .and_then(|f| f.value.clone())
            .or_else(|| meta.initial_value.clone());
        (meta.value_prop_name.clone(), value)
    }

    // =========================================================================
    // Flags
    // =========================================================================

    /// Returns `true` if a validation run for `name` is in flight.
    pub fn is_field_validating(&self, name: &str) -> bool {
        self.fields.get(name).is_some_and(|f| f.validating)
    }

    /// Returns `true` if any of `names` (all valid fields when `None`) is
    /// validating.
    pub fn is_fields_validating<S: AsRef<str>>(&self, names: Option<&[S]>) -> bool {
        self.names_or_valid(names)
            .iter()
            .any(|name| self.is_field_validating(name))
    }

    /// Returns `true` if the user has interacted with `name`.
    pub fn is_field_touched(&self, name: &str) -> bool {
        self.fields.get(name).is_some_and(|f| f.touched)
    }

    /// Returns `true` if any of `names` (all valid fields when `None`) is
    /// touched.
    pub fn is_fields_touched<S: AsRef<str>>(&self, names: Option<&[S]>) -> bool {
        self.names_or_valid(names)
            .iter()
            .any(|name| self.is_field_touched(name))
    }

    /// Nested view of every valid field's state.
    pub fn get_nested_all_fields(&self) -> Value {
        let mut acc = Value::Object(Map::new());
        for (name, field) in self.get_all_fields() {
            set_in(&mut acc, &FieldPath::parse(&name), field_to_json(&field));
        }
        acc
    }

    /// Copies of every valid field's state.
    pub fn get_all_fields(&self) -> Fields {
        self.get_valid_fields_name()
            .into_iter()
            .map(|name| {
                let field = self.get_field(&name);
                (name, field)
            })
            .collect()
    }

    // =========================================================================
    // Nesting
    // =========================================================================

    fn names_or_valid<S: AsRef<str>>(&self, names: Option<&[S]>) -> Vec<String> {
        match names {
            Some(names) => names.iter().map(|n| n.as_ref().to_string()).collect(),
            None => self.get_valid_fields_name(),
        }
    }

    fn get_nested_fields<S, F>(&self, names: Option<&[S]>, getter: F) -> Value
    where
        S: AsRef<str>,
        F: Fn(&str) -> Option<Value>,
    {
        let mut acc = Value::Object(Map::new());
        for name in self.names_or_valid(names) {
            if let Some(value) = getter(&name) {
                set_in(&mut acc, &FieldPath::parse(&name), value);
            }
        }
        acc
    }

    fn get_nested_field<F>(&self, name: &str, getter: F) -> Option<Value>
    where
        F: Fn(&str) -> Option<Value>,
    {
        let full_names = self.get_valid_fields_full_name(&[name]);
        // A registered name is read as a leaf even when colliding names nest
        // below it.
        if full_names.is_empty() || full_names.iter().any(|full| full == name) {
            return getter(name);
        }

        let is_array = full_names[0].as_bytes().get(name.len()) == Some(&b'[');
        let suffix_start = if is_array { name.len() } else { name.len() + 1 };
        let mut acc = if is_array {
            Value::Array(Vec::new())
        } else {
            Value::Object(Map::new())
        };
        for full_name in &full_names {
            let Some(suffix) = full_name.get(suffix_start..) else {
                continue;
            };
            if let Some(value) = getter(full_name) {
                set_in(&mut acc, &FieldPath::parse(suffix), value);
            }
        }
        Some(acc)
    }
}

/// JSON form of a field state, as handed to change hooks.
pub fn field_to_json(field: &Field) -> Value {
    serde_json::to_value(field).unwrap_or(Value::Null)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn store_with(names: &[&str]) -> FieldsStore {
        let mut store = FieldsStore::default();
        for name in names {
            store.get_field_meta(name);
        }
        store
    }

    #[test]
    fn test_get_field_meta_is_idempotent() {
        let mut store = FieldsStore::default();
        store.get_field_meta("a").initial_value = Some(json!(1));
        assert_eq!(store.get_field_meta("a").initial_value, Some(json!(1)));
        assert_eq!(store.get_all_fields_name(), vec!["a".to_string()]);
    }

    #[test]
    fn test_value_falls_back_to_initial() {
        let mut store = store_with(&["a"]);
        store.get_field_meta("a").initial_value = Some(json!("init"));
        assert_eq!(store.get_field_value("a"), Some(json!("init")));

        store.set_fields(Fields::from([("a".to_string(), Field::with_value("set"))]));
        assert_eq!(store.get_field_value("a"), Some(json!("set")));
        assert_eq!(store.get_field_value("missing"), None);
    }

    #[test]
    fn test_partial_name_returns_nested_value() {
        let mut store = store_with(&["user.name", "user.age", "tags[0]", "tags[1]"]);
        store.set_fields(Fields::from([
            ("user.name".to_string(), Field::with_value("ann")),
            ("user.age".to_string(), Field::with_value(30)),
            ("tags[0]".to_string(), Field::with_value("x")),
            ("tags[1]".to_string(), Field::with_value("y")),
        ]));
        assert_eq!(
            store.get_field_value("user"),
            Some(json!({"name": "ann", "age": 30}))
        );
        assert_eq!(store.get_field_value("tags"), Some(json!(["x", "y"])));
    }

    #[test]
    fn test_hidden_fields_excluded_from_valid_names() {
        let mut store = store_with(&["a", "b"]);
        store.get_field_meta("b").hidden = true;
        assert_eq!(store.get_valid_fields_name(), vec!["a".to_string()]);
        assert_eq!(store.get_all_fields_name().len(), 2);
    }

    #[test]
    fn test_normalize_runs_on_set() {
        let mut store = store_with(&["code"]);
        store.get_field_meta("code").normalize = Some(std::sync::Arc::new(
            |value: Option<&Value>, _: Option<&Value>, _: &Map<String, Value>| {
                value
                    .and_then(Value::as_str)
                    .map(|s| Value::from(s.to_uppercase()))
            },
        ));
        store.set_fields(Fields::from([("code".to_string(), Field::with_value("ab"))]));
        assert_eq!(store.get_field_value("code"), Some(json!("AB")));
    }

    #[test]
    fn test_set_fields_initial_value_ignores_unregistered() {
        let mut store = store_with(&["a.b"]);
        let stray = store.set_fields_initial_value(&json!({"a": {"b": 1}, "z": 2}));
        assert_eq!(stray, vec!["z".to_string()]);
        assert_eq!(store.get_field_value("a.b"), Some(json!(1)));
    }

    #[test]
    fn test_fields_error_nested() {
        let mut store = store_with(&["a.b", "a.c"]);
        let mut field = Field::with_value(1);
        field.errors = Some(vec![crate::validation::ValidationError::new("a.b", "bad")]);
        store.set_fields(Fields::from([("a.b".to_string(), field)]));
        assert_eq!(store.get_fields_error::<&str>(None), json!({"a": {"b": ["bad"]}}));
        assert_eq!(store.get_field_error("a.b"), Some(vec!["bad".to_string()]));
        assert_eq!(store.get_field_error("a.c"), None);
    }
}
