//! Dotted field names and the nested values they address.
//!
//! Field names such as `address.city` or `tags[0].label` are the external
//! addressing scheme. Internally they are parsed once into a [`FieldPath`]
//! (a list of [`Segment`]s) and used to read and build nested
//! `serde_json::Value` structures.

use std::fmt;

use serde_json::Map;
use serde_json::Value;

/// Largest bracketed number parsed as an array index. Larger numbers are
/// kept as object keys so that building a nested value never pads an array
/// past this length.
pub const MAX_INDEX: usize = 9_999;

/// One step of a field path.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Segment {
    /// Object key (`a` in `a.b`).
    Key(String),
    /// Array index (`0` in `a[0]`).
    Index(usize),
}

impl fmt::Display for Segment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Segment::Key(key) => write!(f, "{}", key),
            Segment::Index(index) => write!(f, "{}", index),
        }
    }
}

/// A parsed field name.
///
/// # Example
///
/// ```
/// use formstate::path::{FieldPath, Segment};
///
/// let path = FieldPath::parse("users[1].name");
/// assert_eq!(
///     path.segments(),
///     &[
///         Segment::Key("users".into()),
///         Segment::Index(1),
///         Segment::Key("name".into()),
///     ]
/// );
/// assert_eq!(path.to_string(), "users[1].name");
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct FieldPath {
    segments: Vec<Segment>,
}

impl FieldPath {
    /// Parses a dotted name. Bracketed numbers up to [`MAX_INDEX`] become
    /// indices, any other bracketed text becomes a key.
    pub fn parse(name: &str) -> Self {
        let mut segments = Vec::new();
        if name.is_empty() {
            return Self { segments };
        }

        for part in name.split('.') {
            let Some(open) = part.find('[') else {
                segments.push(Segment::Key(part.to_string()));
                continue;
            };

            if open > 0 {
                segments.push(Segment::Key(part[..open].to_string()));
            }

            let mut rest = &part[open..];
            while let Some(stripped) = rest.strip_prefix('[') {
                let Some(close) = stripped.find(']') else {
                    // Unbalanced bracket: keep the remainder verbatim.
                    segments.push(Segment::Key(rest.to_string()));
                    break;
                };
                let inner = &stripped[..close];
                match inner.parse::<usize>() {
                    Ok(index) if index <= MAX_INDEX => segments.push(Segment::Index(index)),
                    _ => segments.push(Segment::Key(
                        inner.trim_matches(|c| c == '"' || c == '\'').to_string(),
                    )),
                }
                rest = &stripped[close + 1..];
            }
        }

        Self { segments }
    }

    /// Returns the parsed segments.
    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    /// Returns `true` if the path has no segments.
    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    /// Number of segments.
    pub fn len(&self) -> usize {
        self.segments.len()
    }
}

impl fmt::Display for FieldPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, segment) in self.segments.iter().enumerate() {
            match segment {
                Segment::Key(key) if i == 0 => write!(f, "{}", key)?,
                Segment::Key(key) => write!(f, ".{}", key)?,
                Segment::Index(index) => write!(f, "[{}]", index)?,
            }
        }
        Ok(())
    }
}

impl From<&str> for FieldPath {
    fn from(name: &str) -> Self {
        Self::parse(name)
    }
}

/// Returns `true` if `prefix` names an ancestor of `name`.
///
/// `a` is part of `a.b` and `a[0]`, but not of `ab` or of `a` itself.
pub fn is_part_of(prefix: &str, name: &str) -> bool {
    name.len() > prefix.len()
        && name.starts_with(prefix)
        && matches!(name.as_bytes()[prefix.len()], b'.' | b'[')
}

/// Reads the value at `path`.
pub fn get_in<'a>(root: &'a Value, path: &FieldPath) -> Option<&'a Value> {
    path.segments()
        .iter()
        .try_fold(root, |current, segment| match segment {
            Segment::Key(key) => current.as_object()?.get(key),
            Segment::Index(index) => current.as_array()?.get(*index),
        })
}

/// Writes `value` at `path`, creating intermediate objects and arrays.
///
/// Any non-container value found along the way is replaced. Arrays are
/// padded with `null` up to the requested index.
pub fn set_in(root: &mut Value, path: &FieldPath, value: Value) {
    let mut current = root;
    for segment in path.segments() {
        current = child_mut(current, segment);
    }
    *current = value;
}

fn child_mut<'a>(current: &'a mut Value, segment: &Segment) -> &'a mut Value {
    match segment {
        Segment::Key(key) => {
            if !current.is_object() {
                *current = Value::Object(Map::new());
            }
            match current {
                Value::Object(map) => map.entry(key.clone()).or_insert(Value::Null),
                _ => unreachable!("container was just replaced with an object"),
            }
        }
        Segment::Index(index) => {
            if !current.is_array() {
                *current = Value::Array(Vec::new());
            }
            match current {
                Value::Array(items) => {
                    if items.len() <= *index {
                        items.resize(*index + 1, Value::Null);
                    }
                    &mut items[*index]
                }
                _ => unreachable!("container was just replaced with an array"),
            }
        }
    }
}

/// Builds a nested value from `(dotted name, value)` pairs.
pub fn unflatten<'a, I>(entries: I) -> Value
where
    I: IntoIterator<Item = (&'a str, Value)>,
{
    let mut root = Value::Object(Map::new());
    for (name, value) in entries {
        set_in(&mut root, &FieldPath::parse(name), value);
    }
    root
}

/// Result of [`flatten`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Flattened {
    /// Leaves accepted by the predicate, keyed by dotted name.
    pub leaves: Vec<(String, Value)>,
    /// Scalar paths that reached no accepted leaf.
    pub stray: Vec<String>,
}

/// Walks `tree` and collects every sub-value whose dotted path satisfies
/// `is_leaf`. Descent stops at accepted leaves. `null` subtrees are skipped.
///
/// Keys that already contain dots (`{"a.b": 1}`) are joined as-is, so flat
/// and nested inputs address the same names.
pub fn flatten<F>(tree: &Value, is_leaf: F) -> Flattened
where
    F: Fn(&str, &Value) -> bool,
{
    let mut out = Flattened::default();
    traverse("", tree, &is_leaf, &mut out);
    out
}

fn traverse<F>(path: &str, tree: &Value, is_leaf: &F, out: &mut Flattened)
where
    F: Fn(&str, &Value) -> bool,
{
    if !path.is_empty() && is_leaf(path, tree) {
        out.leaves.push((path.to_string(), tree.clone()));
        return;
    }

    match tree {
        Value::Null => {}
        Value::Array(items) => {
            for (index, item) in items.iter().enumerate() {
                traverse(&format!("{}[{}]", path, index), item, is_leaf, out);
            }
        }
        Value::Object(map) => {
            for (key, sub_tree) in map {
                let sub_path = if path.is_empty() {
                    key.clone()
                } else {
                    format!("{}.{}", path, key)
                };
                traverse(&sub_path, sub_tree, is_leaf, out);
            }
        }
        _ => out.stray.push(path.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_dotted_and_indexed() {
        let path = FieldPath::parse("a.b[2][0].c");
        assert_eq!(
            path.segments(),
            &[
                Segment::Key("a".into()),
                Segment::Key("b".into()),
                Segment::Index(2),
                Segment::Index(0),
                Segment::Key("c".into()),
            ]
        );
        assert_eq!(path.to_string(), "a.b[2][0].c");
    }

    #[test]
    fn test_parse_leading_index() {
        let path = FieldPath::parse("[1].name");
        assert_eq!(
            path.segments(),
            &[Segment::Index(1), Segment::Key("name".into())]
        );
    }

    #[test]
    fn test_parse_quoted_bracket_key() {
        let path = FieldPath::parse("a[\"b\"]");
        assert_eq!(
            path.segments(),
            &[Segment::Key("a".into()), Segment::Key("b".into())]
        );
    }

    #[test]
    fn test_is_part_of() {
        assert!(is_part_of("a", "a.b"));
        assert!(is_part_of("a", "a[0]"));
        assert!(!is_part_of("a", "ab"));
        assert!(!is_part_of("a", "a"));
        assert!(!is_part_of("a.b", "a"));
    }

    #[test]
    fn test_set_in_builds_containers() {
        let mut root = json!({});
        set_in(&mut root, &FieldPath::parse("a.b"), json!(1));
        set_in(&mut root, &FieldPath::parse("a.c"), json!(2));
        set_in(&mut root, &FieldPath::parse("list[2]"), json!("x"));
        assert_eq!(
            root,
            json!({"a": {"b": 1, "c": 2}, "list": [null, null, "x"]})
        );
    }

    #[test]
    fn test_set_in_replaces_scalars() {
        let mut root = json!({"a": 5});
        set_in(&mut root, &FieldPath::parse("a.b"), json!(true));
        assert_eq!(root, json!({"a": {"b": true}}));
    }

    #[test]
    fn test_get_in() {
        let root = json!({"a": {"list": [10, {"x": "y"}]}});
        assert_eq!(get_in(&root, &FieldPath::parse("a.list[0]")), Some(&json!(10)));
        assert_eq!(
            get_in(&root, &FieldPath::parse("a.list[1].x")),
            Some(&json!("y"))
        );
        assert_eq!(get_in(&root, &FieldPath::parse("a.missing")), None);
    }

    #[test]
    fn test_huge_index_stays_a_key() {
        assert_eq!(
            FieldPath::parse("a[4000000000]").segments(),
            &[Segment::Key("a".into()), Segment::Key("4000000000".into())]
        );
        assert_eq!(
            FieldPath::parse("a[9999]").segments(),
            &[Segment::Key("a".into()), Segment::Index(MAX_INDEX)]
        );

        let mut root = json!({});
        set_in(&mut root, &FieldPath::parse("a[4000000000]"), json!(1));
        assert_eq!(root, json!({"a": {"4000000000": 1}}));
    }

    #[test]
    fn test_flatten_stops_at_leaves() {
        let tree = json!({"a": {"b": {"deep": 1}, "c": 2}, "x": 3});
        let flat = flatten(&tree, |path, _| path == "a.b" || path == "a.c");
        assert_eq!(
            flat.leaves,
            vec![
                ("a.b".to_string(), json!({"deep": 1})),
                ("a.c".to_string(), json!(2)),
            ]
        );
        assert_eq!(flat.stray, vec!["x".to_string()]);
    }

    #[test]
    fn test_flatten_accepts_flat_keys() {
        let tree = json!({"a.b": 1, "list": [7]});
        let flat = flatten(&tree, |path, _| path == "a.b" || path == "list[0]");
        assert_eq!(
            flat.leaves,
            vec![("a.b".to_string(), json!(1)), ("list[0]".to_string(), json!(7))]
        );
        assert!(flat.stray.is_empty());
    }
}
