//! Schema-scoped field differencing.
//!
//! Only fields declared in the [`FieldSchema`] are visited. Nested objects
//! produce nested diffs; collections are replaced as a whole when their
//! multiset of elements differs.

use serde::ser::{Serialize, SerializeMap, Serializer};
use serde_json::Value;

use ordersync_core::{FieldKind, FieldSchema};

use crate::equality::{arrays_equal_unordered, structurally_equal};

/// One differing field.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
#[serde(untagged)]
pub enum DiffEntry {
    /// Whole-value change. `None` means the field is absent on that side.
    Changed {
        #[serde(rename = "oldValue", skip_serializing_if = "Option::is_none")]
        old_value: Option<Value>,
        #[serde(rename = "newValue", skip_serializing_if = "Option::is_none")]
        new_value: Option<Value>,
    },
    /// Changes inside a nested object.
    Nested(Diff),
}

impl DiffEntry {
    fn changed(old_value: Option<&Value>, new_value: Option<&Value>) -> Self {
        DiffEntry::Changed {
            old_value: old_value.cloned(),
            new_value: new_value.cloned(),
        }
    }
}

/// Sparse map of differing fields, in schema declaration order.
///
/// Serializes as a JSON object: `{"field": {"oldValue": …, "newValue": …}}`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Diff {
    entries: Vec<(String, DiffEntry)>,
}

impl Diff {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn get(&self, field: &str) -> Option<&DiffEntry> {
        self.entries
            .iter()
            .find(|(name, _)| name == field)
            .map(|(_, entry)| entry)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &DiffEntry)> {
        self.entries.iter().map(|(name, entry)| (name.as_str(), entry))
    }

    /// Dotted paths of every leaf change, e.g. `shipping_address.zip`.
    pub fn changed_paths(&self) -> Vec<String> {
        let mut paths = Vec::new();
        self.collect_paths("", &mut paths);
        paths
    }

    fn collect_paths(&self, prefix: &str, out: &mut Vec<String>) {
        for (name, entry) in &self.entries {
            let path = if prefix.is_empty() {
                name.clone()
            } else {
                format!("{prefix}.{name}")
            };
            match entry {
                DiffEntry::Changed { .. } => out.push(path),
                DiffEntry::Nested(inner) => inner.collect_paths(&path, out),
            }
        }
    }

    fn push(&mut self, field: &str, entry: DiffEntry) {
        self.entries.push((field.to_owned(), entry));
    }
}

impl Serialize for Diff {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (name, entry) in &self.entries {
            map.serialize_entry(name, entry)?;
        }
        map.end()
    }
}

/// Dotted leaf paths of a diff already in its JSON form, e.g. one read back
/// from the daemon. A leaf is an object holding only `oldValue`/`newValue`.
pub fn changed_paths_in(diff: &Value) -> Vec<String> {
    fn is_leaf(entry: &serde_json::Map<String, Value>) -> bool {
        !entry.is_empty() && entry.keys().all(|k| k == "oldValue" || k == "newValue")
    }
    fn walk(diff: &Value, prefix: &str, out: &mut Vec<String>) {
        let Some(fields) = diff.as_object() else {
            return;
        };
        for (name, entry) in fields {
            let path = if prefix.is_empty() {
                name.clone()
            } else {
                format!("{prefix}.{name}")
            };
            match entry.as_object() {
                Some(inner) if !is_leaf(inner) => walk(entry, &path, out),
                _ => out.push(path),
            }
        }
    }

    let mut paths = Vec::new();
    walk(diff, "", &mut paths);
    paths
}

/// Fields of `new` that differ from `old`, restricted to `schema`.
///
/// `old` is the stored side, `new` the fetched side.
pub fn diff_records(new: &Value, old: &Value, schema: &FieldSchema) -> Diff {
    let mut diff = Diff::new();

    for (field, kind) in schema.fields() {
        let (new_value, old_value) = match (new.get(field), old.get(field)) {
            (None, None) => continue,
            (Some(n), Some(o)) => (n, o),
            (n, o) => {
                diff.push(field, DiffEntry::changed(o, n));
                continue;
            }
        };

        // An explicit null on either side short-circuits nested comparison.
        if new_value.is_null() || old_value.is_null() {
            if new_value.is_null() != old_value.is_null() {
                diff.push(field, DiffEntry::changed(Some(old_value), Some(new_value)));
            }
            continue;
        }

        match (kind, new_value, old_value) {
            (FieldKind::Nested(sub), Value::Object(_), Value::Object(_)) => {
                let nested = diff_records(new_value, old_value, sub);
                if !nested.is_empty() {
                    diff.push(field, DiffEntry::Nested(nested));
                }
            }
            (FieldKind::Collection(_), Value::Array(n), Value::Array(o)) => {
                if !arrays_equal_unordered(n, o) {
                    diff.push(field, DiffEntry::changed(Some(old_value), Some(new_value)));
                }
            }
            _ => {
                if !structurally_equal(new_value, old_value) {
                    diff.push(field, DiffEntry::changed(Some(old_value), Some(new_value)));
                }
            }
        }
    }

    diff
}
