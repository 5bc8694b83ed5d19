//! Record and patch model shared by every stage of a migration.

use super::error::ClassifierError;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;

/// Field map of a record. Sorted by field name so renderings are stable.
pub type Fields = BTreeMap<String, Value>;

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecordId(String);

impl RecordId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for RecordId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for RecordId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// A stored document: an id plus its named fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    pub id: RecordId,
    pub fields: Fields,
}

impl Record {
    pub fn new(id: impl Into<RecordId>, fields: Fields) -> Self {
        Self {
            id: id.into(),
            fields,
        }
    }

    /// Builds a record from a JSON object. Anything other than an object is rejected.
    pub fn from_json(id: impl Into<RecordId>, value: Value) -> Result<Self, ClassifierError> {
        match value {
            Value::Object(map) => Ok(Self::new(id, map.into_iter().collect())),
            other => Err(ClassifierError::Invalid(format!(
                "expected a JSON object, found {}",
                json_type_name(&other)
            ))),
        }
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.fields.get(field)
    }

    pub fn has_field(&self, field: &str) -> bool {
        self.fields.contains_key(field)
    }

    /// Reads an optional boolean field, rejecting values of any other type.
    pub fn bool_field(&self, field: &str) -> Result<Option<bool>, ClassifierError> {
        match self.fields.get(field) {
            None => Ok(None),
            Some(Value::Bool(flag)) => Ok(Some(*flag)),
            Some(other) => Err(type_mismatch(field, "boolean", other)),
        }
    }

    /// Reads an optional string field, rejecting values of any other type.
    pub fn str_field(&self, field: &str) -> Result<Option<&str>, ClassifierError> {
        match self.fields.get(field) {
            None => Ok(None),
            Some(Value::String(text)) => Ok(Some(text.as_str())),
            Some(other) => Err(type_mismatch(field, "string", other)),
        }
    }

    pub fn apply(&mut self, patch: &Patch) {
        patch.apply_to(&mut self.fields);
    }

    pub fn patched(&self, patch: &Patch) -> Self {
        let mut next = self.clone();
        next.apply(patch);
        next
    }

    /// Renders the record as a JSON object, id included.
    pub fn to_json(&self) -> Value {
        let mut map = serde_json::Map::new();
        map.insert("id".to_string(), Value::String(self.id.to_string()));
        for (name, value) in &self.fields {
            map.insert(name.clone(), value.clone());
        }
        Value::Object(map)
    }
}

/// Partial update naming only the fields to set.
///
/// Applying a patch overwrites exactly the named fields, so applying the same
/// patch twice leaves the record as applying it once did.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Patch(Fields);

impl Patch {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a field assignment
    pub fn set(mut self, field: impl Into<String>, value: Value) -> Self {
        self.0.insert(field.into(), value);
        self
    }

    pub fn insert(&mut self, field: impl Into<String>, value: Value) {
        self.0.insert(field.into(), value);
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.0.get(field)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn fields(&self) -> &Fields {
        &self.0
    }

    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    pub fn apply_to(&self, fields: &mut Fields) {
        for (name, value) in &self.0 {
            fields.insert(name.clone(), value.clone());
        }
    }

    /// True when every field of the patch already holds the patched value.
    pub fn is_applied_to(&self, fields: &Fields) -> bool {
        self.0
            .iter()
            .all(|(name, value)| fields.get(name) == Some(value))
    }

    /// Folds another patch into this one; later assignments win.
    pub fn extend(&mut self, other: Patch) {
        self.0.extend(other.0);
    }

    /// Computes the patch that turns `current` into a superset of `desired`.
    ///
    /// Fields present in `current` but absent from `desired` are left alone.
    pub fn diff(current: &Fields, desired: &Fields) -> Self {
        Self(
            desired
                .iter()
                .filter(|(name, value)| current.get(name.as_str()) != Some(value))
                .map(|(name, value)| (name.clone(), value.clone()))
                .collect(),
        )
    }
}

impl FromIterator<(String, Value)> for Patch {
    fn from_iter<I: IntoIterator<Item = (String, Value)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

pub fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

fn type_mismatch(field: &str, expected: &'static str, found: &Value) -> ClassifierError {
    ClassifierError::TypeMismatch {
        field: field.to_string(),
        expected,
        found: json_type_name(found),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record(value: Value) -> Record {
        Record::from_json("r1", value).unwrap()
    }

    #[test]
    fn test_patch_is_idempotent() {
        let original = record(json!({"isRestDay": true, "name": "Day 7"}));
        let patch = Patch::new().set("methods", json!([]));

        let once = original.patched(&patch);
        let twice = once.patched(&patch);

        assert_eq!(once, twice);
        assert_eq!(once.get("name"), Some(&json!("Day 7")));
        assert!(patch.is_applied_to(&once.fields));
        assert!(!patch.is_applied_to(&original.fields));
    }

    #[test]
    fn test_typed_accessors() {
        let r = record(json!({"flag": true, "title": "x", "count": 3}));
        assert_eq!(r.bool_field("flag").unwrap(), Some(true));
        assert_eq!(r.bool_field("missing").unwrap(), None);
        assert_eq!(r.str_field("title").unwrap(), Some("x"));

        let err = r.bool_field("count").unwrap_err();
        assert_eq!(
            err,
            ClassifierError::TypeMismatch {
                field: "count".to_string(),
                expected: "boolean",
                found: "number",
            }
        );
    }

    #[test]
    fn test_from_json_rejects_non_objects() {
        assert!(Record::from_json("r1", json!([1, 2])).is_err());
        assert!(Record::from_json("r1", json!("text")).is_err());
    }

    #[test]
    fn test_diff_only_names_changed_fields() {
        let current = record(json!({"a": 1, "b": 2, "keep": true})).fields;
        let desired = record(json!({"a": 1, "b": 3, "c": "new"})).fields;

        let patch = Patch::diff(&current, &desired);
        let names: Vec<&str> = patch.field_names().collect();
        assert_eq!(names, vec!["b", "c"]);
        assert!(Patch::diff(&desired, &desired).is_empty());
    }
}
