use super::{Classification, RecordClassifier};
use crate::core::{ClassifierError, Patch, Record};
use serde_json::Value;
use std::collections::BTreeMap;

/// Derives `target_field` from a table keyed by the string in `key_field`.
///
/// The key may be the record id itself (`key_field` = `"id"`). A key with no
/// table entry is reported as unrecognized rather than given a default.
#[derive(Debug, Clone)]
pub struct LookupClassifier {
    name: String,
    key_field: String,
    target_field: String,
    table: BTreeMap<String, Value>,
}

impl LookupClassifier {
    pub fn new(
        name: impl Into<String>,
        key_field: impl Into<String>,
        target_field: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            key_field: key_field.into(),
            target_field: target_field.into(),
            table: BTreeMap::new(),
        }
    }

    pub fn entry(mut self, key: impl Into<String>, value: Value) -> Self {
        self.table.insert(key.into(), value);
        self
    }

    /// Classification levels of the growth methods catalogue, keyed by id.
    pub fn growth_method_classification() -> Self {
        [
            ("angio_pumping", "Prerequisite"),
            ("angion_method_1_0", "Beginner"),
            ("angion_method_2_0", "Foundation"),
            ("angion_method_2_5", "Intermediate"),
            ("vascion", "Expert"),
            ("angio_wheel", "Master"),
        ]
        .into_iter()
        .fold(
            Self::new("growth-method-classification", "id", "classification"),
            |classifier, (id, level)| classifier.entry(id, Value::String(level.to_string())),
        )
    }

    fn key<'a>(&self, record: &'a Record) -> Result<&'a str, ClassifierError> {
        if self.key_field == "id" {
            return Ok(record.id.as_str());
        }
        record
            .str_field(&self.key_field)?
            .ok_or_else(|| ClassifierError::MissingField(self.key_field.clone()))
    }
}

impl RecordClassifier for LookupClassifier {
    fn name(&self) -> &str {
        &self.name
    }

    fn classify(&self, record: &Record) -> Result<Classification, ClassifierError> {
        let key = self.key(record)?;
        let desired = self
            .table
            .get(key)
            .ok_or_else(|| ClassifierError::UnrecognizedValue {
                field: self.key_field.clone(),
                value: key.to_string(),
            })?;

        if record.get(&self.target_field) == Some(desired) {
            return Ok(Classification::NoChange);
        }
        Ok(Classification::Patch(
            Patch::new().set(self.target_field.clone(), desired.clone()),
        ))
    }
}
