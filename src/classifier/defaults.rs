use super::{Classification, RecordClassifier};
use crate::core::{ClassifierError, Fields, Patch, Record};
use serde_json::Value;
use std::collections::BTreeMap;

/// Fills fields that are missing from a record with fixed defaults.
///
/// Fields that are present are never touched, even when null. A default may
/// be taken from another field of the same record, with a fixed fallback.
/// Optionally a set of fields can be declared required: a record without
/// them fails classification instead of being guessed at.
#[derive(Debug, Clone)]
pub struct DefaultFieldsClassifier {
    name: String,
    defaults: Fields,
    copied_from: BTreeMap<String, String>,
    required: Vec<String>,
}

impl DefaultFieldsClassifier {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            defaults: Fields::new(),
            copied_from: BTreeMap::new(),
            required: Vec::new(),
        }
    }

    pub fn default_value(mut self, field: impl Into<String>, value: Value) -> Self {
        self.defaults.insert(field.into(), value);
        self
    }

    /// Fills `field` with the record's `source` value, or `fallback` when the
    /// record has no `source`.
    pub fn default_from(
        mut self,
        field: impl Into<String>,
        source: impl Into<String>,
        fallback: Value,
    ) -> Self {
        let field = field.into();
        self.copied_from.insert(field.clone(), source.into());
        self.defaults.insert(field, fallback);
        self
    }

    pub fn require(mut self, field: impl Into<String>) -> Self {
        self.required.push(field.into());
        self
    }

    /// Search-ingestion fields of the knowledge base collection.
    pub fn knowledge_base() -> Self {
        Self::new("knowledge-base-fields")
            .require("title")
            .default_value("keywords", Value::Array(Vec::new()))
            .default_from("type", "category", Value::String("knowledge".to_string()))
    }
}

impl RecordClassifier for DefaultFieldsClassifier {
    fn name(&self) -> &str {
        &self.name
    }

    fn classify(&self, record: &Record) -> Result<Classification, ClassifierError> {
        if let Some(missing) = self.required.iter().find(|field| !record.has_field(field)) {
            return Err(ClassifierError::MissingField(missing.clone()));
        }

        let patch: Patch = self
            .defaults
            .iter()
            .filter(|(field, _)| !record.has_field(field))
            .map(|(field, fallback)| {
                let value = self
                    .copied_from
                    .get(field)
                    .and_then(|source| record.get(source))
                    .unwrap_or(fallback);
                (field.clone(), value.clone())
            })
            .collect();
        Ok(Classification::from_patch(patch))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_only_missing_fields_are_filled() {
        let classifier = DefaultFieldsClassifier::knowledge_base();
        let record = Record::from_json(
            "kb1",
            json!({"title": "AM 1.0 basics", "category": "technique", "priority": null}),
        )
        .unwrap();

        let result = classifier.classify(&record).unwrap();
        let patch = result.patch().unwrap();
        let names: Vec<&str> = patch.field_names().collect();
        assert_eq!(names, vec!["keywords", "type"]);
    }

    #[test]
    fn test_type_follows_category_else_knowledge() {
        let classifier = DefaultFieldsClassifier::knowledge_base();

        let categorized = Record::from_json(
            "kb1",
            json!({"title": "Rest days", "category": "recovery", "keywords": []}),
        )
        .unwrap();
        let result = classifier.classify(&categorized).unwrap();
        assert_eq!(result.patch().unwrap().get("type"), Some(&json!("recovery")));

        let plain = Record::from_json("kb2", json!({"title": "Warm up", "keywords": []})).unwrap();
        let result = classifier.classify(&plain).unwrap();
        let patch = result.patch().unwrap();
        assert_eq!(patch.get("type"), Some(&json!("knowledge")));
        assert_eq!(patch.field_names().collect::<Vec<_>>(), vec!["type"]);
    }

    #[test]
    fn test_complete_record_is_unchanged() {
        let classifier = DefaultFieldsClassifier::new("d").default_value("a", json!(1));
        let record = Record::from_json("r", json!({"a": 2})).unwrap();
        assert!(classifier.classify(&record).unwrap().is_no_change());
    }

    #[test]
    fn test_missing_required_field_fails() {
        let classifier = DefaultFieldsClassifier::knowledge_base();
        let record = Record::from_json("kb2", json!({"content": "..."})).unwrap();
        assert_eq!(
            classifier.classify(&record).unwrap_err(),
            ClassifierError::MissingField("title".to_string())
        );
    }
}
