use super::{Classification, RecordClassifier};
use crate::core::{ClassifierError, Patch, Record};
use serde_json::Value;

pub const REST_DAY_FIELD: &str = "isRestDay";
pub const METHODS_FIELD: &str = "methods";

/// Gives rest-day schedule entries an empty `methods` list.
///
/// A present `methods` field always wins, whatever its value and whatever
/// the flag says. Only an absent field on a `true` rest day is patched.
#[derive(Debug, Clone)]
pub struct RestDayMethodsClassifier {
    name: String,
    flag_field: String,
    list_field: String,
}

impl Default for RestDayMethodsClassifier {
    fn default() -> Self {
        Self {
            name: "rest-day-methods".to_string(),
            flag_field: REST_DAY_FIELD.to_string(),
            list_field: METHODS_FIELD.to_string(),
        }
    }
}

impl RestDayMethodsClassifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Same policy against other field names (e.g. `methodIds`).
    pub fn with_fields(flag_field: impl Into<String>, list_field: impl Into<String>) -> Self {
        Self {
            flag_field: flag_field.into(),
            list_field: list_field.into(),
            ..Self::default()
        }
    }

    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }
}

impl RecordClassifier for RestDayMethodsClassifier {
    fn name(&self) -> &str {
        &self.name
    }

    fn classify(&self, record: &Record) -> Result<Classification, ClassifierError> {
        if record.has_field(&self.list_field) {
            return Ok(Classification::NoChange);
        }

        match record.bool_field(&self.flag_field)? {
            Some(true) => Ok(Classification::Patch(
                Patch::new().set(self.list_field.clone(), Value::Array(Vec::new())),
            )),
            Some(false) | None => Ok(Classification::NoChange),
        }
    }
}
