use super::{
    ChainClassifier, DefaultFieldsClassifier, LookupClassifier, RecordClassifier,
    RestDayMethodsClassifier,
};
use std::collections::BTreeMap;

type ClassifierFactory = fn() -> Box<dyn RecordClassifier>;

/// Classifiers addressable by name, with a one-line description each.
pub struct ClassifierRegistry {
    entries: BTreeMap<String, (String, ClassifierFactory)>,
}

impl Default for ClassifierRegistry {
    fn default() -> Self {
        let mut registry = Self::empty();
        registry.register(
            "rest-day-methods",
            "Give rest-day schedule entries without `methods` an empty list",
            || Box::new(RestDayMethodsClassifier::new()),
        );
        registry.register(
            "rest-day-method-ids",
            "Same as rest-day-methods for entries using `methodIds`",
            || {
                Box::new(
                    RestDayMethodsClassifier::with_fields("isRestDay", "methodIds")
                        .named("rest-day-method-ids"),
                )
            },
        );
        registry.register(
            "knowledge-base-fields",
            "Back-fill keywords and type (from category, else knowledge) on knowledge base articles",
            || Box::new(DefaultFieldsClassifier::knowledge_base()),
        );
        registry.register(
            "growth-method-classification",
            "Set `classification` on growth methods from the definitive catalogue",
            || Box::new(LookupClassifier::growth_method_classification()),
        );
        registry.register(
            "routine-schedule-cleanup",
            "rest-day-methods followed by rest-day-method-ids",
            || {
                Box::new(
                    ChainClassifier::new("routine-schedule-cleanup")
                        .then(RestDayMethodsClassifier::new())
                        .then(RestDayMethodsClassifier::with_fields("isRestDay", "methodIds")),
                )
            },
        );
        registry
    }
}

impl ClassifierRegistry {
    pub fn empty() -> Self {
        Self {
            entries: BTreeMap::new(),
        }
    }

    /// Registers (or replaces) a named classifier.
    pub fn register(
        &mut self,
        name: impl Into<String>,
        description: impl Into<String>,
        factory: ClassifierFactory,
    ) {
        self.entries
            .insert(name.into(), (description.into(), factory));
    }

    pub fn build(&self, name: &str) -> Option<Box<dyn RecordClassifier>> {
        self.entries.get(name).map(|(_, factory)| factory())
    }

    /// Names and descriptions, sorted by name.
    pub fn list(&self) -> Vec<(&str, &str)> {
        self.entries
            .iter()
            .map(|(name, (description, _))| (name.as_str(), description.as_str()))
            .collect()
    }

    pub fn names(&self) -> Vec<&str> {
        self.entries.keys().map(String::as_str).collect()
    }
}
