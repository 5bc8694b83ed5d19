use super::{Classification, RecordClassifier};
use crate::core::{ClassifierError, Patch, Record};

/// Runs classifiers in order as a single step.
///
/// Each classifier sees the record with the previous classifiers' patches
/// already applied, and the resulting patches are folded into one. The
/// first error aborts the chain for that record.
pub struct ChainClassifier {
    name: String,
    steps: Vec<Box<dyn RecordClassifier>>,
}

impl ChainClassifier {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            steps: Vec::new(),
        }
    }

    pub fn then(mut self, step: impl RecordClassifier + 'static) -> Self {
        self.steps.push(Box::new(step));
        self
    }

    pub fn then_boxed(mut self, step: Box<dyn RecordClassifier>) -> Self {
        self.steps.push(step);
        self
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }
}

impl RecordClassifier for ChainClassifier {
    fn name(&self) -> &str {
        &self.name
    }

    fn classify(&self, record: &Record) -> Result<Classification, ClassifierError> {
        let mut combined = Patch::new();
        let mut current: Option<Record> = None;

        for step in &self.steps {
            let view = current.as_ref().unwrap_or(record);
            if let Classification::Patch(patch) = step.classify(view)? {
                let next = view.patched(&patch);
                combined.extend(patch);
                current = Some(next);
            }
        }

        // A later step may restore what an earlier one changed.
        let combined = combined
            .fields()
            .iter()
            .filter(|(field, value)| record.get(field) != Some(*value))
            .map(|(field, value)| (field.clone(), value.clone()))
            .collect();
        Ok(Classification::from_patch(combined))
    }
}
