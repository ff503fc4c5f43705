use anyhow::Result;
use ndarray::Array4;

use crate::detect::arch::DEFAULT_INPUT_SIZE;
use crate::detect::backend::Classifier;

/// Stub classifier for dry runs and tests. Predicts the same class for every row.
#[derive(Clone, Debug)]
pub struct StubClassifier {
    class: usize,
    input_size: u32,
}

impl StubClassifier {
    pub fn new(class: usize) -> Self {
        Self {
            class,
            input_size: DEFAULT_INPUT_SIZE,
        }
    }

    pub fn with_input_size(mut self, input_size: u32) -> Self {
        self.input_size = input_size;
        self
    }
}

impl Default for StubClassifier {
    fn default() -> Self {
        Self::new(0)
    }
}

impl Classifier for StubClassifier {
    fn name(&self) -> &'static str {
        "stub"
    }

    fn input_size(&self) -> u32 {
        self.input_size
    }

    fn predict(&self, batch: &Array4<f32>) -> Result<Vec<usize>> {
        Ok(vec![self.class; batch.shape()[0]])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stub_predicts_one_class_per_row() {
        let classifier = StubClassifier::new(1).with_input_size(8);
        let batch = Array4::<f32>::zeros((3, 3, 8, 8));
        assert_eq!(classifier.predict(&batch).unwrap(), vec![1, 1, 1]);
        assert_eq!(classifier.input_size(), 8);
    }
}
