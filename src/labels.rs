//! Implicit preference labels derived from rank position.

use crate::track::FeatureVector;

/// `n` labels spaced linearly from 1.0 (rank 0) down to 0.0 (rank n-1).
///
/// The history is assumed to arrive most-preferred first; nothing here can
/// check that.
#[must_use]
pub fn implicit_labels(n: usize) -> Vec<f64> {
    match n {
        0 => Vec::new(),
        1 => vec![1.0],
        _ => {
            #[allow(clippy::cast_precision_loss)]
            let labels: Vec<f64> = (0..n).map(|rank| 1.0 - rank as f64 / (n - 1) as f64).collect();
            labels
        }
    }
}

/// One normalized training vector and its pseudo-label.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LabeledExample {
    pub vector: FeatureVector,
    pub label: f64,
}

/// Training examples in affinity order, most preferred first.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TrainingSet {
    examples: Vec<LabeledExample>,
}

impl TrainingSet {
    /// Pair rank-ordered vectors with their implicit labels.
    #[must_use]
    pub fn from_ranked(vectors: Vec<FeatureVector>) -> Self {
        let labels = implicit_labels(vectors.len());
        let examples = vectors
            .into_iter()
            .zip(labels)
            .map(|(vector, label)| LabeledExample { vector, label })
            .collect();
        Self { examples }
    }

    #[must_use]
    pub fn examples(&self) -> &[LabeledExample] {
        &self.examples
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.examples.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.examples.is_empty()
    }
}

impl FromIterator<LabeledExample> for TrainingSet {
    fn from_iter<I: IntoIterator<Item = LabeledExample>>(iter: I) -> Self {
        Self { examples: iter.into_iter().collect() }
    }
}
