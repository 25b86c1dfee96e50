//! k-nearest-neighbour preference estimate.

use crate::error::{Result, ScoringError};
use crate::labels::{LabeledExample, TrainingSet};
use crate::track::FeatureVector;

/// Scores a vector as the mean label of its `k` closest training examples.
#[derive(Debug, Clone)]
pub struct NeighborScorer {
    k: usize,
    examples: Vec<LabeledExample>,
}

impl NeighborScorer {
    #[must_use]
    pub fn new(k: usize) -> Self {
        Self { k, examples: Vec::new() }
    }

    /// Store the (already normalized) training examples.
    pub fn fit(&mut self, training: &TrainingSet) {
        self.examples = training.examples().to_vec();
    }

    /// Neighbours actually used: `k` clamped to the training set size.
    #[must_use]
    pub fn effective_k(&self) -> usize {
        self.k.min(self.examples.len())
    }

    /// Mean label of the nearest examples under Euclidean distance.
    ///
    /// Equal distances keep training order, so the result is deterministic.
    ///
    /// # Errors
    ///
    /// [`ScoringError::EmptyTrainingSet`] if nothing has been fitted.
    pub fn score(&self, candidate: &FeatureVector) -> Result<f64> {
        let k = self.effective_k();
        if k == 0 {
            return Err(ScoringError::EmptyTrainingSet);
        }

        let mut by_distance: Vec<(f64, f64)> = self
            .examples
            .iter()
            .map(|example| (candidate.distance(&example.vector), example.label))
            .collect();
        by_distance.sort_by(|(a, _), (b, _)| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));

        #[allow(clippy::cast_precision_loss)]
        let mean = by_distance.iter().take(k).map(|(_, label)| label).sum::<f64>() / k as f64;
        Ok(mean)
    }
}
