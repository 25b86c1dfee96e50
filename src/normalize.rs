//! Zero-mean / unit-variance feature scaling.
//!
//! Statistics are fitted once, on the user's history, and then applied as-is
//! to every vector scored in the same session. Candidates never contribute to
//! the statistics: otherwise the scale would drift with whatever happened to
//! be in the candidate pool.

use crate::error::{Result, ScoringError};
use crate::track::{FeatureVector, FEATURE_DIM, FEATURE_NAMES};

/// Per-dimension mean and standard deviation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NormalizationStats {
    pub mean: [f64; FEATURE_DIM],
    /// Population standard deviation; constant dimensions are stored as 1.0.
    pub std: [f64; FEATURE_DIM],
}

impl NormalizationStats {
    /// Fit statistics over `vectors`.
    ///
    /// # Errors
    ///
    /// [`ScoringError::EmptyTrainingSet`] if `vectors` is empty,
    /// [`ScoringError::NumericOverflow`] if a mean or deviation is not finite.
    pub fn fit(vectors: &[FeatureVector]) -> Result<Self> {
        if vectors.is_empty() {
            return Err(ScoringError::EmptyTrainingSet);
        }

        #[allow(clippy::cast_precision_loss)]
        let n = vectors.len() as f64;
        let mut mean = [0.0; FEATURE_DIM];
        let mut std = [0.0; FEATURE_DIM];

        for dim in 0..FEATURE_DIM {
            mean[dim] = vectors.iter().map(|v| v.0[dim]).sum::<f64>() / n;
            let variance = vectors
                .iter()
                .map(|v| (v.0[dim] - mean[dim]).powi(2))
                .sum::<f64>()
                / n;
            let spread = variance.sqrt();
            if !mean[dim].is_finite() || !spread.is_finite() {
                return Err(ScoringError::NumericOverflow(format!(
                    "`{}` statistics are not finite",
                    FEATURE_NAMES[dim]
                )));
            }
            std[dim] = guard_std(spread);
        }

        Ok(Self { mean, std })
    }

    /// Scale a single vector.
    #[must_use]
    pub fn normalize(&self, vector: &FeatureVector) -> FeatureVector {
        let mut out = [0.0; FEATURE_DIM];
        for (dim, value) in out.iter_mut().enumerate() {
            *value = (vector.0[dim] - self.mean[dim]) / self.std[dim];
        }
        FeatureVector(out)
    }

    /// Scale every vector in `vectors`.
    #[must_use]
    pub fn apply(&self, vectors: &[FeatureVector]) -> Vec<FeatureVector> {
        vectors.iter().map(|v| self.normalize(v)).collect()
    }

    /// Inverse of [`normalize`](Self::normalize).
    #[must_use]
    pub fn denormalize(&self, vector: &FeatureVector) -> FeatureVector {
        let mut out = [0.0; FEATURE_DIM];
        for (dim, value) in out.iter_mut().enumerate() {
            *value = vector.0[dim] * self.std[dim] + self.mean[dim];
        }
        FeatureVector(out)
    }
}

/// A constant dimension has no spread to divide by.
fn guard_std(std: f64) -> f64 {
    if std < f64::EPSILON {
        1.0
    } else {
        std
    }
}
