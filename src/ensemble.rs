//! Weighted combination of the two predictors and final ranking.

use crate::error::{Result, ScoringError};
use crate::track::TrackRecord;
use serde::{Deserialize, Serialize};

/// Blend between the neighbour estimate and the linear prediction.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EnsembleWeights {
    pub neighbor: f64,
    pub parametric: f64,
}

impl Default for EnsembleWeights {
    fn default() -> Self {
        Self {
            neighbor: 0.5,
            parametric: 0.5,
        }
    }
}

impl EnsembleWeights {
    /// Weights with `neighbor` for the neighbour scorer and the remainder for
    /// the linear model.
    #[must_use]
    pub fn with_neighbor_share(neighbor: f64) -> Self {
        Self {
            neighbor,
            parametric: 1.0 - neighbor,
        }
    }

    /// # Errors
    ///
    /// [`ScoringError::InvalidConfig`] unless both weights are finite,
    /// non-negative and sum to 1.
    pub fn validate(&self) -> Result<()> {
        let finite = self.neighbor.is_finite() && self.parametric.is_finite();
        if !finite || self.neighbor < 0.0 || self.parametric < 0.0 {
            return Err(ScoringError::InvalidConfig(format!(
                "ensemble weights must be non-negative numbers, got {self:?}"
            )));
        }
        if (self.neighbor + self.parametric - 1.0).abs() > 1e-6 {
            return Err(ScoringError::InvalidConfig(format!(
                "ensemble weights must sum to 1.0, got {}",
                self.neighbor + self.parametric
            )));
        }
        Ok(())
    }

    #[must_use]
    pub fn combine(&self, neighbor_score: f64, parametric_score: f64) -> f64 {
        self.neighbor * neighbor_score + self.parametric * parametric_score
    }
}

/// Both predictor outputs for one candidate.
#[derive(Debug, Clone, PartialEq)]
pub struct CandidateScores {
    pub track: TrackRecord,
    pub neighbor: f64,
    pub parametric: f64,
}

/// A ranked recommendation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredCandidate {
    pub track: TrackRecord,
    pub score: f64,
}

/// Combine, sort descending and keep the first `limit` entries.
///
/// The sort is stable: candidates with equal scores keep their input order.
/// A `limit` beyond the candidate count returns everything.
#[must_use]
pub fn rank(candidates: Vec<CandidateScores>, weights: EnsembleWeights, limit: usize) -> Vec<ScoredCandidate> {
    let mut ranked: Vec<ScoredCandidate> = candidates
        .into_iter()
        .map(|c| ScoredCandidate {
            score: weights.combine(c.neighbor, c.parametric),
            track: c.track,
        })
        .collect();

    ranked.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
    ranked.truncate(limit);
    ranked
}

#[cfg(test)]
mod tests {
    use super::*;

    fn candidate(id: &str, neighbor: f64, parametric: f64) -> CandidateScores {
        CandidateScores {
            track: TrackRecord {
                id: id.to_string(),
                ..Default::default()
            },
            neighbor,
            parametric,
        }
    }

    fn ids(ranked: &[ScoredCandidate]) -> Vec<&str> {
        ranked.iter().map(|c| c.track.id.as_str()).collect()
    }

    #[test]
    fn test_rank_orders_by_combined_score() {
        let ranked = rank(
            vec![candidate("low", 0.1, 0.1), candidate("high", 0.9, 0.7), candidate("mid", 0.5, 0.4)],
            EnsembleWeights::default(),
            10,
        );
        assert_eq!(ids(&ranked), vec!["high", "mid", "low"]);
        assert!((ranked[0].score - 0.8).abs() < 1e-12);
    }

    #[test]
    fn test_equal_scores_keep_input_order() {
        let ranked = rank(
            vec![
                candidate("first", 0.5, 0.5),
                candidate("second", 0.25, 0.75),
                candidate("third", 0.75, 0.25),
            ],
            EnsembleWeights::default(),
            3,
        );
        assert_eq!(ids(&ranked), vec!["first", "second", "third"]);
    }

    #[test]
    fn test_limit_clamping() {
        let candidates = || vec![candidate("a", 0.3, 0.3), candidate("b", 0.2, 0.2), candidate("c", 0.1, 0.1)];
        assert_eq!(rank(candidates(), EnsembleWeights::default(), 100).len(), 3);
        assert_eq!(rank(candidates(), EnsembleWeights::default(), 2).len(), 2);
        assert!(rank(candidates(), EnsembleWeights::default(), 0).is_empty());
    }

    #[test]
    fn test_weights_shift_the_ranking() {
        let candidates = || vec![candidate("neighbors-like", 0.9, 0.0), candidate("model-likes", 0.0, 0.9)];
        let knn_only = rank(candidates(), EnsembleWeights::with_neighbor_share(1.0), 2);
        let linear_only = rank(candidates(), EnsembleWeights::with_neighbor_share(0.0), 2);
        assert_eq!(knn_only[0].track.id, "neighbors-like");
        assert_eq!(linear_only[0].track.id, "model-likes");
    }

    #[test]
    fn test_weight_validation() {
        assert!(EnsembleWeights::default().validate().is_ok());
        assert!(EnsembleWeights { neighbor: 0.7, parametric: 0.7 }.validate().is_err());
        assert!(EnsembleWeights { neighbor: -0.5, parametric: 1.5 }.validate().is_err());
        assert!(EnsembleWeights { neighbor: f64::NAN, parametric: 0.5 }.validate().is_err());
    }
}
