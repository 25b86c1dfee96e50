//! Scoring pipeline orchestration.
//!
//! A [`ScoringSession`] is built for one request and consumed by it. Training
//! produces a [`ModelState`] that the session owns outright; nothing is cached
//! between sessions, so concurrent requests never see each other's data.
//!
//! ```text
//! Collect → Label → Normalize → Train → CandidatePrep → ScoreAndRank
//! ```
//!
//! # Examples
//!
//! ```no_run
//! use melodymap::config::EngineConfig;
//! use melodymap::session::ScoringSession;
//! # let history = Vec::new();
//! # let candidates = Vec::new();
//!
//! let session = ScoringSession::new(EngineConfig::default())?;
//! for pick in session.recommend(history, candidates, 20)? {
//!     println!("{:.3}  {}", pick.score, pick.track.name);
//! }
//! # Ok::<(), melodymap::error::ScoringError>(())
//! ```

use crate::config::EngineConfig;
use crate::ensemble::{self, CandidateScores, EnsembleWeights, ScoredCandidate};
use crate::error::{Result, ScoringError};
use crate::labels::{implicit_labels, LabeledExample, TrainingSet};
use crate::neighbors::NeighborScorer;
use crate::normalize::NormalizationStats;
use crate::regressor::LinearModel;
use crate::source::{self, TrackSource};
use crate::track::{extract_valid, FeatureVector, TrackRecord};
use log::{debug, info};
use rayon::prelude::*;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Shared flag for aborting a session from another thread.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// Pipeline stages, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionStage {
    Collect,
    Label,
    Normalize,
    Train,
    CandidatePrep,
    ScoreAndRank,
}

impl fmt::Display for SessionStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Collect => "collect",
            Self::Label => "label",
            Self::Normalize => "normalize",
            Self::Train => "train",
            Self::CandidatePrep => "candidate-prep",
            Self::ScoreAndRank => "score-and-rank",
        };
        f.write_str(name)
    }
}

/// Everything learned from one user's history.
///
/// Candidates scored through this state are normalized with the statistics
/// fitted on the history, never with their own.
#[derive(Debug, Clone)]
pub struct ModelState {
    stats: NormalizationStats,
    training: TrainingSet,
    neighbors: NeighborScorer,
    linear: LinearModel,
    weights: EnsembleWeights,
}

impl ModelState {
    #[must_use]
    pub fn stats(&self) -> &NormalizationStats {
        &self.stats
    }

    #[must_use]
    pub fn training(&self) -> &TrainingSet {
        &self.training
    }

    #[must_use]
    pub fn linear_model(&self) -> &LinearModel {
        &self.linear
    }

    /// Neighbour and linear scores for a raw (unnormalized) vector.
    ///
    /// # Errors
    ///
    /// [`ScoringError::EmptyTrainingSet`] if the state holds no examples.
    pub fn predict(&self, raw: &FeatureVector) -> Result<(f64, f64)> {
        let vector = self.stats.normalize(raw);
        Ok((self.neighbors.score(&vector)?, self.linear.predict(&vector)))
    }

    /// Score `candidates` and return the best `limit` of them.
    ///
    /// # Errors
    ///
    /// [`ScoringError::RecommendationUnavailable`] when no candidate has
    /// usable features, [`ScoringError::NumericOverflow`] when a combined
    /// score is not finite, [`ScoringError::Cancelled`] if `cancel` fires.
    pub fn rank_candidates(
        &self,
        candidates: Vec<TrackRecord>,
        limit: usize,
        cancel: &CancellationToken,
    ) -> Result<Vec<ScoredCandidate>> {
        debug!("Session stage: {}", SessionStage::CandidatePrep);
        let offered = candidates.len();
        let valid = extract_valid(candidates);
        if valid.is_empty() {
            return Err(ScoringError::unavailable(format!(
                "none of {offered} candidate tracks has audio features"
            )));
        }
        debug!("{} of {offered} candidates usable", valid.len());

        debug!("Session stage: {}", SessionStage::ScoreAndRank);
        let scored = valid
            .into_par_iter()
            .map(|(track, raw)| {
                if cancel.is_cancelled() {
                    return Err(ScoringError::Cancelled);
                }
                let (neighbor, parametric) = self.predict(&raw)?;
                if !self.weights.combine(neighbor, parametric).is_finite() {
                    return Err(ScoringError::NumericOverflow(format!(
                        "score for track {} is not finite",
                        track.id
                    )));
                }
                Ok(CandidateScores {
                    track,
                    neighbor,
                    parametric,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        if cancel.is_cancelled() {
            return Err(ScoringError::Cancelled);
        }
        Ok(ensemble::rank(scored, self.weights, limit))
    }
}

/// One end-to-end recommendation request.
#[derive(Debug)]
pub struct ScoringSession {
    config: EngineConfig,
    cancel: CancellationToken,
}

impl ScoringSession {
    /// # Errors
    ///
    /// [`ScoringError::InvalidConfig`] if `config` does not validate.
    pub fn new(config: EngineConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            cancel: CancellationToken::new(),
        })
    }

    /// Use `token` so another thread can abort this session.
    #[must_use]
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    #[must_use]
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Fit both predictors on `history`, which must be most-preferred first.
    ///
    /// # Errors
    ///
    /// [`ScoringError::RecommendationUnavailable`] if no historical track has
    /// usable features (nothing is fitted in that case),
    /// [`ScoringError::Cancelled`] if cancelled mid-fit.
    pub fn train(&self, history: Vec<TrackRecord>) -> Result<ModelState> {
        debug!("Session stage: {}", SessionStage::Collect);
        let offered = history.len();
        let vectors: Vec<FeatureVector> = extract_valid(history).into_iter().map(|(_, v)| v).collect();
        if vectors.is_empty() {
            return Err(ScoringError::unavailable(format!(
                "none of {offered} historical tracks has audio features"
            )));
        }

        debug!("Session stage: {}", SessionStage::Label);
        let labels = implicit_labels(vectors.len());

        debug!("Session stage: {}", SessionStage::Normalize);
        let stats = NormalizationStats::fit(&vectors)?;
        let training: TrainingSet = stats
            .apply(&vectors)
            .into_iter()
            .zip(labels)
            .map(|(vector, label)| LabeledExample { vector, label })
            .collect();

        debug!("Session stage: {}", SessionStage::Train);
        let mut neighbors = NeighborScorer::new(self.config.neighbor_count);
        neighbors.fit(&training);
        let linear = self.config.regressor().fit(&training, &self.cancel)?;

        info!(
            "Trained on {} of {offered} historical tracks (k = {})",
            training.len(),
            neighbors.effective_k()
        );
        Ok(ModelState {
            stats,
            training,
            neighbors,
            linear,
            weights: self.config.weights,
        })
    }

    /// Run every stage on in-memory inputs.
    ///
    /// # Errors
    ///
    /// See [`train`](Self::train) and [`ModelState::rank_candidates`].
    pub fn recommend(
        self,
        history: Vec<TrackRecord>,
        candidates: Vec<TrackRecord>,
        limit: usize,
    ) -> Result<Vec<ScoredCandidate>> {
        let model = self.train(history)?;
        model.rank_candidates(candidates, limit, &self.cancel)
    }

    /// Run every stage against a catalog: the user's top tracks become the
    /// history and the first few of them seed the candidate pool.
    ///
    /// # Errors
    ///
    /// Catalog failures are reported as
    /// [`ScoringError::RecommendationUnavailable`]; otherwise as
    /// [`recommend`](Self::recommend).
    pub fn recommend_from_source(self, catalog: &dyn TrackSource, limit: usize) -> Result<Vec<ScoredCandidate>> {
        let top = catalog
            .top_tracks(source::HISTORY_LIMIT)
            .map_err(upstream_failure)?;
        let seeds: Vec<String> = top.iter().take(source::SEED_COUNT).map(|t| t.id.clone()).collect();
        let history = source::attach_audio_features(catalog, top).map_err(upstream_failure)?;

        let model = self.train(history)?;

        let pool = catalog
            .recommendations(&seeds, source::CANDIDATE_POOL_LIMIT)
            .map_err(upstream_failure)?;
        let candidates = source::attach_audio_features(catalog, pool).map_err(upstream_failure)?;

        model.rank_candidates(candidates, limit, &self.cancel)
    }
}

fn upstream_failure(err: anyhow::Error) -> ScoringError {
    ScoringError::unavailable(format!("catalog request failed: {err:#}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::MemorySource;
    use crate::track::test_track;

    /// Points along one line in feature space: `base + t * dir`.
    fn on_line(id: &str, t: f64) -> TrackRecord {
        let base = [50.0, 0.5, 0.5, 0.5, 120.0];
        let dir = [10.0, 0.05, -0.05, 0.1, 5.0];
        let mut values = [0.0; 5];
        for dim in 0..5 {
            values[dim] = base[dim] + t * dir[dim];
        }
        test_track(id, values)
    }

    fn history() -> Vec<TrackRecord> {
        (0..4).map(|i| on_line(&format!("h{i}"), f64::from(i))).collect()
    }

    fn candidates() -> Vec<TrackRecord> {
        vec![on_line("mid", 1.5), on_line("bottom", 2.9), on_line("top", 0.2)]
    }

    fn converging_config() -> EngineConfig {
        EngineConfig {
            neighbor_count: 2,
            iterations: 4000,
            learning_rate: 0.02,
            ..EngineConfig::default()
        }
    }

    #[test]
    fn test_end_to_end_ranking() {
        let config = converging_config();
        let session = ScoringSession::new(config.clone()).unwrap();
        let model = session.train(history()).unwrap();

        let labels: Vec<f64> = model.training().examples().iter().map(|e| e.label).collect();
        let expected_labels = [1.0, 2.0 / 3.0, 1.0 / 3.0, 0.0];
        for (got, want) in labels.iter().zip(expected_labels) {
            assert!((got - want).abs() < 1e-12);
        }

        let ranked = model.rank_candidates(candidates(), 10, &CancellationToken::new()).unwrap();
        let ids: Vec<&str> = ranked.iter().map(|c| c.track.id.as_str()).collect();
        assert_eq!(ids, vec!["top", "mid", "bottom"]);

        // Rebuild each score by hand from the same pieces.
        let raw: Vec<FeatureVector> = history().iter().map(|t| FeatureVector::extract(t).unwrap()).collect();
        let stats = NormalizationStats::fit(&raw).unwrap();
        let training = TrainingSet::from_ranked(stats.apply(&raw));
        let linear = config.regressor().fit(&training, &CancellationToken::new()).unwrap();
        assert_eq!(model.linear_model(), &linear);
        for pick in &ranked {
            let x = stats.normalize(&FeatureVector::extract(&pick.track).unwrap());
            let mut nearest: Vec<(f64, f64)> = training
                .examples()
                .iter()
                .map(|e| (x.distance(&e.vector), e.label))
                .collect();
            nearest.sort_by(|a, b| a.0.partial_cmp(&b.0).unwrap());
            let knn = (nearest[0].1 + nearest[1].1) / 2.0;
            let expected = 0.5 * knn + 0.5 * linear.predict(&x);
            assert!((pick.score - expected).abs() < 1e-12, "{}: {} vs {expected}", pick.track.id, pick.score);
        }
    }

    #[test]
    fn test_candidates_use_training_stats() {
        let session = ScoringSession::new(EngineConfig::default()).unwrap();
        let model = session.train(history()).unwrap();

        let raw: Vec<FeatureVector> = history().iter().map(|t| FeatureVector::extract(t).unwrap()).collect();
        assert_eq!(model.stats(), &NormalizationStats::fit(&raw).unwrap());

        let before = *model.stats();
        model
            .rank_candidates(candidates(), 3, &CancellationToken::new())
            .unwrap();
        assert_eq!(model.stats(), &before);
    }

    #[test]
    fn test_limit_larger_than_pool() {
        let session = ScoringSession::new(EngineConfig::default()).unwrap();
        let ranked = session.recommend(history(), candidates(), 100).unwrap();
        assert_eq!(ranked.len(), 3);
        assert!(ranked.windows(2).all(|w| w[0].score >= w[1].score));
    }

    #[test]
    fn test_empty_history_fails_before_fitting() {
        let cancel = CancellationToken::new();
        cancel.cancel();
        let session = ScoringSession::new(EngineConfig::default())
            .unwrap()
            .with_cancellation(cancel);

        let featureless = vec![TrackRecord {
            id: "nothing".to_string(),
            ..Default::default()
        }];
        // A fit would have reported Cancelled.
        let err = session.recommend(featureless, candidates(), 5).unwrap_err();
        assert!(matches!(err, ScoringError::RecommendationUnavailable { .. }));
    }

    #[test]
    fn test_empty_candidates_fail_as_a_whole() {
        let session = ScoringSession::new(EngineConfig::default()).unwrap();
        let err = session
            .recommend(history(), vec![TrackRecord::default()], 5)
            .unwrap_err();
        assert!(matches!(err, ScoringError::RecommendationUnavailable { .. }));
    }

    #[test]
    fn test_cancelled_session() {
        let cancel = CancellationToken::new();
        let session = ScoringSession::new(EngineConfig::default())
            .unwrap()
            .with_cancellation(cancel.clone());
        cancel.cancel();
        assert_eq!(session.recommend(history(), candidates(), 5), Err(ScoringError::Cancelled));
    }

    #[test]
    fn test_cancel_between_training_and_scoring() {
        let cancel = CancellationToken::new();
        let session = ScoringSession::new(EngineConfig::default())
            .unwrap()
            .with_cancellation(cancel.clone());
        let model = session.train(history()).unwrap();

        cancel.cancel();
        let result = model.rank_candidates(candidates(), 3, &cancel);
        assert_eq!(result, Err(ScoringError::Cancelled));
    }

    #[test]
    fn test_extreme_tempo_is_excluded_from_history() {
        let mut tracks = history();
        if let Some(features) = tracks[1].audio_features.as_mut() {
            features.tempo = Some(1e200);
        }
        let session = ScoringSession::new(EngineConfig::default()).unwrap();
        let model = session.train(tracks).unwrap();
        assert_eq!(model.training().len(), 3);

        let ranked = model
            .rank_candidates(candidates(), 3, &CancellationToken::new())
            .unwrap();
        assert_eq!(ranked.len(), 3);
        assert!(ranked.iter().all(|c| c.score.is_finite()));
    }

    #[test]
    fn test_non_finite_scores_are_not_ranked() {
        let session = ScoringSession::new(EngineConfig::default()).unwrap();
        let mut model = session.train(history()).unwrap();
        model.linear.weights[0] = f64::NAN;

        let err = model
            .rank_candidates(candidates(), 3, &CancellationToken::new())
            .unwrap_err();
        assert!(matches!(err, ScoringError::NumericOverflow(_)));
    }

    #[test]
    fn test_invalid_config_rejected() {
        let config = EngineConfig {
            neighbor_count: 0,
            ..EngineConfig::default()
        };
        assert!(matches!(ScoringSession::new(config), Err(ScoringError::InvalidConfig(_))));
    }

    #[test]
    fn test_recommend_from_source() {
        let mut top = history();
        top.insert(1, TrackRecord { id: "unanalysed".to_string(), ..Default::default() });
        let source = MemorySource::new(top, candidates());

        let session = ScoringSession::new(converging_config()).unwrap();
        let ranked = session.recommend_from_source(&source, 2).unwrap();
        assert_eq!(ranked.len(), 2);
        assert_eq!(ranked[0].track.id, "top");
        assert!(ranked[0].track.audio_features.is_some());
    }

    #[test]
    fn test_source_failure_is_unavailable() {
        struct DownSource;
        impl TrackSource for DownSource {
            fn top_tracks(&self, _: usize) -> anyhow::Result<Vec<TrackRecord>> {
                anyhow::bail!("503 Service Unavailable")
            }
            fn recommendations(&self, _: &[String], _: usize) -> anyhow::Result<Vec<TrackRecord>> {
                Ok(Vec::new())
            }
            fn audio_features(&self, ids: &[String]) -> anyhow::Result<Vec<Option<crate::track::AudioFeatures>>> {
                Ok(vec![None; ids.len()])
            }
        }

        let session = ScoringSession::new(EngineConfig::default()).unwrap();
        let err = session.recommend_from_source(&DownSource, 5).unwrap_err();
        assert!(err.to_string().contains("503"));
    }

    #[test]
    fn test_sessions_are_independent_across_threads() {
        let handles: Vec<_> = (0..4)
            .map(|_| {
                std::thread::spawn(|| {
                    ScoringSession::new(EngineConfig::default())
                        .unwrap()
                        .recommend(history(), candidates(), 3)
                        .unwrap()
                })
            })
            .collect();
        let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        assert!(results.windows(2).all(|w| w[0] == w[1]));
    }
}
