//! Error types for the scoring engine.
//!
//! Engine code returns [`ScoringError`] so callers can tell a data problem
//! from an insufficient-data problem. Application plumbing (store, config, CLI)
//! stays on `anyhow::Result`.

use thiserror::Error;

/// Result type for scoring engine operations
pub type Result<T> = std::result::Result<T, ScoringError>;

/// Everything that can go wrong inside a scoring session
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ScoringError {
    /// A track lacks one of the five required attributes
    #[error("track {track_id} is missing feature `{feature}`")]
    MissingFeature { track_id: String, feature: &'static str },

    /// A track carries a value that cannot be used (NaN, out of range)
    #[error("track {track_id} has invalid `{feature}` value {value}")]
    InvalidFeature {
        track_id: String,
        feature: &'static str,
        value: f64,
    },

    /// A predictor was used before being fitted on at least one example
    #[error("no training examples available")]
    EmptyTrainingSet,

    /// The session could not produce a ranked list
    #[error("recommendation unavailable: {reason}")]
    RecommendationUnavailable { reason: String },

    /// The session was cancelled before it completed
    #[error("scoring session cancelled")]
    Cancelled,

    /// Arithmetic left the finite range (overflowing statistics, diverged scores)
    #[error("numeric overflow: {0}")]
    NumericOverflow(String),

    /// Engine parameters failed validation
    #[error("invalid engine configuration: {0}")]
    InvalidConfig(String),
}

impl ScoringError {
    pub(crate) fn unavailable(reason: impl Into<String>) -> Self {
        Self::RecommendationUnavailable { reason: reason.into() }
    }
}
