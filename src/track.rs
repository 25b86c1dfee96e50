//! Track records and the fixed-schema feature vector derived from them.

use crate::error::{Result, ScoringError};
use log::debug;
use serde::{Deserialize, Serialize};

/// Number of dimensions in a [`FeatureVector`]
pub const FEATURE_DIM: usize = 5;

/// Dimension order shared by training and scoring.
pub const FEATURE_NAMES: [&str; FEATURE_DIM] =
    ["popularity", "danceability", "energy", "valence", "tempo"];

/// Highest tempo accepted, in beats per minute.
pub const MAX_TEMPO_BPM: f64 = 300.0;

/// Inclusive bounds per dimension, in [`FEATURE_NAMES`] order.
const FEATURE_RANGES: [(f64, f64); FEATURE_DIM] = [
    (0.0, 100.0),
    (0.0, 1.0),
    (0.0, 1.0),
    (0.0, 1.0),
    (0.0, MAX_TEMPO_BPM),
];

/// Audio attributes reported by the catalog for a single track.
///
/// Every attribute is optional: the catalog may know a track but not have
/// analysed it yet.
#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
pub struct AudioFeatures {
    #[serde(default)]
    pub danceability: Option<f64>,
    #[serde(default)]
    pub energy: Option<f64>,
    #[serde(default)]
    pub valence: Option<f64>,
    /// Beats per minute.
    #[serde(default)]
    pub tempo: Option<f64>,
}

/// A track as supplied by the catalog.
#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackRecord {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub artist: String,
    /// Catalog popularity, 0 to 100.
    #[serde(default)]
    pub popularity: Option<f64>,
    #[serde(default)]
    pub audio_features: Option<AudioFeatures>,
}

impl TrackRecord {
    /// Copy of this record with `features` attached.
    #[must_use]
    pub fn with_features(mut self, features: Option<AudioFeatures>) -> Self {
        self.audio_features = features;
        self
    }
}

/// `[popularity, danceability, energy, valence, tempo]`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FeatureVector(pub [f64; FEATURE_DIM]);

impl FeatureVector {
    /// Build the vector for `track`.
    ///
    /// # Errors
    ///
    /// [`ScoringError::MissingFeature`] when any attribute is absent. Missing
    /// values are never defaulted: zero is a meaningful value for most of
    /// these features. [`ScoringError::InvalidFeature`] when a value is not
    /// finite or falls outside its range: popularity 0..=100, danceability,
    /// energy and valence 0..=1, tempo 0..=[`MAX_TEMPO_BPM`].
    pub fn extract(track: &TrackRecord) -> Result<Self> {
        let features = track.audio_features.as_ref();
        let raw = [
            track.popularity,
            features.and_then(|f| f.danceability),
            features.and_then(|f| f.energy),
            features.and_then(|f| f.valence),
            features.and_then(|f| f.tempo),
        ];

        let mut values = [0.0; FEATURE_DIM];
        for (dim, value) in raw.into_iter().enumerate() {
            let feature = FEATURE_NAMES[dim];
            let value = value.ok_or_else(|| ScoringError::MissingFeature {
                track_id: track.id.clone(),
                feature,
            })?;
            let (low, high) = FEATURE_RANGES[dim];
            if !value.is_finite() || !(low..=high).contains(&value) {
                return Err(ScoringError::InvalidFeature {
                    track_id: track.id.clone(),
                    feature,
                    value,
                });
            }
            values[dim] = value;
        }

        Ok(Self(values))
    }

    #[must_use]
    pub fn values(&self) -> &[f64; FEATURE_DIM] {
        &self.0
    }

    /// Euclidean distance between two vectors.
    #[must_use]
    pub fn distance(&self, other: &Self) -> f64 {
        self.0
            .iter()
            .zip(other.0.iter())
            .map(|(a, b)| (a - b).powi(2))
            .sum::<f64>()
            .sqrt()
    }
}

/// Keep the tracks whose vectors extract cleanly, in their original order.
///
/// Excluded tracks are logged and dropped; this never fails.
pub fn extract_valid(tracks: Vec<TrackRecord>) -> Vec<(TrackRecord, FeatureVector)> {
    tracks
        .into_iter()
        .filter_map(|track| match FeatureVector::extract(&track) {
            Ok(vector) => Some((track, vector)),
            Err(err) => {
                debug!("Excluding track: {err}");
                None
            }
        })
        .collect()
}

#[cfg(test)]
pub(crate) fn test_track(id: &str, values: [f64; FEATURE_DIM]) -> TrackRecord {
    TrackRecord {
        id: id.to_string(),
        name: format!("Song {id}"),
        artist: "Test Artist".to_string(),
        popularity: Some(values[0]),
        audio_features: Some(AudioFeatures {
            danceability: Some(values[1]),
            energy: Some(values[2]),
            valence: Some(values[3]),
            tempo: Some(values[4]),
        }),
    }
}
