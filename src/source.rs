//! The upstream catalog as seen by the scoring pipeline.
//!
//! A [`TrackSource`] supplies the user's ranked top tracks, a candidate pool
//! seeded from them, and audio features per track id. These are the only
//! places a session waits on I/O; the scoring components never do.

use crate::track::{AudioFeatures, TrackRecord};
use anyhow::{bail, Result};
use std::collections::HashMap;

/// Number of top tracks requested as history.
pub const HISTORY_LIMIT: usize = 50;
/// Number of leading top tracks used to seed the candidate pool.
pub const SEED_COUNT: usize = 5;
/// Size of the candidate pool requested.
pub const CANDIDATE_POOL_LIMIT: usize = 100;
/// Maximum ids per audio-feature request.
pub const FEATURE_BATCH_SIZE: usize = 100;

/// Catalog operations the pipeline depends on.
pub trait TrackSource {
    /// Up to `limit` of the user's top tracks, most preferred first.
    ///
    /// # Errors
    ///
    /// Any upstream failure.
    fn top_tracks(&self, limit: usize) -> Result<Vec<TrackRecord>>;

    /// Up to `limit` candidate tracks related to `seed_ids`.
    ///
    /// Seeds are a hint. A source without a similarity service, such as a
    /// local store, may ignore them and return its general pool.
    ///
    /// # Errors
    ///
    /// Any upstream failure.
    fn recommendations(&self, seed_ids: &[String], limit: usize) -> Result<Vec<TrackRecord>>;

    /// One entry per id, in the same order; `None` where the catalog has no
    /// analysis for that track.
    ///
    /// # Errors
    ///
    /// Any upstream failure.
    fn audio_features(&self, ids: &[String]) -> Result<Vec<Option<AudioFeatures>>>;
}

/// Fetch audio features for `tracks` in batches and attach them.
///
/// Tracks the catalog has no features for come back with `audio_features`
/// set to `None`; the extractor drops them later.
///
/// # Errors
///
/// Propagates source errors, and fails if a batch answer does not have one
/// entry per requested id.
pub fn attach_audio_features(source: &dyn TrackSource, tracks: Vec<TrackRecord>) -> Result<Vec<TrackRecord>> {
    let ids: Vec<String> = tracks.iter().map(|t| t.id.clone()).collect();
    let mut features = Vec::with_capacity(ids.len());

    for chunk in ids.chunks(FEATURE_BATCH_SIZE) {
        let batch = source.audio_features(chunk)?;
        if batch.len() != chunk.len() {
            bail!(
                "audio feature lookup returned {} entries for {} ids",
                batch.len(),
                chunk.len()
            );
        }
        features.extend(batch);
    }

    Ok(tracks
        .into_iter()
        .zip(features)
        .map(|(track, features)| track.with_features(features))
        .collect())
}

/// Catalog held in memory.
///
/// Tracks carry their own `audio_features`, which are stripped from the
/// listings and served through [`TrackSource::audio_features`] like a remote
/// catalog would.
#[derive(Debug, Clone, Default)]
pub struct MemorySource {
    top: Vec<TrackRecord>,
    pool: Vec<TrackRecord>,
    features: HashMap<String, AudioFeatures>,
}

impl MemorySource {
    #[must_use]
    pub fn new(top: Vec<TrackRecord>, pool: Vec<TrackRecord>) -> Self {
        let mut features = HashMap::new();
        let mut strip = |tracks: Vec<TrackRecord>| -> Vec<TrackRecord> {
            tracks
                .into_iter()
                .map(|mut track| {
                    if let Some(f) = track.audio_features.take() {
                        features.insert(track.id.clone(), f);
                    }
                    track
                })
                .collect()
        };
        let top = strip(top);
        let pool = strip(pool);
        Self { top, pool, features }
    }
}

impl TrackSource for MemorySource {
    fn top_tracks(&self, limit: usize) -> Result<Vec<TrackRecord>> {
        Ok(self.top.iter().take(limit).cloned().collect())
    }

    fn recommendations(&self, _seed_ids: &[String], limit: usize) -> Result<Vec<TrackRecord>> {
        Ok(self.pool.iter().take(limit).cloned().collect())
    }

    fn audio_features(&self, ids: &[String]) -> Result<Vec<Option<AudioFeatures>>> {
        Ok(ids.iter().map(|id| self.features.get(id).cloned()).collect())
    }
}
