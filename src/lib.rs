//! Hybrid track-preference scoring.
//!
//! Learns what a listener likes from their ranked top tracks and ranks a pool
//! of candidate tracks by predicted affinity.
//!
//! Core modules:
//! - [`track`] - Track records and fixed-order feature vectors
//! - [`normalize`] - Zero-mean / unit-variance scaling
//! - [`labels`] - Implicit labels from rank position
//! - [`neighbors`] - Nearest-neighbour scorer
//! - [`regressor`] - Linear model trained with Adam
//! - [`ensemble`] - Weighted combination and ranking
//! - [`session`] - Pipeline orchestration
//!
//! ### Supporting Modules
//!
//! - [`source`] - Catalog collaborator interface
//! - [`db`] - SQLite catalog store
//! - [`config`] - Engine parameters and data directories
//! - [`error`] - Error taxonomy
//! - [`cli`] / [`completion`] - Command-line surface
//!
//! ## Quick Start Example
//!
//! ```
//! use melodymap::config::EngineConfig;
//! use melodymap::session::ScoringSession;
//! use melodymap::track::{AudioFeatures, TrackRecord};
//!
//! let track = |id: &str, popularity: f64, energy: f64| TrackRecord {
//!     id: id.to_string(),
//!     popularity: Some(popularity),
//!     audio_features: Some(AudioFeatures {
//!         danceability: Some(0.5),
//!         energy: Some(energy),
//!         valence: Some(0.5),
//!         tempo: Some(120.0),
//!     }),
//!     ..Default::default()
//! };
//!
//! // Most preferred first
//! let history = vec![track("a", 80.0, 0.9), track("b", 60.0, 0.6), track("c", 40.0, 0.2)];
//! let candidates = vec![track("x", 45.0, 0.3), track("y", 78.0, 0.85)];
//!
//! let session = ScoringSession::new(EngineConfig::default())?;
//! let ranked = session.recommend(history, candidates, 10)?;
//! assert_eq!(ranked.len(), 2);
//! # Ok::<(), melodymap::error::ScoringError>(())
//! ```
//!
//! ## Algorithm Details
//!
//! Each request trains from scratch:
//!
//! 1. Tracks without all five features (popularity, danceability, energy,
//!    valence, tempo) are dropped.
//! 2. History tracks get labels spaced linearly from 1.0 down to 0.0.
//! 3. Features are standardised with statistics from the history only.
//! 4. A k-nearest-neighbour scorer and an affine model are fitted.
//! 5. Each candidate scores `0.5 * knn + 0.5 * linear` (weights configurable)
//!    and the list is sorted, best first.
//!
//! ## Error Handling
//!
//! Engine functions return [`error::ScoringError`]. A session either returns
//! a full ranking or one error; tracks with missing features are skipped,
//! never zero-filled.

pub mod cli;
pub mod completion;
pub mod config;
pub mod db;
pub mod ensemble;
pub mod error;
pub mod labels;
pub mod neighbors;
pub mod normalize;
pub mod regressor;
pub mod session;
pub mod source;
pub mod track;
