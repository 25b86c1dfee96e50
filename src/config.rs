//! # Configuration Module
//!
//! Engine parameters and data locations.
//!
//! MelodyMap keeps its catalog store in the platform data directory and reads
//! optional engine settings from the platform config directory:
//! - Linux: `~/.local/share/melodymap/catalog.db`, `~/.config/melodymap/config.json`
//! - macOS: `~/Library/Application Support/melodymap/`
//! - Windows: `%APPDATA%\melodymap\`
//!
//! Every field of the config file is optional; missing fields take the
//! defaults below.
//!
//! ```json
//! { "neighbor_count": 5, "weights": { "neighbor": 0.5, "parametric": 0.5 } }
//! ```

use crate::ensemble::EnsembleWeights;
use crate::error::ScoringError;
use crate::regressor::ParametricRegressor;
use anyhow::{Context, Result};
use log::debug;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Tunable parameters of a scoring session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// `k` for the neighbour scorer; clamped to the history size at scoring time.
    pub neighbor_count: usize,
    pub weights: EnsembleWeights,
    /// Adam steps per fit.
    pub iterations: u32,
    pub learning_rate: f64,
    pub seed: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        let regressor = ParametricRegressor::default();
        Self {
            neighbor_count: 5,
            weights: EnsembleWeights::default(),
            iterations: regressor.iterations,
            learning_rate: regressor.learning_rate,
            seed: regressor.seed,
        }
    }
}

impl EngineConfig {
    /// Read a JSON config file; a missing file yields the defaults.
    ///
    /// # Errors
    ///
    /// Fails if the file exists but cannot be read, parsed, or validated.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            debug!("No config at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let raw = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        let config: Self = serde_json::from_str(&raw)
            .with_context(|| format!("Invalid JSON in config file {}", path.display()))?;
        config
            .validate()
            .with_context(|| format!("Rejected config file {}", path.display()))?;
        Ok(config)
    }

    /// # Errors
    ///
    /// [`ScoringError::InvalidConfig`] naming the first offending field.
    pub fn validate(&self) -> std::result::Result<(), ScoringError> {
        if self.neighbor_count == 0 {
            return Err(ScoringError::InvalidConfig("neighbor_count must be at least 1".into()));
        }
        if self.iterations == 0 {
            return Err(ScoringError::InvalidConfig("iterations must be at least 1".into()));
        }
        if !(self.learning_rate.is_finite() && self.learning_rate > 0.0) {
            return Err(ScoringError::InvalidConfig(format!(
                "learning_rate must be a positive number, got {}",
                self.learning_rate
            )));
        }
        self.weights.validate()
    }

    #[must_use]
    pub fn regressor(&self) -> ParametricRegressor {
        ParametricRegressor {
            iterations: self.iterations,
            learning_rate: self.learning_rate,
            seed: self.seed,
        }
    }
}

/// Returns the platform-appropriate data directory for MelodyMap, creating it
/// if needed.
///
/// # Errors
///
/// Fails if the system data directory is unknown or cannot be created.
pub fn get_data_dir() -> Result<PathBuf> {
    let data_dir = dirs::data_dir()
        .ok_or_else(|| anyhow::anyhow!(
            "Could not determine system data directory. Please ensure your platform supports standard data directories."
        ))?;

    let app_dir = data_dir.join("melodymap");
    fs::create_dir_all(&app_dir)
        .with_context(|| format!(
            "Failed to create MelodyMap data directory at {}. Please check file permissions.",
            app_dir.display()
        ))?;

    Ok(app_dir)
}

/// Returns the default catalog store path, `catalog.db` in [`get_data_dir`].
///
/// # Errors
///
/// See [`get_data_dir`].
pub fn get_db_path() -> Result<PathBuf> {
    Ok(get_data_dir()?.join("catalog.db"))
}

/// Returns the default config file path. The file itself need not exist.
///
/// # Errors
///
/// Fails if the system config directory cannot be determined.
pub fn get_config_path() -> Result<PathBuf> {
    let config_dir = dirs::config_dir()
        .ok_or_else(|| anyhow::anyhow!("Could not determine system config directory."))?;
    Ok(config_dir.join("melodymap").join("config.json"))
}

/// Resolved locations and engine settings for one run of the binary.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuntimeConfig {
    pub db_path: PathBuf,
    pub engine: EngineConfig,
}

impl RuntimeConfig {
    /// Resolve paths, falling back to the platform defaults.
    ///
    /// # Errors
    ///
    /// Fails if a default path cannot be determined or the config file is
    /// invalid.
    pub fn resolve(db_path: Option<PathBuf>, config_path: Option<PathBuf>) -> Result<Self> {
        let db_path = match db_path {
            Some(path) => path,
            None => get_db_path()?,
        };
        let config_path = match config_path {
            Some(path) => path,
            None => get_config_path()?,
        };

        Ok(Self {
            db_path,
            engine: EngineConfig::load(&config_path)?,
        })
    }
}
