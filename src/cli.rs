//! # Command-Line Interface Module
//!
//! Clap definitions for the `melodymap` binary.
//!
//! ## Commands
//!
//! - `import`: Load a catalog JSON file (top tracks + candidate tracks) into the store
//! - `list`: Display stored tracks and their audio features
//! - `recommend`: Rank the stored candidates against the stored top tracks
//! - `completion`: Generate shell completion scripts
//!
//! ## Examples
//!
//! ```bash
//! melodymap import ~/exports/spotify-top.json
//! melodymap recommend --limit 10
//! melodymap recommend --neighbors 3 --neighbor-weight 0.7 --json
//! ```

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// Shell types supported for completion generation
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, ValueEnum, Debug)]
#[allow(clippy::enum_variant_names)]
pub enum Shell {
    /// Bash shell
    Bash,
    /// Zsh shell
    Zsh,
    /// Fish shell
    Fish,
    /// PowerShell
    PowerShell,
    /// Elvish shell
    Elvish,
}

/// Main application arguments structure.
#[derive(Parser, Debug)]
#[command(name = "melodymap")]
#[command(about = "MelodyMap: hybrid track-preference scoring from your listening history")]
#[command(version)]
pub struct Args {
    /// Catalog store location (defaults to the platform data directory)
    #[arg(long, global = true, env = "MELODYMAP_DB")]
    pub db: Option<PathBuf>,

    /// Engine config file (defaults to the platform config directory)
    #[arg(long, global = true, env = "MELODYMAP_CONFIG")]
    pub config: Option<PathBuf>,

    /// The subcommand to execute
    #[command(subcommand)]
    pub command: Command,
}

/// Enumeration of all available subcommands.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Import a catalog JSON file into the store
    ///
    /// The file holds `top_tracks` (the listening history, most preferred
    /// first) and `tracks` (everything else, used as candidates). Importing
    /// again updates known tracks and replaces the top-track ranking.
    Import {
        /// Path to the catalog JSON file
        #[arg(value_hint = clap::ValueHint::FilePath)]
        path: PathBuf,
    },

    /// List all tracks in the store
    List,

    /// Recommend tracks from the stored candidate pool
    ///
    /// Trains a fresh model on the stored top tracks and ranks the remaining
    /// catalog. Flags override values from the config file.
    Recommend {
        /// Number of recommendations to return
        #[arg(short, long, default_value = "20")]
        limit: usize,

        /// Neighbours averaged by the nearest-neighbour scorer
        #[arg(short = 'k', long)]
        neighbors: Option<usize>,

        /// Share of the final score given to the neighbour scorer (0.0 to 1.0)
        #[arg(long)]
        neighbor_weight: Option<f64>,

        /// Optimizer steps for the linear model
        #[arg(long)]
        iterations: Option<u32>,

        /// Seed for the linear model's initial weights
        #[arg(long)]
        seed: Option<u64>,

        /// Print the ranked list as JSON
        #[arg(long)]
        json: bool,
    },

    /// Generate shell completions
    ///
    /// Usage: melodymap completion bash > ~/.local/share/bash-completion/completions/melodymap
    Completion {
        /// Shell to generate completions for
        shell: Shell,
    },
}
