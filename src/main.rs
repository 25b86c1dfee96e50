//! # MelodyMap
//!
//! Ranks candidate tracks by how well they match a user's listening history.
//!
//! ## Usage
//!
//! ```bash
//! # Load an exported catalog (top tracks + candidates)
//! melodymap import catalog.json
//!
//! # See what is stored
//! melodymap list
//!
//! # Get the 10 best matches
//! melodymap recommend --limit 10
//! ```

use anyhow::{Context, Result};
use clap::{CommandFactory, Parser};
use log::{debug, info};
use melodymap::config::RuntimeConfig;
use melodymap::db::{self, CatalogImport, SqliteCatalog};
use melodymap::ensemble::EnsembleWeights;
use melodymap::session::ScoringSession;
use melodymap::{cli, completion};
use std::fs;

/// Main entry point for the MelodyMap application.
///
/// Logging is controlled via `RUST_LOG`:
/// - `RUST_LOG=debug melodymap recommend` - Show pipeline stages
/// - `RUST_LOG=melodymap::regressor=trace melodymap recommend` - Optimizer progress
fn main() -> Result<()> {
    env_logger::init();

    let args = cli::Args::parse();

    match args.command {
        cli::Command::Import { path } => {
            let runtime = RuntimeConfig::resolve(args.db, args.config)?;
            info!("Importing catalog from: {}", path.display());
            let raw = fs::read_to_string(&path)
                .with_context(|| format!("Failed to read catalog file {}", path.display()))?;
            let catalog: CatalogImport = serde_json::from_str(&raw)
                .with_context(|| format!("Invalid catalog JSON in {}", path.display()))?;

            let mut conn = db::open(&runtime.db_path)?;
            let written = db::import_catalog(&mut conn, &catalog)?;
            println!(
                "Imported {written} tracks ({} top tracks) into {}",
                catalog.top_tracks.len(),
                runtime.db_path.display()
            );
        }
        cli::Command::List => {
            let runtime = RuntimeConfig::resolve(args.db, args.config)?;
            let conn = db::open(&runtime.db_path)?;
            for track in db::retrieve_tracks(&conn)? {
                let features = match &track.audio_features {
                    Some(f) => format!(
                        "dance {} energy {} valence {} tempo {}",
                        fmt_opt(f.danceability),
                        fmt_opt(f.energy),
                        fmt_opt(f.valence),
                        fmt_opt(f.tempo)
                    ),
                    None => "no audio features".to_string(),
                };
                println!(
                    "{:<24} {} - {} [popularity {}] {features}",
                    track.id,
                    track.artist,
                    track.name,
                    fmt_opt(track.popularity)
                );
            }
        }
        cli::Command::Recommend {
            limit,
            neighbors,
            neighbor_weight,
            iterations,
            seed,
            json,
        } => {
            let runtime = RuntimeConfig::resolve(args.db, args.config)?;
            let mut engine = runtime.engine;
            if let Some(k) = neighbors {
                engine.neighbor_count = k;
            }
            if let Some(share) = neighbor_weight {
                engine.weights = EnsembleWeights::with_neighbor_share(share);
            }
            if let Some(steps) = iterations {
                engine.iterations = steps;
            }
            if let Some(seed) = seed {
                engine.seed = seed;
            }
            debug!("Engine settings: {engine:?}");

            let catalog = SqliteCatalog::open(&runtime.db_path)?;
            let session = ScoringSession::new(engine)?;
            let ranked = session.recommend_from_source(&catalog, limit)?;

            if json {
                println!("{}", serde_json::to_string_pretty(&ranked)?);
            } else {
                for (position, pick) in ranked.iter().enumerate() {
                    println!(
                        "{:>3}. {:>7.3}  {} - {} ({})",
                        position + 1,
                        pick.score,
                        pick.track.artist,
                        pick.track.name,
                        pick.track.id
                    );
                }
            }
        }
        cli::Command::Completion { shell } => {
            let mut cmd = cli::Args::command();
            completion::generate_completions(
                completion::shell_to_completion_shell(shell),
                &mut cmd,
                &mut std::io::stdout(),
            );
        }
    }

    Ok(())
}

fn fmt_opt(value: Option<f64>) -> String {
    value.map_or_else(|| "-".to_string(), |v| format!("{v:.2}"))
}
