//! Local catalog store.
//!
//! Keeps tracks, their audio features and the user's ranked top tracks in
//! SQLite so sessions can run without a network catalog. Only catalog data
//! lives here; fitted models are never stored.

use crate::source::TrackSource;
use crate::track::{AudioFeatures, TrackRecord};
use anyhow::{Context, Result};
use log::{debug, info, trace};
use rusqlite::{params, Connection, OptionalExtension};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// JSON shape accepted by [`import_catalog`].
///
/// `top_tracks` is the user's history, most preferred first. `tracks` is the
/// rest of the catalog, used as the candidate pool.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CatalogImport {
    #[serde(default)]
    pub top_tracks: Vec<TrackRecord>,
    #[serde(default)]
    pub tracks: Vec<TrackRecord>,
}

/// Open (or create) the store at `path` and make sure the schema exists.
///
/// # Errors
///
/// Fails if the file cannot be opened or the schema cannot be created.
pub fn open(path: &Path) -> Result<Connection> {
    let conn = Connection::open(path)
        .with_context(|| format!("Failed to open catalog store at {}", path.display()))?;
    init_schema(&conn)?;
    Ok(conn)
}

/// Create tables if they are missing.
///
/// # Errors
///
/// Fails on any SQL error.
pub fn init_schema(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "PRAGMA foreign_keys = ON;
        CREATE TABLE IF NOT EXISTS tracks (
            id         TEXT PRIMARY KEY,
            name       TEXT NOT NULL DEFAULT '',
            artist     TEXT NOT NULL DEFAULT '',
            popularity REAL
        );
        CREATE TABLE IF NOT EXISTS audio_features (
            track_id     TEXT PRIMARY KEY REFERENCES tracks(id) ON DELETE CASCADE,
            danceability REAL,
            energy       REAL,
            valence      REAL,
            tempo        REAL
        );
        CREATE TABLE IF NOT EXISTS top_tracks (
            rank     INTEGER PRIMARY KEY,
            track_id TEXT NOT NULL REFERENCES tracks(id) ON DELETE CASCADE
        );",
    )
    .context("Failed to create catalog schema")?;
    Ok(())
}

/// Insert or update every track in `catalog` and replace the ranked top list.
///
/// Runs in a single transaction. Returns the number of tracks written.
///
/// # Errors
///
/// Fails on any SQL error; nothing is written in that case.
pub fn import_catalog(conn: &mut Connection, catalog: &CatalogImport) -> Result<usize> {
    let tx = conn.transaction()?;
    let mut written = 0;

    {
        let mut track_stmt = tx.prepare(
            "INSERT INTO tracks (id, name, artist, popularity) VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(id) DO UPDATE SET name = excluded.name, artist = excluded.artist,
                                           popularity = excluded.popularity",
        )?;
        let mut features_stmt = tx.prepare(
            "INSERT OR REPLACE INTO audio_features (track_id, danceability, energy, valence, tempo)
             VALUES (?1, ?2, ?3, ?4, ?5)",
        )?;
        let mut clear_features = tx.prepare("DELETE FROM audio_features WHERE track_id = ?1")?;

        for track in catalog.top_tracks.iter().chain(catalog.tracks.iter()) {
            track_stmt
                .execute(params![track.id, track.name, track.artist, track.popularity])
                .with_context(|| format!("Failed to store track {}", track.id))?;

            match &track.audio_features {
                Some(f) => features_stmt
                    .execute(params![track.id, f.danceability, f.energy, f.valence, f.tempo])
                    .with_context(|| format!("Failed to store audio features for {}", track.id))?,
                None => clear_features.execute([&track.id])?,
            };
            written += 1;
        }

        tx.execute("DELETE FROM top_tracks", [])?;
        let mut rank_stmt = tx.prepare("INSERT INTO top_tracks (rank, track_id) VALUES (?1, ?2)")?;
        for (rank, track) in catalog.top_tracks.iter().enumerate() {
            rank_stmt.execute(params![i64::try_from(rank)?, track.id])?;
        }
    }

    tx.commit().context("Committing catalog import failed")?;
    info!(
        "Imported {written} tracks ({} ranked as top tracks)",
        catalog.top_tracks.len()
    );
    Ok(written)
}

const TRACK_COLUMNS: &str = "t.id, t.name, t.artist, t.popularity,
     f.track_id, f.danceability, f.energy, f.valence, f.tempo";

fn track_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<TrackRecord> {
    let analysed: Option<String> = row.get(4)?;
    let audio_features = match analysed {
        Some(_) => Some(AudioFeatures {
            danceability: row.get(5)?,
            energy: row.get(6)?,
            valence: row.get(7)?,
            tempo: row.get(8)?,
        }),
        None => None,
    };

    Ok(TrackRecord {
        id: row.get(0)?,
        name: row.get(1)?,
        artist: row.get(2)?,
        popularity: row.get(3)?,
        audio_features,
    })
}

fn collect_tracks(conn: &Connection, sql: &str, params: impl rusqlite::Params) -> Result<Vec<TrackRecord>> {
    let mut stmt = conn
        .prepare(sql)
        .with_context(|| format!("Invalid SQL statement: {sql}"))?;
    let rows = stmt.query_map(params, track_from_row).context("Cannot query tracks")?;

    let mut tracks = Vec::new();
    for track in rows {
        tracks.push(track.context("Failed to read track row")?);
    }
    trace!("Loaded {} tracks", tracks.len());
    Ok(tracks)
}

/// Every stored track with its features, ordered by artist then name.
///
/// # Errors
///
/// Fails on any SQL error.
pub fn retrieve_tracks(conn: &Connection) -> Result<Vec<TrackRecord>> {
    let sql = format!(
        "SELECT {TRACK_COLUMNS} FROM tracks t
         LEFT JOIN audio_features f ON f.track_id = t.id
         ORDER BY t.artist, t.name, t.id"
    );
    collect_tracks(conn, &sql, [])
}

/// Look up one track by id.
///
/// # Errors
///
/// Fails on any SQL error; an unknown id is `Ok(None)`.
pub fn retrieve_track(conn: &Connection, id: &str) -> Result<Option<TrackRecord>> {
    let sql = format!(
        "SELECT {TRACK_COLUMNS} FROM tracks t
         LEFT JOIN audio_features f ON f.track_id = t.id
         WHERE t.id = ?1"
    );
    conn.query_row(&sql, [id], track_from_row)
        .optional()
        .with_context(|| format!("Failed to query track {id}"))
}

/// [`TrackSource`] backed by the local store.
pub struct SqliteCatalog {
    conn: Connection,
}

impl SqliteCatalog {
    #[must_use]
    pub fn new(conn: Connection) -> Self {
        Self { conn }
    }

    /// # Errors
    ///
    /// See [`open`].
    pub fn open(path: &Path) -> Result<Self> {
        Ok(Self::new(open(path)?))
    }
}

impl TrackSource for SqliteCatalog {
    fn top_tracks(&self, limit: usize) -> Result<Vec<TrackRecord>> {
        let sql = "SELECT t.id, t.name, t.artist, t.popularity
                   FROM top_tracks r JOIN tracks t ON t.id = r.track_id
                   ORDER BY r.rank LIMIT ?1";
        let mut stmt = self.conn.prepare(sql)?;
        let rows = stmt.query_map([i64::try_from(limit)?], |row| {
            Ok(TrackRecord {
                id: row.get(0)?,
                name: row.get(1)?,
                artist: row.get(2)?,
                popularity: row.get(3)?,
                audio_features: None,
            })
        })?;
        rows.collect::<rusqlite::Result<Vec<_>>>()
            .context("Failed to read top tracks")
    }

    /// Catalog tracks outside the top list, in insertion order.
    ///
    /// The store has no similarity index, so the seeds only log which request
    /// this pool answers.
    fn recommendations(&self, seed_ids: &[String], limit: usize) -> Result<Vec<TrackRecord>> {
        debug!("Building candidate pool for seeds {seed_ids:?}");
        let sql = "SELECT t.id, t.name, t.artist, t.popularity FROM tracks t
                   WHERE t.id NOT IN (SELECT track_id FROM top_tracks)
                   ORDER BY t.rowid LIMIT ?1";
        let mut stmt = self.conn.prepare(sql)?;
        let rows = stmt.query_map([i64::try_from(limit)?], |row| {
            Ok(TrackRecord {
                id: row.get(0)?,
                name: row.get(1)?,
                artist: row.get(2)?,
                popularity: row.get(3)?,
                audio_features: None,
            })
        })?;
        rows.collect::<rusqlite::Result<Vec<_>>>()
            .context("Failed to read candidate pool")
    }

    fn audio_features(&self, ids: &[String]) -> Result<Vec<Option<AudioFeatures>>> {
        let mut stmt = self.conn.prepare(
            "SELECT danceability, energy, valence, tempo FROM audio_features WHERE track_id = ?1",
        )?;
        let features = ids
            .iter()
            .map(|id| {
                stmt.query_row([id], |row| {
                    Ok(AudioFeatures {
                        danceability: row.get(0)?,
                        energy: row.get(1)?,
                        valence: row.get(2)?,
                        tempo: row.get(3)?,
                    })
                })
                .optional()
                .with_context(|| format!("Failed to query audio features for {id}"))
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(features)
    }
}
