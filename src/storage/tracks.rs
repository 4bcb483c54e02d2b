//! Track repository
//!
//! Tracks are not reconciled: a bulk load clears the registry and rebuilds
//! it from every stored row. Groups must be loaded first.

use rusqlite::{params, Connection};
use tracing::{debug, info, warn};
use crate::document::{self, TrackDocument};
use crate::registry::{GroupRegistry, TrackRegistry};
use crate::track::Track;
use crate::Result;
use super::upsert::{self, UpsertOutcome, UpsertSql};

pub struct TrackRepository<'a> {
    conn: &'a Connection,
    table: &'a str,
}

impl<'a> TrackRepository<'a> {
    pub(crate) fn new(conn: &'a Connection, table: &'a str) -> Self {
        Self { conn, table }
    }

    /// Replace the registry contents with every stored track.
    ///
    /// Rows that fail to decode are logged and skipped. Returns the number
    /// of tracks loaded.
    pub fn load_all(&self, tracks: &mut TrackRegistry, groups: &GroupRegistry) -> Result<usize> {
        tracks.clear();
        self.rebuild(tracks, groups)
            .inspect(|loaded| info!("Loaded {} tracks", loaded))
            .inspect_err(|e| warn!("Track load aborted: {}", e))
    }

    fn rebuild(&self, tracks: &mut TrackRegistry, groups: &GroupRegistry) -> Result<usize> {
        let mut stmt = self.conn.prepare(&format!("SELECT name, data FROM {}", self.table))?;
        let rows = stmt
            .query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?)))?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        let mut loaded = 0;
        for (name, data) in rows {
            let doc: TrackDocument = match document::from_json(&data) {
                Ok(doc) => doc,
                Err(e) => {
                    warn!("Skipping track {} with unreadable data: {}", name, e);
                    continue;
                }
            };
            tracks.push(document::decode_track(&name, &doc, groups))?;
            loaded += 1;
        }
        Ok(loaded)
    }

    /// Write the full track snapshot, keyed by name.
    pub fn save(&self, track: &Track, groups: &GroupRegistry) -> Result<UpsertOutcome> {
        self.try_save(track, groups)
            .inspect(|outcome| debug!("Saved track {} ({:?})", track.name(), outcome))
            .inspect_err(|e| warn!("Failed to save track {}: {}", track.name(), e))
    }

    fn try_save(&self, track: &Track, groups: &GroupRegistry) -> Result<UpsertOutcome> {
        let json = document::to_json(&document::encode_track(track, groups))?;
        let sql = UpsertSql::keyed_document(self.table, "name");
        upsert::upsert(
            self.conn,
            &sql,
            track.name(),
            params![json, track.name()],
            params![track.name(), json],
        )
    }

    /// Delete the stored row only. The registry entry is left alone.
    pub fn delete(&self, track: &Track) -> Result<bool> {
        upsert::delete(self.conn, self.table, "name", track.name())
            .inspect_err(|e| warn!("Failed to delete track {}: {}", track.name(), e))
    }

    pub fn count(&self) -> Result<usize> {
        upsert::count(self.conn, self.table)
    }
}
