use std::io::Write;
use std::path::Path;

use rusqlite::{params, Connection, OptionalExtension, Row};
use tracing::{debug, info, warn};

use crate::codec;
use crate::error::Result;
use crate::metrics;
use crate::rep::Rep;

const SCHEMA: &str = r#"
    CREATE TABLE IF NOT EXISTS reps (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        hash TEXT NOT NULL,
        start INTEGER NOT NULL,
        "end" INTEGER NOT NULL,
        name TEXT NOT NULL,
        lang TEXT NOT NULL,
        wpm REAL NOT NULL,
        raw REAL NOT NULL,
        dur INTEGER NOT NULL CHECK (dur >= 0),
        acc REAL NOT NULL CHECK (acc >= 0 AND acc <= 100),
        miss INTEGER NOT NULL CHECK (miss >= 0),
        errs INTEGER NOT NULL CHECK (errs >= 0),
        events TEXT NOT NULL,
        UNIQUE (hash, start)
    );
    CREATE INDEX IF NOT EXISTS idx_reps_hash ON reps(hash);
    CREATE INDEX IF NOT EXISTS idx_reps_start ON reps(start);
"#;

const REP_COLUMNS: &str = "hash, start, \"end\", name, lang, wpm, raw, dur, acc, miss, errs, events";

/// SQLite-backed history of completed sessions
#[derive(Debug)]
pub struct RepStore {
    conn: Connection,
}

impl RepStore {
    /// Open (creating if needed) the database at `path`
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path)?;
        debug!(path = %path.display(), "opened rep store");
        Self::init(conn)
    }

    pub fn open_in_memory() -> Result<Self> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self> {
        conn.execute_batch(SCHEMA)?;
        Ok(Self { conn })
    }

    pub fn save_rep(&self, rep: &Rep) -> Result<()> {
        self.conn.execute(
            &format!(
                "INSERT INTO reps ({REP_COLUMNS}) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)"
            ),
            params![
                rep.hash, rep.start, rep.end, rep.name, rep.lang, rep.wpm, rep.raw, rep.dur,
                rep.acc, rep.miss, rep.errs, rep.events,
            ],
        )?;
        info!(name = %rep.name, wpm = rep.wpm, acc = rep.acc, "saved rep");
        Ok(())
    }

    /// Most recent reps first
    pub fn recent_reps(&self, limit: usize) -> Result<Vec<Rep>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {REP_COLUMNS} FROM reps ORDER BY start DESC LIMIT ?1"
        ))?;
        let reps = stmt
            .query_map([limit as i64], rep_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(reps)
    }

    /// All reps of one exercise text, oldest first
    pub fn reps_for_hash(&self, hash: &str) -> Result<Vec<Rep>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {REP_COLUMNS} FROM reps WHERE hash = ?1 ORDER BY start ASC"
        ))?;
        let reps = stmt
            .query_map([hash], rep_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(reps)
    }

    pub fn best_wpm(&self, hash: &str) -> Result<Option<f64>> {
        let best = self
            .conn
            .query_row("SELECT MAX(wpm) FROM reps WHERE hash = ?1", [hash], |row| {
                row.get::<_, Option<f64>>(0)
            })
            .optional()?
            .flatten();
        Ok(best)
    }

    pub fn count(&self) -> Result<usize> {
        let n: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM reps", [], |row| row.get(0))?;
        Ok(n as usize)
    }

    /// Missed-key ranking across every stored event log.
    ///
    /// Logs are decoded leniently: a corrupt line drops that one event, not
    /// the whole rep.
    pub fn most_missed_overall(&self, limit: usize) -> Result<Vec<(String, usize)>> {
        let mut stmt = self.conn.prepare("SELECT name, events FROM reps")?;
        let blobs = stmt
            .query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?)))?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        let mut events = Vec::new();
        for (name, blob) in blobs {
            let decoded = codec::split(&blob);
            for err in &decoded.errors {
                warn!(rep = %name, error = %err, "skipping malformed event line");
            }
            events.extend(decoded.events);
        }
        Ok(metrics::missed_key_counts(&events, limit))
    }

    /// Write every rep (without its event log) as CSV, oldest first
    pub fn export_csv<W: Write>(&self, out: W) -> Result<usize> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {REP_COLUMNS} FROM reps ORDER BY start ASC"
        ))?;
        let reps = stmt
            .query_map([], rep_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        let mut writer = csv::Writer::from_writer(out);
        writer.write_record([
            "hash", "start", "end", "name", "lang", "wpm", "raw", "dur", "acc", "miss", "errs",
        ])?;
        for rep in &reps {
            writer.write_record([
                rep.hash.clone(),
                rep.start.to_string(),
                rep.end.to_string(),
                rep.name.clone(),
                rep.lang.clone(),
                format!("{:.2}", rep.wpm),
                format!("{:.2}", rep.raw),
                rep.dur.to_string(),
                format!("{:.2}", rep.acc),
                rep.miss.to_string(),
                rep.errs.to_string(),
            ])?;
        }
        writer.flush()?;
        Ok(reps.len())
    }
}

fn rep_from_row(row: &Row<'_>) -> rusqlite::Result<Rep> {
    Ok(Rep {
        hash: row.get(0)?,
        start: row.get(1)?,
        end: row.get(2)?,
        name: row.get(3)?,
        lang: row.get(4)?,
        wpm: row.get(5)?,
        raw: row.get(6)?,
        dur: row.get(7)?,
        acc: row.get(8)?,
        miss: row.get(9)?,
        errs: row.get(10)?,
        events: row.get(11)?,
    })
}
