//! SQLite output backend (feature `sqlite`).
//!
//! Creates a single `output.db` file in the configured output directory with
//! three tables: `trajectory`, `episodes` and `metrics`.  Optional values
//! are stored as NULL.

use std::path::Path;

use rusqlite::Connection;

use crate::writer::OutputWriter;
use crate::{EpisodeRow, MetricRow, OutputResult, TrajectoryRow};

/// Writes simulation output to an SQLite database.
pub struct SqliteWriter {
    conn:     Connection,
    finished: bool,
}

impl SqliteWriter {
    /// Create `dir` if needed, open (or create) `output.db` in it and
    /// initialise the schema.
    pub fn new(dir: &Path) -> OutputResult<Self> {
        std::fs::create_dir_all(dir)?;
        let conn = Connection::open(dir.join("output.db"))?;

        conn.execute_batch(
            "PRAGMA journal_mode = WAL;
             PRAGMA synchronous  = NORMAL;
             CREATE TABLE IF NOT EXISTS trajectory (
                 episode    INTEGER NOT NULL,
                 time_secs  REAL    NOT NULL,
                 event      TEXT    NOT NULL,
                 bus        INTEGER NOT NULL,
                 route      INTEGER NOT NULL,
                 stop       INTEGER,
                 stop_index INTEGER,
                 status     TEXT    NOT NULL,
                 load       INTEGER NOT NULL,
                 location_m REAL    NOT NULL
             );
             CREATE TABLE IF NOT EXISTS episodes (
                 episode         INTEGER PRIMARY KEY,
                 seed            INTEGER NOT NULL,
                 completed_trips INTEGER NOT NULL,
                 truncated_trips INTEGER NOT NULL,
                 holds           INTEGER NOT NULL,
                 total_hold_secs REAL    NOT NULL,
                 warnings        INTEGER NOT NULL
             );
             CREATE TABLE IF NOT EXISTS metrics (
                 episode   INTEGER NOT NULL,
                 metric    TEXT    NOT NULL,
                 route     INTEGER NOT NULL,
                 aggregate TEXT    NOT NULL,
                 stop      INTEGER,
                 bucket    INTEGER,
                 mean      REAL    NOT NULL,
                 std       REAL    NOT NULL,
                 count     INTEGER NOT NULL
             );",
        )?;

        Ok(Self { conn, finished: false })
    }
}

impl OutputWriter for SqliteWriter {
    fn write_trajectory(&mut self, rows: &[TrajectoryRow]) -> OutputResult<()> {
        if rows.is_empty() {
            return Ok(());
        }
        let tx = self.conn.unchecked_transaction()?;
        {
            let mut stmt = tx.prepare_cached(
                "INSERT INTO trajectory \
                 (episode, time_secs, event, bus, route, stop, stop_index, status, load, location_m) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
            )?;
            for row in rows {
                stmt.execute(rusqlite::params![
                    row.episode,
                    row.time_secs,
                    row.event,
                    row.bus,
                    row.route,
                    row.stop,
                    row.stop_index,
                    row.status,
                    row.load,
                    row.location_m,
                ])?;
            }
        }
        tx.commit()?;
        Ok(())
    }

    fn write_episode(&mut self, row: &EpisodeRow) -> OutputResult<()> {
        self.conn.execute(
            "INSERT INTO episodes \
             (episode, seed, completed_trips, truncated_trips, holds, total_hold_secs, warnings) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            rusqlite::params![
                row.episode,
                // INTEGER is signed 64-bit; keep the seed's bit pattern.
                row.seed as i64,
                row.completed_trips,
                row.truncated_trips,
                row.holds,
                row.total_hold_secs,
                row.warnings,
            ],
        )?;
        Ok(())
    }

    fn write_metrics(&mut self, rows: &[MetricRow]) -> OutputResult<()> {
        if rows.is_empty() {
            return Ok(());
        }
        let tx = self.conn.unchecked_transaction()?;
        {
            let mut stmt = tx.prepare_cached(
                "INSERT INTO metrics \
                 (episode, metric, route, aggregate, stop, bucket, mean, std, count) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            )?;
            for row in rows {
                stmt.execute(rusqlite::params![
                    row.episode,
                    row.metric,
                    row.route,
                    row.aggregate,
                    row.stop,
                    row.bucket,
                    row.mean,
                    row.std,
                    row.count as i64,
                ])?;
            }
        }
        tx.commit()?;
        Ok(())
    }

    fn finish(&mut self) -> OutputResult<()> {
        if self.finished {
            return Ok(());
        }
        self.finished = true;
        self.conn.execute_batch("PRAGMA wal_checkpoint(TRUNCATE);")?;
        Ok(())
    }
}
