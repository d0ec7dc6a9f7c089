//! Tile row operations: transactional fan-out insert, ordered scans,
//! size accounting, and global oldest-first eviction.

use rusqlite::params;

use crate::codec;
use crate::database::Database;
use crate::error::Result;
use crate::models::{Stroke, TileCoord};

/// One persisted row: a stroke replicated into a single tile.
#[derive(Debug, Clone)]
pub struct TileRow {
    pub z: i64,
    pub tx: i64,
    pub ty: i64,
    pub t: i64,
    pub id: String,
    pub payload: Vec<u8>,
}

/// Store size snapshot used by the eviction policy and `/api/db-status`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StoreStats {
    pub total_bytes: u64,
    pub row_count: u64,
}

impl Database {
    /// Append rows in one transaction. All or nothing: a failure on any row
    /// rolls the whole batch back.
    pub fn insert_many(&mut self, rows: &[TileRow]) -> Result<()> {
        let tx = self.conn_mut().transaction()?;
        {
            let mut stmt = tx.prepare_cached(
                "INSERT INTO strokes (z, tx, ty, t, id, payload)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            )?;
            for row in rows {
                stmt.execute(params![
                    row.z, row.tx, row.ty, row.t, row.id, row.payload,
                ])?;
            }
        }
        tx.commit()?;
        Ok(())
    }

    /// All strokes of one tile, ordered by `(t, insertion)` ascending.
    ///
    /// Rows whose payload fails to inflate are skipped, not surfaced.
    pub fn scan(&self, z: i64, tx: i64, ty: i64) -> Result<Vec<Stroke>> {
        self.scan_since(z, tx, ty, i64::MIN)
    }

    /// Strokes of one tile with `t > t0`, ordered by `(t, insertion)`.
    pub fn scan_since(&self, z: i64, tx: i64, ty: i64, t0: i64) -> Result<Vec<Stroke>> {
        let mut stmt = self.conn().prepare_cached(
            "SELECT payload FROM strokes
             WHERE z = ?1 AND tx = ?2 AND ty = ?3 AND t > ?4
             ORDER BY t ASC, rowid ASC",
        )?;

        let rows = stmt.query_map(params![z, tx, ty, t0], |row| {
            row.get::<_, Vec<u8>>(0)
        })?;

        let mut strokes = Vec::new();
        for payload in rows {
            if let Some(stroke) = codec::decompress(&payload?) {
                strokes.push(stroke);
            }
        }
        Ok(strokes)
    }

    /// Total database size (pages on disk) and row count.
    pub fn stats(&self) -> Result<StoreStats> {
        let page_count: u64 = self
            .conn()
            .pragma_query_value(None, "page_count", |row| row.get(0))?;
        let page_size: u64 = self
            .conn()
            .pragma_query_value(None, "page_size", |row| row.get(0))?;
        let row_count: u64 = self.conn().query_row(
            "SELECT COUNT(*) FROM strokes",
            [],
            |row| row.get(0),
        )?;

        Ok(StoreStats {
            total_bytes: page_count * page_size,
            row_count,
        })
    }

    /// Delete the `n` globally oldest rows, ordered by `(t, insertion)`.
    ///
    /// Oldest-first across all tiles, not per-tile: recent activity stays
    /// consistent everywhere while history degrades uniformly.
    pub fn evict_oldest(&mut self, n: u64) -> Result<usize> {
        let deleted = self.conn().execute(
            "DELETE FROM strokes WHERE rowid IN (
                 SELECT rowid FROM strokes ORDER BY t ASC, rowid ASC LIMIT ?1
             )",
            params![n as i64],
        )?;
        Ok(deleted)
    }

    /// Hand freed pages back to the filesystem after an eviction pass.
    pub fn compact(&mut self) -> Result<()> {
        self.conn().execute_batch("PRAGMA incremental_vacuum;")?;
        Ok(())
    }
}
