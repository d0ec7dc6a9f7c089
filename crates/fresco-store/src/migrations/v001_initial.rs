//! v001 -- Initial schema creation.
//!
//! One table holds every tile row; a stroke that spans N tiles contributes
//! N rows sharing the same `t` and `id`.

use rusqlite::Connection;

/// SQL executed when upgrading from version 0 to version 1.
const UP_SQL: &str = r#"
-- ----------------------------------------------------------------
-- Tile rows
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS strokes (
    z       INTEGER NOT NULL,     -- zoom level, currently always 0
    tx      INTEGER NOT NULL,     -- tile column
    ty      INTEGER NOT NULL,     -- tile row
    t       INTEGER NOT NULL,     -- server-assigned ms since epoch
    id      TEXT    NOT NULL,     -- stroke id, shared by all rows of one stroke
    payload BLOB    NOT NULL      -- gzip-compressed canonical stroke JSON
);

-- Per-tile timeline scans
CREATE INDEX IF NOT EXISTS idx_strokes_tile_t
    ON strokes(z, tx, ty, t);

-- Global oldest-first eviction
CREATE INDEX IF NOT EXISTS idx_strokes_t
    ON strokes(t);
"#;

/// Apply the initial migration.
pub fn up(conn: &Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(UP_SQL)
}
