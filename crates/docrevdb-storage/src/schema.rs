use rusqlite::Connection;

use docrevdb_core::Result;

use crate::error::map_sqlite_err;

/// The authoritative `docs` table (spec §6). `sequence` is the replication
/// cursor: `AUTOINCREMENT` guarantees it is never reused even across
/// deletes, which is what lets a remembered `lastSequence` survive restarts
/// and compaction.
const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS docs (
    sequence INTEGER PRIMARY KEY AUTOINCREMENT,
    docid    TEXT NOT NULL,
    revid    TEXT NOT NULL,
    parent   INTEGER NULL REFERENCES docs(sequence) ON DELETE SET NULL,
    current  BOOLEAN NOT NULL,
    deleted  BOOLEAN NOT NULL DEFAULT 0,
    json     BLOB NULL
);

CREATE UNIQUE INDEX IF NOT EXISTS docs_docid_revid ON docs(docid, revid);
CREATE INDEX IF NOT EXISTS docs_docid_current ON docs(docid, current);
CREATE INDEX IF NOT EXISTS docs_current ON docs(current);
"#;

pub(crate) fn init(conn: &Connection) -> Result<()> {
    conn.execute_batch("PRAGMA foreign_keys = ON;")
        .map_err(map_sqlite_err)?;
    conn.execute_batch(SCHEMA).map_err(map_sqlite_err)?;
    Ok(())
}
