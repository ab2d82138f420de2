use std::collections::HashSet;
use std::sync::Mutex as StdMutex;

use rusqlite::{Connection, OptionalExtension, Row, params};
use tokio::sync::Mutex as AsyncMutex;

use docrevdb_core::document::RevisionKey;
use docrevdb_core::{DocError, RevId, Result, Revision};

use crate::config::{StorageConfig, StoragePath};
use crate::error::map_sqlite_err;
use crate::schema;
use crate::txn::TxnScope;

const SELECT_COLUMNS: &str = "sequence, docid, revid, parent, current, deleted, json";

fn row_to_revision(row: &Row<'_>) -> rusqlite::Result<Revision> {
    let revid_str: String = row.get(2)?;
    let rev_id = RevId::parse(&revid_str)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(2, rusqlite::types::Type::Text, Box::new(e)))?;
    let json_text: Option<String> = row.get(6)?;
    let body = json_text
        .map(|s| serde_json::from_str(&s))
        .transpose()
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(6, rusqlite::types::Type::Text, Box::new(e)))?;
    Ok(Revision {
        sequence: Some(row.get(0)?),
        doc_id: row.get(1)?,
        rev_id,
        parent_sequence: row.get(3)?,
        current: row.get(4)?,
        deleted: row.get(5)?,
        body,
    })
}

/// Thin adapter over `rusqlite` exposing typed statements against the `docs`
/// table (spec §2.4). Owns the single connection a `DocumentStore`
/// encapsulates (spec §5): all access goes through `conn`, serialized by an
/// async mutex so callers don't block the executor thread pool indefinitely
/// while another in-process caller holds the connection.
pub struct Storage {
    conn: AsyncMutex<Connection>,
    depth: StdMutex<u32>,
    failed: StdMutex<bool>,
}

impl Storage {
    pub async fn open(config: StorageConfig) -> Result<Self> {
        let conn = match &config.path {
            StoragePath::Memory => Connection::open_in_memory().map_err(map_sqlite_err)?,
            StoragePath::File(path) => Connection::open(path).map_err(map_sqlite_err)?,
        };
        conn.busy_timeout(std::time::Duration::from_millis(config.busy_timeout_ms as u64))
            .map_err(map_sqlite_err)?;
        conn.pragma_update(None, "cache_size", config.cache_size)
            .map_err(map_sqlite_err)?;
        schema::init(&conn)?;
        Ok(Storage {
            conn: AsyncMutex::new(conn),
            depth: StdMutex::new(0),
            failed: StdMutex::new(false),
        })
    }

    // -- transaction scoping (spec §4.2) ------------------------------------

    pub async fn begin(&self) -> Result<TxnScope<'_>> {
        let depth_now = {
            let mut depth = self.depth.lock().unwrap();
            *depth += 1;
            *depth
        };
        if depth_now == 1 {
            *self.failed.lock().unwrap() = false;
            let conn = self.conn.lock().await;
            conn.execute_batch("BEGIN IMMEDIATE").map_err(map_sqlite_err)?;
        }
        Ok(TxnScope::new(self))
    }

    pub(crate) fn mark_failed(&self) {
        *self.failed.lock().unwrap() = true;
    }

    pub(crate) async fn end_scope(&self) -> Result<()> {
        let depth_now = {
            let mut depth = self.depth.lock().unwrap();
            *depth -= 1;
            *depth
        };
        if depth_now == 0 {
            let failed = {
                let mut f = self.failed.lock().unwrap();
                let v = *f;
                *f = false;
                v
            };
            let conn = self.conn.lock().await;
            if failed {
                tracing::debug!("rolling back transaction after fail-flag set");
                conn.execute_batch("ROLLBACK").map_err(map_sqlite_err)?;
            } else {
                conn.execute_batch("COMMIT").map_err(map_sqlite_err)?;
            }
        }
        Ok(())
    }

    // -- typed statements against `docs` -------------------------------------

    pub async fn insert_revision(
        &self,
        doc_id: &str,
        rev_id: &RevId,
        parent_sequence: Option<i64>,
        current: bool,
        deleted: bool,
        json: Option<&serde_json::Value>,
    ) -> Result<i64> {
        let conn = self.conn.lock().await;
        let json_text = json.map(|v| v.to_string());
        conn.execute(
            "INSERT INTO docs (docid, revid, parent, current, deleted, json) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![doc_id, rev_id.to_string(), parent_sequence, current, deleted, json_text],
        )
        .map_err(map_sqlite_err)?;
        Ok(conn.last_insert_rowid())
    }

    pub async fn demote(&self, sequence: i64) -> Result<()> {
        let conn = self.conn.lock().await;
        conn.execute(
            "UPDATE docs SET current = 0 WHERE sequence = ?1",
            params![sequence],
        )
        .map_err(map_sqlite_err)?;
        Ok(())
    }

    /// Any row `(docid, revid)`, whatever its `current`/`deleted` state.
    /// Used by `get(docID, revID)` and by `forceInsert`'s "already present
    /// locally" check.
    pub async fn get_by_doc_and_rev(&self, doc_id: &str, rev_id: &RevId) -> Result<Option<Revision>> {
        let conn = self.conn.lock().await;
        conn.query_row(
            &format!("SELECT {SELECT_COLUMNS} FROM docs WHERE docid = ?1 AND revid = ?2"),
            params![doc_id, rev_id.to_string()],
            row_to_revision,
        )
        .optional()
        .map_err(map_sqlite_err)
    }

    /// The row `(docid, revid)` with `current = 1` — spec §4.3.3 step 2's
    /// "find the row (docID, revID=prevRevID, current=true)".
    pub async fn find_current_by_doc_and_rev(
        &self,
        doc_id: &str,
        rev_id: &RevId,
    ) -> Result<Option<Revision>> {
        let conn = self.conn.lock().await;
        conn.query_row(
            &format!(
                "SELECT {SELECT_COLUMNS} FROM docs WHERE docid = ?1 AND revid = ?2 AND current = 1"
            ),
            params![doc_id, rev_id.to_string()],
            row_to_revision,
        )
        .optional()
        .map_err(map_sqlite_err)
    }

    /// Any current row for `doc_id`, regardless of deleted state — used to
    /// tell "document has no current revision" from "document has one" in
    /// spec §4.3.3 step 2.
    pub async fn find_any_current(&self, doc_id: &str) -> Result<Option<Revision>> {
        let conn = self.conn.lock().await;
        conn.query_row(
            &format!("SELECT {SELECT_COLUMNS} FROM docs WHERE docid = ?1 AND current = 1 LIMIT 1"),
            params![doc_id],
            row_to_revision,
        )
        .optional()
        .map_err(map_sqlite_err)
    }

    /// The current, non-deleted revision with the lexicographically
    /// greatest `revid` (spec §4.3.1, §9 "largest revID wins").
    pub async fn get_latest_current(&self, doc_id: &str) -> Result<Option<Revision>> {
        let conn = self.conn.lock().await;
        conn.query_row(
            &format!(
                "SELECT {SELECT_COLUMNS} FROM docs WHERE docid = ?1 AND current = 1 AND deleted = 0 \
                 ORDER BY revid DESC LIMIT 1"
            ),
            params![doc_id],
            row_to_revision,
        )
        .optional()
        .map_err(map_sqlite_err)
    }

    pub async fn get_by_sequence(&self, sequence: i64) -> Result<Option<Revision>> {
        let conn = self.conn.lock().await;
        conn.query_row(
            &format!("SELECT {SELECT_COLUMNS} FROM docs WHERE sequence = ?1"),
            params![sequence],
            row_to_revision,
        )
        .optional()
        .map_err(map_sqlite_err)
    }

    /// Every row for `doc_id`, newest sequence first (spec §4.5.2).
    pub async fn get_all_revisions(&self, doc_id: &str) -> Result<Vec<Revision>> {
        let conn = self.conn.lock().await;
        let mut stmt = conn
            .prepare(&format!(
                "SELECT {SELECT_COLUMNS} FROM docs WHERE docid = ?1 ORDER BY sequence DESC"
            ))
            .map_err(map_sqlite_err)?;
        let rows = stmt
            .query_map(params![doc_id], row_to_revision)
            .map_err(map_sqlite_err)?;
        rows.collect::<rusqlite::Result<Vec<_>>>().map_err(map_sqlite_err)
    }

    /// Rows with `sequence > since AND current = 1`, ascending, optionally
    /// restricted to `doc_ids` (the `_doc_ids` changes filter) and capped at
    /// `limit` (spec §4.4.1).
    pub async fn changes_since(
        &self,
        since: i64,
        limit: Option<u64>,
        doc_ids: Option<&[String]>,
    ) -> Result<Vec<Revision>> {
        let conn = self.conn.lock().await;
        let mut sql = format!(
            "SELECT {SELECT_COLUMNS} FROM docs WHERE sequence > ?1 AND current = 1"
        );
        if let Some(ids) = doc_ids {
            if ids.is_empty() {
                return Ok(Vec::new());
            }
            let placeholders = ids.iter().map(|_| "?").collect::<Vec<_>>().join(", ");
            sql.push_str(&format!(" AND docid IN ({placeholders})"));
        }
        sql.push_str(" ORDER BY sequence ASC");
        if let Some(limit) = limit {
            sql.push_str(&format!(" LIMIT {limit}"));
        }
        let mut stmt = conn.prepare(&sql).map_err(map_sqlite_err)?;
        let rows = if let Some(ids) = doc_ids {
            let mut params: Vec<&dyn rusqlite::ToSql> = vec![&since];
            for id in ids {
                params.push(id);
            }
            stmt.query_map(params.as_slice(), row_to_revision)
                .map_err(map_sqlite_err)?
                .collect::<rusqlite::Result<Vec<_>>>()
        } else {
            stmt.query_map(params![since], row_to_revision)
                .map_err(map_sqlite_err)?
                .collect::<rusqlite::Result<Vec<_>>>()
        };
        rows.map_err(map_sqlite_err)
    }

    /// Current, non-deleted rows ordered by `docid`, paginated (spec
    /// §4.5.4 `allDocuments`).
    pub async fn all_docs(&self, descending: bool, skip: u64, limit: Option<u64>) -> Result<Vec<Revision>> {
        let conn = self.conn.lock().await;
        let order = if descending { "DESC" } else { "ASC" };
        let mut sql = format!(
            "SELECT {SELECT_COLUMNS} FROM docs WHERE current = 1 AND deleted = 0 ORDER BY docid {order}"
        );
        sql.push_str(&format!(" LIMIT {} OFFSET {}", limit.unwrap_or(i64::MAX as u64), skip));
        let mut stmt = conn.prepare(&sql).map_err(map_sqlite_err)?;
        let rows = stmt.query_map([], row_to_revision).map_err(map_sqlite_err)?;
        rows.collect::<rusqlite::Result<Vec<_>>>().map_err(map_sqlite_err)
    }

    pub async fn document_count(&self) -> Result<u64> {
        let conn = self.conn.lock().await;
        let count: i64 = conn
            .query_row(
                "SELECT COUNT(DISTINCT docid) FROM docs WHERE current = 1 AND deleted = 0",
                [],
                |row| row.get(0),
            )
            .map_err(map_sqlite_err)?;
        Ok(count as u64)
    }

    pub async fn last_sequence(&self) -> Result<i64> {
        let conn = self.conn.lock().await;
        let seq: Option<i64> = conn
            .query_row("SELECT MAX(sequence) FROM docs", [], |row| row.get(0))
            .map_err(map_sqlite_err)?;
        Ok(seq.unwrap_or(0))
    }

    /// Discards bodies of every non-current row (spec §4.3.5). Irreversible.
    pub async fn compact(&self) -> Result<u64> {
        let conn = self.conn.lock().await;
        let affected = conn
            .execute(
                "UPDATE docs SET json = NULL WHERE current = 0 AND json IS NOT NULL",
                [],
            )
            .map_err(map_sqlite_err)?;
        Ok(affected as u64)
    }

    /// The `(docid, revid)` pairs that already exist locally among the
    /// given `doc_ids` — a single indexed query over the union of document
    /// ids feeding `findMissing`'s set-difference (spec §4.5.1).
    pub async fn existing_keys_for_docs(&self, doc_ids: &[String]) -> Result<HashSet<RevisionKey>> {
        if doc_ids.is_empty() {
            return Ok(HashSet::new());
        }
        let conn = self.conn.lock().await;
        let placeholders = doc_ids.iter().map(|_| "?").collect::<Vec<_>>().join(", ");
        let sql = format!("SELECT docid, revid FROM docs WHERE docid IN ({placeholders})");
        let mut stmt = conn.prepare(&sql).map_err(map_sqlite_err)?;
        let params: Vec<&dyn rusqlite::ToSql> =
            doc_ids.iter().map(|id| id as &dyn rusqlite::ToSql).collect();
        let rows = stmt
            .query_map(params.as_slice(), |row| {
                let doc_id: String = row.get(0)?;
                let revid_str: String = row.get(1)?;
                Ok((doc_id, revid_str))
            })
            .map_err(map_sqlite_err)?;
        let mut keys = HashSet::new();
        for row in rows {
            let (doc_id, revid_str) = row.map_err(map_sqlite_err)?;
            let rev_id = RevId::parse(&revid_str).map_err(|_| {
                DocError::Internal(format!("corrupt revid stored for {doc_id}: {revid_str}"))
            })?;
            keys.insert(RevisionKey { doc_id, rev_id });
        }
        Ok(keys)
    }

    /// Total row count in `docs`, including non-current and compacted rows.
    /// Exposed mainly for tests asserting no-partial-write behavior (spec
    /// property P8).
    pub async fn row_count(&self) -> Result<i64> {
        let conn = self.conn.lock().await;
        conn.query_row("SELECT COUNT(*) FROM docs", [], |row| row.get(0))
            .map_err(map_sqlite_err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn open_memory() -> Storage {
        Storage::open(StorageConfig::memory()).await.unwrap()
    }

    #[tokio::test]
    async fn insert_and_fetch_by_doc_and_rev() {
        let storage = open_memory().await;
        let rev_id = RevId::parse("1-abc").unwrap();
        let seq = storage
            .insert_revision("d1", &rev_id, None, true, false, Some(&serde_json::json!({"x": 1})))
            .await
            .unwrap();
        assert_eq!(seq, 1);

        let found = storage.get_by_doc_and_rev("d1", &rev_id).await.unwrap().unwrap();
        assert_eq!(found.doc_id, "d1");
        assert_eq!(found.sequence, Some(1));
        assert_eq!(found.body.unwrap()["x"], 1);
    }

    #[tokio::test]
    async fn demote_clears_current_flag() {
        let storage = open_memory().await;
        let rev_id = RevId::parse("1-abc").unwrap();
        let seq = storage
            .insert_revision("d1", &rev_id, None, true, false, None)
            .await
            .unwrap();
        storage.demote(seq).await.unwrap();
        assert!(storage.find_any_current("d1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn last_sequence_and_document_count() {
        let storage = open_memory().await;
        assert_eq!(storage.last_sequence().await.unwrap(), 0);
        assert_eq!(storage.document_count().await.unwrap(), 0);

        let rev_id = RevId::parse("1-abc").unwrap();
        storage
            .insert_revision("d1", &rev_id, None, true, false, None)
            .await
            .unwrap();
        assert_eq!(storage.last_sequence().await.unwrap(), 1);
        assert_eq!(storage.document_count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn compact_clears_non_current_bodies_only() {
        let storage = open_memory().await;
        let r1 = RevId::parse("1-a").unwrap();
        let r2 = RevId::parse("2-b").unwrap();
        let seq1 = storage
            .insert_revision("d1", &r1, None, true, false, Some(&serde_json::json!({"v": 1})))
            .await
            .unwrap();
        storage.demote(seq1).await.unwrap();
        storage
            .insert_revision("d1", &r2, Some(seq1), true, false, Some(&serde_json::json!({"v": 2})))
            .await
            .unwrap();

        let affected = storage.compact().await.unwrap();
        assert_eq!(affected, 1);

        let old = storage.get_by_doc_and_rev("d1", &r1).await.unwrap().unwrap();
        assert!(old.body.is_none());
        let current = storage.get_by_doc_and_rev("d1", &r2).await.unwrap().unwrap();
        assert!(current.body.is_some());
    }

    #[tokio::test]
    async fn transaction_rolls_back_on_failure() {
        let storage = open_memory().await;
        let scope = storage.begin().await.unwrap();
        let rev_id = RevId::parse("1-abc").unwrap();
        storage
            .insert_revision("d1", &rev_id, None, true, false, None)
            .await
            .unwrap();
        scope.fail();
        scope.end().await.unwrap();

        assert_eq!(storage.row_count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn transaction_commits_without_failure() {
        let storage = open_memory().await;
        let scope = storage.begin().await.unwrap();
        let rev_id = RevId::parse("1-abc").unwrap();
        storage
            .insert_revision("d1", &rev_id, None, true, false, None)
            .await
            .unwrap();
        scope.end().await.unwrap();

        assert_eq!(storage.row_count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn existing_keys_for_docs_finds_union() {
        let storage = open_memory().await;
        let r1 = RevId::parse("1-a").unwrap();
        storage.insert_revision("d1", &r1, None, true, false, None).await.unwrap();

        let keys = storage
            .existing_keys_for_docs(&["d1".to_string(), "d2".to_string()])
            .await
            .unwrap();
        assert_eq!(keys.len(), 1);
        assert!(keys.contains(&RevisionKey {
            doc_id: "d1".to_string(),
            rev_id: r1,
        }));
    }
}
