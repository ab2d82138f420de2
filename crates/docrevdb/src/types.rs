//! Request/response shapes that sit above the `docs` table but aren't part
//! of the core vocabulary (`docrevdb-core` doesn't know about `tokio` or
//! pagination) — the ambient "query options" surface spec §6 describes.
use docrevdb_core::{RevId, Revision};

/// `{ startKey?, endKey?, skip=0, limit=INT_MAX, descending=false,
/// includeDocs=false, updateSeq=false }` (spec §6), scoped to
/// `allDocuments`. `startKey`/`endKey` are accepted for API compatibility
/// with the replication summarization endpoint but filtering by key range
/// is a secondary-index query the core explicitly leaves out of scope
/// (spec §1 Non-goals) — only `skip`/`limit`/`descending` are applied here.
#[derive(Debug, Clone, Default)]
pub struct AllDocumentsOptions {
    pub skip: u64,
    pub limit: Option<u64>,
    pub descending: bool,
    pub include_docs: bool,
    pub update_seq: bool,
}

#[derive(Debug, Clone)]
pub struct AllDocumentsResult {
    pub rows: Vec<Revision>,
    pub total_rows: u64,
    pub offset: u64,
    pub update_seq: Option<i64>,
}

/// Options for [`DocumentStore::changes_since`](crate::DocumentStore::changes_since)
/// (spec §4.4.1), plus the `doc_ids` allowlist CouchDB's
/// `_changes?filter=_doc_ids` exposes and the teacher's `ChangesOptions`
/// already modeled.
#[derive(Debug, Clone, Default)]
pub struct ChangesOptions {
    pub limit: Option<u64>,
    pub doc_ids: Option<Vec<String>>,
}

/// The payload dispatched to observers after a committed mutation (spec
/// §6 "Change notification payload").
#[derive(Debug, Clone)]
pub struct ChangeNotification {
    pub rev: Revision,
    pub seq: i64,
}

/// Status returned by [`DocumentStore::load_body`](crate::DocumentStore::load_body)
/// (spec §4.3.2).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadStatus {
    Ok,
    NotFound,
}

/// Input to [`DocumentStore::force_insert`](crate::DocumentStore::force_insert)
/// (spec §4.3.4): a remote revision chain to splice into the local tree.
/// `history` is ordered newest-to-oldest and its first entry must equal
/// `leaf_rev_id`.
#[derive(Debug, Clone)]
pub struct ForceInsertRequest {
    pub doc_id: String,
    pub leaf_rev_id: RevId,
    pub deleted: bool,
    pub body: Option<serde_json::Value>,
    pub history: Vec<RevId>,
}
