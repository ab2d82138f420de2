//! The document-revision data model (spec §3): a `Revision` is an
//! immutable-after-commit snapshot of one document at one point in its
//! branching history; a `RevisionList` is the bag of revisions replication
//! trades back and forth when diffing two trees.
use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::error::{DocError, Result};
use crate::revid::RevId;

/// One row of the `docs` table (spec §6), minus the part of the identity
/// (`sequence`) that only exists once a row has actually been inserted.
///
/// `body` is `None` until [`body`](Revision::body) is populated — either
/// because the caller didn't ask for it, or because compaction discarded it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Revision {
    pub doc_id: String,
    pub rev_id: RevId,
    pub deleted: bool,
    pub current: bool,
    pub sequence: Option<i64>,
    pub parent_sequence: Option<i64>,
    pub body: Option<serde_json::Value>,
}

impl Revision {
    /// A revision that hasn't been assigned a sequence yet — used to build
    /// the row a write is about to insert.
    pub fn pending(
        doc_id: impl Into<String>,
        rev_id: RevId,
        deleted: bool,
        parent_sequence: Option<i64>,
        body: Option<serde_json::Value>,
    ) -> Self {
        Revision {
            doc_id: doc_id.into(),
            rev_id,
            deleted,
            current: true,
            sequence: None,
            parent_sequence,
            body,
        }
    }

    /// Returns the body, injecting `_id`/`_rev` the way spec §4.3.3 step 4
    /// requires for a non-deleted put. Returns `null` for deleted revisions.
    pub fn as_json(&self) -> serde_json::Value {
        if self.deleted {
            return serde_json::Value::Null;
        }
        let mut obj = match &self.body {
            Some(serde_json::Value::Object(m)) => m.clone(),
            Some(other) => {
                let mut m = serde_json::Map::new();
                m.insert("value".into(), other.clone());
                m
            }
            None => serde_json::Map::new(),
        };
        obj.insert("_id".into(), serde_json::Value::String(self.doc_id.clone()));
        obj.insert(
            "_rev".into(),
            serde_json::Value::String(self.rev_id.to_string()),
        );
        serde_json::Value::Object(obj)
    }

    pub fn key(&self) -> RevisionKey {
        RevisionKey {
            doc_id: self.doc_id.clone(),
            rev_id: self.rev_id.clone(),
        }
    }
}

/// Identity of a revision independent of its storage row: `(docID, revID)`
/// is unique per spec I7.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RevisionKey {
    pub doc_id: String,
    pub rev_id: RevId,
}

/// Caller-supplied input to [`DocumentStore::put`](crate) — a revision
/// that has not yet been assigned a `revID` or `sequence`.
///
/// Per spec §4.3.3 preconditions: `doc_id` may be absent only when inserting
/// a brand-new document (no `prev_rev_id`); a deletion (`deleted = true`)
/// must always carry a `prev_rev_id`.
#[derive(Debug, Clone, Default)]
pub struct NewRevision {
    pub doc_id: Option<String>,
    pub body: serde_json::Value,
    pub deleted: bool,
}

impl NewRevision {
    pub fn insert(doc_id: impl Into<String>, body: serde_json::Value) -> Self {
        NewRevision {
            doc_id: Some(doc_id.into()),
            body,
            deleted: false,
        }
    }

    pub fn create(body: serde_json::Value) -> Self {
        NewRevision {
            doc_id: None,
            body,
            deleted: false,
        }
    }

    pub fn delete(doc_id: impl Into<String>) -> Self {
        NewRevision {
            doc_id: Some(doc_id.into()),
            body: serde_json::Value::Null,
            deleted: true,
        }
    }
}

/// Outcome of a successful mutation, carrying the CouchDB-style status code
/// spec §4.3.3 step 6 assigns: `Created` for a fresh row, `Ok` for a row that
/// overwrote/deleted an existing leaf.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    Created,
    Ok,
}

impl Status {
    pub fn code(self) -> u16 {
        match self {
            Status::Created => 201,
            Status::Ok => 200,
        }
    }
}

/// A collection of [`Revision`]s keyed by `(docID, revID)`, used by
/// replication's bulk set-difference operations (spec §4.5.1, §4.5.2).
#[derive(Debug, Clone, Default)]
pub struct RevisionList {
    revisions: Vec<Revision>,
}

impl RevisionList {
    pub fn new() -> Self {
        RevisionList {
            revisions: Vec::new(),
        }
    }

    pub fn from_vec(revisions: Vec<Revision>) -> Self {
        RevisionList { revisions }
    }

    pub fn push(&mut self, rev: Revision) {
        self.revisions.push(rev);
    }

    pub fn is_empty(&self) -> bool {
        self.revisions.is_empty()
    }

    pub fn len(&self) -> usize {
        self.revisions.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Revision> {
        self.revisions.iter()
    }

    pub fn into_vec(self) -> Vec<Revision> {
        self.revisions
    }

    pub fn find(&self, doc_id: &str, rev_id: &RevId) -> Option<&Revision> {
        self.revisions
            .iter()
            .find(|r| r.doc_id == doc_id && &r.rev_id == rev_id)
    }

    /// Removes every entry whose `(docID, revID)` appears in `present` —
    /// the set-difference step of `findMissing` (spec §4.5.1): what's left
    /// is exactly what the remote must transfer.
    pub fn retain_missing(&mut self, present: &HashSet<RevisionKey>) {
        self.revisions.retain(|r| !present.contains(&r.key()));
    }

    pub fn doc_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.revisions.iter().map(|r| r.doc_id.clone()).collect();
        ids.sort();
        ids.dedup();
        ids
    }
}

/// Validates the preconditions spec §4.3.3 step 1 requires of a `put` call.
/// `prev_rev_id.is_some()` is implied by the caller; this only checks the
/// parts that belong to `rev` itself.
pub fn validate_new_revision(rev: &NewRevision, has_prev: bool) -> Result<()> {
    if rev.deleted && !has_prev {
        return Err(DocError::BadRequest(
            "deleting a document requires prev_rev_id".into(),
        ));
    }
    if let Some(doc_id) = &rev.doc_id
        && doc_id.is_empty()
    {
        return Err(DocError::BadRequest("doc_id must not be empty".into()));
    }
    Ok(())
}
