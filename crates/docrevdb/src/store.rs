//! `DocumentStore` (spec §4.3): the central component. Owns the `Storage`,
//! assigns sequences and revision ids, and enforces the single-current-leaf
//! conflict semantics that keep the revision DAG well-formed.
use docrevdb_core::document::{validate_new_revision, NewRevision, Status};
use docrevdb_core::{DocError, RevId, Result, Revision};
use docrevdb_storage::{Storage, StorageConfig};

use crate::changes::{ChangeReceiver, ChangeSender};
use crate::types::{ChangeNotification, LoadStatus};

/// The embedded document-revision store. One `DocumentStore` owns exactly
/// one `Storage` (one SQLite connection) — spec §5's single-writer,
/// single-connection model.
pub struct DocumentStore {
    pub(crate) storage: Storage,
    pub(crate) change_sender: ChangeSender,
}

fn must_have_sequence(rev: &Revision) -> i64 {
    rev.sequence
        .expect("rows returned from storage always carry a sequence")
}

impl DocumentStore {
    pub async fn open(config: StorageConfig) -> Result<Self> {
        let storage = Storage::open(config).await?;
        let (change_sender, _receiver) = ChangeSender::new();
        Ok(DocumentStore {
            storage,
            change_sender,
        })
    }

    /// Subscribes to this store's change notifications (spec §4.4.2).
    pub fn subscribe(&self) -> ChangeReceiver {
        self.change_sender.subscribe()
    }

    /// Spec §4.3.1: the unique `(docID, revID)` row if `rev_id` is given,
    /// otherwise the current non-deleted revision with the
    /// lexicographically greatest `revID` among conflicting leaves.
    pub async fn get(&self, doc_id: &str, rev_id: Option<&RevId>) -> Result<Option<Revision>> {
        match rev_id {
            Some(rid) => self.storage.get_by_doc_and_rev(doc_id, rid).await,
            None => self.storage.get_latest_current(doc_id).await,
        }
    }

    /// Spec §4.3.2: populates `rev.body` in place if it isn't already
    /// loaded. `NotFound` if the row itself no longer exists; `Ok` (with an
    /// empty body) if the row exists but its JSON was compacted away.
    pub async fn load_body(&self, rev: &mut Revision) -> Result<LoadStatus> {
        if rev.body.is_some() {
            return Ok(LoadStatus::Ok);
        }
        let sequence = rev
            .sequence
            .ok_or_else(|| DocError::BadRequest("revision has no assigned sequence".into()))?;
        match self.storage.get_by_sequence(sequence).await? {
            Some(found) => {
                rev.body = found.body;
                Ok(LoadStatus::Ok)
            }
            None => Ok(LoadStatus::NotFound),
        }
    }

    /// Spec §4.3.3: insert a new revision, enforcing single-current-leaf
    /// conflict semantics. Runs inside its own transaction; notifies
    /// subscribers only after that transaction commits.
    pub async fn put(
        &self,
        rev: NewRevision,
        prev_rev_id: Option<RevId>,
    ) -> Result<(Revision, Status)> {
        validate_new_revision(&rev, prev_rev_id.is_some())?;

        let scope = self.storage.begin().await?;
        let result = self.put_inner(rev, prev_rev_id.as_ref()).await;
        if result.is_err() {
            scope.fail();
        }
        scope.end().await?;
        let (inserted, status) = result?;

        self.change_sender.notify(ChangeNotification {
            seq: must_have_sequence(&inserted),
            rev: inserted.clone(),
        });
        Ok((inserted, status))
    }

    async fn put_inner(
        &self,
        rev: NewRevision,
        prev_rev_id: Option<&RevId>,
    ) -> Result<(Revision, Status)> {
        let (doc_id, parent_sequence) = match prev_rev_id {
            Some(prid) => {
                let doc_id = rev.doc_id.clone().ok_or_else(|| {
                    DocError::BadRequest("doc_id is required when prev_rev_id is set".into())
                })?;
                match self.storage.find_current_by_doc_and_rev(&doc_id, prid).await? {
                    Some(found) => {
                        let seq = must_have_sequence(&found);
                        self.storage.demote(seq).await?;
                        (doc_id, Some(seq))
                    }
                    None => {
                        return Err(match self.storage.find_any_current(&doc_id).await? {
                            Some(_) => DocError::Conflict,
                            None => DocError::NotFound(format!("document not found: {doc_id}")),
                        });
                    }
                }
            }
            None => {
                let doc_id = rev
                    .doc_id
                    .clone()
                    .unwrap_or_else(|| uuid::Uuid::new_v4().simple().to_string());
                match self.storage.find_any_current(&doc_id).await? {
                    Some(existing) if !existing.deleted => return Err(DocError::Conflict),
                    Some(existing) => {
                        let seq = must_have_sequence(&existing);
                        self.storage.demote(seq).await?;
                        (doc_id, Some(seq))
                    }
                    None => (doc_id, None),
                }
            }
        };

        let new_rev_id = RevId::next(prev_rev_id);
        let body = if rev.deleted {
            None
        } else {
            let pending = Revision::pending(
                doc_id.clone(),
                new_rev_id.clone(),
                false,
                parent_sequence,
                Some(rev.body),
            );
            Some(pending.as_json())
        };

        let sequence = self
            .storage
            .insert_revision(&doc_id, &new_rev_id, parent_sequence, true, rev.deleted, body.as_ref())
            .await?;

        let status = if rev.deleted { Status::Ok } else { Status::Created };
        let inserted = Revision {
            sequence: Some(sequence),
            doc_id,
            rev_id: new_rev_id,
            parent_sequence,
            current: true,
            deleted: rev.deleted,
            body,
        };
        Ok((inserted, status))
    }

    /// Spec §4.3.5: discards the bodies of every non-current revision.
    /// History structure is preserved; not reversible.
    pub async fn compact(&self) -> Result<u64> {
        self.storage.compact().await
    }

    /// Spec §4.3.6: documents with at least one current, non-deleted row.
    pub async fn document_count(&self) -> Result<u64> {
        self.storage.document_count().await
    }

    /// Spec §4.3.7: the maximum assigned sequence, or 0 if empty.
    pub async fn last_sequence(&self) -> Result<i64> {
        self.storage.last_sequence().await
    }
}
