//! `ReplicationSupport` (spec §4.5): the auxiliary queries bidirectional
//! replication needs on top of plain CRUD — missing-revision diffing,
//! ancestry traversal, and a splice operation (`force_insert`) that bypasses
//! normal conflict checks to faithfully mirror a remote tree.
use docrevdb_core::document::RevisionKey;
use docrevdb_core::{DocError, Result, Revision, RevisionList, Status};

use crate::changes::ChangeNotification;
use crate::store::DocumentStore;
use crate::types::{AllDocumentsOptions, AllDocumentsResult, ForceInsertRequest};

impl DocumentStore {
    /// Spec §4.3.4 / §4.5: splice a remote revision chain into the local
    /// tree. `history` is ordered newest-to-oldest and must begin with
    /// `request.leaf_rev_id`. Idempotent: replaying the same request yields
    /// no new rows and the same final sequence for the leaf (spec P4).
    pub async fn force_insert(&self, request: ForceInsertRequest) -> Result<Status> {
        if request.history.first() != Some(&request.leaf_rev_id) {
            return Err(DocError::BadRequest(
                "history must begin with the leaf's revID".into(),
            ));
        }
        if !request.deleted && request.body.is_none() {
            return Err(DocError::BadRequest(
                "force_insert of a non-deleted leaf requires a body".into(),
            ));
        }

        let scope = self.storage.begin().await?;
        let result = self.force_insert_inner(&request).await;
        if result.is_err() {
            scope.fail();
        }
        scope.end().await?;
        let leaf_sequence = result?;

        self.change_sender.notify(ChangeNotification {
            seq: leaf_sequence,
            rev: Revision {
                sequence: Some(leaf_sequence),
                doc_id: request.doc_id,
                rev_id: request.leaf_rev_id,
                parent_sequence: None,
                current: true,
                deleted: request.deleted,
                body: request.body,
            },
        });
        Ok(Status::Created)
    }

    async fn force_insert_inner(&self, request: &ForceInsertRequest) -> Result<i64> {
        let mut parent_sequence: Option<i64> = None;

        // Walk oldest (last index) to newest (index 0), mirroring spec §4.3.4.
        for (index, rev_id) in request.history.iter().enumerate().rev() {
            if let Some(existing) = self.storage.get_by_doc_and_rev(&request.doc_id, rev_id).await? {
                let seq = existing
                    .sequence
                    .expect("rows returned from storage always carry a sequence");
                // Any entry other than the leaf is about to gain (or already
                // has) a child in this chain, so it cannot remain a current
                // leaf (spec I5'). A matched non-leaf entry may still be
                // `current = true` here if it was the document's live leaf
                // before this chain extended it (e.g. a local `put` or an
                // earlier, shorter replicated chain) — demote it.
                if index != 0 && existing.current {
                    self.storage.demote(seq).await?;
                }
                parent_sequence = Some(seq);
                continue;
            }

            let is_leaf = index == 0;
            if is_leaf {
                let body = if request.deleted {
                    None
                } else {
                    let pending = Revision::pending(
                        request.doc_id.clone(),
                        rev_id.clone(),
                        false,
                        parent_sequence,
                        request.body.clone(),
                    );
                    Some(pending.as_json())
                };
                let seq = self
                    .storage
                    .insert_revision(
                        &request.doc_id,
                        rev_id,
                        parent_sequence,
                        true,
                        request.deleted,
                        body.as_ref(),
                    )
                    .await?;
                parent_sequence = Some(seq);
            } else {
                // Stub: present for lineage, no body.
                let seq = self
                    .storage
                    .insert_revision(&request.doc_id, rev_id, parent_sequence, false, false, None)
                    .await?;
                parent_sequence = Some(seq);
            }
        }

        Ok(parent_sequence.expect("history is non-empty, so at least one sequence was assigned"))
    }

    /// Spec §4.5.1: removes from `revs` every `(docID, revID)` already
    /// present locally. What's left is exactly what the remote must
    /// transfer. Implemented as a single indexed query over the union of
    /// document ids present in `revs`.
    pub async fn find_missing(&self, revs: &mut RevisionList) -> Result<()> {
        let doc_ids = revs.doc_ids();
        let existing: std::collections::HashSet<RevisionKey> =
            self.storage.existing_keys_for_docs(&doc_ids).await?;
        revs.retain_missing(&existing);
        Ok(())
    }

    /// Spec §4.5.2: every row for `doc_id`, newest sequence first, body
    /// omitted.
    pub async fn get_all_revisions(&self, doc_id: &str) -> Result<RevisionList> {
        let mut rows = self.storage.get_all_revisions(doc_id).await?;
        for row in rows.iter_mut() {
            row.body = None;
        }
        Ok(RevisionList::from_vec(rows))
    }

    /// Spec §4.5.3: the linear ancestry of `rev`, from the leaf back to the
    /// root, newest first. Stops when `parent_sequence` is null.
    pub async fn get_revision_history(&self, rev: &Revision) -> Result<Vec<Revision>> {
        let mut chain = Vec::new();
        let mut next_parent = rev.parent_sequence;
        chain.push(rev.clone());

        while let Some(seq) = next_parent {
            match self.storage.get_by_sequence(seq).await? {
                Some(parent) => {
                    next_parent = parent.parent_sequence;
                    chain.push(parent);
                }
                None => break,
            }
        }
        Ok(chain)
    }

    /// Spec §4.5.4: the sorted set of current, non-deleted revisions,
    /// paginated by `skip`/`limit`. `update_seq`, if requested, is a
    /// snapshot of `last_sequence` taken in the same transaction as the row
    /// scan so the two can't disagree about what "now" means.
    pub async fn all_documents(&self, options: AllDocumentsOptions) -> Result<AllDocumentsResult> {
        let scope = self.storage.begin().await?;
        let result = self.all_documents_inner(&options).await;
        if result.is_err() {
            scope.fail();
        }
        scope.end().await?;
        result
    }

    async fn all_documents_inner(&self, options: &AllDocumentsOptions) -> Result<AllDocumentsResult> {
        let mut rows = self
            .storage
            .all_docs(options.descending, options.skip, options.limit)
            .await?;
        if !options.include_docs {
            for row in rows.iter_mut() {
                row.body = None;
            }
        }
        let total_rows = self.storage.document_count().await?;
        let update_seq = if options.update_seq {
            Some(self.storage.last_sequence().await?)
        } else {
            None
        };
        Ok(AllDocumentsResult {
            rows,
            total_rows,
            offset: options.skip,
            update_seq,
        })
    }

    /// Spec §4.4.1: revisions with `sequence > last_sequence AND current =
    /// true`, ascending, capped at `options.limit`. Body is not populated —
    /// call `load_body` if needed.
    pub async fn changes_since(
        &self,
        last_sequence: i64,
        options: &crate::types::ChangesOptions,
    ) -> Result<Vec<Revision>> {
        let mut rows = self
            .storage
            .changes_since(last_sequence, options.limit, options.doc_ids.as_deref())
            .await?;
        for row in rows.iter_mut() {
            row.body = None;
        }
        Ok(rows)
    }
}
