//! `docrevdb`: the embedded, document-oriented revision store this
//! workspace builds (spec §1–§2). A single-file SQLite database holds a
//! branching revision DAG per document; `DocumentStore` enforces the
//! single-current-leaf conflict rules a local writer needs and exposes the
//! diffing/splicing/history primitives bidirectional, CouchDB-style
//! replication needs on top.
//!
//! Out of scope here, by design (spec §1): map/reduce views, an HTTP
//! listener, the replication network transport itself, attachments, and
//! any CLI/config surface. This crate is the in-process API a host process
//! wraps with those concerns.

mod changes;
mod replication;
mod store;
mod types;

pub use changes::{ChangeReceiver, ChangeSender};
pub use store::DocumentStore;
pub use types::{
    AllDocumentsOptions, AllDocumentsResult, ChangeNotification, ChangesOptions, ForceInsertRequest,
    LoadStatus,
};

pub use docrevdb_core::document::{NewRevision, Status};
pub use docrevdb_core::{DocError, RevId, Result, Revision, RevisionList};
pub use docrevdb_storage::{StorageConfig, StoragePath};
