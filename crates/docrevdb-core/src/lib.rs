//! Core types for the document-revision store: revision identifiers, the
//! `Revision` value type, the `RevisionList` collection used by replication,
//! and the error taxonomy every crate in the workspace propagates.
//!
//! This crate has no storage or concurrency opinions of its own — it is the
//! vocabulary `docrevdb-storage` and `docrevdb` build on.

pub mod document;
pub mod error;
pub mod revid;

pub use document::{NewRevision, Revision, RevisionList, Status};
pub use error::{DocError, Result};
pub use revid::RevId;
