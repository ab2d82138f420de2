//! SQL-backed storage adapter and transaction scoping for `docrevdb`.
//!
//! This crate is the "typed key-value substrate with SQL queries" spec §1
//! names as an external collaborator: it knows the `docs` table schema and
//! how to open/migrate a single SQLite file, but nothing about revision
//! trees, conflict semantics, or replication — that's `docrevdb`'s job.

mod config;
mod error;
mod schema;
mod storage;
mod txn;

pub use config::{StorageConfig, StoragePath};
pub use storage::Storage;
pub use txn::TxnScope;
