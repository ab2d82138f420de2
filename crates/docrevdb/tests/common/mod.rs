use docrevdb::{DocumentStore, StorageConfig};

pub async fn open_store() -> DocumentStore {
    DocumentStore::open(StorageConfig::memory())
        .await
        .expect("in-memory store should always open")
}
