mod common;

use docrevdb::{LoadStatus, NewRevision, Status};

use common::open_store;

#[tokio::test]
async fn create_assigns_generation_one_and_bumps_sequence() {
    let store = open_store().await;

    let (rev, status) = store
        .put(NewRevision::insert("d1", serde_json::json!({"x": 1})), None)
        .await
        .unwrap();

    assert_eq!(status, Status::Created);
    assert_eq!(rev.rev_id.generation, 1);
    assert_eq!(store.last_sequence().await.unwrap(), 1);
    assert_eq!(store.document_count().await.unwrap(), 1);
}

#[tokio::test]
async fn update_demotes_previous_leaf() {
    let store = open_store().await;
    let (created, _) = store
        .put(NewRevision::insert("d1", serde_json::json!({"x": 1})), None)
        .await
        .unwrap();

    let (updated, status) = store
        .put(
            NewRevision::insert("d1", serde_json::json!({"x": 2})),
            Some(created.rev_id.clone()),
        )
        .await
        .unwrap();

    assert_eq!(status, Status::Created);
    assert_eq!(updated.rev_id.generation, 2);

    let old = store
        .get("d1", Some(&created.rev_id))
        .await
        .unwrap()
        .unwrap();
    assert!(!old.current);

    let current = store.get("d1", None).await.unwrap().unwrap();
    assert_eq!(current.rev_id, updated.rev_id);
    assert!(current.current);
}

#[tokio::test]
async fn delete_marks_leaf_deleted_and_excludes_from_count() {
    let store = open_store().await;
    let (created, _) = store
        .put(NewRevision::insert("d1", serde_json::json!({})), None)
        .await
        .unwrap();

    let (deleted, status) = store
        .put(NewRevision::delete("d1"), Some(created.rev_id.clone()))
        .await
        .unwrap();

    assert_eq!(status, Status::Ok);
    assert!(deleted.deleted);
    assert!(deleted.current);
    assert_eq!(store.document_count().await.unwrap(), 0);
    assert_eq!(store.last_sequence().await.unwrap(), 2);
}

#[tokio::test]
async fn recreate_after_delete_is_allowed() {
    let store = open_store().await;
    let (created, _) = store
        .put(NewRevision::insert("d1", serde_json::json!({})), None)
        .await
        .unwrap();
    let (deleted, _) = store
        .put(NewRevision::delete("d1"), Some(created.rev_id.clone()))
        .await
        .unwrap();

    let (recreated, status) = store
        .put(NewRevision::insert("d1", serde_json::json!({"y": 1})), None)
        .await
        .unwrap();

    assert_eq!(status, Status::Created);
    assert!(!recreated.deleted);

    let old_deleted = store
        .get("d1", Some(&deleted.rev_id))
        .await
        .unwrap()
        .unwrap();
    assert!(!old_deleted.current);
}

#[tokio::test]
async fn load_body_populates_an_unloaded_revision() {
    let store = open_store().await;
    let (created, _) = store
        .put(NewRevision::insert("d1", serde_json::json!({"x": 42})), None)
        .await
        .unwrap();

    let mut bare = store.get("d1", Some(&created.rev_id)).await.unwrap().unwrap();
    bare.body = None;
    let status = store.load_body(&mut bare).await.unwrap();
    assert_eq!(status, LoadStatus::Ok);
    assert_eq!(bare.body.unwrap()["x"], 42);
}

#[tokio::test]
async fn compact_discards_non_current_bodies_but_keeps_structure() {
    let store = open_store().await;
    let (created, _) = store
        .put(NewRevision::insert("d1", serde_json::json!({"x": 1})), None)
        .await
        .unwrap();
    store
        .put(
            NewRevision::insert("d1", serde_json::json!({"x": 2})),
            Some(created.rev_id.clone()),
        )
        .await
        .unwrap();

    let affected = store.compact().await.unwrap();
    assert_eq!(affected, 1);

    let old = store.get("d1", Some(&created.rev_id)).await.unwrap().unwrap();
    assert!(old.body.is_none());

    let current = store.get("d1", None).await.unwrap().unwrap();
    assert!(current.body.is_some());
    assert_eq!(current.parent_sequence, Some(created.sequence.unwrap()));
}
