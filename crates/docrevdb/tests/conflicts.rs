mod common;

use docrevdb::{DocError, ForceInsertRequest, NewRevision, RevId};

use common::open_store;

#[tokio::test]
async fn put_with_stale_parent_returns_conflict() {
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

    // created.rev_id is no longer the current leaf, so this is a conflict.
    let err = store
        .put(
            NewRevision::insert("d1", serde_json::json!({"x": 3})),
            Some(created.rev_id),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, DocError::Conflict));
    assert_eq!(err.status(), 409);
}

#[tokio::test]
async fn put_new_doc_with_id_already_present_returns_conflict() {
    let store = open_store().await;
    store
        .put(NewRevision::insert("d1", serde_json::json!({})), None)
        .await
        .unwrap();

    let err = store
        .put(NewRevision::insert("d1", serde_json::json!({})), None)
        .await
        .unwrap_err();
    assert!(matches!(err, DocError::Conflict));
}

#[tokio::test]
async fn put_with_prev_rev_on_missing_document_is_not_found() {
    let store = open_store().await;
    let bogus = RevId::parse("1-doesnotexist").unwrap();
    let err = store
        .put(NewRevision::insert("ghost", serde_json::json!({})), Some(bogus))
        .await
        .unwrap_err();
    assert!(matches!(err, DocError::NotFound(_)));
    assert_eq!(err.status(), 404);
}

#[tokio::test]
async fn get_without_rev_returns_lexicographically_greatest_leaf() {
    let store = open_store().await;
    let (created, _) = store
        .put(NewRevision::insert("d1", serde_json::json!({"x": 1})), None)
        .await
        .unwrap();

    // Splice two conflicting branches at generation 2 directly off the root,
    // one with a revid that sorts before the original current leaf and one
    // after, to exercise "largest revID wins" independent of insert order.
    store
        .force_insert(ForceInsertRequest {
            doc_id: "d1".into(),
            leaf_rev_id: RevId::parse("2-aaaa").unwrap(),
            deleted: false,
            body: Some(serde_json::json!({"branch": "a"})),
            history: vec![RevId::parse("2-aaaa").unwrap(), created.rev_id.clone()],
        })
        .await
        .unwrap();
    store
        .force_insert(ForceInsertRequest {
            doc_id: "d1".into(),
            leaf_rev_id: RevId::parse("2-zzzz").unwrap(),
            deleted: false,
            body: Some(serde_json::json!({"branch": "z"})),
            history: vec![RevId::parse("2-zzzz").unwrap(), created.rev_id],
        })
        .await
        .unwrap();

    let winner = store.get("d1", None).await.unwrap().unwrap();
    assert_eq!(winner.rev_id.to_string(), "2-zzzz");
}

#[tokio::test]
async fn force_insert_replay_is_idempotent() {
    let store = open_store().await;
    let request = ForceInsertRequest {
        doc_id: "d1".into(),
        leaf_rev_id: RevId::parse("2-bbbb").unwrap(),
        deleted: false,
        body: Some(serde_json::json!({"v": 1})),
        history: vec![RevId::parse("2-bbbb").unwrap(), RevId::parse("1-aaaa").unwrap()],
    };

    store.force_insert(request.clone()).await.unwrap();
    let rows_after_first = store.get_all_revisions("d1").await.unwrap().len();

    store.force_insert(request).await.unwrap();
    let rows_after_second = store.get_all_revisions("d1").await.unwrap().len();

    assert_eq!(rows_after_first, rows_after_second);
    let leaf = store
        .get("d1", Some(&RevId::parse("2-bbbb").unwrap()))
        .await
        .unwrap()
        .unwrap();
    assert!(leaf.current);
}

#[tokio::test]
async fn find_missing_narrows_to_absent_revisions() {
    let store = open_store().await;
    let (created, _) = store
        .put(NewRevision::insert("d1", serde_json::json!({})), None)
        .await
        .unwrap();

    let mut candidates = docrevdb::RevisionList::from_vec(vec![]);
    // Build a list mixing a present revision and one that doesn't exist.
    let present = store.get("d1", Some(&created.rev_id)).await.unwrap().unwrap();
    let missing = {
        let mut r = present.clone();
        r.rev_id = RevId::parse("2-notstored").unwrap();
        r
    };
    candidates.push(present);
    candidates.push(missing);

    store.find_missing(&mut candidates).await.unwrap();
    assert_eq!(candidates.len(), 1);
    assert_eq!(
        candidates.iter().next().unwrap().rev_id.to_string(),
        "2-notstored"
    );
}
