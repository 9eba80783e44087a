use std::collections::BTreeSet;
use std::sync::Arc;
use taxdoc_artifact::{ArtifactKey, ArtifactStore, FsArtifactStore, InMemoryArtifactStore};
use taxdoc_core::FillRequest;
use taxdoc_test_utils::*;

fn key() -> ArtifactKey {
    ArtifactKey::new(SUBJECT, FORM_1040, TAX_YEAR)
}

fn request() -> FillRequest {
    FillRequest::new(SUBJECT, FORM_1040, TAX_YEAR, scenario_facts_with_bank())
}

#[tokio::test]
async fn test_identical_fills_create_new_versions_with_same_content() {
    let store = Arc::new(InMemoryArtifactStore::new());
    let engine = setup_engine(store.clone());

    let first = engine.fill(request()).await.unwrap().artifact.unwrap();
    let second = engine.fill(request()).await.unwrap().artifact.unwrap();

    assert_eq!(first.version, 1);
    assert_eq!(second.version, 2);
    assert_eq!(first.content_hash, second.content_hash);

    let v1 = store.get_version(&key(), 1).await.unwrap().unwrap();
    let v2 = store.get_version(&key(), 2).await.unwrap().unwrap();
    assert_eq!(v1.bytes, v2.bytes);
}

#[tokio::test]
async fn test_sequential_fills_are_numbered_without_gaps() {
    let store = Arc::new(InMemoryArtifactStore::new());
    let engine = setup_engine(store.clone());

    for expected in 1..=5 {
        let artifact = engine.fill(request()).await.unwrap().artifact.unwrap();
        assert_eq!(artifact.version, expected);
    }

    let versions: Vec<u64> = store
        .list_versions(&key())
        .await
        .unwrap()
        .iter()
        .map(|r| r.version)
        .collect();
    assert_eq!(versions, vec![5, 4, 3, 2, 1]);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_fills_get_distinct_versions() {
    let store = Arc::new(InMemoryArtifactStore::new());
    let engine = Arc::new(setup_engine(store.clone()));

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let engine = Arc::clone(&engine);
            tokio::spawn(async move { engine.fill(request()).await })
        })
        .collect();

    let mut versions = BTreeSet::new();
    for handle in handles {
        let result = handle.await.unwrap().unwrap();
        versions.insert(result.artifact.unwrap().version);
    }
    assert_eq!(versions, (1..=8).collect());
}

#[tokio::test]
async fn test_filesystem_store_end_to_end() {
    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(FsArtifactStore::new(dir.path()));
    let engine = setup_engine(store.clone());

    let first = engine.fill_tax_form(request()).await.unwrap();
    let second = engine.fill_tax_form(request()).await.unwrap();
    assert!(first.filled_form_url.unwrap().starts_with("file://"));
    assert!(second.success);

    let latest = store.get_latest(&key()).await.unwrap().unwrap().verified().unwrap();
    assert_eq!(latest.record.version, 2);
    assert!(dir.path().join("client-7/1040/2024/v000002.bin").exists());
}

#[tokio::test]
async fn test_other_subjects_have_independent_versions() {
    let store = Arc::new(InMemoryArtifactStore::new());
    let engine = setup_engine(store.clone());

    engine.fill(request()).await.unwrap();
    let other = engine
        .fill(FillRequest::new("client-8", FORM_1040, TAX_YEAR, scenario_facts_with_bank()))
        .await
        .unwrap();
    assert_eq!(other.artifact.unwrap().version, 1);
    assert_eq!(store.key_count(), 2);
}
