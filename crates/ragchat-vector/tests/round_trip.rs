use std::path::Path;
use std::sync::Arc;

use ragchat_core::config::IndexSettings;
use ragchat_core::error::Error;
use ragchat_core::traits::Embedder;
use ragchat_core::types::{Chunk, Meta};
use ragchat_embed::HashEmbedder;
use ragchat_vector::{IndexBackend, IndexManager, Manifest};

fn corpus() -> Vec<Chunk> {
    let texts = [
        "Our store opens at nine in the morning and closes at five.",
        "Returns are accepted within thirty days with a receipt.",
        "Shipping is free for orders above fifty dollars.",
        "Gift cards never expire and can be used online.",
        "Customer support is reachable by phone and email.",
        "Returns of opened electronics carry a restocking fee.",
    ];
    texts
        .iter()
        .enumerate()
        .map(|(i, t)| {
            let mut metadata = Meta::new();
            metadata.insert("topic".to_string(), format!("t{i}"));
            Chunk {
                id: format!("faq#{i}:0"),
                doc_id: format!("faq#{i}"),
                content: t.to_string(),
                metadata,
                chunk_index: 0,
                total_chunks: 1,
            }
        })
        .collect()
}

fn settings(path: &Path, backend: &str, trust: bool) -> IndexSettings {
    IndexSettings { backend: backend.to_string(), path: path.to_path_buf(), trust_persisted: trust }
}

fn embedder() -> Arc<dyn Embedder> {
    Arc::new(HashEmbedder::new(128))
}

async fn top_ids(index: &ragchat_vector::VectorIndex, manager: &IndexManager, query: &str, k: usize) -> Vec<(String, f32)> {
    let q = manager.embed_query(query).unwrap();
    index.search(&q, k).await.unwrap().into_iter().map(|h| (h.chunk.id, h.score)).collect()
}

async fn assert_round_trip(backend: &str) {
    let tmp = tempfile::tempdir().unwrap();
    let path = tmp.path().join("vector_store");
    let manager = IndexManager::new(&settings(&path, backend, true), embedder()).unwrap();

    let created = manager.create(&corpus()).await.unwrap();
    manager.save(&created).await.unwrap();
    let loaded = manager.load().await.unwrap().expect("index persisted");
    assert_eq!(loaded.len(), 6);

    for query in ["how do returns work", "when does the store open", "free shipping", "zebra"] {
        let before = top_ids(&created, &manager, query, 3).await;
        let after = top_ids(&loaded, &manager, query, 3).await;
        assert_eq!(before.len(), 3);
        let ids_before: Vec<_> = before.iter().map(|(id, _)| id.clone()).collect();
        let ids_after: Vec<_> = after.iter().map(|(id, _)| id.clone()).collect();
        assert_eq!(ids_before, ids_after, "query {query:?}");
        for ((_, a), (_, b)) in before.iter().zip(&after) {
            assert!((a - b).abs() < 1e-5);
        }
    }

    let hits = loaded.search(&manager.embed_query("returns receipt").unwrap(), 1).await.unwrap();
    assert_eq!(hits[0].chunk.id, "faq#1:0");
    assert_eq!(hits[0].chunk.metadata.get("topic").map(String::as_str), Some("t1"));

    let manifest = Manifest::read(&path).unwrap();
    assert_eq!(manifest.backend, backend);
    assert_eq!(manifest.chunk_count, 6);
    assert_eq!(manifest.embedder_id, "hash:d128");
}

#[tokio::test]
async fn flat_round_trip_preserves_results() {
    assert_round_trip("flat").await;
}

#[tokio::test]
async fn lance_round_trip_preserves_results() {
    assert_round_trip("lance").await;
}

#[tokio::test]
async fn absent_index_loads_as_none() {
    let tmp = tempfile::tempdir().unwrap();
    let manager = IndexManager::new(&settings(&tmp.path().join("missing"), "flat", true), embedder()).unwrap();
    assert!(manager.load().await.unwrap().is_none());
    assert!(manager.manifest().unwrap().is_none());
}

#[test]
fn unsupported_backend_fails_at_construction() {
    let tmp = tempfile::tempdir().unwrap();
    let err = IndexManager::new(&settings(tmp.path(), "faiss", true), embedder()).err().expect("must fail");
    assert!(matches!(err, Error::UnsupportedBackend(name) if name == "faiss"));

    let ok = IndexManager::new(&settings(tmp.path(), "LANCE", true), embedder()).unwrap();
    assert_eq!(ok.backend(), IndexBackend::Lance);
}

#[tokio::test]
async fn untrusted_load_is_refused() {
    let tmp = tempfile::tempdir().unwrap();
    let path = tmp.path().join("store");
    let writer = IndexManager::new(&settings(&path, "flat", true), embedder()).unwrap();
    writer.save(&writer.create(&corpus()).await.unwrap()).await.unwrap();

    let reader = IndexManager::new(&settings(&path, "flat", false), embedder()).unwrap();
    assert!(matches!(reader.load().await, Err(Error::UntrustedIndex(p)) if p == path));
}

#[tokio::test]
async fn backend_mismatch_is_surfaced_on_load_and_save() {
    let tmp = tempfile::tempdir().unwrap();
    let path = tmp.path().join("store");
    let flat = IndexManager::new(&settings(&path, "flat", true), embedder()).unwrap();
    let index = flat.create(&corpus()).await.unwrap();
    flat.save(&index).await.unwrap();

    let lance = IndexManager::new(&settings(&path, "lance", true), embedder()).unwrap();
    match lance.load().await {
        Err(Error::BackendMismatch { expected, found, .. }) => {
            assert_eq!(expected, "lance");
            assert_eq!(found, "flat");
        }
        other => panic!("expected BackendMismatch, got {:?}", other.map(|o| o.map(|i| i.len()))),
    }
    assert!(matches!(lance.save(&index).await, Err(Error::BackendMismatch { .. })));
}

#[tokio::test]
async fn embedder_mismatch_is_surfaced() {
    let tmp = tempfile::tempdir().unwrap();
    let path = tmp.path().join("store");
    let writer = IndexManager::new(&settings(&path, "flat", true), embedder()).unwrap();
    writer.save(&writer.create(&corpus()).await.unwrap()).await.unwrap();

    let other: Arc<dyn Embedder> = Arc::new(HashEmbedder::new(64));
    let reader = IndexManager::new(&settings(&path, "flat", true), other).unwrap();
    assert!(matches!(reader.load().await, Err(Error::EmbedderMismatch { .. })));
}

#[tokio::test]
async fn saving_again_replaces_the_previous_index() {
    let tmp = tempfile::tempdir().unwrap();
    let path = tmp.path().join("store");
    let manager = IndexManager::new(&settings(&path, "flat", true), embedder()).unwrap();
    manager.save(&manager.create(&corpus()).await.unwrap()).await.unwrap();
    manager.save(&manager.create(&corpus()[..2]).await.unwrap()).await.unwrap();

    let loaded = manager.load().await.unwrap().unwrap();
    assert_eq!(loaded.len(), 2);
    let leftovers: Vec<_> = std::fs::read_dir(tmp.path()).unwrap().filter_map(|e| e.ok()).collect();
    assert_eq!(leftovers.len(), 1, "staging directories are cleaned up");
}

#[tokio::test]
async fn lance_rebuild_keeps_the_loaded_index_answering_until_saved() {
    let tmp = tempfile::tempdir().unwrap();
    let path = tmp.path().join("store");
    let manager = IndexManager::new(&settings(&path, "lance", true), embedder()).unwrap();
    manager.save(&manager.create(&corpus()).await.unwrap()).await.unwrap();

    let loaded = manager.load().await.unwrap().expect("index persisted");
    let before = top_ids(&loaded, &manager, "how do returns work", 3).await;

    let rebuilt = manager.create(&corpus()[..2]).await.unwrap();
    assert_eq!(top_ids(&loaded, &manager, "how do returns work", 3).await, before);
    assert_eq!(manager.load().await.unwrap().unwrap().len(), 6, "persisted index is unchanged before save");

    manager.save(&rebuilt).await.unwrap();
    assert_eq!(manager.load().await.unwrap().unwrap().len(), 2);

    let mut entries: Vec<String> = std::fs::read_dir(&path)
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    entries.sort();
    assert_eq!(entries.len(), 2, "only the live table and its manifest remain: {entries:?}");
    assert!(entries[0].starts_with("lance-"));
    assert_eq!(entries[1], "manifest.json");
}

async fn assert_ties_follow_insertion_order(backend: &str) {
    let tmp = tempfile::tempdir().unwrap();
    let manager = IndexManager::new(&settings(&tmp.path().join("store"), backend, true), embedder()).unwrap();
    let chunks: Vec<Chunk> = (0..25)
        .map(|i| Chunk {
            id: format!("dup#{i}:0"),
            doc_id: format!("dup#{i}"),
            content: "Returns are accepted within thirty days.".to_string(),
            metadata: Meta::new(),
            chunk_index: 0,
            total_chunks: 1,
        })
        .collect();
    let index = manager.create(&chunks).await.unwrap();

    let ids: Vec<String> = top_ids(&index, &manager, "returns", 2).await.into_iter().map(|(id, _)| id).collect();
    assert_eq!(ids, ["dup#0:0", "dup#1:0"]);
}

#[tokio::test]
async fn flat_ties_follow_insertion_order() {
    assert_ties_follow_insertion_order("flat").await;
}

#[tokio::test]
async fn lance_ties_follow_insertion_order_beyond_the_candidate_window() {
    assert_ties_follow_insertion_order("lance").await;
}
