//! Export -> destructive import round trip: row counts and embedding
//! values must match exactly afterward.

use mindstore_core::model::MemoryType;
use mindstore_core::traits::{NewMemory, NewMemoryLink, RelationalBackend, Scope};
use mindstore_storage::transfer::{export_all, import_envelope};
use mindstore_storage::EmbeddedBackend;

fn sample(content: &str, embedding: Vec<f32>) -> NewMemory {
    NewMemory {
        content: content.to_string(),
        tags: vec!["test".into()],
        source: "test".into(),
        memory_type: MemoryType::Observation,
        quality_score: 0.6,
        quality_factors: Default::default(),
        embedding: Some(embedding),
        valid_from: None,
        valid_until: None,
    }
}

#[tokio::test]
async fn export_then_import_preserves_counts_and_embeddings() {
    let backend = EmbeddedBackend::open_in_memory().unwrap();
    let scope = Scope::Project("proj".into());

    let ids = backend
        .insert_memories(
            &scope,
            &[
                sample("first memory", vec![0.1, 0.2, 0.3]),
                sample("second memory", vec![0.4, 0.5, 0.6]),
            ],
        )
        .await
        .unwrap();

    backend
        .upsert_link(&NewMemoryLink {
            source_id: ids[0],
            target_id: ids[1],
            relation: mindstore_core::model::RelationKind::Related,
            weight: 1.0,
            valid_from: None,
            valid_until: None,
            llm_enriched: false,
        })
        .await
        .unwrap();

    let envelope = export_all(&backend, &scope, "embedded", None).await.unwrap();
    assert_eq!(envelope.memories.len(), 2);
    assert_eq!(envelope.memory_links.len(), 1);

    let result = import_envelope(&backend, &scope, &envelope).await.unwrap();
    assert_eq!(result.memory_ids.len(), 2);

    let after = backend.all_memories(&scope).await.unwrap();
    assert_eq!(after.len(), 2);
    let mut embeddings: Vec<Vec<f32>> = after.into_iter().filter_map(|m| m.embedding).collect();
    embeddings.sort_by(|a, b| a.partial_cmp(b).unwrap());
    let mut expected = vec![vec![0.1f32, 0.2, 0.3], vec![0.4f32, 0.5, 0.6]];
    expected.sort_by(|a, b| a.partial_cmp(b).unwrap());
    assert_eq!(embeddings, expected);

    let links_after = backend.all_links().await.unwrap();
    assert_eq!(links_after.len(), 1);
}

#[tokio::test]
async fn export_empty_store_round_trips_to_empty() {
    let backend = EmbeddedBackend::open_in_memory().unwrap();
    let scope = Scope::Project("empty".into());
    let envelope = export_all(&backend, &scope, "embedded", None).await.unwrap();
    assert!(envelope.memories.is_empty());
    assert!(envelope.documents.is_empty());
    let result = import_envelope(&backend, &scope, &envelope).await.unwrap();
    assert!(result.memory_ids.is_empty());
}
