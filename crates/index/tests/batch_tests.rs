//! Batch indexing into sinks.

mod common;

use std::sync::Arc;

use serde_json::json;

use common::*;
use helios_index::types::DocumentEnvelope;
use helios_index::{BatchDocument, BatchIndexer, BatchStatus, EntrySink, InMemorySink, JsonLinesSink};

#[tokio::test]
async fn test_batch_with_chaining() {
    let indexer = Arc::new(chaining_indexer(
        &[PatientFixture::new("123", "Smith").build()],
        1,
    ));
    let sink = Arc::new(InMemorySink::new());
    let batch = BatchIndexer::new(indexer, sink.clone()).with_concurrency(4);

    let documents: Vec<BatchDocument> = (0..10)
        .map(|i| {
            BatchDocument::new(
                format!("obs-{i}.json"),
                observation_with_quantity(&format!("obs-{i}"), "Patient/123", "5.0", "mg"),
            )
        })
        .chain([BatchDocument::new(
            "orphan.json",
            observation_with_quantity("orphan", "Patient/404", "1", "mg"),
        )])
        .collect();

    let progress = batch.run(documents).await;
    assert_eq!(progress.status, BatchStatus::Completed);
    assert_eq!(progress.processed, 11);
    assert_eq!(progress.failed, 0);
    assert_eq!(progress.chain_failures, 1);
    assert_eq!(sink.document_count(), 11);

    let entries = sink.entries("Observation", "obs-3");
    assert!(entries.iter().any(|e| e.parameter_name == "subject.family"));
    let orphan = sink.entries("Observation", "orphan");
    assert!(!orphan.is_empty());
    assert!(!orphan.iter().any(|e| e.parameter_name.starts_with("subject.")));
}

#[tokio::test]
async fn test_batch_into_json_lines() {
    let indexer = Arc::new(chaining_indexer(&[], 1));
    let sink = Arc::new(JsonLinesSink::new(Vec::new()));
    let batch = BatchIndexer::new(indexer, sink.clone() as Arc<dyn EntrySink>);

    let progress = batch
        .run(vec![
            BatchDocument::new(
                "p.json",
                DocumentEnvelope::from_json(&json!({"resourceType": "Patient", "id": "p1", "gender": "other"})),
            ),
            BatchDocument::new(
                "bad.json",
                DocumentEnvelope::from_json(&json!({"resourceType": "Widget", "id": "w"})),
            ),
        ])
        .await;

    assert_eq!(progress.processed, 1);
    assert_eq!(progress.failed, 1);
    assert!(progress.errors[0].error.contains("Widget"));

    drop(batch);
    let sink = Arc::try_unwrap(sink).ok().unwrap();
    let output = String::from_utf8(sink.into_inner()).unwrap();
    assert_eq!(output.lines().count() as u64, progress.entries_written);
    assert!(output.lines().all(|l| l.contains("\"document_id\":\"p1\"")));
}
