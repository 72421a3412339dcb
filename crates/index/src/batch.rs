//! Batch indexing.
//!
//! [`BatchIndexer`] indexes a batch of documents concurrently, writes each
//! document's entries to an [`EntrySink`] and tracks a [`BatchProgress`]
//! per job.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::indexer::Indexer;
use crate::sink::EntrySink;
use crate::types::DocumentEnvelope;

/// One document of a batch.
#[derive(Debug, Clone)]
pub struct BatchDocument {
    /// Label used in errors (a file path, a queue key, ...). Also used as
    /// the sink key when the document has no id.
    pub source: String,
    /// The document.
    pub envelope: DocumentEnvelope,
}

impl BatchDocument {
    /// Creates a batch document.
    pub fn new(source: impl Into<String>, envelope: DocumentEnvelope) -> Self {
        Self {
            source: source.into(),
            envelope,
        }
    }
}

/// Status of a batch job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BatchStatus {
    /// Not started yet.
    Queued,
    /// Documents are being indexed.
    InProgress,
    /// Finished; individual documents may still have failed.
    Completed,
    /// Every document failed.
    Failed,
}

impl BatchStatus {
    /// Returns true while the job runs.
    pub fn is_running(&self) -> bool {
        matches!(self, BatchStatus::Queued | BatchStatus::InProgress)
    }

    /// Returns true once the job has completed or failed.
    pub fn is_finished(&self) -> bool {
        matches!(self, BatchStatus::Completed | BatchStatus::Failed)
    }
}

/// A document that could not be indexed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchItemError {
    /// The document's source label.
    pub source: String,
    /// Rendered error.
    pub error: String,
}

/// Progress of a batch job.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchProgress {
    /// Job identifier.
    pub job_id: String,
    /// Current status.
    pub status: BatchStatus,
    /// Documents in the batch.
    pub total: u64,
    /// Documents indexed and written.
    pub processed: u64,
    /// Documents that failed.
    pub failed: u64,
    /// Entries handed to the sink.
    pub entries_written: u64,
    /// Values skipped as unencodable.
    pub skipped_values: u64,
    /// Chain steps that failed.
    pub chain_failures: u64,
    /// Per-document failures.
    pub errors: Vec<BatchItemError>,
    /// RFC 3339 start time.
    pub started_at: Option<String>,
    /// RFC 3339 completion time.
    pub completed_at: Option<String>,
}

impl BatchProgress {
    /// Creates queued progress for a job.
    pub fn new(job_id: impl Into<String>, total: u64) -> Self {
        Self {
            job_id: job_id.into(),
            status: BatchStatus::Queued,
            total,
            processed: 0,
            failed: 0,
            entries_written: 0,
            skipped_values: 0,
            chain_failures: 0,
            errors: Vec::new(),
            started_at: None,
            completed_at: None,
        }
    }

    /// Returns the completion percentage.
    pub fn percentage(&self) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            ((self.processed + self.failed) as f64 / self.total as f64) * 100.0
        }
    }

    /// Returns true if any document failed.
    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }
}

enum Outcome {
    Written {
        entries: usize,
        skipped: usize,
        chain_failures: usize,
    },
    Failed(BatchItemError),
}

/// Indexes batches of documents into a sink.
pub struct BatchIndexer {
    indexer: Arc<Indexer>,
    sink: Arc<dyn EntrySink>,
    concurrency: usize,
    jobs: Arc<RwLock<HashMap<String, BatchProgress>>>,
}

impl BatchIndexer {
    /// Creates a batch indexer. Concurrency follows the indexer's
    /// `lookup_concurrency`.
    pub fn new(indexer: Arc<Indexer>, sink: Arc<dyn EntrySink>) -> Self {
        let concurrency = indexer.config().lookup_concurrency.max(1);
        Self {
            indexer,
            sink,
            concurrency,
            jobs: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Sets the number of documents indexed at once.
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    /// Indexes `documents` and returns the final progress.
    pub async fn run(&self, documents: Vec<BatchDocument>) -> BatchProgress {
        let job_id = Uuid::new_v4().to_string();
        let mut progress = BatchProgress::new(&job_id, documents.len() as u64);
        progress.status = BatchStatus::InProgress;
        progress.started_at = Some(chrono::Utc::now().to_rfc3339());
        self.jobs.write().insert(job_id.clone(), progress);

        info!(job_id = %job_id, documents = documents.len(), concurrency = self.concurrency, "Starting batch");

        let permits = Arc::new(Semaphore::new(self.concurrency));
        let mut tasks = JoinSet::new();
        for document in documents {
            let indexer = Arc::clone(&self.indexer);
            let sink = Arc::clone(&self.sink);
            let permits = Arc::clone(&permits);
            tasks.spawn(async move {
                index_with_permit(permits, &indexer, sink.as_ref(), document).await
            });
        }

        while let Some(joined) = tasks.join_next().await {
            let outcome = joined.unwrap_or_else(|e| {
                Outcome::Failed(BatchItemError {
                    source: String::new(),
                    error: format!("indexing task failed: {}", e),
                })
            });
            self.record(&job_id, outcome);
        }

        if let Err(e) = self.sink.flush().await {
            warn!(job_id = %job_id, error = %e, "Failed to flush sink");
        }

        let mut jobs = self.jobs.write();
        let progress = jobs
            .entry(job_id.clone())
            .or_insert_with(|| BatchProgress::new(&job_id, 0));
        progress.status = if progress.total > 0 && progress.failed == progress.total {
            BatchStatus::Failed
        } else {
            BatchStatus::Completed
        };
        progress.completed_at = Some(chrono::Utc::now().to_rfc3339());

        info!(
            job_id = %job_id,
            processed = progress.processed,
            failed = progress.failed,
            entries = progress.entries_written,
            "Batch finished"
        );
        progress.clone()
    }

    /// Returns the progress of a job.
    pub fn progress(&self, job_id: &str) -> Option<BatchProgress> {
        self.jobs.read().get(job_id).cloned()
    }

    /// Lists all jobs (running and finished).
    pub fn list_jobs(&self) -> Vec<BatchProgress> {
        self.jobs.read().values().cloned().collect()
    }

    /// Removes a finished job and returns its final progress. Running jobs
    /// are kept.
    pub fn remove_job(&self, job_id: &str) -> Option<BatchProgress> {
        let mut jobs = self.jobs.write();
        if !jobs.get(job_id)?.status.is_finished() {
            return None;
        }
        jobs.remove(job_id)
    }

    /// Removes finished jobs that completed more than `max_age_seconds` ago.
    pub fn cleanup_old_jobs(&self, max_age_seconds: i64) {
        let cutoff = chrono::Utc::now() - chrono::Duration::seconds(max_age_seconds);

        self.jobs.write().retain(|job_id, progress| {
            let expired = progress.status.is_finished()
                && progress
                    .completed_at
                    .as_deref()
                    .and_then(|completed| chrono::DateTime::parse_from_rfc3339(completed).ok())
                    .is_some_and(|completed| completed.with_timezone(&chrono::Utc) < cutoff);
            if expired {
                debug!(job_id = %job_id, "Removing finished batch job");
            }
            !expired
        });
    }

    fn record(&self, job_id: &str, outcome: Outcome) {
        let mut jobs = self.jobs.write();
        let Some(progress) = jobs.get_mut(job_id) else {
            return;
        };
        match outcome {
            Outcome::Written {
                entries,
                skipped,
                chain_failures,
            } => {
                progress.processed += 1;
                progress.entries_written += entries as u64;
                progress.skipped_values += skipped as u64;
                progress.chain_failures += chain_failures as u64;
            }
            Outcome::Failed(error) => {
                progress.failed += 1;
                progress.errors.push(error);
            }
        }
    }
}

impl std::fmt::Debug for BatchIndexer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BatchIndexer")
            .field("concurrency", &self.concurrency)
            .field("jobs", &self.jobs.read().len())
            .finish()
    }
}

async fn index_with_permit(
    permits: Arc<Semaphore>,
    indexer: &Indexer,
    sink: &dyn EntrySink,
    document: BatchDocument,
) -> Outcome {
    let _permit = match permits.acquire_owned().await {
        Ok(permit) => permit,
        Err(e) => {
            warn!(source = %document.source, error = %e, "No indexing permit");
            return Outcome::Failed(BatchItemError {
                source: document.source,
                error: format!("concurrency limiter closed: {}", e),
            });
        }
    };
    index_one(indexer, sink, document).await
}

async fn index_one(indexer: &Indexer, sink: &dyn EntrySink, document: BatchDocument) -> Outcome {
    let failed = |error: String| {
        warn!(source = %document.source, error = %error, "Failed to index document");
        Outcome::Failed(BatchItemError {
            source: document.source.clone(),
            error,
        })
    };

    let projection = match indexer.index(&document.envelope).await {
        Ok(projection) => projection,
        Err(e) => return failed(e.to_string()),
    };

    let document_id = projection
        .document_id
        .clone()
        .unwrap_or_else(|| document.source.clone());
    let skipped = projection.skipped.len();
    let chain_failures = projection.chain_failures.len();
    let resource_type = projection.resource_type.clone();

    match sink
        .write_entries(&resource_type, &document_id, projection.into_entries())
        .await
    {
        Ok(entries) => {
            debug!(
                document_type = %resource_type,
                document_id = %document_id,
                entries,
                "Wrote entries"
            );
            Outcome::Written {
                entries,
                skipped,
                chain_failures,
            }
        }
        Err(e) => failed(e.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sink::InMemorySink;
    use serde_json::json;

    fn documents() -> Vec<BatchDocument> {
        vec![
            BatchDocument::new(
                "a.json",
                DocumentEnvelope::from_json(&json!({"resourceType": "Patient", "id": "p1", "gender": "male"})),
            ),
            BatchDocument::new(
                "b.json",
                DocumentEnvelope::from_json(&json!({"resourceType": "Task", "status": "ready"})),
            ),
            BatchDocument::new("c.json", DocumentEnvelope::new("{not json")),
        ]
    }

    #[tokio::test]
    async fn test_batch_run() {
        let indexer = Arc::new(Indexer::with_defaults("https://ex.org/fhir/").unwrap());
        let sink = Arc::new(InMemorySink::new());
        let batch = BatchIndexer::new(indexer, sink.clone()).with_concurrency(2);

        let progress = batch.run(documents()).await;
        assert_eq!(progress.status, BatchStatus::Completed);
        assert_eq!(progress.total, 3);
        assert_eq!(progress.processed, 2);
        assert_eq!(progress.failed, 1);
        assert_eq!(progress.errors[0].source, "c.json");
        assert_eq!(progress.entries_written as usize, sink.entry_count());
        assert_eq!(progress.percentage(), 100.0);

        // documents without an id are keyed by their source
        assert!(!sink.entries("Task", "b.json").is_empty());
        assert_eq!(batch.progress(&progress.job_id).unwrap().processed, 2);
        assert_eq!(batch.list_jobs().len(), 1);
    }

    #[tokio::test]
    async fn test_batch_all_failed() {
        let indexer = Arc::new(Indexer::with_defaults("https://ex.org/fhir/").unwrap());
        let batch = BatchIndexer::new(indexer, Arc::new(InMemorySink::new()));
        let progress = batch
            .run(vec![BatchDocument::new("x", DocumentEnvelope::new("[]"))])
            .await;
        assert_eq!(progress.status, BatchStatus::Failed);
        assert!(progress.has_errors());
    }

    #[tokio::test]
    async fn test_remove_and_cleanup_jobs() {
        let indexer = Arc::new(Indexer::with_defaults("https://ex.org/fhir/").unwrap());
        let batch = BatchIndexer::new(indexer, Arc::new(InMemorySink::new()));

        let first = batch.run(documents()).await;
        let second = batch.run(documents()).await;
        assert_eq!(batch.list_jobs().len(), 2);

        assert_eq!(batch.remove_job(&first.job_id).unwrap().job_id, first.job_id);
        assert!(batch.remove_job(&first.job_id).is_none());
        assert_eq!(batch.list_jobs().len(), 1);

        let mut stale = BatchProgress::new("stale", 1);
        stale.status = BatchStatus::Completed;
        stale.completed_at = Some("2000-01-01T00:00:00Z".to_string());
        let mut running = BatchProgress::new("running", 1);
        running.status = BatchStatus::InProgress;
        running.started_at = Some("2000-01-01T00:00:00Z".to_string());
        batch.jobs.write().insert("stale".into(), stale);
        batch.jobs.write().insert("running".into(), running);

        assert!(batch.remove_job("running").is_none());
        batch.cleanup_old_jobs(3600);
        assert!(batch.progress("stale").is_none());
        assert!(batch.progress("running").is_some());
        assert!(batch.progress(&second.job_id).is_some());
    }

    #[tokio::test]
    async fn test_closed_limiter_fails_document() {
        let indexer = Indexer::with_defaults("https://ex.org/fhir/").unwrap();
        let sink = InMemorySink::new();
        let permits = Arc::new(Semaphore::new(1));
        permits.close();

        let outcome = index_with_permit(permits, &indexer, &sink, documents().remove(0)).await;
        match outcome {
            Outcome::Failed(error) => assert_eq!(error.source, "a.json"),
            Outcome::Written { .. } => panic!("indexed without a permit"),
        }
        assert_eq!(sink.entry_count(), 0);
    }

    #[test]
    fn test_status() {
        assert!(BatchStatus::Queued.is_running());
        assert!(!BatchStatus::Failed.is_running());
        assert!(BatchStatus::Failed.is_finished());
        assert!(!BatchStatus::InProgress.is_finished());
        assert_eq!(BatchProgress::new("j", 0).percentage(), 0.0);
    }
}
