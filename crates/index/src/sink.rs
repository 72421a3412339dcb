//! Entry sinks.
//!
//! Projection hands its entries to an [`EntrySink`], which owns
//! persistence. Two sinks are provided: [`InMemorySink`] for tests and
//! embedding, and [`JsonLinesSink`], which writes one JSON object per entry.

use std::collections::HashMap;
use std::io::Write;

use async_trait::async_trait;
use parking_lot::{Mutex, RwLock};
use serde::Serialize;

use crate::error::SinkError;
use crate::types::{Entry, EntryRecord};

/// Receives the entries produced for a document.
#[async_trait]
pub trait EntrySink: Send + Sync {
    /// Stores the entries for one document, replacing any previous ones.
    ///
    /// # Returns
    ///
    /// The number of entries written.
    async fn write_entries(
        &self,
        resource_type: &str,
        document_id: &str,
        entries: Vec<Entry>,
    ) -> Result<usize, SinkError>;

    /// Removes all entries of one document.
    ///
    /// # Returns
    ///
    /// The number of entries removed.
    async fn delete_entries(&self, resource_type: &str, document_id: &str) -> Result<usize, SinkError>;

    /// Flushes buffered output.
    async fn flush(&self) -> Result<(), SinkError> {
        Ok(())
    }
}

/// Sink holding entries in memory, keyed by `(type, id)`.
#[derive(Debug, Default)]
pub struct InMemorySink {
    documents: RwLock<HashMap<(String, String), Vec<Entry>>>,
}

impl InMemorySink {
    /// Creates an empty sink.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the entries stored for one document.
    pub fn entries(&self, resource_type: &str, document_id: &str) -> Vec<Entry> {
        self.documents
            .read()
            .get(&(resource_type.to_string(), document_id.to_string()))
            .cloned()
            .unwrap_or_default()
    }

    /// Returns the number of documents stored.
    pub fn document_count(&self) -> usize {
        self.documents.read().len()
    }

    /// Returns the total number of entries stored.
    pub fn entry_count(&self) -> usize {
        self.documents.read().values().map(Vec::len).sum()
    }
}

#[async_trait]
impl EntrySink for InMemorySink {
    async fn write_entries(
        &self,
        resource_type: &str,
        document_id: &str,
        entries: Vec<Entry>,
    ) -> Result<usize, SinkError> {
        let count = entries.len();
        self.documents
            .write()
            .insert((resource_type.to_string(), document_id.to_string()), entries);
        Ok(count)
    }

    async fn delete_entries(&self, resource_type: &str, document_id: &str) -> Result<usize, SinkError> {
        Ok(self
            .documents
            .write()
            .remove(&(resource_type.to_string(), document_id.to_string()))
            .map(|entries| entries.len())
            .unwrap_or(0))
    }
}

#[derive(Serialize)]
struct EntryLine<'a> {
    resource_type: &'a str,
    document_id: &'a str,
    #[serde(flatten)]
    record: EntryRecord,
}

#[derive(Serialize)]
struct DeleteLine<'a> {
    resource_type: &'a str,
    document_id: &'a str,
    deleted: bool,
}

/// Append-only sink writing one JSON object per line.
///
/// Deletes are written as `{"resource_type", "document_id", "deleted": true}`
/// markers; readers replay the stream in order.
pub struct JsonLinesSink<W> {
    writer: Mutex<W>,
}

impl<W: Write + Send> JsonLinesSink<W> {
    /// Creates a sink writing to `writer`.
    pub fn new(writer: W) -> Self {
        Self {
            writer: Mutex::new(writer),
        }
    }

    /// Consumes the sink, returning the writer.
    pub fn into_inner(self) -> W {
        self.writer.into_inner()
    }
}

impl<W> std::fmt::Debug for JsonLinesSink<W> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JsonLinesSink").finish_non_exhaustive()
    }
}

#[async_trait]
impl<W: Write + Send> EntrySink for JsonLinesSink<W> {
    async fn write_entries(
        &self,
        resource_type: &str,
        document_id: &str,
        entries: Vec<Entry>,
    ) -> Result<usize, SinkError> {
        let mut buffer = Vec::new();
        for entry in &entries {
            let line = EntryLine {
                resource_type,
                document_id,
                record: entry.to_record(),
            };
            serde_json::to_writer(&mut buffer, &line)?;
            buffer.push(b'\n');
        }

        self.writer.lock().write_all(&buffer)?;
        Ok(entries.len())
    }

    async fn delete_entries(&self, resource_type: &str, document_id: &str) -> Result<usize, SinkError> {
        let mut buffer = serde_json::to_vec(&DeleteLine {
            resource_type,
            document_id,
            deleted: true,
        })?;
        buffer.push(b'\n');
        self.writer.lock().write_all(&buffer)?;
        Ok(0)
    }

    async fn flush(&self) -> Result<(), SinkError> {
        self.writer.lock().flush()?;
        Ok(())
    }
}
