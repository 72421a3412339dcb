//! Input collection.

use std::path::{Path, PathBuf};

use anyhow::Context;
use helios_index::BatchDocument;
use helios_index::types::DocumentEnvelope;
use serde_json::Value;
use tracing::debug;

/// Expands files and directories into the JSON files to index, sorted per
/// directory.
pub fn collect_files(inputs: &[PathBuf]) -> anyhow::Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for input in inputs {
        if input.is_dir() {
            walk(input, &mut files)?;
        } else if input.is_file() {
            files.push(input.clone());
        } else {
            anyhow::bail!("Input {} does not exist", input.display());
        }
    }
    Ok(files)
}

fn walk(dir: &Path, files: &mut Vec<PathBuf>) -> anyhow::Result<()> {
    let mut entries: Vec<PathBuf> = std::fs::read_dir(dir)
        .with_context(|| format!("reading directory {}", dir.display()))?
        .map(|entry| entry.map(|e| e.path()))
        .collect::<Result<_, _>>()?;
    entries.sort();

    for path in entries {
        if path.is_dir() {
            walk(&path, files)?;
        } else if path.extension().is_some_and(|ext| ext == "json") {
            files.push(path);
        }
    }
    Ok(())
}

/// Reads one file into batch documents. A Bundle yields one document per
/// entry resource; anything else (including invalid JSON, which the
/// indexer reports) is passed through as-is.
pub async fn read_documents(path: &Path) -> anyhow::Result<Vec<BatchDocument>> {
    let body = tokio::fs::read(path)
        .await
        .with_context(|| format!("reading {}", path.display()))?;
    let source = path.display().to_string();

    let Ok(value) = serde_json::from_slice::<Value>(&body) else {
        return Ok(vec![BatchDocument::new(source, DocumentEnvelope::new(body))]);
    };

    if value.get("resourceType").and_then(Value::as_str) != Some("Bundle") {
        return Ok(vec![BatchDocument::new(source, DocumentEnvelope::new(body))]);
    }

    let documents: Vec<BatchDocument> = value
        .get("entry")
        .and_then(Value::as_array)
        .map(|entries| {
            entries
                .iter()
                .enumerate()
                .filter_map(|(i, entry)| {
                    entry.get("resource").map(|resource| {
                        BatchDocument::new(
                            format!("{}#entry[{}]", source, i),
                            DocumentEnvelope::from_json(resource),
                        )
                    })
                })
                .collect()
        })
        .unwrap_or_default();

    debug!(source = %source, documents = documents.len(), "Expanded bundle");
    Ok(documents)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_collect_files() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("nested")).unwrap();
        std::fs::write(dir.path().join("b.json"), "{}").unwrap();
        std::fs::write(dir.path().join("a.json"), "{}").unwrap();
        std::fs::write(dir.path().join("notes.txt"), "").unwrap();
        std::fs::write(dir.path().join("nested").join("c.json"), "{}").unwrap();

        let files = collect_files(&[dir.path().to_path_buf()]).unwrap();
        let names: Vec<String> = files
            .iter()
            .map(|f| f.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["a.json", "b.json", "c.json"]);

        assert!(collect_files(&[dir.path().join("missing.json")]).is_err());
    }

    #[tokio::test]
    async fn test_read_bundle() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bundle.json");
        std::fs::write(
            &path,
            r#"{"resourceType": "Bundle", "type": "collection", "entry": [
                {"resource": {"resourceType": "Patient", "id": "p1"}},
                {"fullUrl": "urn:uuid:1"},
                {"resource": {"resourceType": "Patient", "id": "p2"}}
            ]}"#,
        )
        .unwrap();

        let documents = read_documents(&path).await.unwrap();
        assert_eq!(documents.len(), 2);
        assert!(documents[1].source.ends_with("#entry[2]"));
    }

    #[tokio::test]
    async fn test_read_plain_and_invalid() {
        let dir = tempfile::tempdir().unwrap();
        let plain = dir.path().join("p.json");
        let invalid = dir.path().join("x.json");
        std::fs::write(&plain, r#"{"resourceType": "Patient", "id": "p1"}"#).unwrap();
        std::fs::write(&invalid, "{oops").unwrap();

        assert_eq!(read_documents(&plain).await.unwrap().len(), 1);
        assert_eq!(read_documents(&invalid).await.unwrap().len(), 1);
    }
}
