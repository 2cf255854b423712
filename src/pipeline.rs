//! Ingestion pipeline orchestration.
//!
//! Coordinates the write path: parse documents, ensure the collection
//! exists, embed every description in one batch, and upsert the points.
//! Individual malformed documents are skipped with a warning; the request
//! fails only when nothing valid remains.

use anyhow::anyhow;
use std::path::Path;
use std::sync::Arc;

use crate::embedding::EmbeddingGenerator;
use crate::models::{DocumentInput, IngestResponse, ParkPoint, ParkRecord};
use crate::parser::parse_document;
use crate::qdrant::VectorIndex;

/// Ingestion failure, split along the HTTP response boundary.
#[derive(Debug)]
pub enum IngestError {
    /// Nothing to do: surfaced as a 400, never retried.
    Validation(String),
    /// An upstream dependency (embedding generator, vector index) failed.
    Upstream(anyhow::Error),
}

/// Run the full ingestion flow over a batch of raw documents.
///
/// Steps execute strictly in order: parse, ensure-collection, embed-batch,
/// upsert. The upsert is one idempotent batch; re-ingesting a park code
/// overwrites its point.
pub async fn ingest_documents(
    embedder: &Arc<dyn EmbeddingGenerator>,
    index: &Arc<dyn VectorIndex>,
    documents: &[DocumentInput],
) -> Result<IngestResponse, IngestError> {
    if documents.is_empty() {
        return Err(IngestError::Validation(
            "No documents found to ingest.".to_string(),
        ));
    }

    println!("Processing {} documents for ingestion", documents.len());

    index
        .ensure_collection()
        .await
        .map_err(IngestError::Upstream)?;

    let mut records: Vec<ParkRecord> = Vec::with_capacity(documents.len());
    for document in documents {
        match parse_document(&document.file_name, &document.content) {
            Some(record) => records.push(record),
            None => {
                eprintln!(
                    "warning: skipping {}: insufficient content",
                    document.file_name
                );
            }
        }
    }

    if records.is_empty() {
        return Err(IngestError::Validation(
            "No valid documents to ingest after parsing.".to_string(),
        ));
    }

    // One batch for all descriptions; the generator preserves input order.
    let descriptions: Vec<String> = records.iter().map(|r| r.description.clone()).collect();
    let embeddings = embedder
        .generate(&descriptions)
        .await
        .map_err(IngestError::Upstream)?;

    if embeddings.len() != records.len() {
        return Err(IngestError::Upstream(anyhow!(
            "embedding generator returned {} vectors for {} inputs",
            embeddings.len(),
            records.len()
        )));
    }

    let points: Vec<ParkPoint> = records
        .into_iter()
        .zip(embeddings)
        .map(|(record, embedding)| ParkPoint {
            code: record.code,
            name: record.name,
            state: record.state,
            content: record.content,
            embedding,
        })
        .collect();

    let count = points.len();
    index
        .upsert_parks(&points)
        .await
        .map_err(IngestError::Upstream)?;

    println!("Successfully ingested {} parks", count);

    Ok(IngestResponse {
        message: format!("Successfully ingested {} parks.", count),
        count,
    })
}

/// Read `*.txt` park files from a local directory, for the `parkd ingest`
/// subcommand.
pub fn read_park_dir(dir: &Path) -> anyhow::Result<Vec<DocumentInput>> {
    let mut documents = Vec::new();

    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();

        if path.extension().and_then(|e| e.to_str()) != Some("txt") {
            continue;
        }

        let file_name = match path.file_name().and_then(|n| n.to_str()) {
            Some(name) => name.to_string(),
            None => continue,
        };

        let content = std::fs::read_to_string(&path)?;
        documents.push(DocumentInput { file_name, content });
    }

    documents.sort_by(|a, b| a.file_name.cmp(&b.file_name));
    Ok(documents)
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::Mutex;

    use crate::models::ParkSearchResult;
    use crate::qdrant::point_id;

    struct StubEmbedder {
        inputs: Mutex<Vec<String>>,
    }

    impl StubEmbedder {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                inputs: Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait]
    impl EmbeddingGenerator for StubEmbedder {
        async fn generate(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
            self.inputs.lock().unwrap().extend(texts.iter().cloned());
            Ok(texts.iter().map(|_| vec![0.5, 0.5]).collect())
        }

        fn dims(&self) -> usize {
            2
        }
    }

    /// Models the same-id-replaces contract of the real index.
    struct RecordingIndex {
        points: Mutex<HashMap<String, ParkPoint>>,
    }

    impl RecordingIndex {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                points: Mutex::new(HashMap::new()),
            })
        }
    }

    #[async_trait]
    impl VectorIndex for RecordingIndex {
        async fn ensure_collection(&self) -> Result<()> {
            Ok(())
        }

        async fn upsert_parks(&self, parks: &[ParkPoint]) -> Result<()> {
            let mut stored = self.points.lock().unwrap();
            for park in parks {
                stored.insert(point_id(&park.code).to_string(), park.clone());
            }
            Ok(())
        }

        async fn search(
            &self,
            _query_embedding: &[f32],
            _limit: usize,
        ) -> Result<Vec<ParkSearchResult>> {
            Ok(Vec::new())
        }

        async fn ping(&self) -> Result<usize> {
            Ok(1)
        }
    }

    fn doc(file_name: &str, content: &str) -> DocumentInput {
        DocumentInput {
            file_name: file_name.to_string(),
            content: content.to_string(),
        }
    }

    fn deps() -> (Arc<dyn EmbeddingGenerator>, Arc<dyn VectorIndex>) {
        (StubEmbedder::new(), RecordingIndex::new())
    }

    #[tokio::test]
    async fn empty_request_is_a_validation_error() {
        let (embedder, index) = deps();
        let err = ingest_documents(&embedder, &index, &[]).await.unwrap_err();
        match err {
            IngestError::Validation(message) => {
                assert_eq!(message, "No documents found to ingest.")
            }
            other => panic!("expected validation error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn all_invalid_documents_is_a_validation_error() {
        let (embedder, index) = deps();
        let documents = vec![doc("a.txt", "only one line"), doc("b.txt", "")];

        let err = ingest_documents(&embedder, &index, &documents)
            .await
            .unwrap_err();
        match err {
            IngestError::Validation(message) => {
                assert!(message.contains("No valid documents"))
            }
            other => panic!("expected validation error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn invalid_documents_are_skipped_not_fatal() {
        let (embedder, index) = deps();
        let documents = vec![
            doc("acad.txt", "Acadia National Park\nState(s): ME\n"),
            doc("bad.txt", "too short"),
        ];

        let response = ingest_documents(&embedder, &index, &documents)
            .await
            .unwrap();
        assert_eq!(response.count, 1);
        assert_eq!(response.message, "Successfully ingested 1 parks.");
    }

    #[tokio::test]
    async fn reingest_overwrites_the_same_point() {
        let embedder: Arc<dyn EmbeddingGenerator> = StubEmbedder::new();
        let recording = RecordingIndex::new();
        let index: Arc<dyn VectorIndex> = recording.clone();

        let first = vec![doc("acad.txt", "Acadia National Park\nState(s): ME\nOld.")];
        let second = vec![doc("acad.txt", "Acadia National Park\nState(s): ME\nNew.")];

        ingest_documents(&embedder, &index, &first).await.unwrap();
        ingest_documents(&embedder, &index, &second).await.unwrap();

        let stored = recording.points.lock().unwrap();
        assert_eq!(stored.len(), 1, "same code must map to one point");
        let point = stored.values().next().unwrap();
        assert!(point.content.contains("New."));
    }

    #[tokio::test]
    async fn embeds_the_extracted_description_not_the_whole_file() {
        let stub = StubEmbedder::new();
        let embedder: Arc<dyn EmbeddingGenerator> = stub.clone();
        let (_, index) = deps();

        let content =
            "Acadia National Park\nState(s): ME\n\nDescription:\nRocky coastline.\n\nDirections:\nGo north.";
        ingest_documents(&embedder, &index, &[doc("acad.txt", content)])
            .await
            .unwrap();

        let inputs = stub.inputs.lock().unwrap();
        assert_eq!(inputs.len(), 1);
        assert!(inputs[0].contains("Rocky coastline."));
        assert!(!inputs[0].contains("Go north."));
    }

    #[test]
    fn read_park_dir_picks_up_txt_files_only() {
        let tmp = tempfile::TempDir::new().unwrap();
        std::fs::write(tmp.path().join("acad.txt"), "Acadia\nState(s): ME").unwrap();
        std::fs::write(tmp.path().join("yell.txt"), "Yellowstone\nState(s): WY").unwrap();
        std::fs::write(tmp.path().join("notes.md"), "ignored").unwrap();

        let documents = read_park_dir(tmp.path()).unwrap();
        assert_eq!(documents.len(), 2);
        assert_eq!(documents[0].file_name, "acad.txt");
        assert_eq!(documents[1].file_name, "yell.txt");
    }
}
