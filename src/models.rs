//! Core data models used throughout the park knowledge service.
//!
//! These types represent the documents, index points, and search results that
//! flow through the ingestion and retrieval pipeline, plus the JSON bodies of
//! the HTTP API.

use serde::{Deserialize, Serialize};

// ============ HTTP request/response bodies ============

/// Request body for `POST /ask` and `POST /ask/stream`.
#[derive(Debug, Clone, Deserialize)]
pub struct AskRequest {
    #[serde(default)]
    pub question: String,
}

/// Response body for a successful `POST /ask`.
#[derive(Debug, Clone, Serialize)]
pub struct AskResponse {
    pub answer: String,
}

/// Stable error body shape shared by every endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

impl ErrorResponse {
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
        }
    }
}

/// Request body for `POST /ingest`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct IngestRequest {
    #[serde(default)]
    pub documents: Vec<DocumentInput>,
}

/// One raw document submitted for ingestion.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentInput {
    #[serde(rename = "fileName")]
    pub file_name: String,
    pub content: String,
}

/// Response body for a successful `POST /ingest`.
#[derive(Debug, Clone, Serialize)]
pub struct IngestResponse {
    pub message: String,
    pub count: usize,
}

// ============ Domain records ============

/// Normalized park record produced by the parser.
///
/// `code` is the file stem of the source document and is the identity used
/// for content-addressed indexing: re-ingesting the same code overwrites the
/// stored point instead of duplicating it.
#[derive(Debug, Clone, PartialEq)]
pub struct ParkRecord {
    pub code: String,
    pub name: String,
    pub state: String,
    pub content: String,
    pub description: String,
}

/// A park record paired with its description embedding, ready to upsert.
#[derive(Debug, Clone)]
pub struct ParkPoint {
    pub code: String,
    pub name: String,
    pub state: String,
    pub content: String,
    pub embedding: Vec<f32>,
}

/// One retrieval hit from the vector index, in the index's ranking order.
#[derive(Debug, Clone, PartialEq)]
pub struct ParkSearchResult {
    pub park_code: String,
    pub park_name: String,
    pub state: String,
    pub content: String,
    pub score: f32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ask_request_missing_question_defaults_to_empty() {
        let req: AskRequest = serde_json::from_str("{}").unwrap();
        assert_eq!(req.question, "");
    }

    #[test]
    fn document_input_uses_camel_case_file_name() {
        let doc: DocumentInput =
            serde_json::from_str(r#"{"fileName": "acad.txt", "content": "x"}"#).unwrap();
        assert_eq!(doc.file_name, "acad.txt");

        let json = serde_json::to_string(&doc).unwrap();
        assert!(json.contains("\"fileName\""));
    }

    #[test]
    fn error_response_serializes_single_field() {
        let body = serde_json::to_value(ErrorResponse::new("boom")).unwrap();
        assert_eq!(body, serde_json::json!({ "error": "boom" }));
    }

    #[test]
    fn ingest_response_shape() {
        let body = serde_json::to_value(IngestResponse {
            message: "Successfully ingested 2 parks.".to_string(),
            count: 2,
        })
        .unwrap();
        assert_eq!(body["message"], "Successfully ingested 2 parks.");
        assert_eq!(body["count"], 2);
    }
}
