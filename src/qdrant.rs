//! Qdrant-backed vector index.
//!
//! Wraps one named Qdrant collection behind the [`VectorIndex`] trait:
//! lifecycle (create-if-absent), batched point upsert, and cosine
//! nearest-neighbor search over the REST API.
//!
//! Point identifiers are content-addressed: the UUID for a park is derived
//! from its code, so re-ingesting a park overwrites its point in place and
//! the collection never accumulates duplicates.

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use sha2::{Digest, Sha256};
use std::time::Duration;
use uuid::Uuid;

use crate::config::QdrantConfig;
use crate::models::{ParkPoint, ParkSearchResult};

/// Vector database operations the pipeline and search tool depend on.
///
/// `QdrantIndex` is the production implementation; tests substitute
/// in-memory fakes.
#[async_trait]
pub trait VectorIndex: Send + Sync {
    /// Create the collection if it does not exist yet. Idempotent, called on
    /// every ingestion request.
    async fn ensure_collection(&self) -> Result<()>;

    /// Write a batch of park points. Same-id writes replace the stored
    /// vector and payload.
    async fn upsert_parks(&self, parks: &[ParkPoint]) -> Result<()>;

    /// Nearest points to `query_embedding` by cosine similarity, best first,
    /// each with its stored payload and score. Fails whole when the backing
    /// service is unreachable; zero hits is a valid outcome.
    async fn search(&self, query_embedding: &[f32], limit: usize)
        -> Result<Vec<ParkSearchResult>>;

    /// Lightweight reachability probe; returns the collection count.
    async fn ping(&self) -> Result<usize>;
}

/// Deterministic point identifier for a park code.
///
/// Consumes the first 128 bits of `SHA-256(code)` as a UUID, so the same
/// code always maps to the same point and distinct codes collide only with
/// negligible probability.
pub fn point_id(code: &str) -> Uuid {
    let digest = Sha256::digest(code.as_bytes());
    let mut bytes = [0u8; 16];
    bytes.copy_from_slice(&digest[..16]);
    Uuid::from_bytes(bytes)
}

/// Qdrant REST client scoped to a single collection.
pub struct QdrantIndex {
    client: reqwest::Client,
    url: String,
    collection: String,
    dims: usize,
}

impl QdrantIndex {
    pub fn new(config: &QdrantConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .context("failed to build Qdrant HTTP client")?;

        Ok(Self {
            client,
            url: config.url.trim_end_matches('/').to_string(),
            collection: config.collection.clone(),
            dims: config.dims,
        })
    }

    async fn list_collections(&self) -> Result<Vec<String>> {
        let resp = self
            .client
            .get(format!("{}/collections", self.url))
            .send()
            .await
            .context("Qdrant unreachable while listing collections")?;

        let json = check_response(resp).await?;
        Ok(parse_collection_names(&json))
    }
}

#[async_trait]
impl VectorIndex for QdrantIndex {
    async fn ensure_collection(&self) -> Result<()> {
        let existing = self.list_collections().await?;

        if existing.iter().any(|name| name == &self.collection) {
            return Ok(());
        }

        let body = serde_json::json!({
            "vectors": { "size": self.dims, "distance": "Cosine" }
        });

        let resp = self
            .client
            .put(format!("{}/collections/{}", self.url, self.collection))
            .json(&body)
            .send()
            .await
            .context("Qdrant unreachable while creating collection")?;

        check_response(resp).await?;
        println!(
            "Created collection '{}' with {} dimensions",
            self.collection, self.dims
        );
        Ok(())
    }

    async fn upsert_parks(&self, parks: &[ParkPoint]) -> Result<()> {
        if parks.is_empty() {
            return Ok(());
        }

        for park in parks {
            if park.embedding.len() != self.dims {
                bail!(
                    "embedding for '{}' has {} dimensions, collection expects {}",
                    park.code,
                    park.embedding.len(),
                    self.dims
                );
            }
        }

        let points: Vec<serde_json::Value> = parks
            .iter()
            .map(|park| {
                serde_json::json!({
                    "id": point_id(&park.code).to_string(),
                    "vector": park.embedding,
                    "payload": {
                        "park_code": park.code,
                        "park_name": park.name,
                        "state": park.state,
                        "content": park.content,
                    }
                })
            })
            .collect();

        let resp = self
            .client
            .put(format!(
                "{}/collections/{}/points?wait=true",
                self.url, self.collection
            ))
            .json(&serde_json::json!({ "points": points }))
            .send()
            .await
            .context("Qdrant unreachable while upserting points")?;

        check_response(resp).await?;
        println!(
            "Upserted {} points into '{}'",
            parks.len(),
            self.collection
        );
        Ok(())
    }

    async fn search(
        &self,
        query_embedding: &[f32],
        limit: usize,
    ) -> Result<Vec<ParkSearchResult>> {
        let body = serde_json::json!({
            "vector": query_embedding,
            "limit": limit,
            "with_payload": true,
        });

        let resp = self
            .client
            .post(format!(
                "{}/collections/{}/points/search",
                self.url, self.collection
            ))
            .json(&body)
            .send()
            .await
            .context("Qdrant unreachable while searching")?;

        let json = check_response(resp).await?;
        parse_search_response(&json)
    }

    async fn ping(&self) -> Result<usize> {
        Ok(self.list_collections().await?.len())
    }
}

/// Fail on non-2xx with the response body in the error, otherwise parse JSON.
async fn check_response(resp: reqwest::Response) -> Result<serde_json::Value> {
    let status = resp.status();
    if !status.is_success() {
        let body = resp.text().await.unwrap_or_default();
        bail!("Qdrant returned {}: {}", status, body);
    }
    resp.json().await.context("invalid JSON from Qdrant")
}

fn parse_collection_names(json: &serde_json::Value) -> Vec<String> {
    json.pointer("/result/collections")
        .and_then(|c| c.as_array())
        .map(|collections| {
            collections
                .iter()
                .filter_map(|c| c.get("name").and_then(|n| n.as_str()))
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}

/// Map scored points back to the domain model, keeping Qdrant's ranking
/// order. Missing payload fields become empty strings rather than errors.
fn parse_search_response(json: &serde_json::Value) -> Result<Vec<ParkSearchResult>> {
    let points = json
        .get("result")
        .and_then(|r| r.as_array())
        .ok_or_else(|| anyhow::anyhow!("Invalid Qdrant search response: missing result array"))?;

    let results = points
        .iter()
        .map(|point| {
            let payload = point.get("payload");
            let field = |name: &str| {
                payload
                    .and_then(|p| p.get(name))
                    .and_then(|v| v.as_str())
                    .unwrap_or("")
                    .to_string()
            };

            ParkSearchResult {
                park_code: field("park_code"),
                park_name: field("park_name"),
                state: field("state"),
                content: field("content"),
                score: point.get("score").and_then(|s| s.as_f64()).unwrap_or(0.0) as f32,
            }
        })
        .collect();

    Ok(results)
}
