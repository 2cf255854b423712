//! The park search capability exposed through the tool bridge.
//!
//! Composes the embedding generator with the vector index and formats hits
//! into one text block the language model can ground its answer in.

use anyhow::Result;
use std::sync::Arc;

use crate::embedding::EmbeddingGenerator;
use crate::models::ParkSearchResult;
use crate::qdrant::VectorIndex;

/// How many hits a single search returns.
const SEARCH_LIMIT: usize = 5;

/// Returned verbatim when the index has nothing relevant. A miss is a valid
/// answer for the model to relay, not an error.
pub const NO_RESULTS_MESSAGE: &str = "No park information found for that query.";

pub struct SearchTool {
    embedder: Arc<dyn EmbeddingGenerator>,
    index: Arc<dyn VectorIndex>,
}

impl SearchTool {
    pub fn new(embedder: Arc<dyn EmbeddingGenerator>, index: Arc<dyn VectorIndex>) -> Self {
        Self { embedder, index }
    }

    /// Embed the query, run the similarity search, and format the hits.
    pub async fn search(&self, query: &str) -> Result<String> {
        let embeddings = self.embedder.generate(&[query.to_string()]).await?;
        let query_embedding = embeddings
            .first()
            .ok_or_else(|| anyhow::anyhow!("Empty embedding response"))?;

        let results = self.index.search(query_embedding, SEARCH_LIMIT).await?;

        if results.is_empty() {
            return Ok(NO_RESULTS_MESSAGE.to_string());
        }

        Ok(format_results(&results))
    }
}

/// One markdown block per hit, in the index's ranking order. The score is
/// rendered to exactly three decimal places.
fn format_results(results: &[ParkSearchResult]) -> String {
    let mut out = String::new();
    for r in results {
        out.push_str(&format!(
            "## {} ({}) — {}  [score: {:.3}]\n",
            r.park_name, r.park_code, r.state, r.score
        ));
        out.push_str(&r.content);
        out.push('\n');
        out.push('\n');
    }
    out
}
